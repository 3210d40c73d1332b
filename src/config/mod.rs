use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod validator;

use crate::cli::Cli;

pub const DEFAULT_CONFIG_FILE: &str = "schemaform.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub compiler: CompilerSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub log: LogSettings,
}

/// Knobs of the node compiler
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CompilerSettings {
    /// Enum fields with at least this many options render as `select`, else `radio`
    #[serde(default = "default_select_threshold")]
    pub select_threshold: usize,
    /// Prefix of synthesized keys (selectors, parameter adders); value keys with
    /// this prefix are never turned into custom properties
    #[serde(default = "default_reserved_prefix")]
    pub reserved_prefix: String,
    /// Maximum schema nesting followed by a single compile pass
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            select_threshold: default_select_threshold(),
            reserved_prefix: default_reserved_prefix(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_select_threshold() -> usize {
    5
}

fn default_reserved_prefix() -> String {
    "__".to_string()
}

fn default_max_depth() -> usize {
    32
}

/// Remote schema fetching
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FetchSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timeout_seconds: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("schemaform/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogSettings {
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load settings from an optional TOML file, then `SCHEMAFORM_*` environment
    /// variables (`SCHEMAFORM_COMPILER__SELECT_THRESHOLD=7`).
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("SCHEMAFORM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        Ok(settings)
    }

    /// Create settings from CLI arguments (includes config file and CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::from_file(&cli.config)?;

        // CLI > env vars > config file
        settings.apply_cli_overrides(cli);

        if let Err(errors) = validator::ConfigValidator::validate(&settings) {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            anyhow::bail!("Invalid configuration: {}", message);
        }

        Ok(settings)
    }

    pub fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(level) = &cli.log_level {
            self.log.level = level.clone();
        }
        if let Some(threshold) = cli.select_threshold {
            self.compiler.select_threshold = threshold;
        }
        if let Some(enabled) = cli.fetch_enabled {
            self.fetch.enabled = enabled;
        }
        if let Some(timeout) = cli.fetch_timeout {
            self.fetch.timeout_seconds = timeout;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.compiler.select_threshold, 5);
        assert_eq!(settings.compiler.reserved_prefix, "__");
        assert!(settings.fetch.enabled);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "schemaform",
            "--schema",
            "form.json",
            "--log-level",
            "debug",
            "--select-threshold",
            "3",
            "--fetch-enabled",
            "false",
        ]);
        let mut settings = Settings::default();
        settings.apply_cli_overrides(&cli);

        assert_eq!(settings.log.level, "debug");
        assert_eq!(settings.compiler.select_threshold, 3);
        assert!(!settings.fetch.enabled);
        assert_eq!(settings.fetch.timeout_seconds, 30);
    }
}
