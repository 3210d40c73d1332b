use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;

/// Compile a JSON Schema into a form tree, optionally fill it, and print the result
#[derive(Parser, Debug, Clone)]
#[command(name = "schemaform", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "SCHEMAFORM_CONFIG", default_value = "schemaform.toml")]
    pub config: PathBuf,

    /// Schema document: a file path or an http(s) URL
    #[arg(short, long)]
    pub schema: String,

    /// JSON file whose contents are patched into the compiled form
    #[arg(long)]
    pub value: Option<PathBuf>,

    /// Set a field after patching, e.g. `--set country='"USA"'` (repeatable, applied in order)
    #[arg(long = "set", value_name = "PATH=JSON")]
    pub set: Vec<String>,

    /// What to print
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Value)]
    pub output: OutputFormat,

    /// Default log filter (overridden by RUST_LOG)
    #[arg(long, env = "SCHEMAFORM_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Enum option count at which fields render as select instead of radio
    #[arg(long)]
    pub select_threshold: Option<usize>,

    /// Enable fetching of remote $ref documents
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub fetch_enabled: Option<bool>,

    /// Remote fetch timeout in seconds
    #[arg(long)]
    pub fetch_timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Read-back JSON value
    Value,
    /// Indented outline of the live tree
    Tree,
    /// Diagnostics recorded while compiling and patching
    Diagnostics,
}

/// Split `path=json` into a path and a JSON value. Values that are not valid JSON
/// are taken as plain strings.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (path, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Expected PATH=VALUE, got '{}'", raw))?;
    let path = path.trim();
    if path.is_empty() {
        return Err(format!("Missing path in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((path.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["schemaform", "--schema", "form.json"]);
        assert_eq!(cli.config, PathBuf::from("schemaform.toml"));
        assert_eq!(cli.schema, "form.json");
        assert!(cli.value.is_none());
        assert!(cli.set.is_empty());
        assert_eq!(cli.output, OutputFormat::Value);
        assert!(cli.fetch_enabled.is_none());
    }

    #[test]
    fn test_cli_with_args() {
        let cli = Cli::parse_from([
            "schemaform",
            "--config",
            "custom.toml",
            "--schema",
            "https://example.com/form.json",
            "--value",
            "value.json",
            "--set",
            "country=\"USA\"",
            "--set",
            "age=42",
            "--output",
            "tree",
            "--fetch-enabled",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.value, Some(PathBuf::from("value.json")));
        assert_eq!(cli.set.len(), 2);
        assert_eq!(cli.output, OutputFormat::Tree);
        assert_eq!(cli.fetch_enabled, Some(true));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("country=\"USA\"").unwrap(),
            ("country".to_string(), json!("USA"))
        );
        assert_eq!(
            parse_assignment("items[0].qty=3").unwrap(),
            ("items[0].qty".to_string(), json!(3))
        );
        assert_eq!(
            parse_assignment("name=Ada").unwrap(),
            ("name".to_string(), json!("Ada"))
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }
}
