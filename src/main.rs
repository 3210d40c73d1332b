use clap::Parser;
use schemaform::adapters::fetch::{DisabledFetcher, HttpSchemaFetcher, SchemaFetcher};
use schemaform::cli::{parse_assignment, Cli, OutputFormat};
use schemaform::config::Settings;
use schemaform::engine::resolver::is_remote_url;
use schemaform::FormTree;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let fetcher: Box<dyn SchemaFetcher> = if settings.fetch.enabled {
        Box::new(HttpSchemaFetcher::new(&settings.fetch)?)
    } else {
        Box::new(DisabledFetcher)
    };

    let schema = load_schema(&cli.schema, fetcher.as_ref()).await?;
    info!("Compiling schema from {}", cli.schema);
    let mut tree = FormTree::load(schema, fetcher.as_ref(), settings.compiler.clone()).await;

    if let Some(path) = &cli.value {
        let raw = tokio::fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&raw)?;
        tree.patch(&value);
    }

    for raw in &cli.set {
        let (path, value) = parse_assignment(raw).map_err(anyhow::Error::msg)?;
        match tree.find(&path) {
            Some(id) => tree.set_value(id, value)?,
            None => anyhow::bail!("No field at path '{}'", path),
        }
    }

    match cli.output {
        OutputFormat::Value => println!("{}", serde_json::to_string_pretty(&tree.read())?),
        OutputFormat::Tree => print!("{}", tree.outline()),
        OutputFormat::Diagnostics => {
            for diagnostic in tree.diagnostics() {
                println!("{}", diagnostic);
            }
        }
    }

    if !tree.diagnostics().is_empty() {
        warn!("{} diagnostics recorded", tree.diagnostics().len());
    }

    Ok(())
}

/// Read the root schema from a file path or http(s) URL
async fn load_schema(source: &str, fetcher: &dyn SchemaFetcher) -> anyhow::Result<Value> {
    if is_remote_url(source) {
        return Ok(fetcher.fetch(source).await?);
    }
    let raw = tokio::fs::read_to_string(source).await?;
    Ok(serde_json::from_str(&raw)?)
}
