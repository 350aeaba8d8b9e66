use anyhow::Result;
use clap::Parser;
use kuku::cli::{Cli, Commands};
use kuku::config::Config;
use kuku::relay::{GeminiClient, QueryPipeline};
use kuku::server::{self, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => handle_serve(config, host, port).await?,
        Commands::Ask { question, json } => handle_ask(&config, &question, json).await?,
        Commands::Prompt { question } => handle_prompt(&config, &question)?,
        Commands::Config => handle_config(&config)?,
    }

    Ok(())
}

fn init_pipeline(config: &Config) -> Result<QueryPipeline> {
    tracing::info!(
        "Using model {} at {} ({:?} mode)",
        config.llm.model,
        config.llm.base_url,
        config.mode
    );
    let backend = GeminiClient::new(&config.llm)?;
    Ok(QueryPipeline::new(config, Arc::new(backend)))
}

async fn handle_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let pipeline = init_pipeline(&config)?;
    let state = Arc::new(AppState { pipeline });

    println!(
        "Starting kuku server on {}:{}",
        config.server.host, config.server.port
    );
    println!("Endpoints:");
    println!("  POST /api/chat - Ask a poultry question");
    println!("  GET  /health   - Liveness check");
    println!("  GET  /         - Service info");

    server::run_server(state, &config.server).await
}

async fn handle_ask(config: &Config, question: &str, json: bool) -> Result<()> {
    let pipeline = init_pipeline(config)?;
    let input = serde_json::json!({ first_alias(config): question });

    match pipeline.handle(&input).await {
        Ok(response) if json => println!("{}", serde_json::to_string_pretty(&response)?),
        Ok(response) => println!("{}", response.response),
        Err(error) if json => println!("{}", serde_json::to_string_pretty(&error)?),
        Err(error) => match error.details {
            Some(details) => anyhow::bail!("{} ({})", error.error, details),
            None => anyhow::bail!("{}", error.error),
        },
    }

    Ok(())
}

fn handle_prompt(config: &Config, question: &str) -> Result<()> {
    let pipeline = init_pipeline(config)?;
    let input = serde_json::json!({ first_alias(config): question });

    let question = pipeline.validate(&input)?;
    let envelope = pipeline.build_envelope(&question);
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    Ok(())
}

fn handle_config(config: &Config) -> Result<()> {
    print!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

fn first_alias(config: &Config) -> &str {
    config
        .pipeline
        .field_aliases
        .first()
        .map(String::as_str)
        .unwrap_or("message")
}
