//! Command-line interface for the NLU service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use nlu_api::ServerState;
use nlu_core::{config::env_vars, Settings};
use nlu_engine::{create_embedding_model, load_engine, NluEngine};

/// NLU service - map utterances to domains, intents and slots.
#[derive(Parser, Debug)]
#[command(name = "nlu")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration document directory.
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the web server.
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind to.
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
    /// Recognize a single utterance and exit.
    Recognize {
        /// The text to recognize.
        text: String,
        /// Pre-committed domain (skips domain classification).
        #[arg(short, long)]
        domain: Option<String>,
    },
    /// Show engine information (domains, intents, rules).
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let mut settings = Settings::from_env();
    if let Some(dir) = &args.config_dir {
        settings = settings.with_config_dir(dir);
    }

    match args.command {
        Command::Serve { host, port } => run_server(settings, host, port).await,
        Command::Recognize { text, domain } => run_recognize(settings, &text, domain).await,
        Command::Info => run_info(settings).await,
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("nlu={default_level}")));

    // JSON format for production/container environments.
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

async fn build_engine(settings: Settings) -> Result<NluEngine> {
    let embedder = create_embedding_model(&settings.embedding);
    tracing::info!(
        model = embedder.model_name(),
        dimension = embedder.dimension(),
        "embedding provider ready"
    );
    load_engine(settings, embedder)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load engine: {e}"))
}

/// Run the web server.
async fn run_server(settings: Settings, host: String, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid address: {host}:{port}"))?;

    let engine = build_engine(settings).await?;
    let state = ServerState::new(Arc::new(engine));
    nlu_api::run(addr, state).await
}

/// Recognize a single utterance.
async fn run_recognize(settings: Settings, text: &str, domain: Option<String>) -> Result<()> {
    let engine = build_engine(settings).await?;
    let result = engine.recognize(text, domain.as_deref(), None, None).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Print engine information.
async fn run_info(settings: Settings) -> Result<()> {
    let engine = build_engine(settings).await?;
    let info = engine.info().await;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
