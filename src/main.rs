//! Tabletalk entry point.

use clap::{Parser, Subcommand};
use tabletalk::{Config, QueryPipeline};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tabletalk: natural-language chat over a Supabase database
#[derive(Parser, Debug)]
#[command(name = "tabletalk")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server (default behavior)
    Serve {
        /// Bind address. If not specified, uses the config file value.
        #[arg(long)]
        host: Option<String>,
        /// Listen port. If not specified, uses the config file value.
        #[arg(short, long)]
        port: Option<u16>,
        /// Enable JSON logging format
        #[arg(long)]
        log_json: bool,
    },
    /// Ask one question and print the answer
    Query {
        /// Question text
        text: String,
        /// Session ID to record the exchange under
        #[arg(short, long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::Query { text, session }) => {
            // Minimal logging for one-shot queries
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::WARN)
                .with_writer(std::io::stderr)
                .init();
            run_query(&args.config, &text, session, args.json).await
        }
        Some(Command::Serve {
            host,
            port,
            log_json,
        }) => run_server(&args.config, host, port, log_json).await,
        None => run_server(&args.config, None, None, false).await,
    }
}

/// Run the HTTP API server.
async fn run_server(
    config_path: &Option<String>,
    host: Option<String>,
    port: Option<u16>,
    log_json: bool,
) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Tabletalk v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(config_path)?;

    // Override bind address from CLI args only if explicitly provided
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tabletalk::serve(config).await?;

    Ok(())
}

/// Run one question through the pipeline and print the answer.
async fn run_query(
    config_path: &Option<String>,
    text: &str,
    session: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let credentials = config.resolve_credentials(None, None, None)?;
    let pipeline = QueryPipeline::from_config(&config, &credentials)?;

    let reply = pipeline.run(text, session.as_deref()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else {
        println!("{}", reply.response);
        if let Some(error) = &reply.error {
            eprintln!("error: {error}");
        }
    }

    Ok(())
}

fn load_config(config_path: &Option<String>) -> tabletalk::Result<Config> {
    if let Some(path) = config_path {
        Config::from_file(path)
    } else {
        Config::load()
    }
}
