use clap::Parser;
use tokio::sync::broadcast;
use tracemsg_core::TraceConfig;
use tracing_subscriber::{fmt, EnvFilter};

use tracemsg_server::http;
use tracemsg_server::subsystems::trace_service::TraceService;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "tracemsg.toml")]
    config: String,

    /// Check store connectivity and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match TraceConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Connect to the store
    let store = match tracemsg_core::create_store(&config.store).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to set up {} store: {}", config.store.backend, e);
            std::process::exit(1);
        }
    };

    if args.health {
        match store.health_check().await {
            Ok(v) => println!("✅ {} reachable: {}", store.name(), v),
            Err(e) => {
                println!("❌ {} health check failed: {}", store.name(), e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let service = TraceService::new(store);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                let _ = shutdown_tx.send(());
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    http::start_http_server(&config.http, service, tx.subscribe()).await?;

    Ok(())
}
