//! Bravia Bridge - Rust implementation
//!
//! Mirrors a Sony Bravia TV's power and audio status into a state store and
//! forwards user writes as remote control commands.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use bravia_bridge::bridge::{Bridge, Namespace};
use bravia_bridge::config::{AppConfig, LoggingConfig};
use bravia_bridge::device::{BraviaClient, BraviaDevice};
use bravia_bridge::probe::TcpProbe;
use bravia_bridge::state::StateActorHandle;

/// Bravia Bridge - Mirror a Sony Bravia TV into a state store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "BRAVIA_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Television address (overrides device.ip)
    #[arg(long, env = "BRAVIA_IP")]
    ip: Option<String>,

    /// Pre-shared key (overrides device.psk)
    #[arg(long, env = "BRAVIA_PSK", hide_env_values = true)]
    psk: Option<String>,

    /// Start an interactive console
    #[arg(short, long)]
    interactive: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    let mut config = AppConfig::read(&args.config).await?;
    if let Some(ip) = &args.ip {
        config.device.ip = ip.clone();
    }
    if let Some(psk) = &args.psk {
        config.device.psk = psk.clone();
    }

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(&args.log_level, args.log_format, config.logging.as_ref())?;

    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", args.config))?;

    info!("Starting Bravia Bridge v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let device: Option<Arc<dyn BraviaDevice>> = match BraviaClient::from_config(&config.device) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            error!("Cannot create Bravia client: {}", e);
            None
        }
    };
    let prober = Arc::new(TcpProbe::from_config(&config.probe));

    let store = StateActorHandle::spawn();
    let bridge = Bridge::from_config(&config, device, prober, store.clone());
    let created = bridge.init_states().await?;
    info!(created, namespace = %bridge.namespace(), "States initialized");

    let repl_done = if args.interactive {
        let (done_tx, done_rx) = oneshot::channel();
        let repl_store = store.clone();
        let namespace = Namespace::new(&config.namespace);
        tokio::spawn(async move {
            if let Err(e) = bravia_bridge::cli::run_repl(repl_store, namespace).await {
                error!("Console error: {:#}", e);
            }
            let _ = done_tx.send(());
        });
        Some(done_rx)
    } else {
        None
    };

    bridge
        .run(config.refresh_interval(), shutdown_signal(repl_done))
        .await?;

    store.shutdown();
    info!("Bravia Bridge shutdown complete");
    Ok(())
}

fn init_logging(
    level: &str,
    format: LogFormat,
    file: Option<&LoggingConfig>,
) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let console = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    let (file_layer, guard) = match file {
        Some(logging) => {
            std::fs::create_dir_all(&logging.directory).with_context(|| {
                format!("Failed to create log directory {}", logging.directory.display())
            })?;
            let appender =
                tracing_appender::rolling::daily(&logging.directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

/// Resolves on Ctrl-C or when the console exits
fn shutdown_signal(repl_done: Option<oneshot::Receiver<()>>) -> impl Future<Output = ()> {
    async move {
        let console = async {
            match repl_done {
                Some(done) => {
                    let _ = done.await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => info!("Shutdown signal received"),
            _ = console => info!("Console closed"),
        }
    }
}
