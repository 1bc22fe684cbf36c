//! slipscan HTTP server.
//!
//! ```bash
//! slipscan-server --config slipscan.json --port 8080
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use slipscan::config::LogFormat;
use slipscan::db::resolve_database_path;
use slipscan::{load_config, Database, PipelineConfig, PipelineCoordinator, WorkerPool};
use slipscan_server::{router, run_server, AppState};

const DEFAULT_LOG_FILTER: &str = "slipscan=info,slipscan_server=info,tower_http=info";

#[derive(Parser)]
#[command(name = "slipscan-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Receipt ingestion and extraction over HTTP", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "SLIPSCAN_CONFIG")]
    config: PathBuf,

    /// Host to bind to (overrides server.host)
    #[arg(long, env = "SLIPSCAN_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(long, env = "SLIPSCAN_PORT")]
    port: Option<u16>,
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)
        .with_context(|| format!("failed to load config '{}'", cli.config.display()))?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_tracing(config.server.log_format)?;

    let db_path = resolve_database_path(config.database_path.as_deref())
        .context("could not determine home directory for the default database")?;
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database '{}'", db_path.display()))?;

    let pipeline_config = PipelineConfig::from_config(&config);
    let coordinator = Arc::new(
        PipelineCoordinator::from_config(&pipeline_config, db)
            .context("failed to start pipeline")?,
    );
    let pool = Arc::new(WorkerPool::new(
        Arc::clone(&coordinator),
        config.worker_count,
        config.queue_depth,
    )?);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    info!(
        workers = config.worker_count,
        queue_depth = config.queue_depth,
        "Starting slipscan-server"
    );

    let app = router(
        AppState::new(coordinator, Arc::clone(&pool)),
        config.server.max_upload_bytes,
    );
    run_server(app, addr).await?;

    pool.shutdown();
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.wait(),
        Err(_) => warn!("Worker pool still referenced at shutdown; not joining workers"),
    }

    Ok(())
}
