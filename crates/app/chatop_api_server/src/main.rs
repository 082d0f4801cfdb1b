//! ChaTop API server binary.
//!
//! Reads configuration from the environment (and `.env`), runs database
//! migrations, then serves the REST API until interrupted.

use std::sync::Arc;

use chatop_api::config::ApiConfig;
use chatop_api::{AppState, router};
use chatop_core::store::{MemoryStore, PgStore, Store};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "chatop_api_server", about = "ChaTop rental listing API server")]
struct Args {
    /// Address to listen on. Overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL. Overrides `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    /// Keep everything in process memory instead of PostgreSQL.
    ///
    /// Data is lost on exit.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

async fn open_store(
    args: &Args,
    config: &ApiConfig,
) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    if args.in_memory {
        warn!("using in-memory store; data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    let store = PgStore::new(pool);
    info!("running database migrations");
    store.migrate().await?;
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatop_api=debug,chatop_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind) = &args.bind {
        config.bind_addr = bind.clone();
    }
    if let Some(url) = &args.database_url {
        config.pg_connection_url = url.clone();
    }

    info!(bind = %config.bind_addr, in_memory = args.in_memory, "starting chatop_api_server");

    let store = open_store(&args, &config).await?;
    let state = AppState::new(store, config.clone())?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
