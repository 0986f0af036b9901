//! donorbase-server - Fundraising pipeline service
//!
//! Single authority over the donor record collection. Serves the dashboard
//! API and the command surface over one engine so concurrent front-ends
//! cannot diverge on validation or clobber each other's writes.

use anyhow::Result;
use clap::Parser;
use donorbase_common::config;
use donorbase_common::db::init_database;
use donorbase_server::{build_router, AppState};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "donorbase-server", about = "Fundraising pipeline service")]
struct Args {
    /// Data directory holding donorbase.db (overrides env and config file)
    #[arg(long)]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting donorbase-server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();
    let data_dir = config::resolve_data_dir(args.data_dir.as_deref());
    let db_path = config::database_path(&data_dir);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await?;

    let state = AppState::new(pool);
    let app = build_router(state);

    let server = config::load_server_config();
    let bind_addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("donorbase-server listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
