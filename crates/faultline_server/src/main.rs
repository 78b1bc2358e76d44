//! FAULTLINE Server
//!
//! Binary entrypoint: wires the simulated mesh, the in-memory store,
//! and the run coordinator behind the HTTP API.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use faultline_chaos::HarnessSeed;
use faultline_engine::{CoordinatorConfig, RunCoordinator, StreamHub};
use faultline_mesh::ServiceMesh;
use faultline_server::{router, AppState};
use faultline_store::MemoryStore;
use tracing::info;

#[derive(Parser)]
#[command(name = "faultline-server")]
#[command(about = "FAULTLINE fault-injection harness server", long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1:3001")]
    bind: String,

    /// Seed for the simulated services' randomness
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter("faultline=debug,tower_http=debug")
        .init();

    let mesh = ServiceMesh::standard(&HarnessSeed::from_literal(args.seed));
    let coordinator = RunCoordinator::new(
        CoordinatorConfig::new(),
        Arc::new(MemoryStore::new()),
        Arc::new(StreamHub::default()),
        Arc::new(mesh.clone()),
    );

    let app = router(AppState { coordinator, mesh });

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!(bind = %args.bind, seed = args.seed, "faultline server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
