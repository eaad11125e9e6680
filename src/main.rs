//! ternd: channel state and admission control daemon.

mod batch;
mod config;
mod engine;
mod error;
mod handlers;
mod network;
mod state;

use crate::config::Config;
use crate::network::Gateway;
use crate::state::Mesh;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ternd.toml".to_string());
    let config = Config::load(&path)?;
    info!(
        server = %config.server.name,
        network = %config.server.network,
        sid = %config.server.sid,
        "starting ternd"
    );

    let mesh = Mesh::new(config);
    mesh.refresh_split();

    Gateway::new(mesh).run().await
}
