use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use redlite::config::{Cli, Config};
use redlite::rdb;
use redlite::replication::ReplicationState;
use redlite::server::Server;
use redlite::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = Config::from_cli(Cli::parse())?;
    let store = Arc::new(Store::new());

    // A configured snapshot must load cleanly; a missing or corrupt file
    // is fatal here. No configuration simply means an empty store.
    if let Some(path) = config.snapshot_path() {
        let snapshot = rdb::load_file(&path)
            .with_context(|| format!("failed to load snapshot {}", path.display()))?;
        let loaded = snapshot.apply(&store).await;
        info!(path = %path.display(), keys = loaded, "loaded snapshot");
    }

    let replication = Arc::new(ReplicationState::new(config.role()));
    info!(
        port = config.port,
        role = replication.role().as_str(),
        "starting redlite"
    );

    Server::new(Arc::new(config), store, replication).run().await
}
