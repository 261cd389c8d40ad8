//! `tankmaze-relay`: runs the Tank Maze relay until Ctrl-C.

use clap::Parser;
use tankmaze::{Cli, RelayError, RelayServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.resolve()?;
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "loaded config file");
    }
    tracing::info!(
        bind = %config.bind,
        max_frame_len = ?config.max_frame_len,
        idle_timeout_secs = ?config.idle_timeout_secs,
        write_timeout_secs = ?config.write_timeout_secs,
        max_rooms = ?config.max_rooms,
        "starting tankmaze relay"
    );

    let server = RelayServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }
    Ok(())
}
