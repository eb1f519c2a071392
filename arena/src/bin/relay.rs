//! Arena relay server.
//!
//! Pairs PvP clients first come, first served and forwards their protocol
//! lines. Also runs the broadcast chat listener.
//!
//! ```bash
//! BIND_HOST=0.0.0.0 PVP_PORT=7000 CHAT_PORT=8081 cargo run -p arena --bin arena-relay
//! ```

use anyhow::Context;
use arena_core::config::NetConfig;
use arena_core::relay::{RelayConfig, RelayServer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let net = NetConfig::from_env().context("invalid network configuration")?;
    let server = RelayServer::bind(RelayConfig::from_net(&net))
        .await
        .context("failed to start relay")?;
    tracing::info!(
        pvp = ?server.local_addr(),
        chat = ?server.chat_addr(),
        "relay started"
    );

    tokio::select! {
        _ = server.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            tracing::info!("shutting down");
        }
    }
    Ok(())
}
