//! Arena PvP client.
//!
//! Connects to the relay, waits for an opponent and plays a match from
//! line commands on stdin. `arena duel` fights a computer opponent offline.
//!
//! ```bash
//! SERVER_HOST=arena.example PVP_PORT=7000 cargo run -p arena -- --validate
//! cargo run -p arena -- duel --name Vex --class rogue
//! ```

mod duel;
mod headless;

use anyhow::Context;
use arena_core::config::NetConfig;
use arena_core::headless::{connect_with_fallback, MatchClient};
use arena_core::items::ItemCatalog;
use arena_core::pvp::{PvpConfig, PvpMatch, ValidateReported};
use arena_core::rules::CombatEngine;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    if args.get(1).map(String::as_str) == Some("duel") {
        return duel::run(duel::parse_config_from_args(&args[2..])).await;
    }
    let validate = args.iter().any(|a| a == "--validate");

    let net = NetConfig::from_env().context("invalid network configuration")?;
    println!("Connecting to {}...", net.pvp_targets().join(" or "));
    let session = connect_with_fallback(&net)
        .await
        .context("could not reach the arena server")?;
    println!("Connected. Waiting for an opponent...");

    let config = PvpConfig::default();
    if validate {
        let game = PvpMatch::with_parts(
            config,
            ItemCatalog::standard(),
            CombatEngine::default(),
            ValidateReported::default(),
        )?;
        headless::run(MatchClient::new(session, game)).await?;
    } else {
        headless::run(MatchClient::new(session, PvpMatch::new(config)?)).await?;
    }
    Ok(())
}

/// Log to stderr so stdout stays a clean transcript.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_help() {
    println!("Arena PvP client");
    println!();
    println!("Usage: arena [--validate]");
    println!("       arena duel [--name NAME] [--class warrior|mage|rogue] [--save-dir DIR]");
    println!();
    println!("Options:");
    println!("  --validate   Clip opponent-reported damage to what their gear allows");
    println!("  -h, --help   Show this help");
    println!();
    println!("Environment:");
    println!("  SERVER_HOST    Relay host (default localhost)");
    println!("  FALLBACK_HOST  Tried once if SERVER_HOST is unreachable");
    println!("  PVP_PORT       Relay PvP port (default 7000)");
    println!("  SAVE_DIR       Duel save directory (default saves)");
    println!("  RUST_LOG       Log filter (default warn)");
}
