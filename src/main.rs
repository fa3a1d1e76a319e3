use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use seer::api::{start_api_server, ApiState};
use seer::config::SeerConfig;
use seer::navigator::Navigator;
use seer::reasoning::RemoteReasoner;
use seer::state::SceneTracker;
use seer::stt::Transcriber;

#[derive(Parser)]
#[command(name = "seer")]
#[command(about = "Navigation assistance server for visually impaired users")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listen port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(format!("seer={log_level}"))
        .try_init();

    info!("Starting Seer navigation assistance server");

    let mut config = SeerConfig::load(&args.config).await?;
    info!("Configuration loaded successfully");

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        config.reasoning.api_key = key;
    }
    if let Ok(key) = std::env::var("WHISPER_API_KEY") {
        config.transcription.api_key = key;
    }
    if config.reasoning.api_key.is_empty() {
        warn!("No reasoning API key configured; every plan request will degrade to the safe default");
    }

    let backend = Arc::new(RemoteReasoner::new(config.reasoning.clone())?);
    let tracker = SceneTracker::new();
    let navigator = Navigator::new(config.navigation.clone(), backend, tracker.clone());
    let transcriber = Transcriber::new(config.transcription.clone())?;

    let state = ApiState { navigator, tracker, transcriber };
    start_api_server(&config.server, state).await
}
