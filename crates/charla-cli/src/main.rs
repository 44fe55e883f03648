use charla_ai::{GeminiClient, GenerationConfig, SpeechClient, SpeechConfig};
use charla_channel::{TelegramChannel, TelegramConfig};
use charla_session::{
    Collaborators, EventRouter, FileHistoryStore, IdleReaper, SessionConfig, SessionRegistry,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "charla", about = "Charla: a conversational relay for Telegram")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "charla.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay
    Run,
}

#[derive(Deserialize)]
struct CharlaConfig {
    telegram: TelegramConfig,
    generation: GenerationConfig,
    speech: SpeechConfig,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default = "default_history_dir")]
    history_dir: PathBuf,
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("./chats")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    // Load config
    let config_str = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            cli.config.display(),
            e
        )
    })?;
    let config: CharlaConfig = toml::from_str(&config_str)?;

    match cli.command {
        Commands::Run => {
            info!(
                history_dir = %config.history_dir.display(),
                "Starting Charla relay"
            );

            let channel = Arc::new(TelegramChannel::new(config.telegram));
            let generator = Arc::new(GeminiClient::new(config.generation));
            let speech = Arc::new(SpeechClient::new(config.speech));
            let store = Arc::new(FileHistoryStore::new(config.history_dir).await?);

            let collaborators = Collaborators {
                generator,
                speech,
                delivery: channel.clone(),
            };
            let registry = Arc::new(SessionRegistry::new(
                collaborators,
                store,
                config.session.clone(),
            ));

            let reaper = IdleReaper::new(registry.clone(), config.session.reap_interval());
            let reaper_handle = reaper.spawn();

            let mut router = EventRouter::new(channel, registry.clone(), config.session);

            tokio::select! {
                result = router.run() => {
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, persisting live sessions");
                    reaper_handle.abort();
                    registry.shutdown().await;
                }
            }
        }
    }

    Ok(())
}
