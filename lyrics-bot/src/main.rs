mod command;
mod error;
mod format;
mod handler;
mod models;

use error::BotError;
use handler::LyricsHandler;
use log::{info, warn, LevelFilter};
use models::config::Config;
use models::context::Context;
use serenity::Client;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::sync::Arc;

const ENV_FILE: &str = ".env";
const CONFIG_FILE: &str = "config.yaml";

fn init_logging(level: LevelFilter) -> Result<(), BotError> {
    let log_config = ConfigBuilder::new()
        .add_filter_ignore_str("serenity")
        .add_filter_ignore_str("tungstenite")
        .add_filter_ignore_str("rustls")
        .build();
    TermLogger::init(level, log_config, TerminalMode::Mixed, ColorChoice::Auto)?;
    Ok(())
}

/// Resolves on CTRL-C, or SIGTERM on unix
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(err) => warn!("Could not listen for SIGTERM: {}", err),
        }
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for CTRL-C: {}", err);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), BotError> {
    let env_loaded = dotenvy::from_filename(ENV_FILE);

    let config = Config::load(CONFIG_FILE)?;
    init_logging(config.log_level_filter()?)?;
    if let Err(err) = env_loaded {
        warn!("Could not load {}: {}", ENV_FILE, err);
    }

    let context = Arc::new(Context::new(config));

    let mut client = Client::builder(context.config().token(), LyricsHandler::intents())
        .event_handler(LyricsHandler::new(context.clone()))
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down");
        shard_manager.shutdown_all().await;
    });

    info!("Bot is now running. Press CTRL-C to exit.");
    let result = client.start().await;

    context.shutdown().await;
    result.map_err(BotError::from)
}
