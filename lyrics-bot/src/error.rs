use thiserror::Error;

/// Failures that stop the bot from starting
#[derive(Debug, Error)]
pub enum BotError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] figment::Error),
    #[error("missing Discord token, set TOKEN in the environment or in .env")]
    MissingToken,
    #[error("invalid log level `{0}`")]
    InvalidLogLevel(String),
    #[error("failed to initialize logger: {0}")]
    Logger(#[from] log::SetLoggerError),
    #[error("discord client error: {0}")]
    Discord(#[from] serenity::Error),
}
