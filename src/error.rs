use thiserror::Error;

/// Why a command was refused without touching state. The display text is
/// what the operator sees.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("Panic mode is active. Disengage it to operate bots.")]
    PanicEngaged,

    #[error("Top up your Aegis credits to operate bots.")]
    CreditsExhausted,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("bot not found: {id}")]
    BotNotFound { id: String },

    #[error("command rejected: {0}")]
    Rejected(Rejection),

    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("advisor error: {0}")]
    Advisor(String),

    #[error("unsupported state version {found} for key {key} (expected {expected})")]
    VersionMismatch {
        key: String,
        found: u32,
        expected: u32,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
