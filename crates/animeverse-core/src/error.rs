use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnimeverseError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("database actor closed")]
    ActorClosed,

    #[error("invalid lookup: {0}")]
    InvalidLookup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
