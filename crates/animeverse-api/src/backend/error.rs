use thiserror::Error;

/// Errors from the Animeverse backend image store.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("save rejected by backend")]
    Rejected,

    #[error("parse error: {0}")]
    Parse(String),
}
