//! Error types for the remote services the bot talks to.

/// Failure talking to Telegram or Google Drive.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Telegram answered `ok: false`.
    #[error("telegram {method} failed: {description}")]
    Telegram { method: &'static str, description: String },

    /// Drive answered with a non-success status.
    #[error("drive {op} failed ({status}): {body}")]
    Drive { op: &'static str, status: u16, body: String },

    /// Service-account token could not be obtained.
    #[error("auth error: {0}")]
    Auth(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;
