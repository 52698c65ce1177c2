//! Mail delivery error types.

use thiserror::Error;

/// Mail delivery errors
#[derive(Debug, Error)]
pub enum MailError {
    /// Backend could not be configured
    #[error("mail configuration error: {0}")]
    Config(String),

    /// Reading the API key failed
    #[error("cannot load mail api key: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failure
    #[error("mail transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Mail API answered with a non-success status
    #[error("mail api rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Message could not be delivered
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Result type for mail operations
pub type Result<T> = std::result::Result<T, MailError>;
