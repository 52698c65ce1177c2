//! Command error types.

use keyward_identity::{ErrorKind, IdentityError};
use thiserror::Error;

/// Command errors
///
/// The `Display` text of every variant is what the caller sees after the
/// `Error: ` prefix.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Help text returned in place of a result
    #[error("{0}")]
    Help(String),

    #[error("unknown command: {name}\n\n{help}")]
    UnknownCommand { name: String, help: String },

    #[error("unknown {command} subcommand: {name}\n\n{help}")]
    UnknownSubcommand {
        command: String,
        name: String,
        help: String,
    },

    #[error("Usage: {0}")]
    Usage(String),

    #[error("{}", identity_message(.0))]
    Identity(#[from] IdentityError),

    #[error("server shutdown not available")]
    ShutdownUnavailable,

    #[error("internal error, please retry later")]
    Internal(String),
}

impl CommandError {
    /// Whether this error is worth a log line at the dispatch boundary
    pub fn is_fault(&self) -> bool {
        match self {
            Self::Identity(e) => matches!(e.kind(), ErrorKind::Transient | ErrorKind::Internal),
            Self::Internal(_) => true,
            _ => false,
        }
    }
}

/// Store faults are reported generically; everything else verbatim.
fn identity_message(error: &IdentityError) -> String {
    match error {
        IdentityError::Storage(_) | IdentityError::Internal(_) => "internal error, please retry later".to_string(),
        other => other.to_string(),
    }
}

/// Result type for command handlers
pub type Result<T> = std::result::Result<T, CommandError>;
