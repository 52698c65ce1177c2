//! Identity error types.

use crate::validation::{EmailValidationError, FingerprintValidationError};
use keyward_mail::MailError;
use keyward_storage::StorageError;
use thiserror::Error;

/// Coarse classification of an [`IdentityError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; reported verbatim
    Validation,
    /// Missing registration, grant or admin
    NotFound,
    /// Operation clashes with existing state
    Conflict,
    /// Caller lacks the role or permission
    Unauthorized,
    /// Store or mail gateway failure; the caller may retry
    Transient,
    /// Unexpected fault
    Internal,
}

/// Identity errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid email address: {0}")]
    InvalidEmail(#[from] EmailValidationError),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(#[from] FingerprintValidationError),

    #[error("email and fingerprint combination already registered")]
    AlreadyRegistered,

    /// Fingerprint is confirmed to a different email
    #[error("this key is already registered to another email, unregister it first")]
    FingerprintBound,

    #[error("Verification mail has already been sent. It will expire within {remaining_minutes} min")]
    VerificationPending { remaining_minutes: u64 },

    #[error("could not find verification request for fingerprint and code")]
    VerificationNotFound,

    #[error("verification code has expired, please register again")]
    VerificationExpired,

    /// Caller of `unregister` has no binding
    #[error("no registration found for this fingerprint")]
    NotRegistered,

    #[error("no user found with fingerprint: {0}")]
    UnknownFingerprint(String),

    #[error("no user found with email: {0}")]
    UnknownEmail(String),

    #[error("you can't allow yourself, use whoami instead.")]
    SelfAllow,

    #[error("you can't deny yourself.")]
    SelfDeny,

    #[error("no permission found for {0}")]
    PermissionNotFound(String),

    #[error("caller not registered")]
    CallerNotRegistered,

    /// Same text whether the target is unknown or hidden
    #[error("no email found or permission denied")]
    PermissionDenied,

    #[error("unauthorized: only admins can {action}")]
    NotAdmin { action: &'static str },

    #[error("admin already exists")]
    AdminExists,

    #[error("cannot remove last admin")]
    LastAdmin,

    #[error("admin not found")]
    AdminNotFound,

    #[error("failed to send confirmation email: {0}")]
    Mail(#[from] MailError),

    #[error("confirmation email timed out after {0}s")]
    MailTimeout(u64),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEmail(_) | Self::InvalidFingerprint(_) => ErrorKind::Validation,
            Self::VerificationNotFound
            | Self::VerificationExpired
            | Self::NotRegistered
            | Self::UnknownFingerprint(_)
            | Self::UnknownEmail(_)
            | Self::PermissionNotFound(_)
            | Self::CallerNotRegistered
            | Self::AdminNotFound => ErrorKind::NotFound,
            Self::AlreadyRegistered
            | Self::FingerprintBound
            | Self::VerificationPending { .. }
            | Self::SelfAllow
            | Self::SelfDeny
            | Self::AdminExists
            | Self::LastAdmin => ErrorKind::Conflict,
            Self::PermissionDenied | Self::NotAdmin { .. } => ErrorKind::Unauthorized,
            Self::Mail(_) | Self::MailTimeout(_) => ErrorKind::Transient,
            Self::Storage(e) => match e {
                StorageError::Database(_) | StorageError::IoError(_) => ErrorKind::Transient,
                _ => ErrorKind::Internal,
            },
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for identity operations
pub type Result<T> = std::result::Result<T, IdentityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(IdentityError::AlreadyRegistered.kind(), ErrorKind::Conflict);
        assert_eq!(IdentityError::LastAdmin.kind(), ErrorKind::Conflict);
        assert_eq!(IdentityError::PermissionDenied.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            IdentityError::NotAdmin { action: "list admins" }.kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(IdentityError::NotRegistered.kind(), ErrorKind::NotFound);
        assert_eq!(IdentityError::MailTimeout(30).kind(), ErrorKind::Transient);
        assert_eq!(
            IdentityError::Storage(StorageError::Database("down".into())).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            IdentityError::Storage(StorageError::Deserialization("bad".into())).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            IdentityError::InvalidEmail(EmailValidationError::Empty).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            IdentityError::NotAdmin { action: "add new admins" }.to_string(),
            "unauthorized: only admins can add new admins"
        );
        assert_eq!(
            IdentityError::UnknownEmail("bob@example.com".into()).to_string(),
            "no user found with email: bob@example.com"
        );
    }
}
