//! # keyward-mail
//!
//! Outbound mail for keyward.
//!
//! The [`MailSender`] capability has one job: deliver a message to an
//! address, or fail. Backends are chosen at construction time:
//!
//! - [`ResendMailSender`]: HTTP mail API
//! - [`LogMailSender`]: writes deliveries to the log (development)
//! - [`MemoryMailSender`]: records deliveries in memory (tests)

#![warn(clippy::all)]

pub mod backends;
pub mod errors;
pub mod sender;
pub mod template;

pub use backends::{LogMailSender, MemoryMailSender, ResendMailSender, SentMail};
pub use errors::{MailError, Result};
pub use sender::{MailMessage, MailSender};

/// Short, stable digest of an email address for log fields.
///
/// Addresses are never written to the log in clear text.
pub fn email_hash_for_log(email: &str) -> String {
    let hash = blake3::hash(email.as_bytes());
    hex::encode(&hash.as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_hash_for_log_is_stable_and_opaque() {
        let a = email_hash_for_log("alice@example.com");

        assert_eq!(a, email_hash_for_log("alice@example.com"));
        assert_ne!(a, email_hash_for_log("bob@example.com"));
        assert_eq!(a.len(), 16);
        assert!(!a.contains("alice"));
    }
}
