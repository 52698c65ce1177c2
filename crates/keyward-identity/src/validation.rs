//! Input normalization and validation.
//!
//! Emails are compared case-insensitively, so they are trimmed and
//! lower-cased before anything else touches them. Fingerprints keep their
//! base64 digest verbatim; only the algorithm prefix is upper-cased.

use thiserror::Error;

const MIN_EMAIL_LENGTH: usize = 3; // a@b
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_LOCAL_LENGTH: usize = 64; // RFC 5321
const MAX_DOMAIN_LENGTH: usize = 255;
const MAX_LABEL_LENGTH: usize = 63;

/// Email validation failures
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EmailValidationError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email is too short")]
    TooShort,
    #[error("email exceeds maximum length")]
    TooLong,
    #[error("email must contain exactly one @ symbol")]
    AtSign,
    #[error("local part exceeds maximum length")]
    LocalTooLong,
    #[error("domain part exceeds maximum length")]
    DomainTooLong,
    #[error("email format is invalid")]
    InvalidFormat,
    #[error("domain is invalid")]
    InvalidDomain,
}

/// Fingerprint validation failures
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum FingerprintValidationError {
    #[error("fingerprint cannot be empty")]
    Empty,
    #[error("fingerprint must look like SHA256:<base64>")]
    InvalidFormat,
}

/// Trim and lower-case an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an already normalized email address.
pub fn validate_email(email: &str) -> Result<(), EmailValidationError> {
    if email.is_empty() {
        return Err(EmailValidationError::Empty);
    }

    let length = email.chars().count();
    if length < MIN_EMAIL_LENGTH {
        return Err(EmailValidationError::TooShort);
    }
    if length > MAX_EMAIL_LENGTH {
        return Err(EmailValidationError::TooLong);
    }

    let (local, domain) = match email.split_once('@') {
        Some((local, domain)) if !domain.contains('@') => (local, domain),
        _ => return Err(EmailValidationError::AtSign),
    };

    if local.chars().count() > MAX_LOCAL_LENGTH {
        return Err(EmailValidationError::LocalTooLong);
    }
    if domain.chars().count() > MAX_DOMAIN_LENGTH {
        return Err(EmailValidationError::DomainTooLong);
    }

    if local.is_empty() || !local.chars().all(is_local_char) {
        return Err(EmailValidationError::InvalidFormat);
    }

    if !is_valid_domain(domain) {
        return Err(EmailValidationError::InvalidDomain);
    }

    Ok(())
}

/// Normalize and validate an email in one step
pub fn parse_email(email: &str) -> Result<String, EmailValidationError> {
    let email = normalize_email(email);
    validate_email(&email)?;
    Ok(email)
}

/// Normalize an SSH key fingerprint (`sha256:abc` → `SHA256:abc`).
pub fn normalize_fingerprint(fingerprint: &str) -> Result<String, FingerprintValidationError> {
    let fingerprint = fingerprint.trim();
    if fingerprint.is_empty() {
        return Err(FingerprintValidationError::Empty);
    }

    let (algorithm, digest) = fingerprint
        .split_once(':')
        .ok_or(FingerprintValidationError::InvalidFormat)?;

    let algorithm_ok = !algorithm.is_empty() && algorithm.chars().all(|c| c.is_ascii_alphanumeric());
    let digest_ok = !digest.is_empty()
        && digest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | ':'));

    if !algorithm_ok || !digest_ok {
        return Err(FingerprintValidationError::InvalidFormat);
    }

    Ok(format!("{}:{}", algorithm.to_ascii_uppercase(), digest))
}

fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c)
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let tld_ok = labels.last().is_some_and(|tld| tld.len() >= 2);

    tld_ok
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= MAX_LABEL_LENGTH
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
