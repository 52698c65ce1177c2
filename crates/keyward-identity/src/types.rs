//! Identity type definitions.

use serde::{Deserialize, Serialize};

/// Confirmed binding between a key fingerprint and an email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub fingerprint: String,
    pub email: String,
    pub created_at: u64,
}

/// Outstanding email verification for a fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVerification {
    pub fingerprint: String,
    pub email: String,
    pub code: String,
    pub created_at: u64,
}

impl PendingVerification {
    /// Whether the verification is older than `lifetime_secs` at `now`
    pub fn is_expired(&self, now: u64, lifetime_secs: u64) -> bool {
        now.saturating_sub(self.created_at) > lifetime_secs
    }
}

/// Permission for `grantee_email` to see `granter_email`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub granter_email: String,
    pub grantee_email: String,
    pub created_at: u64,
}

/// Admin role holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRole {
    pub fingerprint: String,
    pub created_at: u64,
}

/// What `register` does when the fingerprint already has a live
/// verification outstanding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingPolicy {
    /// Refuse until the outstanding code expires
    #[default]
    Reject,
    /// Issue a fresh code, invalidating the previous one
    Overwrite,
}

/// Result of a successful `register`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    pub fingerprint: String,
    pub email: String,
    pub expires_at: u64,
}

/// Result of a successful `unregister`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistration {
    pub email: String,
    /// Whether this was the last key bound to the email
    pub last_key: bool,
    /// Grants removed because the email lost its last key
    pub grants_removed: usize,
    /// Whether the fingerprint held the admin role
    pub admin_removed: bool,
}

/// Result of a successful `allow`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Created,
    AlreadyExists,
}

/// One key bound to the caller's email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub fingerprint: String,
    pub created_at: u64,
    /// Whether this is the key of the calling session
    pub current: bool,
}

/// One email allowed to see the caller's email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantInfo {
    pub email: String,
    pub created_at: u64,
}

/// Result of `whoami`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhoAmI {
    Unregistered {
        fingerprint: String,
    },
    Registered {
        email: String,
        /// Ordered by registration time
        keys: Vec<KeyInfo>,
        /// Ordered by grant time
        grants: Vec<GrantInfo>,
    },
}
