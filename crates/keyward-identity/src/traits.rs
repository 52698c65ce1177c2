//! Identity trait definitions.

use crate::{errors::Result, types::*};
use async_trait::async_trait;

/// Fingerprint to email bindings and disclosure grants.
///
/// Fingerprint arguments identify the calling session unless stated
/// otherwise. Email arguments are normalized before use.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Start verification of `email` for `fingerprint` and mail out a code
    async fn register(&self, fingerprint: &str, email: &str) -> Result<PendingRegistration>;

    /// Complete a verification, returning the now bound email
    async fn confirm(&self, fingerprint: &str, code: &str) -> Result<String>;

    /// Remove the caller's binding, cascading grants when it was the last key
    async fn unregister(&self, fingerprint: &str) -> Result<Unregistration>;

    /// Let `grantee_email` see the caller's email
    async fn allow(&self, fingerprint: &str, grantee_email: &str) -> Result<GrantOutcome>;

    /// Revoke a grant made by `allow`
    async fn deny(&self, fingerprint: &str, grantee_email: &str) -> Result<()>;

    /// Describe the caller's binding, keys and grants
    async fn whoami(&self, fingerprint: &str) -> Result<WhoAmI>;

    /// Disclose the email bound to `target` if the caller may see it
    async fn get_email(&self, caller: &str, target: &str) -> Result<String>;

    /// Delete verifications that outlived their lifetime at `now`
    async fn expire_pending(&self, now: u64) -> Result<usize>;
}

/// Admin role management.
#[async_trait]
pub trait PrivilegedRole: Send + Sync {
    async fn is_admin(&self, fingerprint: &str) -> Result<bool>;

    /// Grant the admin role; `caller` must be an admin
    async fn add_admin(&self, caller: &str, fingerprint: &str) -> Result<()>;

    /// Revoke the admin role; never empties the admin set
    async fn remove_admin(&self, caller: &str, fingerprint: &str) -> Result<()>;

    /// All admins ordered by when they were added
    async fn list_admins(&self, caller: &str) -> Result<Vec<AdminRole>>;

    /// Seed the admin set when it is empty; returns how many were added
    async fn bootstrap_admins(&self, fingerprints: &[String]) -> Result<usize>;
}
