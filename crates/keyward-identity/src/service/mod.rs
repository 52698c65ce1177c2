//! Registry service implementation.

mod admin;
mod lookup;
mod permissions;
mod registration;

use crate::{errors::*, traits::*, types::*, unit_of_work::UnitOfWork};
use async_trait::async_trait;
use keyward_mail::MailSender;
use keyward_runtime::current_timestamp;
use keyward_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Registry service tunables
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long a confirmation code stays valid
    pub verification_lifetime: Duration,
    pub pending_policy: PendingPolicy,
    /// Upper bound on a single confirmation mail delivery, during which the
    /// store is locked for all other operations
    pub mail_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            verification_lifetime: Duration::from_secs(3600),
            pending_policy: PendingPolicy::Reject,
            mail_timeout: Duration::from_secs(10),
        }
    }
}

/// [`IdentityStore`] and [`PrivilegedRole`] over a key-value store.
///
/// All operations of one service instance share a single lock, so writers
/// are serialized against each other and against readers.
///
/// `register` delivers the confirmation mail inside its unit of work, so the
/// write lock is held for the whole delivery. A slow mail gateway stalls
/// every other operation, readers included, for up to `mail_timeout`; keep
/// that bound short.
pub struct RegistryService<S: Storage> {
    pub(super) storage: Arc<S>,
    pub(super) mail: Arc<dyn MailSender>,
    pub(super) config: RegistryConfig,
    lock: RwLock<()>,
}

impl<S: Storage> RegistryService<S> {
    pub fn new(storage: Arc<S>, mail: Arc<dyn MailSender>, config: RegistryConfig) -> Self {
        Self {
            storage,
            mail,
            config,
            lock: RwLock::new(()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub(super) async fn write(&self) -> UnitOfWork<'_, S> {
        UnitOfWork::write(self.storage.as_ref(), &self.lock).await
    }

    pub(super) async fn read(&self) -> UnitOfWork<'_, S> {
        UnitOfWork::read(self.storage.as_ref(), &self.lock).await
    }

    pub(super) fn lifetime_secs(&self) -> u64 {
        self.config.verification_lifetime.as_secs()
    }
}

#[async_trait]
impl<S: Storage + 'static> IdentityStore for RegistryService<S> {
    async fn register(&self, fingerprint: &str, email: &str) -> Result<PendingRegistration> {
        self.register_at(fingerprint, email, current_timestamp()).await
    }

    async fn confirm(&self, fingerprint: &str, code: &str) -> Result<String> {
        self.confirm_at(fingerprint, code, current_timestamp()).await
    }

    async fn unregister(&self, fingerprint: &str) -> Result<Unregistration> {
        self.unregister_internal(fingerprint).await
    }

    async fn allow(&self, fingerprint: &str, grantee_email: &str) -> Result<GrantOutcome> {
        self.allow_at(fingerprint, grantee_email, current_timestamp()).await
    }

    async fn deny(&self, fingerprint: &str, grantee_email: &str) -> Result<()> {
        self.deny_internal(fingerprint, grantee_email).await
    }

    async fn whoami(&self, fingerprint: &str) -> Result<WhoAmI> {
        self.whoami_internal(fingerprint).await
    }

    async fn get_email(&self, caller: &str, target: &str) -> Result<String> {
        self.get_email_internal(caller, target).await
    }

    async fn expire_pending(&self, now: u64) -> Result<usize> {
        self.expire_pending_internal(now).await
    }
}

#[async_trait]
impl<S: Storage + 'static> PrivilegedRole for RegistryService<S> {
    async fn is_admin(&self, fingerprint: &str) -> Result<bool> {
        self.is_admin_internal(fingerprint).await
    }

    async fn add_admin(&self, caller: &str, fingerprint: &str) -> Result<()> {
        self.add_admin_at(caller, fingerprint, current_timestamp()).await
    }

    async fn remove_admin(&self, caller: &str, fingerprint: &str) -> Result<()> {
        self.remove_admin_internal(caller, fingerprint).await
    }

    async fn list_admins(&self, caller: &str) -> Result<Vec<AdminRole>> {
        self.list_admins_internal(caller).await
    }

    async fn bootstrap_admins(&self, fingerprints: &[String]) -> Result<usize> {
        self.bootstrap_admins_at(fingerprints, current_timestamp()).await
    }
}
