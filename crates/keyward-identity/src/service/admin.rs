//! Admin role operations.

use super::RegistryService;
use crate::{errors::*, types::*, unit_of_work::UnitOfWork, validation::normalize_fingerprint};
use keyward_storage::{Storage, CF_ADMINS};
use std::collections::BTreeSet;
use tracing::info;

impl<S: Storage + 'static> RegistryService<S> {
    pub(crate) async fn is_admin_internal(&self, fingerprint: &str) -> Result<bool> {
        let fingerprint = normalize_fingerprint(fingerprint)?;
        let uow = self.read().await;
        Ok(uow.exists(CF_ADMINS, &fingerprint).await?)
    }

    pub(crate) async fn add_admin_at(&self, caller: &str, fingerprint: &str, now: u64) -> Result<()> {
        let caller = normalize_fingerprint(caller)?;
        let fingerprint = normalize_fingerprint(fingerprint)?;

        let mut uow = self.write().await;
        require_admin(&uow, &caller, "add new admins").await?;

        if uow.exists(CF_ADMINS, &fingerprint).await? {
            return Err(IdentityError::AdminExists);
        }

        let role = AdminRole {
            fingerprint: fingerprint.clone(),
            created_at: now,
        };
        uow.put(CF_ADMINS, &fingerprint, &role)?;
        uow.commit().await?;

        info!(caller = %caller, admin = %fingerprint, "Admin added");
        Ok(())
    }

    pub(crate) async fn remove_admin_internal(&self, caller: &str, fingerprint: &str) -> Result<()> {
        let caller = normalize_fingerprint(caller)?;
        let fingerprint = normalize_fingerprint(fingerprint)?;

        let mut uow = self.write().await;
        require_admin(&uow, &caller, "remove admins").await?;

        let admins: Vec<AdminRole> = uow.values(CF_ADMINS).await?;
        if admins.len() <= 1 {
            return Err(IdentityError::LastAdmin);
        }
        if !admins.iter().any(|admin| admin.fingerprint == fingerprint) {
            return Err(IdentityError::AdminNotFound);
        }

        uow.delete(CF_ADMINS, &fingerprint)?;
        uow.commit().await?;

        info!(caller = %caller, admin = %fingerprint, "Admin removed");
        Ok(())
    }

    pub(crate) async fn list_admins_internal(&self, caller: &str) -> Result<Vec<AdminRole>> {
        let caller = normalize_fingerprint(caller)?;

        let uow = self.read().await;
        require_admin(&uow, &caller, "list admins").await?;

        let mut admins: Vec<AdminRole> = uow.values(CF_ADMINS).await?;
        admins.sort_by(|a, b| (a.created_at, &a.fingerprint).cmp(&(b.created_at, &b.fingerprint)));
        Ok(admins)
    }

    pub(crate) async fn bootstrap_admins_at(&self, fingerprints: &[String], now: u64) -> Result<usize> {
        let fingerprints = fingerprints
            .iter()
            .map(|fp| normalize_fingerprint(fp))
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        if fingerprints.is_empty() {
            return Ok(0);
        }

        let mut uow = self.write().await;

        let existing: Vec<AdminRole> = uow.values(CF_ADMINS).await?;
        if !existing.is_empty() {
            return Ok(0);
        }

        for fingerprint in &fingerprints {
            let role = AdminRole {
                fingerprint: fingerprint.clone(),
                created_at: now,
            };
            uow.put(CF_ADMINS, fingerprint, &role)?;
        }
        uow.commit().await?;

        info!(count = fingerprints.len(), "Seeded admin set");
        Ok(fingerprints.len())
    }
}

async fn require_admin<S: Storage>(uow: &UnitOfWork<'_, S>, caller: &str, action: &'static str) -> Result<()> {
    if uow.exists(CF_ADMINS, &caller).await? {
        Ok(())
    } else {
        Err(IdentityError::NotAdmin { action })
    }
}
