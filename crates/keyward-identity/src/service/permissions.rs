//! Disclosure grants.

use super::RegistryService;
use crate::{
    errors::*,
    types::*,
    validation::{normalize_fingerprint, parse_email},
};
use keyward_mail::email_hash_for_log;
use keyward_storage::{
    Storage, CF_IDENTITIES, CF_IDENTITIES_BY_EMAIL, CF_PERMISSION_GRANTS,
    CF_PERMISSION_GRANTS_BY_GRANTEE,
};
use tracing::info;

impl<S: Storage + 'static> RegistryService<S> {
    pub(crate) async fn allow_at(&self, fingerprint: &str, grantee_email: &str, now: u64) -> Result<GrantOutcome> {
        let grantee = parse_email(grantee_email)?;
        let fingerprint = normalize_fingerprint(fingerprint)?;

        let mut uow = self.write().await;

        let granter: IdentityRecord = uow
            .get(CF_IDENTITIES, &fingerprint)
            .await?
            .ok_or_else(|| IdentityError::UnknownFingerprint(fingerprint.clone()))?;

        if granter.email == grantee {
            return Err(IdentityError::SelfAllow);
        }

        let grantee_keys: Vec<IdentityRecord> = uow.values_by_prefix(CF_IDENTITIES_BY_EMAIL, &grantee).await?;
        if grantee_keys.is_empty() {
            return Err(IdentityError::UnknownEmail(grantee));
        }

        let key = (&granter.email, &grantee);
        if uow.exists(CF_PERMISSION_GRANTS, &key).await? {
            return Ok(GrantOutcome::AlreadyExists);
        }

        let grant = PermissionGrant {
            granter_email: granter.email.clone(),
            grantee_email: grantee.clone(),
            created_at: now,
        };
        uow.put(CF_PERMISSION_GRANTS, &key, &grant)?;
        uow.put(CF_PERMISSION_GRANTS_BY_GRANTEE, &(&grantee, &granter.email), &grant)?;
        uow.commit().await?;

        info!(
            granter_hash = %email_hash_for_log(&granter.email),
            grantee_hash = %email_hash_for_log(&grantee),
            "Permission granted"
        );

        Ok(GrantOutcome::Created)
    }

    pub(crate) async fn deny_internal(&self, fingerprint: &str, grantee_email: &str) -> Result<()> {
        let grantee = parse_email(grantee_email)?;
        let fingerprint = normalize_fingerprint(fingerprint)?;

        let mut uow = self.write().await;

        let granter: IdentityRecord = uow
            .get(CF_IDENTITIES, &fingerprint)
            .await?
            .ok_or_else(|| IdentityError::UnknownFingerprint(fingerprint.clone()))?;

        if granter.email == grantee {
            return Err(IdentityError::SelfDeny);
        }

        let key = (&granter.email, &grantee);
        if !uow.exists(CF_PERMISSION_GRANTS, &key).await? {
            return Err(IdentityError::PermissionNotFound(grantee));
        }

        uow.delete(CF_PERMISSION_GRANTS, &key)?;
        uow.delete(CF_PERMISSION_GRANTS_BY_GRANTEE, &(&grantee, &granter.email))?;
        uow.commit().await?;

        info!(
            granter_hash = %email_hash_for_log(&granter.email),
            grantee_hash = %email_hash_for_log(&grantee),
            "Permission revoked"
        );

        Ok(())
    }
}
