//! Read-only queries.

use super::RegistryService;
use crate::{errors::*, types::*, validation::normalize_fingerprint};
use keyward_storage::{Storage, CF_IDENTITIES, CF_IDENTITIES_BY_EMAIL, CF_PERMISSION_GRANTS};
use tracing::debug;

impl<S: Storage + 'static> RegistryService<S> {
    pub(crate) async fn whoami_internal(&self, fingerprint: &str) -> Result<WhoAmI> {
        let fingerprint = normalize_fingerprint(fingerprint)?;
        let uow = self.read().await;

        let Some(record) = uow.get::<_, IdentityRecord>(CF_IDENTITIES, &fingerprint).await? else {
            return Ok(WhoAmI::Unregistered { fingerprint });
        };

        let mut keys: Vec<IdentityRecord> = uow.values_by_prefix(CF_IDENTITIES_BY_EMAIL, &record.email).await?;
        keys.sort_by(|a, b| (a.created_at, &a.fingerprint).cmp(&(b.created_at, &b.fingerprint)));

        let mut grants: Vec<PermissionGrant> = uow.values_by_prefix(CF_PERMISSION_GRANTS, &record.email).await?;
        grants.sort_by(|a, b| (a.created_at, &a.grantee_email).cmp(&(b.created_at, &b.grantee_email)));

        Ok(WhoAmI::Registered {
            keys: keys
                .into_iter()
                .map(|key| KeyInfo {
                    current: key.fingerprint == fingerprint,
                    fingerprint: key.fingerprint,
                    created_at: key.created_at,
                })
                .collect(),
            grants: grants
                .into_iter()
                .map(|grant| GrantInfo {
                    email: grant.grantee_email,
                    created_at: grant.created_at,
                })
                .collect(),
            email: record.email,
        })
    }

    /// Disclosure rule: same email, or a grant from the target's email to
    /// the caller's. An unknown target and a missing grant look the same.
    pub(crate) async fn get_email_internal(&self, caller: &str, target: &str) -> Result<String> {
        let caller = normalize_fingerprint(caller)?;
        let target = normalize_fingerprint(target)?;
        let uow = self.read().await;

        let caller_record: IdentityRecord = uow
            .get(CF_IDENTITIES, &caller)
            .await?
            .ok_or(IdentityError::CallerNotRegistered)?;

        let Some(target_record) = uow.get::<_, IdentityRecord>(CF_IDENTITIES, &target).await? else {
            debug!(caller = %caller, target = %target, "Lookup of unknown fingerprint");
            return Err(IdentityError::PermissionDenied);
        };

        if target_record.email == caller_record.email {
            return Ok(target_record.email);
        }

        let granted = uow
            .exists(CF_PERMISSION_GRANTS, &(&target_record.email, &caller_record.email))
            .await?;
        if !granted {
            debug!(caller = %caller, target = %target, "Lookup without permission");
            return Err(IdentityError::PermissionDenied);
        }

        Ok(target_record.email)
    }
}
