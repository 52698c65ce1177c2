//! Registration lifecycle: register, confirm, unregister, expiry.

use super::RegistryService;
use crate::{
    codes::{codes_match, generate_code},
    errors::*,
    types::*,
    validation::{normalize_fingerprint, parse_email},
};
use keyward_mail::email_hash_for_log;
use keyward_storage::{
    Storage, CF_ADMINS, CF_IDENTITIES, CF_IDENTITIES_BY_EMAIL, CF_PENDING_VERIFICATIONS,
    CF_PERMISSION_GRANTS, CF_PERMISSION_GRANTS_BY_GRANTEE,
};
use tracing::{debug, info, warn};

impl<S: Storage + 'static> RegistryService<S> {
    /// Start verification of `email` for `fingerprint` at time `now`.
    ///
    /// The pending record and the mail delivery form one unit: if the mail
    /// cannot be delivered within the configured timeout nothing is stored.
    pub async fn register_at(&self, fingerprint: &str, email: &str, now: u64) -> Result<PendingRegistration> {
        let email = parse_email(email)?;
        let fingerprint = normalize_fingerprint(fingerprint)?;
        let lifetime = self.lifetime_secs();

        let mut uow = self.write().await;

        if let Some(existing) = uow.get::<_, IdentityRecord>(CF_IDENTITIES, &fingerprint).await? {
            return Err(if existing.email == email {
                IdentityError::AlreadyRegistered
            } else {
                IdentityError::FingerprintBound
            });
        }

        if let Some(pending) = uow
            .get::<_, PendingVerification>(CF_PENDING_VERIFICATIONS, &fingerprint)
            .await?
        {
            if !pending.is_expired(now, lifetime) {
                match self.config.pending_policy {
                    PendingPolicy::Reject => {
                        let remaining = (pending.created_at + lifetime).saturating_sub(now);
                        return Err(IdentityError::VerificationPending {
                            remaining_minutes: remaining.div_ceil(60).max(1),
                        });
                    }
                    PendingPolicy::Overwrite => {
                        debug!(fingerprint = %fingerprint, "Replacing outstanding verification");
                    }
                }
            }
        }

        let pending = PendingVerification {
            fingerprint: fingerprint.clone(),
            email: email.clone(),
            code: generate_code(),
            created_at: now,
        };
        uow.put(CF_PENDING_VERIFICATIONS, &fingerprint, &pending)?;

        let timeout = self.config.mail_timeout;
        match tokio::time::timeout(
            timeout,
            self.mail.send_confirmation(&email, &pending.code, &fingerprint),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(fingerprint = %fingerprint, error = %e, "Confirmation mail failed");
                return Err(e.into());
            }
            Err(_) => {
                warn!(fingerprint = %fingerprint, timeout_secs = timeout.as_secs(), "Confirmation mail timed out");
                return Err(IdentityError::MailTimeout(timeout.as_secs()));
            }
        }

        uow.commit().await?;

        info!(
            fingerprint = %fingerprint,
            email_hash = %email_hash_for_log(&email),
            "Verification started"
        );

        Ok(PendingRegistration {
            fingerprint,
            email,
            expires_at: now + lifetime,
        })
    }

    /// Complete a verification at time `now`.
    pub async fn confirm_at(&self, fingerprint: &str, code: &str, now: u64) -> Result<String> {
        let fingerprint = normalize_fingerprint(fingerprint)?;
        let code = code.trim();

        let mut uow = self.write().await;

        let pending: PendingVerification = uow
            .get(CF_PENDING_VERIFICATIONS, &fingerprint)
            .await?
            .filter(|pending: &PendingVerification| codes_match(&pending.code, code))
            .ok_or(IdentityError::VerificationNotFound)?;

        if pending.is_expired(now, self.lifetime_secs()) {
            return Err(IdentityError::VerificationExpired);
        }

        if let Some(existing) = uow.get::<_, IdentityRecord>(CF_IDENTITIES, &fingerprint).await? {
            return Err(if existing.email == pending.email {
                IdentityError::AlreadyRegistered
            } else {
                IdentityError::FingerprintBound
            });
        }

        let record = IdentityRecord {
            fingerprint: fingerprint.clone(),
            email: pending.email.clone(),
            created_at: now,
        };

        uow.delete(CF_PENDING_VERIFICATIONS, &fingerprint)?;
        uow.put(CF_IDENTITIES, &fingerprint, &record)?;
        uow.put(CF_IDENTITIES_BY_EMAIL, &(&record.email, &fingerprint), &record)?;
        uow.commit().await?;

        info!(
            fingerprint = %fingerprint,
            email_hash = %email_hash_for_log(&record.email),
            "Registration confirmed"
        );

        Ok(record.email)
    }

    pub(crate) async fn unregister_internal(&self, fingerprint: &str) -> Result<Unregistration> {
        let fingerprint = normalize_fingerprint(fingerprint)?;

        let mut uow = self.write().await;

        let record: IdentityRecord = uow
            .get(CF_IDENTITIES, &fingerprint)
            .await?
            .ok_or(IdentityError::NotRegistered)?;
        let email = record.email;

        let keys: Vec<IdentityRecord> = uow.values_by_prefix(CF_IDENTITIES_BY_EMAIL, &email).await?;
        let last_key = keys.len() <= 1;

        let mut grants_removed = 0;
        if last_key {
            let granted: Vec<PermissionGrant> = uow.values_by_prefix(CF_PERMISSION_GRANTS, &email).await?;
            let received: Vec<PermissionGrant> = uow
                .values_by_prefix(CF_PERMISSION_GRANTS_BY_GRANTEE, &email)
                .await?;

            for grant in granted.iter().chain(received.iter()) {
                uow.delete(CF_PERMISSION_GRANTS, &(&grant.granter_email, &grant.grantee_email))?;
                uow.delete(
                    CF_PERMISSION_GRANTS_BY_GRANTEE,
                    &(&grant.grantee_email, &grant.granter_email),
                )?;
            }
            grants_removed = granted.len() + received.len();
        }

        let admin_removed = uow.exists(CF_ADMINS, &fingerprint).await?;
        if admin_removed {
            let admins: Vec<AdminRole> = uow.values(CF_ADMINS).await?;
            if admins.len() <= 1 {
                warn!(fingerprint = %fingerprint, "Last admin unregistered, admin set is now empty");
            }
            uow.delete(CF_ADMINS, &fingerprint)?;
        }

        uow.delete(CF_PENDING_VERIFICATIONS, &fingerprint)?;
        uow.delete(CF_IDENTITIES, &fingerprint)?;
        uow.delete(CF_IDENTITIES_BY_EMAIL, &(&email, &fingerprint))?;
        uow.commit().await?;

        info!(
            fingerprint = %fingerprint,
            email_hash = %email_hash_for_log(&email),
            last_key,
            grants_removed,
            admin_removed,
            "Registration removed"
        );

        Ok(Unregistration {
            email,
            last_key,
            grants_removed,
            admin_removed,
        })
    }

    pub(crate) async fn expire_pending_internal(&self, now: u64) -> Result<usize> {
        let lifetime = self.lifetime_secs();
        let mut uow = self.write().await;

        let pending: Vec<PendingVerification> = uow.values(CF_PENDING_VERIFICATIONS).await?;
        let mut expired = 0;
        for record in pending.iter().filter(|p| p.is_expired(now, lifetime)) {
            uow.delete(CF_PENDING_VERIFICATIONS, &record.fingerprint)?;
            expired += 1;
        }

        if expired > 0 {
            uow.commit().await?;
            info!(expired, "Expired stale verifications");
        }

        Ok(expired)
    }
}
