//! RocksDB column family definitions.
//!
//! Each relation of the data model is one column family; secondary indexes
//! duplicate the record under a composite key so they can be prefix-scanned.

/// Confirmed bindings: fingerprint → IdentityRecord
pub const CF_IDENTITIES: &str = "identities";

/// Bindings by email index: (email, fingerprint) → IdentityRecord
pub const CF_IDENTITIES_BY_EMAIL: &str = "identities_by_email";

/// Outstanding email verifications: fingerprint → PendingVerification
pub const CF_PENDING_VERIFICATIONS: &str = "pending_verifications";

/// Disclosure grants: (granter_email, grantee_email) → PermissionGrant
pub const CF_PERMISSION_GRANTS: &str = "permission_grants";

/// Disclosure grants by grantee: (grantee_email, granter_email) → PermissionGrant
pub const CF_PERMISSION_GRANTS_BY_GRANTEE: &str = "permission_grants_by_grantee";

/// Admin role holders: fingerprint → AdminRole
pub const CF_ADMINS: &str = "admins";

/// Get all column family names
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        CF_IDENTITIES,
        CF_IDENTITIES_BY_EMAIL,
        CF_PENDING_VERIFICATIONS,
        CF_PERMISSION_GRANTS,
        CF_PERMISSION_GRANTS_BY_GRANTEE,
        CF_ADMINS,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_duplicate_column_families() {
        let cfs = all_column_families();
        let mut unique = std::collections::HashSet::new();

        for cf in &cfs {
            assert!(unique.insert(cf), "Duplicate column family: {}", cf);
        }
    }
}
