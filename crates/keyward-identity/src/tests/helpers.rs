//! Test helpers for registry service tests.

use crate::*;
use keyward_mail::MemoryMailSender;
use keyward_storage::RocksDbStorage;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const NOW: u64 = 1_700_000_000;
pub const LIFETIME: u64 = 3600;

pub const ALICE_FP: &str = "SHA256:aliceKey1";
pub const ALICE_FP2: &str = "SHA256:aliceKey2";
pub const BOB_FP: &str = "SHA256:bobKey1";
pub const CAROL_FP: &str = "SHA256:carolKey1";

pub type TestService = RegistryService<RocksDbStorage>;

pub struct Harness {
    pub service: Arc<TestService>,
    pub mail: Arc<MemoryMailSender>,
    _temp_dir: TempDir,
}

pub fn create_test_storage() -> (Arc<RocksDbStorage>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = RocksDbStorage::open(temp_dir.path()).unwrap();
    (Arc::new(db), temp_dir)
}

pub fn harness_with(policy: PendingPolicy, mail: MemoryMailSender) -> Harness {
    let (storage, temp_dir) = create_test_storage();
    let mail = Arc::new(mail);
    let config = RegistryConfig {
        verification_lifetime: Duration::from_secs(LIFETIME),
        pending_policy: policy,
        mail_timeout: Duration::from_secs(5),
    };

    Harness {
        service: Arc::new(RegistryService::new(storage, mail.clone(), config)),
        mail,
        _temp_dir: temp_dir,
    }
}

pub fn harness() -> Harness {
    harness_with(PendingPolicy::Reject, MemoryMailSender::new())
}

impl Harness {
    /// Register and confirm `email` for `fingerprint` at `now`
    pub async fn enroll_at(&self, fingerprint: &str, email: &str, now: u64) {
        self.service.register_at(fingerprint, email, now).await.unwrap();
        let code = self.mail.last_code_for(email).unwrap();
        self.service.confirm_at(fingerprint, &code, now).await.unwrap();
    }

    pub async fn enroll(&self, fingerprint: &str, email: &str) {
        self.enroll_at(fingerprint, email, NOW).await;
    }
}
