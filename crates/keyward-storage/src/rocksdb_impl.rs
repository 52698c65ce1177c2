//! RocksDB storage implementation.

use crate::{
    column_families::all_column_families,
    errors::{Result, StorageError},
    traits::{deserialize_value, serialize_key, Batch, Storage},
};
use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;
use tracing::{debug, info};

/// RocksDB storage implementation
pub struct RocksDbStorage {
    db: Arc<DB>,
}

impl RocksDbStorage {
    /// Open RocksDB database at the specified path
    ///
    /// Creates all required column families if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, &path, all_column_families())
            .map_err(|e| StorageError::Database(e.to_string()))?;

        info!(path = %path.as_ref().display(), "Opened RocksDB");

        Ok(Self { db: Arc::new(db) })
    }

    /// Open a database in a fresh temporary directory.
    ///
    /// The directory is removed when the returned [`TempDir`] is dropped, so
    /// callers must keep it alive for as long as the storage is in use. This
    /// is public for use in other crates' test modules.
    pub fn open_test() -> Result<(Self, TempDir)> {
        let temp_dir = TempDir::new()?;
        let storage = Self::open(temp_dir.path())?;
        Ok((storage, temp_dir))
    }

    fn cf_handle(&self, cf: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(cf)
            .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))
    }

    fn collect_from(
        &self,
        cf: &str,
        mode: IteratorMode<'_>,
        prefix: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf_handle = self.cf_handle(cf)?;
        let mut results = Vec::new();

        for item in self.db.iterator_cf(cf_handle, mode) {
            let (key, value) = item.map_err(|e| StorageError::Database(e.to_string()))?;

            if let Some(prefix) = prefix {
                // Keys are sorted, so once we're past the prefix, we're done
                if !key.starts_with(prefix) {
                    break;
                }
            }

            results.push((key.to_vec(), value.to_vec()));
        }

        Ok(results)
    }
}

#[async_trait]
impl Storage for RocksDbStorage {
    async fn get<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let cf_handle = self.cf_handle(cf)?;
        let key_bytes = serialize_key(key)?;

        let result = self
            .db
            .get_cf(cf_handle, &key_bytes)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        match result {
            Some(bytes) => Ok(Some(deserialize_value(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn exists<K>(&self, cf: &str, key: &K) -> Result<bool>
    where
        K: Serialize + Send + Sync,
    {
        let cf_handle = self.cf_handle(cf)?;
        let key_bytes = serialize_key(key)?;

        let result = self
            .db
            .get_pinned_cf(cf_handle, &key_bytes)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(result.is_some())
    }

    async fn get_by_prefix<K, V>(&self, cf: &str, prefix: &K) -> Result<Vec<(Vec<u8>, V)>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let prefix_bytes = serialize_key(prefix)?;

        // Seek to the prefix position; no prefix extractor is configured
        let raw = self.collect_from(
            cf,
            IteratorMode::From(&prefix_bytes, Direction::Forward),
            Some(&prefix_bytes),
        )?;

        raw.into_iter()
            .map(|(key, value)| Ok((key, deserialize_value(&value)?)))
            .collect()
    }

    async fn scan_all<V>(&self, cf: &str) -> Result<Vec<(Vec<u8>, V)>>
    where
        V: DeserializeOwned,
    {
        let raw = self.collect_from(cf, IteratorMode::Start, None)?;

        raw.into_iter()
            .map(|(key, value)| Ok((key, deserialize_value(&value)?)))
            .collect()
    }

    fn batch(&self) -> Box<dyn Batch> {
        Box::new(RocksDbBatch {
            db: Arc::clone(&self.db),
            write_batch: WriteBatch::default(),
        })
    }
}

/// RocksDB batch implementation
pub struct RocksDbBatch {
    db: Arc<DB>,
    write_batch: WriteBatch,
}

#[async_trait]
impl Batch for RocksDbBatch {
    fn put_raw(&mut self, cf: &str, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let cf_handle = self
            .db
            .cf_handle(cf)
            .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))?;

        self.write_batch.put_cf(cf_handle, &key, &value);

        Ok(())
    }

    fn delete_raw(&mut self, cf: &str, key: Vec<u8>) -> Result<()> {
        let cf_handle = self
            .db
            .cf_handle(cf)
            .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))?;

        self.write_batch.delete_cf(cf_handle, &key);

        Ok(())
    }

    fn len(&self) -> usize {
        self.write_batch.len()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let operations = self.write_batch.len();

        self.db
            .write(self.write_batch)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!(operations, "Batch committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        debug!(operations = self.write_batch.len(), "Batch rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_families::{
        CF_ADMINS, CF_IDENTITIES, CF_IDENTITIES_BY_EMAIL, CF_PENDING_VERIFICATIONS,
    };
    use crate::traits::BatchExt;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Binding {
        fingerprint: String,
        email: String,
        created_at: u64,
    }

    fn binding(fingerprint: &str, email: &str) -> Binding {
        Binding {
            fingerprint: fingerprint.to_string(),
            email: email.to_string(),
            created_at: 1_700_000_000,
        }
    }

    async fn put_one<V: Serialize>(storage: &RocksDbStorage, cf: &str, key: &impl Serialize, value: &V) {
        let mut batch = storage.batch();
        batch.put(cf, key, value).unwrap();
        batch.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (storage, _dir) = RocksDbStorage::open_test().unwrap();
        let data = binding("SHA256:alice", "alice@example.com");

        put_one(&storage, CF_IDENTITIES, &data.fingerprint, &data).await;

        let result: Option<Binding> = storage.get(CF_IDENTITIES, &"SHA256:alice").await.unwrap();
        assert_eq!(result, Some(data));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (storage, _dir) = RocksDbStorage::open_test().unwrap();

        let result: Option<Binding> = storage.get(CF_IDENTITIES, &"SHA256:nobody").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let (storage, _dir) = RocksDbStorage::open_test().unwrap();
        let key = "SHA256:admin".to_string();

        assert!(!storage.exists(CF_ADMINS, &key).await.unwrap());

        put_one(&storage, CF_ADMINS, &key, &42u64).await;
        assert!(storage.exists(CF_ADMINS, &key).await.unwrap());

        let mut batch = storage.batch();
        batch.delete(CF_ADMINS, &key).unwrap();
        batch.commit().await.unwrap();

        assert!(!storage.exists(CF_ADMINS, &key).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_commit_spans_column_families() {
        let (storage, _dir) = RocksDbStorage::open_test().unwrap();
        let data = binding("SHA256:alice", "alice@example.com");

        let mut batch = storage.batch();
        batch.put(CF_IDENTITIES, &data.fingerprint, &data).unwrap();
        batch
            .put(CF_IDENTITIES_BY_EMAIL, &(&data.email, &data.fingerprint), &data)
            .unwrap();
        batch.delete(CF_PENDING_VERIFICATIONS, &data.fingerprint).unwrap();
        assert_eq!(batch.len(), 3);
        batch.commit().await.unwrap();

        assert!(storage.exists(CF_IDENTITIES, &data.fingerprint).await.unwrap());
        assert!(storage
            .exists(CF_IDENTITIES_BY_EMAIL, &(&data.email, &data.fingerprint))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_batch_rollback() {
        let (storage, _dir) = RocksDbStorage::open_test().unwrap();
        let data = binding("SHA256:alice", "alice@example.com");

        let mut batch = storage.batch();
        batch.put(CF_IDENTITIES, &data.fingerprint, &data).unwrap();
        batch.rollback();

        let result: Option<Binding> = storage.get(CF_IDENTITIES, &data.fingerprint).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_invalid_column_family() {
        let (storage, _dir) = RocksDbStorage::open_test().unwrap();

        let mut batch = storage.batch();
        let err = batch.put("no_such_cf", &"k", &1u8).unwrap_err();
        assert!(matches!(err, StorageError::InvalidColumnFamily(_)));
    }

    #[tokio::test]
    async fn test_get_by_prefix_matches_whole_leading_component() {
        let (storage, _dir) = RocksDbStorage::open_test().unwrap();

        let rows = [
            binding("SHA256:a1", "bob@example.com"),
            binding("SHA256:a2", "bob@example.com"),
            binding("SHA256:a3", "bob@example.community"),
            binding("SHA256:a4", "alice@example.com"),
        ];
        for row in &rows {
            put_one(&storage, CF_IDENTITIES_BY_EMAIL, &(&row.email, &row.fingerprint), row).await;
        }

        let results: Vec<(Vec<u8>, Binding)> = storage
            .get_by_prefix(CF_IDENTITIES_BY_EMAIL, &"bob@example.com")
            .await
            .unwrap();

        let fingerprints: Vec<_> = results.iter().map(|(_, b)| b.fingerprint.as_str()).collect();
        assert_eq!(fingerprints, vec!["SHA256:a1", "SHA256:a2"]);
    }

    #[tokio::test]
    async fn test_scan_all() {
        let (storage, _dir) = RocksDbStorage::open_test().unwrap();

        for fp in ["SHA256:x", "SHA256:y", "SHA256:z"] {
            put_one(&storage, CF_PENDING_VERIFICATIONS, &fp, &binding(fp, "p@example.com")).await;
        }

        let all: Vec<(Vec<u8>, Binding)> = storage.scan_all(CF_PENDING_VERIFICATIONS).await.unwrap();
        assert_eq!(all.len(), 3);

        let admins: Vec<(Vec<u8>, u64)> = storage.scan_all(CF_ADMINS).await.unwrap();
        assert!(admins.is_empty());
    }

    #[tokio::test]
    async fn test_reopen_persists() {
        let dir = TempDir::new().unwrap();
        let data = binding("SHA256:alice", "alice@example.com");

        {
            let storage = RocksDbStorage::open(dir.path()).unwrap();
            put_one(&storage, CF_IDENTITIES, &data.fingerprint, &data).await;
        }

        let storage = RocksDbStorage::open(dir.path()).unwrap();
        let result: Option<Binding> = storage.get(CF_IDENTITIES, &data.fingerprint).await.unwrap();
        assert_eq!(result, Some(data));
    }
}
