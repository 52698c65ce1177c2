//! Serialized, atomic units of work over [`Storage`].
//!
//! A write unit holds the store's write lock for its whole lifetime and
//! buffers every mutation in a [`Batch`]; `commit` applies the batch
//! atomically. Dropping a unit that was not committed rolls the batch back.
//! Read units share the read lock and reject mutations.
//!
//! Reads always go to the store, so they do not observe mutations buffered
//! earlier in the same unit.

use keyward_storage::{Batch, BatchExt, Storage, StorageError};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

enum Guard<'a> {
    Read(#[allow(dead_code)] RwLockReadGuard<'a, ()>),
    Write(#[allow(dead_code)] RwLockWriteGuard<'a, ()>),
}

pub(crate) struct UnitOfWork<'a, S: Storage> {
    storage: &'a S,
    // Only touched through `&mut self`; the mutex makes the unit `Sync`
    batch: Mutex<Option<Box<dyn Batch>>>,
    _guard: Guard<'a>,
}

impl<'a, S: Storage> UnitOfWork<'a, S> {
    /// Begin a read-write unit, waiting for exclusive access
    pub(crate) async fn write(storage: &'a S, lock: &'a RwLock<()>) -> UnitOfWork<'a, S> {
        let guard = lock.write().await;
        Self {
            storage,
            batch: Mutex::new(Some(storage.batch())),
            _guard: Guard::Write(guard),
        }
    }

    /// Begin a read-only unit
    pub(crate) async fn read(storage: &'a S, lock: &'a RwLock<()>) -> UnitOfWork<'a, S> {
        let guard = lock.read().await;
        Self {
            storage,
            batch: Mutex::new(None),
            _guard: Guard::Read(guard),
        }
    }

    pub(crate) async fn get<K, V>(&self, cf: &str, key: &K) -> keyward_storage::Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        self.storage.get(cf, key).await
    }

    pub(crate) async fn exists<K>(&self, cf: &str, key: &K) -> keyward_storage::Result<bool>
    where
        K: Serialize + Send + Sync,
    {
        self.storage.exists(cf, key).await
    }

    /// Values of every entry whose key starts with `prefix`
    pub(crate) async fn values_by_prefix<K, V>(&self, cf: &str, prefix: &K) -> keyward_storage::Result<Vec<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let entries: Vec<(Vec<u8>, V)> = self.storage.get_by_prefix(cf, prefix).await?;
        Ok(entries.into_iter().map(|(_, value)| value).collect())
    }

    /// Values of every entry in `cf`
    pub(crate) async fn values<V>(&self, cf: &str) -> keyward_storage::Result<Vec<V>>
    where
        V: DeserializeOwned,
    {
        let entries: Vec<(Vec<u8>, V)> = self.storage.scan_all(cf).await?;
        Ok(entries.into_iter().map(|(_, value)| value).collect())
    }

    pub(crate) fn put<K, V>(&mut self, cf: &str, key: &K, value: &V) -> keyward_storage::Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        self.batch_mut()?.put(cf, key, value)
    }

    pub(crate) fn delete<K>(&mut self, cf: &str, key: &K) -> keyward_storage::Result<()>
    where
        K: Serialize + ?Sized,
    {
        self.batch_mut()?.delete(cf, key)
    }

    /// Apply all buffered mutations atomically and release the lock
    pub(crate) async fn commit(mut self) -> keyward_storage::Result<()> {
        match self.batch.get_mut().take() {
            Some(batch) => batch.commit().await,
            None => Err(read_only()),
        }
    }

    fn batch_mut(&mut self) -> keyward_storage::Result<&mut Box<dyn Batch>> {
        self.batch.get_mut().as_mut().ok_or_else(read_only)
    }
}

impl<S: Storage> Drop for UnitOfWork<'_, S> {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.get_mut().take() {
            if !batch.is_empty() {
                debug!(operations = batch.len(), "Unit of work rolled back");
            }
            batch.rollback();
        }
    }
}

fn read_only() -> StorageError {
    StorageError::TransactionError("unit of work is read-only".to_string())
}
