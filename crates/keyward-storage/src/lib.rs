//! # keyward-storage
//!
//! Storage abstraction for keyward backed by RocksDB.
//!
//! Values and keys are bincode-encoded. Multi-record writes go through a
//! [`Batch`], which is applied atomically on commit and discarded on
//! rollback.

#![warn(clippy::all)]

pub mod column_families;
pub mod errors;
pub mod rocksdb_impl;
pub mod traits;

pub use column_families::*;
pub use errors::{Result, StorageError};
pub use rocksdb_impl::RocksDbStorage;
pub use traits::{Batch, BatchExt, Storage};
