//! # keyward-runtime
//!
//! Small runtime helpers shared by the keyward crates: the wall clock used
//! for persisted timestamps and the cancellable periodic background task.

#![warn(clippy::all)]

pub mod clock;
pub mod task;

pub use clock::current_timestamp;
pub use task::{FirstRun, PeriodicTask};
