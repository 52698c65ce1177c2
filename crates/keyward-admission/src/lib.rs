//! # keyward-admission
//!
//! Per-identity admission control for inbound commands.
//!
//! Each identity carries an exponentially weighted moving average of its
//! request rate, decayed continuously with the time since its last request.
//! A request is admitted while the smoothed rate stays at or below the
//! configured limit; otherwise the caller is told how long the rate needs to
//! decay back under the limit.

#![warn(clippy::all)]

pub mod controller;
pub mod errors;

pub use controller::{Admission, AdmissionController};
pub use errors::{AdmissionError, Result};
