//! # keyward-identity
//!
//! Fingerprint to email bindings and disclosure grants.
//!
//! This crate owns the persistent state machine of the service:
//! - Email verification (register, confirm) and unregistration with cascade
//! - Disclosure grants between verified emails (allow, deny, get email)
//! - The privileged admin role and its "never empty" invariant
//! - Background expiry of stale verifications
//!
//! Every operation runs as one unit of work: writers are serialized, all
//! writes of an operation are applied atomically, and any error leaves the
//! store untouched.

#![warn(clippy::all)]

pub mod codes;
pub mod errors;
pub mod expiry;
mod service;
pub mod traits;
pub mod types;
mod unit_of_work;
pub mod validation;


pub use errors::{ErrorKind, IdentityError, Result};
pub use expiry::VerificationExpiry;
pub use service::{RegistryConfig, RegistryService};
pub use traits::{IdentityStore, PrivilegedRole};
pub use types::*;
