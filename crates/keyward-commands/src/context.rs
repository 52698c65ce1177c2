//! Per-invocation command context.

use crate::{errors::*, registry::CommandRegistry, traits::ShutdownTrigger};
use keyward_identity::{IdentityStore, PrivilegedRole};
use std::sync::Arc;

/// Capabilities available to command handlers
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityStore>,
    pub roles: Arc<dyn PrivilegedRole>,
    /// Absent when the process cannot be shut down from a session
    pub shutdown: Option<Arc<dyn ShutdownTrigger>>,
}

impl Services {
    pub fn new(identity: Arc<dyn IdentityStore>, roles: Arc<dyn PrivilegedRole>) -> Self {
        Self {
            identity,
            roles,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, trigger: Arc<dyn ShutdownTrigger>) -> Self {
        self.shutdown = Some(trigger);
        self
    }
}

/// Everything a handler gets to see about one command invocation.
///
/// `fingerprint` is the authenticated session key and is never taken from
/// the command line.
pub struct CommandContext<'a> {
    pub registry: &'a CommandRegistry,
    pub services: &'a Services,
    pub fingerprint: &'a str,
    /// All tokens including the command path
    pub args: &'a [String],
}

impl<'a> CommandContext<'a> {
    pub fn new(registry: &'a CommandRegistry, services: &'a Services, fingerprint: &'a str, args: &'a [String]) -> Self {
        Self {
            registry,
            services,
            fingerprint,
            args,
        }
    }

    /// Token at `index` of the raw command line
    pub fn arg(&self, index: usize) -> Result<&'a str> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| CommandError::Internal(format!("missing argument {index}")))
    }
}
