//! Command handler and shutdown capabilities.

use crate::{context::CommandContext, errors::Result};
use async_trait::async_trait;

/// Executes one command.
///
/// The registry has already checked the arity when `handle` is called, so
/// the arguments declared in the usage string are present.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String>;
}

/// Starts a graceful shutdown of the serving process.
///
/// `initiate` returns immediately; draining happens in the background.
pub trait ShutdownTrigger: Send + Sync {
    fn initiate(&self);
}
