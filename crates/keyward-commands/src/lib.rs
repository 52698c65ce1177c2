//! # keyward-commands
//!
//! The command surface of keyward.
//!
//! A session sends one command line; the [`CommandRegistry`] splits it into
//! a command path and arguments, checks the arity declared by the usage
//! string and hands a [`CommandContext`] to the matching [`CommandHandler`].
//! Handlers are thin: they call into [`keyward_identity`] and format the
//! outcome as text. [`render`] turns the result into the wire response.

#![warn(clippy::all)]

pub mod context;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod traits;

pub use context::{CommandContext, Services};
pub use errors::{CommandError, Result};
pub use handlers::default_registry;
pub use registry::{render, required_args, Action, Command, CommandRegistry};
pub use traits::{CommandHandler, ShutdownTrigger};
