//! Command table, arity checks and dispatch.

use crate::{context::CommandContext, errors::*, traits::CommandHandler};
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What a command does when invoked
#[derive(Clone)]
pub enum Action {
    Handler(Arc<dyn CommandHandler>),
    /// Named subcommands, the second token selects one
    Group(BTreeMap<String, Command>),
}

/// One entry of the command table.
#[derive(Clone)]
pub struct Command {
    name: String,
    usage: String,
    description: String,
    category: String,
    arity: usize,
    action: Action,
}

impl Command {
    /// A leaf command; its arity is read from `usage`
    pub fn new(
        name: impl Into<String>,
        usage: impl Into<String>,
        description: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> Self {
        let usage = usage.into();
        Self {
            name: name.into(),
            arity: required_args(&usage),
            usage,
            description: description.into(),
            category: String::new(),
            action: Action::Handler(Arc::new(handler)),
        }
    }

    /// A command whose second token picks one of `subcommands`
    pub fn group(
        name: impl Into<String>,
        usage: impl Into<String>,
        description: impl Into<String>,
        subcommands: impl IntoIterator<Item = Command>,
    ) -> Self {
        let usage = usage.into();
        Self {
            name: name.into(),
            arity: required_args(&usage),
            usage,
            description: description.into(),
            category: String::new(),
            action: Action::Group(subcommands.into_iter().map(|cmd| (cmd.name.clone(), cmd)).collect()),
        }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Required arguments after the command path
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn action(&self) -> &Action {
        &self.action
    }
}

/// Number of `<placeholder>` tokens after the first word of `usage`.
///
/// `"get email <fingerprint>"` has one: the subcommand word is part of the
/// path, not an argument.
pub fn required_args(usage: &str) -> usize {
    usage
        .split_whitespace()
        .skip(1)
        .filter(|token| token.len() > 2 && token.starts_with('<') && token.ends_with('>'))
        .count()
}

/// The set of commands a server answers.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `command`, replacing any command with the same name
    pub fn register(&mut self, command: Command) {
        if self.commands.insert(command.name.clone(), command).is_some() {
            debug!("Replaced an existing command");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// Commands sorted by name
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    /// Resolve and run the command named by `ctx.args`.
    ///
    /// A panicking handler is reported as an internal error; the panic does
    /// not escape this call.
    pub async fn dispatch(&self, ctx: &CommandContext<'_>) -> Result<String> {
        let (command, handler, path_len) = self.resolve(ctx.args)?;

        let supplied = ctx.args.len() - path_len;
        if supplied != command.arity {
            return Err(CommandError::Usage(command.usage.clone()));
        }

        let outcome = AssertUnwindSafe(handler.handle(ctx)).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(command = %command.usage, fingerprint = %ctx.fingerprint, panic = %message, "Command handler panicked");
                Err(CommandError::Internal(message))
            }
        };

        if let Err(e) = &result {
            if e.is_fault() {
                match e {
                    CommandError::Identity(inner) => {
                        warn!(command = %command.usage, fingerprint = %ctx.fingerprint, error = %inner, "Command failed")
                    }
                    other => error!(command = %command.usage, fingerprint = %ctx.fingerprint, error = ?other, "Command failed"),
                }
            }
        }

        result
    }

    /// Find the leaf command for `args` and how many tokens its path uses
    fn resolve<'r>(&'r self, args: &[String]) -> Result<(&'r Command, &'r Arc<dyn CommandHandler>, usize)> {
        let Some(name) = args.first() else {
            return Err(CommandError::Help(self.help_text()));
        };

        let command = self.commands.get(name).ok_or_else(|| CommandError::UnknownCommand {
            name: name.clone(),
            help: self.help_text(),
        })?;

        match &command.action {
            Action::Handler(handler) => Ok((command, handler, 1)),
            Action::Group(subcommands) => {
                let Some(sub_name) = args.get(1) else {
                    return Err(CommandError::Help(subcommand_help(command)));
                };
                let sub = subcommands.get(sub_name).ok_or_else(|| CommandError::UnknownSubcommand {
                    command: command.name.clone(),
                    name: sub_name.clone(),
                    help: subcommand_help(command),
                })?;
                match &sub.action {
                    Action::Handler(handler) => Ok((sub, handler, 2)),
                    Action::Group(_) => Err(CommandError::Internal(format!(
                        "nested command group {} {}",
                        command.name, sub.name
                    ))),
                }
            }
        }
    }

    /// Every command grouped by category, both sorted by name
    pub fn help_text(&self) -> String {
        let mut by_category: BTreeMap<&str, Vec<&Command>> = BTreeMap::new();
        for command in self.commands.values() {
            by_category.entry(&command.category).or_default().push(command);
        }

        let mut help = String::from("Available commands:\n\n");
        for (category, commands) in by_category {
            let _ = writeln!(help, "{category}:");
            for command in commands {
                let _ = writeln!(help, "  {}\n    {}", command.usage, command.description);
                if let Action::Group(subcommands) = &command.action {
                    for sub in subcommands.values() {
                        let _ = writeln!(help, "      {}\n        {}", sub.usage, sub.description);
                    }
                }
                help.push('\n');
            }
        }
        help
    }

    /// Help for the subcommands of the group named `name`
    pub fn subcommand_help(&self, name: &str) -> Option<String> {
        self.commands.get(name).map(subcommand_help)
    }
}

fn subcommand_help(command: &Command) -> String {
    let mut help = format!("Available {} subcommands:\n\n", command.name);
    if let Action::Group(subcommands) = &command.action {
        for sub in subcommands.values() {
            let _ = write!(help, "  {}\n    {}\n\n", sub.usage, sub.description);
        }
    }
    help
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Wire form of a command result: the text, or `Error: ` and the message,
/// terminated by a newline.
pub fn render(result: &Result<String>) -> String {
    match result {
        Ok(text) => format!("{}\n", text.trim_end_matches('\n')),
        Err(e) => format!("Error: {}\n", e.to_string().trim_end_matches('\n')),
    }
}
