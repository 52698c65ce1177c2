//! Static informational commands.

use crate::{context::CommandContext, errors::*, registry::*, traits::CommandHandler};
use async_trait::async_trait;

const CATEGORY: &str = "Info";

const ABOUT: &str = "\
* Verified registry linking SSH public keys to email addresses
* No installation or configuration needed - works with your existing SSH setup
* Privacy-focused: you control what information is public or private
* Simple email verification process
* Free public service";

const WHY: &str = "\
* Single verified identity for all SSH-based applications - register once, use everywhere
* Perfect for SSH application developers - no need to build and maintain user verification systems
* Users control their privacy - they decide which applications can access their email
* Lightweight alternative to OAuth for CLI applications - just use SSH keys that users already have
* Central identity system that respects privacy and puts users in control";

pub(super) fn register(registry: &mut CommandRegistry) {
    registry.register(Command::new("help", "help", "List the available commands.", Help).in_category(CATEGORY));
    registry.register(
        Command::new(
            "about",
            "about",
            "Learn about this service and how it helps map SSH keys to email addresses while protecting user privacy.",
            Static(ABOUT),
        )
        .in_category(CATEGORY),
    );
    registry.register(
        Command::new(
            "why",
            "why",
            "Understand the motivation behind this project and how it helps solve common SSH key management challenges.",
            Static(WHY),
        )
        .in_category(CATEGORY),
    );
}

struct Help;

#[async_trait]
impl CommandHandler for Help {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        Ok(ctx.registry.help_text())
    }
}

struct Static(&'static str);

#[async_trait]
impl CommandHandler for Static {
    async fn handle(&self, _ctx: &CommandContext<'_>) -> Result<String> {
        Ok(self.0.to_string())
    }
}
