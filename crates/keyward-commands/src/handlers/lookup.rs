//! Lookup commands.

use crate::{context::CommandContext, errors::*, registry::*, traits::CommandHandler};
use async_trait::async_trait;

pub(super) fn register(registry: &mut CommandRegistry) {
    registry.register(
        Command::group(
            "get",
            "get <subcommand>",
            "Get information about users",
            [Command::new(
                "email",
                "get email <fingerprint>",
                "Get email for the given fingerprint (if authorized)",
                GetEmail,
            )],
        )
        .in_category("Information"),
    );
}

struct GetEmail;

#[async_trait]
impl CommandHandler for GetEmail {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        let target = ctx.arg(2)?;
        Ok(ctx.services.identity.get_email(ctx.fingerprint, target).await?)
    }
}
