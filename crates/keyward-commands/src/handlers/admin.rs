//! Admin commands and shutdown.

use crate::{context::CommandContext, errors::*, registry::*, traits::CommandHandler};
use async_trait::async_trait;
use keyward_identity::IdentityError;
use tracing::info;

const CATEGORY: &str = "Admin";

pub(super) fn register(registry: &mut CommandRegistry) {
    registry.register(
        Command::group(
            "admin",
            "admin <subcommand>",
            "Administrative commands",
            [
                Command::new("add", "admin add <fingerprint>", "Add a new admin fingerprint", AddAdmin),
                Command::new(
                    "remove",
                    "admin remove <fingerprint>",
                    "Remove an admin fingerprint",
                    RemoveAdmin,
                ),
                Command::new("list", "admin list", "Print fingerprint list of admins", ListAdmins),
            ],
        )
        .in_category(CATEGORY),
    );
    registry.register(
        Command::new(
            "shutdown",
            "shutdown",
            "Gracefully shutdown the server (admin only)",
            Shutdown,
        )
        .in_category(CATEGORY),
    );
}

struct AddAdmin;

#[async_trait]
impl CommandHandler for AddAdmin {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        ctx.services.roles.add_admin(ctx.fingerprint, ctx.arg(2)?).await?;
        Ok("Admin added".to_string())
    }
}

struct RemoveAdmin;

#[async_trait]
impl CommandHandler for RemoveAdmin {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        ctx.services.roles.remove_admin(ctx.fingerprint, ctx.arg(2)?).await?;
        Ok("Admin removed".to_string())
    }
}

struct ListAdmins;

#[async_trait]
impl CommandHandler for ListAdmins {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        let admins = ctx.services.roles.list_admins(ctx.fingerprint).await?;
        let mut out = String::from("Admin fingerprints:");
        for admin in admins {
            out.push_str("\n- ");
            out.push_str(&admin.fingerprint);
        }
        Ok(out)
    }
}

struct Shutdown;

#[async_trait]
impl CommandHandler for Shutdown {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        let trigger = ctx
            .services
            .shutdown
            .as_ref()
            .ok_or(CommandError::ShutdownUnavailable)?;

        if !ctx.services.roles.is_admin(ctx.fingerprint).await? {
            return Err(IdentityError::NotAdmin {
                action: "shut down the server",
            }
            .into());
        }

        info!(fingerprint = %ctx.fingerprint, "Shutdown requested");
        trigger.initiate();
        Ok("Initiating graceful shutdown...".to_string())
    }
}
