//! Disclosure grants: allow and deny.

use crate::{context::CommandContext, errors::*, registry::*, traits::CommandHandler};
use async_trait::async_trait;
use keyward_identity::{validation::normalize_email, GrantOutcome};

const CATEGORY: &str = "Privacy Control";

pub(super) fn register(registry: &mut CommandRegistry) {
    registry.register(
        Command::new(
            "allow",
            "allow <email>",
            "Grant permission to the given email address to see your email. The user must be registered in the system.",
            Allow,
        )
        .in_category(CATEGORY),
    );
    registry.register(
        Command::new(
            "deny",
            "deny <email>",
            "Remove permission for the given email address to see your email.",
            Deny,
        )
        .in_category(CATEGORY),
    );
}

struct Allow;

#[async_trait]
impl CommandHandler for Allow {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        let grantee = ctx.arg(1)?;
        match ctx.services.identity.allow(ctx.fingerprint, grantee).await? {
            GrantOutcome::Created => Ok(format!(
                "Success: user {} can read your email address",
                normalize_email(grantee)
            )),
            GrantOutcome::AlreadyExists => Ok("permission already exists".to_string()),
        }
    }
}

struct Deny;

#[async_trait]
impl CommandHandler for Deny {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        let grantee = ctx.arg(1)?;
        ctx.services.identity.deny(ctx.fingerprint, grantee).await?;
        Ok(format!(
            "Success: user {} can no longer read your email address",
            normalize_email(grantee)
        ))
    }
}
