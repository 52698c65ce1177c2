//! Account commands: register, confirm, whoami, unregister.

use super::format_timestamp;
use crate::{context::CommandContext, errors::*, registry::*, traits::CommandHandler};
use async_trait::async_trait;
use keyward_identity::{validation::normalize_fingerprint, IdentityError, WhoAmI};
use std::fmt::Write as _;

const CATEGORY: &str = "Account";

pub(super) fn register(registry: &mut CommandRegistry) {
    registry.register(
        Command::new(
            "whoami",
            "whoami",
            "Show your fingerprint, registered email, registration date, and list of users allowed to see your email.",
            Whoami,
        )
        .in_category(CATEGORY),
    );
    registry.register(
        Command::new(
            "register",
            "register <email>",
            "Register your SSH key with the given email address. You will receive a confirmation code via email.",
            Register,
        )
        .in_category(CATEGORY),
    );
    registry.register(
        Command::new(
            "confirm",
            "confirm <code>",
            "Confirm your email address using the code you received. This completes your registration.",
            Confirm,
        )
        .in_category(CATEGORY),
    );
    registry.register(
        Command::new(
            "unregister",
            "unregister",
            "Remove your registration and all associated permissions. This cannot be undone.",
            Unregister,
        )
        .in_category(CATEGORY),
    );
}

struct Register;

#[async_trait]
impl CommandHandler for Register {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        let pending = ctx.services.identity.register(ctx.fingerprint, ctx.arg(1)?).await?;
        Ok(format!(
            "Success: Confirmation mail sent to {}, the code is valid until {}",
            pending.email,
            format_timestamp(pending.expires_at)
        ))
    }
}

struct Confirm;

#[async_trait]
impl CommandHandler for Confirm {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        let email = ctx.services.identity.confirm(ctx.fingerprint, ctx.arg(1)?).await?;
        let fingerprint = normalize_fingerprint(ctx.fingerprint).map_err(IdentityError::from)?;
        Ok(format!("Success: email {email} is now associated with fingerprint {fingerprint}"))
    }
}

struct Whoami;

#[async_trait]
impl CommandHandler for Whoami {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        let who = ctx.services.identity.whoami(ctx.fingerprint).await?;
        Ok(format_whoami(&who))
    }
}

struct Unregister;

#[async_trait]
impl CommandHandler for Unregister {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<String> {
        let removed = ctx.services.identity.unregister(ctx.fingerprint).await?;
        Ok(if removed.last_key {
            "Success: Your registration and all related permissions have been removed".to_string()
        } else {
            format!(
                "Success: This key has been removed, other keys remain registered to {}",
                removed.email
            )
        })
    }
}

/// Text shown by `whoami`
pub fn format_whoami(who: &WhoAmI) -> String {
    let (email, keys, grants) = match who {
        WhoAmI::Unregistered { fingerprint } => {
            return format!("You are not registered. Your fingerprint is {fingerprint}");
        }
        WhoAmI::Registered { email, keys, grants } => (email, keys, grants),
    };

    let mut out = format!("Email: {email}\n\nRegistered Keys:\n");
    for key in keys {
        let registered = format_timestamp(key.created_at);
        if key.current {
            let _ = writeln!(out, "* {} (current) - registered: {registered}", key.fingerprint);
        } else {
            let _ = writeln!(out, "  {} - registered: {registered}", key.fingerprint);
        }
    }

    if grants.is_empty() {
        out.push_str("\nNo users are allowed to see your email.");
    } else {
        out.push_str("\nAllowed users:\n");
        for grant in grants {
            let _ = writeln!(out, "- {} (granted: {})", grant.email, format_timestamp(grant.created_at));
        }
    }
    out
}
