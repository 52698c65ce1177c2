//! Built-in command handlers.

mod account;
mod admin;
mod info;
mod lookup;
mod privacy;

pub use account::format_whoami;

use crate::registry::CommandRegistry;
use chrono::{DateTime, SecondsFormat};

/// Registry with every keyward command
pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    account::register(&mut registry);
    privacy::register(&mut registry);
    lookup::register(&mut registry);
    admin::register(&mut registry);
    info::register(&mut registry);
    registry
}

/// RFC 3339 rendering of a Unix timestamp
pub(crate) fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14T22:13:20Z");
        assert_eq!(format_timestamp(u64::MAX), u64::MAX.to_string());
    }

    #[test]
    fn test_default_registry_commands() {
        let registry = default_registry();

        let names: Vec<&str> = registry.commands().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "about",
                "admin",
                "allow",
                "confirm",
                "deny",
                "get",
                "help",
                "register",
                "shutdown",
                "unregister",
                "whoami",
                "why"
            ]
        );

        assert_eq!(registry.get("register").unwrap().arity(), 1);
        assert_eq!(registry.get("whoami").unwrap().arity(), 0);
    }
}
