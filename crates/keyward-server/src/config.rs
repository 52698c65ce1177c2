use anyhow::{bail, Context, Result};
use keyward_identity::{PendingPolicy, RegistryConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration
///
/// Missing fields in a config file take their production defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub rate_limit: RateLimitConfig,
    pub verification: VerificationConfig,
    pub email: EmailConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the SSH listener binds to
    pub bind_address: SocketAddr,
    /// OpenSSH private key used as host key
    pub host_key_path: PathBuf,
    /// Upper bound on draining in-flight commands at shutdown
    pub shutdown_timeout_secs: u64,
    /// Idle connections are closed after this long
    pub inactivity_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 22)),
            host_key_path: PathBuf::from("/etc/keyward/host_key"),
            shutdown_timeout_secs: 30,
            inactivity_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/keyward/db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per period a single key may sustain
    pub limit: f64,
    pub period_secs: u64,
    /// Count denied requests against the key as well
    pub strict: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 600.0,
            period_secs: 10 * 3600,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub lifetime_secs: u64,
    pub pending_policy: PendingPolicy,
    pub mail_timeout_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: 3600,
            pending_policy: PendingPolicy::Reject,
            mail_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    /// HTTP mail API
    Resend,
    /// Write confirmation codes to the log
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub backend: MailBackend,
    pub api_url: String,
    pub resend_key_path: PathBuf,
    pub from_email: String,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            backend: MailBackend::Resend,
            api_url: "https://api.resend.com/emails".to_string(),
            resend_key_path: PathBuf::from("/etc/keyward/resend_key"),
            from_email: "confirmations@keyward.sh".to_string(),
            from_name: "keyward.sh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Seeded into an empty admin set at startup
    pub bootstrap_fingerprints: Vec<String>,
}

impl Config {
    /// Production defaults
    pub fn production() -> Self {
        Self::default()
    }

    /// Local test profile: high port, short verification lifetime, codes in the log
    pub fn test() -> Self {
        Self {
            server: ServerConfig {
                bind_address: SocketAddr::from(([127, 0, 0, 1], 2288)),
                host_key_path: PathBuf::from("./data_test/host_key"),
                ..ServerConfig::default()
            },
            database: DatabaseConfig {
                path: PathBuf::from("./data_test/db"),
            },
            rate_limit: RateLimitConfig {
                limit: 1000.0,
                period_secs: 3600,
                strict: false,
            },
            verification: VerificationConfig {
                lifetime_secs: 5 * 60,
                ..VerificationConfig::default()
            },
            email: EmailConfig {
                backend: MailBackend::Log,
                from_email: "test-confirmations@keyward.sh".to_string(),
                from_name: "keyward.sh-test".to_string(),
                ..EmailConfig::default()
            },
            admin: AdminConfig::default(),
        }
    }

    /// Resolve the configuration from CLI choices and the environment.
    ///
    /// Returns the configuration and a description of where it came from.
    pub fn load(path: Option<&Path>, test: bool) -> Result<(Self, String)> {
        let (mut config, source) = match (path, test) {
            (Some(_), true) => bail!("--config and --test cannot be used together"),
            (Some(path), false) => (
                Self::from_file(path)?,
                format!("config file {}", path.display()),
            ),
            (None, true) => (Self::test(), "built-in test configuration".to_string()),
            (None, false) => (Self::production(), "default production configuration".to_string()),
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok((config, source))
    }

    /// Parse a JSON config file over the production defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Apply environment overrides; `lookup` returns the value of a variable
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(addr) = lookup("BIND_ADDRESS") {
            self.server.bind_address = addr
                .parse()
                .with_context(|| format!("invalid BIND_ADDRESS: {addr}"))?;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database.path = path.into();
        }
        if let Some(path) = lookup("HOST_KEY_PATH") {
            self.server.host_key_path = path.into();
        }
        if let Some(path) = lookup("RESEND_KEY_PATH") {
            self.email.resend_key_path = path.into();
        }
        if let Some(admins) = lookup("KEYWARD_ADMINS") {
            self.admin.bootstrap_fingerprints = admins
                .split(',')
                .map(str::trim)
                .filter(|fp| !fp.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.rate_limit.limit.is_finite() || self.rate_limit.limit < 1.0 {
            bail!("rate_limit.limit must be at least 1, got {}", self.rate_limit.limit);
        }
        if self.rate_limit.period_secs == 0 {
            bail!("rate_limit.period_secs must be positive");
        }
        if self.verification.lifetime_secs == 0 {
            bail!("verification.lifetime_secs must be positive");
        }
        if self.verification.mail_timeout_secs == 0 {
            bail!("verification.mail_timeout_secs must be positive");
        }
        if self.server.shutdown_timeout_secs == 0 {
            bail!("server.shutdown_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(self.rate_limit.period_secs)
    }

    pub fn verification_lifetime(&self) -> Duration {
        Duration::from_secs(self.verification.lifetime_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            verification_lifetime: self.verification_lifetime(),
            pending_policy: self.verification.pending_policy,
            mail_timeout: Duration::from_secs(self.verification.mail_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_profiles_are_valid() {
        Config::production().validate().unwrap();
        Config::test().validate().unwrap();

        assert_eq!(Config::production().rate_limit.limit, 600.0);
        assert_eq!(Config::production().rate_limit_period(), Duration::from_secs(36_000));
        assert_eq!(Config::test().verification_lifetime(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_file_overlays_production_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rate_limit": {{"limit": 50}}, "verification": {{"pending_policy": "overwrite"}}}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.rate_limit.limit, 50.0);
        assert_eq!(config.rate_limit.period_secs, 36_000);
        assert_eq!(config.verification.pending_policy, PendingPolicy::Overwrite);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_config_and_test_flags_conflict() {
        let err = Config::load(Some(Path::new("keyward.json")), true).unwrap_err();
        assert!(err.to_string().contains("cannot be used together"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BIND_ADDRESS", "127.0.0.1:2222"),
            ("DATABASE_PATH", "/tmp/keyward-db"),
            ("KEYWARD_ADMINS", "SHA256:a, SHA256:b,,"),
        ]);
        let mut config = Config::production();

        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:2222".parse().unwrap());
        assert_eq!(config.database.path, PathBuf::from("/tmp/keyward-db"));
        assert_eq!(config.admin.bootstrap_fingerprints, vec!["SHA256:a", "SHA256:b"]);
        assert_eq!(config.email.resend_key_path, EmailConfig::default().resend_key_path);
    }

    #[test]
    fn test_invalid_bind_address() {
        let mut config = Config::production();
        let err = config
            .apply_overrides(|name| (name == "BIND_ADDRESS").then(|| "not-an-address".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("BIND_ADDRESS"));
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let mut config = Config::production();
        config.rate_limit.limit = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::production();
        config.rate_limit.period_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::production();
        config.verification.lifetime_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::production();
        config.rate_limit.limit = f64::NAN;
        assert!(config.validate().is_err());
    }
}
