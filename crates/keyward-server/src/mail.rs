use crate::config::{EmailConfig, MailBackend};
use anyhow::{Context, Result};
use keyward_mail::{LogMailSender, MailSender, ResendMailSender};
use std::sync::Arc;
use std::time::Duration;

/// Build the configured mail backend
pub fn build_sender(config: &EmailConfig, timeout: Duration) -> Result<Arc<dyn MailSender>> {
    Ok(match config.backend {
        MailBackend::Resend => Arc::new(
            ResendMailSender::new(
                &config.api_url,
                &config.resend_key_path,
                &config.from_email,
                &config.from_name,
                timeout,
            )
            .with_context(|| {
                format!(
                    "failed to set up mail delivery with key {}",
                    config.resend_key_path.display()
                )
            })?,
        ),
        MailBackend::Log => Arc::new(LogMailSender::new(&config.from_name)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_backend() {
        let config = EmailConfig {
            backend: MailBackend::Log,
            ..EmailConfig::default()
        };

        let sender = build_sender(&config, Duration::from_secs(5)).unwrap();

        assert_eq!(sender.service_name(), "keyward.sh");
    }

    #[test]
    fn test_resend_backend_needs_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmailConfig {
            resend_key_path: dir.path().join("missing"),
            ..EmailConfig::default()
        };

        assert!(build_sender(&config, Duration::from_secs(5)).is_err());

        let mut key = tempfile::NamedTempFile::new().unwrap();
        writeln!(key, "re_test_key").unwrap();
        let config = EmailConfig {
            resend_key_path: key.path().to_path_buf(),
            ..EmailConfig::default()
        };
        let sender = build_sender(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(sender.service_name(), "keyward.sh");
    }
}
