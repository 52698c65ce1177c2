//! Mail sender backends.

use crate::email_hash_for_log;
use crate::errors::{MailError, Result};
use crate::sender::{MailMessage, MailSender};
use crate::template;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sender backed by the Resend HTTP mail API
pub struct ResendMailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

impl ResendMailSender {
    /// Create a sender, reading the API key from `key_path`.
    ///
    /// Surrounding whitespace is stripped from the key file.
    pub fn new(
        api_url: impl Into<String>,
        key_path: impl AsRef<Path>,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = std::fs::read_to_string(key_path.as_ref())?
            .trim()
            .replace(['\r', '\n'], "");
        if api_key.is_empty() {
            return Err(MailError::Config(format!(
                "api key file {} is empty",
                key_path.as_ref().display()
            )));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
            from_email: from_email.into(),
            from_name: from_name.into(),
        })
    }

    fn from_field(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }
}

#[async_trait]
impl MailSender for ResendMailSender {
    fn service_name(&self) -> &str {
        &self.from_name
    }

    async fn send(&self, message: &MailMessage) -> Result<()> {
        let request = SendEmailRequest {
            from: self.from_field(),
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Mail API rejected message");
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        for to in &message.to {
            info!(email_hash = %email_hash_for_log(to), "Mail delivered");
        }
        Ok(())
    }
}

/// Sender that only logs deliveries.
///
/// Confirmation codes are logged so a local deployment can be exercised
/// without a mail account.
pub struct LogMailSender {
    service_name: String,
}

impl LogMailSender {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

#[async_trait]
impl MailSender for LogMailSender {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    async fn send(&self, message: &MailMessage) -> Result<()> {
        for to in &message.to {
            info!(
                email_hash = %email_hash_for_log(to),
                subject = %message.subject,
                "Mail not sent (log backend)"
            );
        }
        debug!(html = %message.html, "Mail body");
        Ok(())
    }

    async fn send_confirmation(&self, to: &str, code: &str, fingerprint: &str) -> Result<()> {
        info!(
            email_hash = %email_hash_for_log(to),
            fingerprint = %fingerprint,
            code = %code,
            "Confirmation code (log backend)"
        );
        let message = template::confirmation(&self.service_name, to, code, fingerprint);
        self.send(&message).await
    }
}

/// A delivery recorded by [`MemoryMailSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub message: MailMessage,
    /// Confirmation code, when the message was a confirmation
    pub code: Option<String>,
    pub fingerprint: Option<String>,
}

/// Sender that records deliveries in memory
#[derive(Default)]
pub struct MemoryMailSender {
    sent: Mutex<Vec<SentMail>>,
    failing: bool,
}

impl MemoryMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose every delivery fails
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    /// All recorded deliveries, oldest first
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().clone()
    }

    /// Number of recorded deliveries
    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Most recent confirmation code delivered to `to`
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|mail| mail.message.to.iter().any(|addr| addr == to))
            .and_then(|mail| mail.code.clone())
    }

    fn record(&self, mail: SentMail) -> Result<()> {
        if self.failing {
            return Err(MailError::Delivery("memory sender configured to fail".to_string()));
        }
        self.sent.lock().push(mail);
        Ok(())
    }
}

#[async_trait]
impl MailSender for MemoryMailSender {
    fn service_name(&self) -> &str {
        "keyward"
    }

    async fn send(&self, message: &MailMessage) -> Result<()> {
        self.record(SentMail {
            message: message.clone(),
            code: None,
            fingerprint: None,
        })
    }

    async fn send_confirmation(&self, to: &str, code: &str, fingerprint: &str) -> Result<()> {
        self.record(SentMail {
            message: template::confirmation(self.service_name(), to, code, fingerprint),
            code: Some(code.to_string()),
            fingerprint: Some(fingerprint.to_string()),
        })
    }
}
