//! Mail sender capability.

use crate::errors::Result;
use crate::template;
use async_trait::async_trait;

/// A fully rendered outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Deliver mail to an address, failing if it cannot be delivered.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Name shown to recipients and used as the SSH host in instructions
    fn service_name(&self) -> &str;

    /// Deliver a rendered message
    async fn send(&self, message: &MailMessage) -> Result<()>;

    /// Deliver the confirmation code for `fingerprint` to `to`
    async fn send_confirmation(&self, to: &str, code: &str, fingerprint: &str) -> Result<()> {
        let message = template::confirmation(self.service_name(), to, code, fingerprint);
        self.send(&message).await
    }
}
