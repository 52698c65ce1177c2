use keyward_admission::AdmissionController;
use keyward_commands::{render, CommandContext, CommandRegistry, Services};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Response to one command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub text: String,
    pub success: bool,
}

impl Response {
    pub fn exit_status(&self) -> u32 {
        if self.success {
            0
        } else {
            1
        }
    }
}

/// Application state shared across all sessions
pub struct AppState {
    pub admission: Arc<AdmissionController>,
    pub registry: CommandRegistry,
    pub services: Services,
}

impl AppState {
    pub fn new(admission: Arc<AdmissionController>, registry: CommandRegistry, services: Services) -> Self {
        Self {
            admission,
            registry,
            services,
        }
    }

    /// Admit and run one command line sent by `fingerprint`
    pub async fn execute(&self, fingerprint: &str, args: &[String]) -> Response {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let command = args.first().map(String::as_str).unwrap_or("");
        debug!(%request_id, fingerprint, command, "Command received");

        let admission = self.admission.check(fingerprint);
        if !admission.allowed {
            let retry_secs = admission
                .retry_after
                .map(|d| d.as_secs_f64().ceil() as u64)
                .unwrap_or(1)
                .max(1);
            info!(%request_id, fingerprint, retry_secs, "Rate limited");
            return Response {
                text: format!("Error: Rate-limited, retry in {retry_secs}s\n"),
                success: false,
            };
        }

        let ctx = CommandContext::new(&self.registry, &self.services, fingerprint, args);
        let result = self.registry.dispatch(&ctx).await;

        info!(
            %request_id,
            fingerprint,
            command,
            success = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command completed"
        );

        Response {
            success: result.is_ok(),
            text: render(&result),
        }
    }

    /// Text for sessions that ask for an interactive shell
    pub fn shell_banner(&self) -> String {
        render(&Ok(self.registry.help_text()))
    }
}
