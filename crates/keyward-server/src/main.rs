use anyhow::{Context, Result};
use clap::Parser;
use keyward_admission::AdmissionController;
use keyward_commands::{default_registry, Services};
use keyward_identity::{codes::generate_code, PrivilegedRole, RegistryService, VerificationExpiry};
use keyward_mail::MailSender;
use keyward_storage::RocksDbStorage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod mail;
mod shutdown;
mod ssh;
mod state;

use config::Config;
use shutdown::DrainController;
use state::AppState;

/// Registry of SSH keys and verified email addresses
#[derive(Debug, Parser)]
#[command(name = "keyward", version)]
struct Cli {
    /// JSON config file, overlaid on the production defaults
    #[arg(long, value_name = "FILE", conflicts_with = "test")]
    config: Option<PathBuf>,

    /// Use the built-in test configuration
    #[arg(long)]
    test: bool,

    /// Print the active configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Deliver a sample confirmation mail to this address and exit
    #[arg(long, value_name = "ADDRESS")]
    send_test_mail: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "keyward=debug,keyward_commands=info,keyward_identity=info,keyward_admission=info,keyward_mail=info,russh=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (config, source) = Config::load(cli.config.as_deref(), cli.test)?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    tracing::info!("Starting keyward with {}", source);

    let mail = mail::build_sender(&config.email, config.registry_config().mail_timeout)?;

    if let Some(to) = cli.send_test_mail {
        mail.send_confirmation(&to, &generate_code(), "SHA256:keyward-test-mail")
            .await
            .with_context(|| format!("failed to send test mail to {to}"))?;
        tracing::info!(email_hash = %keyward_mail::email_hash_for_log(&to), "Test mail sent");
        return Ok(());
    }

    run(config, mail).await
}

async fn run(config: Config, mail: Arc<dyn MailSender>) -> Result<()> {
    let storage = Arc::new(RocksDbStorage::open(&config.database.path)?);
    let service = Arc::new(RegistryService::new(storage, mail, config.registry_config()));

    let seeded = service
        .bootstrap_admins(&config.admin.bootstrap_fingerprints)
        .await
        .context("failed to seed admins")?;
    if seeded > 0 {
        tracing::info!(seeded, "Admin set initialized from configuration");
    }

    let admission = Arc::new(AdmissionController::new(
        config.rate_limit.limit,
        config.rate_limit_period(),
        config.rate_limit.strict,
    )?);
    let admission_cleanup = admission.spawn_cleanup();
    let expiry = VerificationExpiry::spawn(service.clone(), config.verification_lifetime());

    let drain = Arc::new(DrainController::new());
    drain.listen_for_signals();

    let services = Services::new(service.clone(), service.clone()).with_shutdown(drain.clone());
    let state = Arc::new(AppState::new(admission, default_registry(), services));

    let served = ssh::serve(&config.server, state, drain.clone()).await;

    drain.drain(config.shutdown_timeout()).await;
    admission_cleanup.stop().await;
    expiry.stop().await;

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
