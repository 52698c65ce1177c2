//! SSH transport adapter.
//!
//! Every public key is accepted; the key's SHA-256 fingerprint is the
//! caller identity. An exec request carries one command line, which is run
//! through [`AppState::execute`] in a drain-tracked task. The response is
//! written to the channel followed by the exit status, EOF and close.

use crate::config::ServerConfig;
use crate::shutdown::DrainController;
use crate::state::{AppState, Response};
use anyhow::{Context, Result};
use async_trait::async_trait;
use russh::server::{self, Auth, Handle, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec};
use russh_keys::key::{KeyPair, PublicKey};
use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Load the server host key (OpenSSH or PKCS#8 private key file).
///
/// A missing key file is replaced by a freshly generated Ed25519 key,
/// written as PKCS#8 PEM readable only by the owner.
pub fn load_host_key(path: &Path) -> Result<KeyPair> {
    if !path.exists() {
        return generate_host_key(path);
    }

    info!(path = %path.display(), "Loading existing host key");
    russh_keys::load_secret_key(path, None)
        .with_context(|| format!("failed to load host key from {}", path.display()))
}

fn generate_host_key(path: &Path) -> Result<KeyPair> {
    let key = KeyPair::generate_ed25519().context("failed to generate host key")?;

    let mut pem = Vec::new();
    russh_keys::encode_pkcs8_pem(&key, &mut pem).context("failed to encode host key")?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    write_private(path, &pem).with_context(|| format!("failed to save host key to {}", path.display()))?;

    let public = key.clone_public_key().context("failed to derive host public key")?;
    info!(
        path = %path.display(),
        fingerprint = %fingerprint(&public),
        "Generated new host key"
    );
    Ok(key)
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// `SHA256:<base64>` fingerprint of `key`, as printed by `ssh-keygen -l`
pub fn fingerprint(key: &PublicKey) -> String {
    format!("SHA256:{}", key.fingerprint())
}

/// Split an exec payload into command tokens
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(String::from).collect()
}

/// Accept connections until shutdown is initiated.
///
/// Returns once the listener has stopped; in-flight commands keep running
/// and are waited for by [`DrainController::drain`].
pub async fn serve(config: &ServerConfig, state: Arc<AppState>, drain: Arc<DrainController>) -> Result<()> {
    let host_key = load_host_key(&config.host_key_path)?;
    let ssh_config = Arc::new(server::Config {
        keys: vec![host_key],
        auth_rejection_time: Duration::from_secs(1),
        auth_rejection_time_initial: Some(Duration::ZERO),
        inactivity_timeout: Some(Duration::from_secs(config.inactivity_timeout_secs)),
        ..Default::default()
    });

    let listener = TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!(address = %config.bind_address, "SSH server listening");

    let stop = drain.token();
    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                info!("Listener stopped");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(connection) => connection,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };

                let handler = SessionHandler::new(Arc::clone(&state), Arc::clone(&drain), peer);
                let ssh_config = Arc::clone(&ssh_config);
                tokio::spawn(async move {
                    match server::run_stream(ssh_config, stream, handler).await {
                        Ok(session) => {
                            if let Err(e) = session.await {
                                debug!(%peer, error = %e, "Session ended with error");
                            }
                        }
                        Err(e) => debug!(%peer, error = %e, "SSH handshake failed"),
                    }
                });
            }
        }
    }
}

struct SessionHandler {
    state: Arc<AppState>,
    drain: Arc<DrainController>,
    peer: SocketAddr,
    fingerprint: Option<String>,
}

impl SessionHandler {
    fn new(state: Arc<AppState>, drain: Arc<DrainController>, peer: SocketAddr) -> Self {
        Self {
            state,
            drain,
            peer,
            fingerprint: None,
        }
    }
}

#[async_trait]
impl server::Handler for SessionHandler {
    type Error = russh::Error;

    async fn auth_publickey(&mut self, user: &str, public_key: &PublicKey) -> Result<Auth, Self::Error> {
        let fingerprint = fingerprint(public_key);
        debug!(peer = %self.peer, user, fingerprint = %fingerprint, "Public key authenticated");
        self.fingerprint = Some(fingerprint);
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn exec_request(&mut self, channel: ChannelId, data: &[u8], session: &mut Session) -> Result<(), Self::Error> {
        let Some(fingerprint) = self.fingerprint.clone() else {
            let _ = session.channel_failure(channel);
            return Ok(());
        };
        if self.drain.is_draining() {
            let _ = session.channel_failure(channel);
            return Ok(());
        }

        let args = tokenize(&String::from_utf8_lossy(data));
        let _ = session.channel_success(channel);

        let handle = session.handle();
        let state = Arc::clone(&self.state);
        self.drain.spawn(async move {
            let response = state.execute(&fingerprint, &args).await;
            reply(&handle, channel, &response).await;
        });
        Ok(())
    }

    async fn shell_request(&mut self, channel: ChannelId, session: &mut Session) -> Result<(), Self::Error> {
        let _ = session.channel_success(channel);

        let handle = session.handle();
        let response = Response {
            text: self.state.shell_banner(),
            success: true,
        };
        self.drain.spawn(async move {
            reply(&handle, channel, &response).await;
        });
        Ok(())
    }
}

async fn reply(handle: &Handle, channel: ChannelId, response: &Response) {
    if handle
        .data(channel, CryptoVec::from_slice(response.text.as_bytes()))
        .await
        .is_err()
    {
        debug!("Client went away before the response was written");
        return;
    }
    let _ = handle.exit_status_request(channel, response.exit_status()).await;
    let _ = handle.eof(channel).await;
    let _ = handle.close(channel).await;
}
