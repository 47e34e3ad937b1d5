//! SSH client implementation using russh.
//!
//! Provides connection management and password authentication.

use std::net::ToSocketAddrs;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::Disconnect;
use tokio::sync::Mutex;

use crate::error::{Result, SshHerdError};
use crate::session::{CommandOutput, Credential, InteractiveChannel, RemoteSession};
use crate::ssh::config::SshConfig;
use crate::ssh::pty::ShellChannel;

/// SSH client wrapper over russh.
pub struct SshClient {
    session: Arc<Mutex<Handle<ClientHandler>>>,
    host: String,
    term: String,
}

impl SshClient {
    /// Connect to an SSH server and authenticate, bounded by the configured timeout.
    pub async fn connect(
        host: &str,
        username: &str,
        credential: &Credential,
        config: &SshConfig,
    ) -> Result<Self> {
        tokio::time::timeout(
            config.connect_timeout,
            Self::establish(host, username, credential, config),
        )
        .await
        .map_err(|_| {
            SshHerdError::Ssh(format!(
                "Timed out after {}s connecting to {}",
                config.connect_timeout.as_secs(),
                host
            ))
        })?
    }

    async fn establish(
        host: &str,
        username: &str,
        credential: &Credential,
        config: &SshConfig,
    ) -> Result<Self> {
        let russh_config = Arc::new(client::Config {
            // Interactive sessions may idle for a long time
            inactivity_timeout: None,
            keepalive_interval: Some(std::time::Duration::from_secs(15)),
            keepalive_max: 4,
            ..Default::default()
        });

        let addr = format!("{}:{}", host, config.port)
            .to_socket_addrs()
            .map_err(|e| SshHerdError::Ssh(format!("Failed to resolve {}: {}", host, e)))?
            .next()
            .ok_or_else(|| SshHerdError::Ssh(format!("No address found for {}", host)))?;

        let mut session = client::connect(russh_config, addr, ClientHandler)
            .await
            .map_err(|e| SshHerdError::Ssh(format!("Connection failed: {}", e)))?;

        let authenticated = session
            .authenticate_password(username, credential.expose())
            .await
            .map_err(|e| SshHerdError::Ssh(format!("Authentication failed: {}", e)))?;

        if !authenticated {
            return Err(SshHerdError::Ssh(format!(
                "Server rejected password for {}@{}",
                username, host
            )));
        }

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            host: host.to_string(),
            term: config.term.clone(),
        })
    }

    /// Execute a command on the remote host (non-interactive).
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let session = self.session.lock().await;
        crate::ssh::exec::exec_command(&session, command).await
    }

    /// Open a shell with a PTY for interactive mode.
    pub async fn shell(&self) -> Result<ShellChannel> {
        let session = self.session.lock().await;
        crate::ssh::pty::open_shell(&session, &self.term).await
    }
}

#[async_trait]
impl RemoteSession for SshClient {
    async fn execute(&self, command: &str) -> Result<CommandOutput> {
        self.exec(command).await
    }

    async fn open_interactive(&self) -> Result<Box<dyn InteractiveChannel>> {
        Ok(Box::new(self.shell().await?))
    }

    async fn close(&self) {
        let session = self.session.lock().await;
        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            tracing::debug!("Disconnect from {} failed: {}", self.host, e);
        }
    }
}

/// Client handler for russh connection callbacks.
pub struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = SshHerdError;

    // Unknown host keys are accepted, like an auto-add policy.
    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}
