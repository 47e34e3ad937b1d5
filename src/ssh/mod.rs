//! Pure Rust SSH transport for sshherd.
//!
//! Implements the [`crate::session`] capability on top of russh, so no
//! external `ssh` binary is needed.
//!
//! ## Modules
//!
//! - [`client`] - SSH connection management and password authentication
//! - [`exec`] - Remote command execution
//! - [`pty`] - Interactive shell channels

mod client;
pub mod config;
mod exec;
mod pty;

// Re-exports for public API
pub use client::SshClient;
pub use config::SshConfig;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::session::{Connector, Credential, RemoteSession};

/// Connector producing russh-backed sessions.
#[derive(Debug, Clone)]
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        address: &str,
        username: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn RemoteSession>> {
        let client = SshClient::connect(address, username, credential, &self.config).await?;
        Ok(Arc::new(client))
    }
}
