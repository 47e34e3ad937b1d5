//! SSH connection configuration.

use std::time::Duration;

use crate::config::AppConfig;

/// SSH connection configuration shared by every host of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    /// Remote SSH port.
    pub port: u16,

    /// Upper bound on TCP connect + handshake + authentication.
    pub connect_timeout: Duration,

    /// Terminal type requested for interactive channels.
    pub term: String,
}

impl SshConfig {
    /// Create a new SSH configuration.
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
            term: "xterm".to_string(),
        }
    }
}

impl From<&AppConfig> for SshConfig {
    fn from(app_config: &AppConfig) -> Self {
        Self::new(app_config.port, app_config.connect_timeout())
    }
}
