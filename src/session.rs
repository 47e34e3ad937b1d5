//! Remote session capability.
//!
//! The orchestration code only talks to hosts through these traits. The
//! russh-backed implementation lives in [`crate::ssh`]; tests plug in fakes.
//!
//! ```text
//! ┌───────────┐  connect   ┌───────────────────┐  open_interactive  ┌──────────────────────┐
//! │ Connector │ ─────────▶ │ dyn RemoteSession │ ─────────────────▶ │ dyn InteractiveChannel│
//! └───────────┘            └───────────────────┘                    └──────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Opaque secret forwarded to the transport.
///
/// Never printed: `Debug` is redacted and there is no `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret to the transport layer.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Exit status reported by the remote side, if any.
    pub exit_status: Option<u32>,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status: None,
        }
    }

    /// A command counts as successful when it wrote nothing to stderr.
    pub fn succeeded(&self) -> bool {
        self.stderr.is_empty()
    }
}

/// Establishes authenticated sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        address: &str,
        username: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn RemoteSession>>;
}

/// One authenticated connection to a host.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run a command to completion, capturing its output.
    async fn execute(&self, command: &str) -> Result<CommandOutput>;

    /// Open a shell channel for interactive mode.
    async fn open_interactive(&self) -> Result<Box<dyn InteractiveChannel>>;

    /// Close the connection. Errors are logged by the implementation.
    async fn close(&self);
}

/// A bidirectional byte stream to a remote shell.
#[async_trait]
pub trait InteractiveChannel: Send {
    /// Wait for remote output. `Ok(None)` means the remote side closed the channel.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>>;

    async fn send(&mut self, data: &[u8]) -> Result<()>;

    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("hunter2");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.expose(), "hunter2");
    }

    #[test]
    fn test_command_output_success_is_empty_stderr() {
        assert!(CommandOutput::new("hello\n", "").succeeded());
        assert!(!CommandOutput::new("", "boom\n").succeeded());
    }
}
