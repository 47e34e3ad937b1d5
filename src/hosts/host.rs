use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SshHerdError};
use crate::session::{Credential, InteractiveChannel, RemoteSession};

/// Stable host identifier, assigned in registration order and never reused.
pub type HostId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("Disconnected"),
            Self::Connected => f.write_str("Connected"),
        }
    }
}

/// One remote endpoint and its session state.
///
/// The session handle is the source of truth for the connection state, and an
/// interactive channel can only be attached while a session is present.
pub struct Host {
    pub id: HostId,
    pub address: String,
    pub username: String,
    credential: Credential,
    last_command_succeeded: bool,
    session: Option<Arc<dyn RemoteSession>>,
    channel: Option<Box<dyn InteractiveChannel>>,
}

impl Host {
    pub fn new(
        id: HostId,
        address: impl Into<String>,
        username: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            id,
            address: address.into(),
            username: username.into(),
            credential,
            last_command_succeeded: false,
            session: None,
            channel: None,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn state(&self) -> ConnectionState {
        if self.session.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn last_command_succeeded(&self) -> bool {
        self.is_connected() && self.last_command_succeeded
    }

    pub fn record_command(&mut self, succeeded: bool) {
        self.last_command_succeeded = succeeded;
    }

    pub fn session(&self) -> Option<Arc<dyn RemoteSession>> {
        self.session.clone()
    }

    pub fn attach_session(&mut self, session: Arc<dyn RemoteSession>) {
        self.session = Some(session);
        self.last_command_succeeded = true;
    }

    pub fn is_interactive(&self) -> bool {
        self.channel.is_some()
    }

    pub fn attach_channel(&mut self, channel: Box<dyn InteractiveChannel>) -> Result<()> {
        if !self.is_connected() {
            return Err(SshHerdError::Interactive(format!(
                "host {} is not connected",
                self.address
            )));
        }
        self.channel = Some(channel);
        Ok(())
    }

    pub fn channel_mut(&mut self) -> Option<&mut Box<dyn InteractiveChannel>> {
        self.channel.as_mut()
    }

    /// Close and drop the interactive channel, keeping the session.
    pub async fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }
    }

    /// Close the interactive channel and the session.
    pub async fn disconnect(&mut self) {
        self.close_channel().await;
        if let Some(session) = self.session.take() {
            session.close().await;
            tracing::debug!("Disconnected from {}", self.address);
        }
        self.last_command_succeeded = false;
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:\t{}@{}\t({})",
            self.id,
            self.username,
            self.address,
            self.state()
        )
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("credential", &self.credential)
            .field("state", &self.state())
            .field("interactive", &self.is_interactive())
            .finish()
    }
}
