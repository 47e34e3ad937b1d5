//! PTY (pseudo-terminal) shell channels for interactive mode.

use async_trait::async_trait;
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg};

use crate::error::{Result, SshHerdError};
use crate::session::InteractiveChannel;
use crate::ssh::client::ClientHandler;

/// A remote shell with a PTY attached.
pub struct ShellChannel {
    channel: Channel<Msg>,
}

/// Open a session channel, request a PTY sized like the local terminal and start a shell.
pub async fn open_shell(session: &Handle<ClientHandler>, term: &str) -> Result<ShellChannel> {
    let channel = session
        .channel_open_session()
        .await
        .map_err(|e| SshHerdError::Ssh(format!("Failed to open channel: {}", e)))?;

    let (width, height) = get_terminal_size();

    channel
        .request_pty(
            true,
            term,
            width as u32,
            height as u32,
            0,
            0,
            &[], // No special modes
        )
        .await
        .map_err(|e| SshHerdError::Ssh(format!("Failed to request PTY: {}", e)))?;

    channel
        .request_shell(true)
        .await
        .map_err(|e| SshHerdError::Ssh(format!("Failed to request shell: {}", e)))?;

    Ok(ShellChannel { channel })
}

#[async_trait]
impl InteractiveChannel for ShellChannel {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => return Ok(Some(data.to_vec())),
                // A PTY merges stderr, but forward it if the server sends it anyway
                Some(ChannelMsg::ExtendedData { data, .. }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                _ => {}
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.channel
            .data(data)
            .await
            .map_err(|e| SshHerdError::Ssh(format!("Failed to send data: {}", e)))
    }

    async fn close(&mut self) {
        if let Err(e) = self.channel.close().await {
            tracing::debug!("Closing shell channel failed: {}", e);
        }
    }
}

/// Get current terminal size.
fn get_terminal_size() -> (u16, u16) {
    crossterm::terminal::size().unwrap_or((80, 24))
}
