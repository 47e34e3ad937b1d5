//! Remote command execution.
//!
//! Provides non-interactive command execution with stdout/stderr capture.

use russh::client::Handle;
use russh::ChannelMsg;

use crate::error::{Result, SshHerdError};
use crate::session::CommandOutput;
use crate::ssh::client::ClientHandler;

/// Execute a command on the remote host (non-interactive).
pub async fn exec_command(session: &Handle<ClientHandler>, command: &str) -> Result<CommandOutput> {
    let mut channel = session
        .channel_open_session()
        .await
        .map_err(|e| SshHerdError::Ssh(format!("Failed to open channel: {}", e)))?;

    channel
        .exec(true, command.as_bytes())
        .await
        .map_err(|e| SshHerdError::Ssh(format!("Failed to execute command: {}", e)))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => {
                stdout.extend_from_slice(&data);
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                if ext == 1 {
                    stderr.extend_from_slice(&data);
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                exit_status = Some(status);
            }
            // Exit status may arrive after EOF, so only stop on close
            Some(ChannelMsg::Close) | None => {
                break;
            }
            _ => {}
        }
    }

    Ok(collect_output(&stdout, &stderr, exit_status))
}

fn collect_output(stdout: &[u8], stderr: &[u8], exit_status: Option<u32>) -> CommandOutput {
    CommandOutput {
        exit_status,
        ..CommandOutput::new(String::from_utf8_lossy(stdout), String::from_utf8_lossy(stderr))
    }
}
