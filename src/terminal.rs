//! Local terminal helpers for interactive mode.

use std::io::IsTerminal;

use crossterm::terminal;

use crate::error::{Result, SshHerdError};

/// RAII guard for raw terminal mode.
/// Enables raw mode on creation, restores on drop.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        terminal::enable_raw_mode()
            .map_err(|e| SshHerdError::Interactive(format!("Failed to enable raw mode: {}", e)))?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Whether stdin is attached to a terminal that can be put in raw mode.
pub fn stdin_is_terminal() -> bool {
    std::io::stdin().is_terminal()
}

/// Rewrite bare `\n` as `\r\n` for a terminal in raw mode.
pub fn to_crlf(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 16);
    let mut previous = '\0';
    for c in text.chars() {
        if c == '\n' && previous != '\r' {
            out.push('\r');
        }
        out.push(c);
        previous = c;
    }
    out
}
