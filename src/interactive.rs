//! Interactive mode: one local keyboard mirrored to every connected host.
//!
//! Each connected host gets a PTY shell. Local input goes to all of them and
//! every byte a shell prints is copied to local output as it arrives. An `@`
//! typed at the start of a line is an escape: the next byte is resolved by
//! the router (`@n` leaves, `@?` prints help, `@@` sends a literal `@`).
//!
//! Losing any one shell ends interactive mode for the whole group.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::hosts::{HostId, HostRegistry};
use crate::router::{Action, CommandRouter};
use crate::terminal::{self, RawModeGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractiveExit {
    /// The user typed `@n`.
    Escaped,
    /// A remote shell closed or failed.
    LinkLost { host: String },
    /// Local input reached end of file.
    InputClosed,
    /// No connected host could open a shell.
    NoChannels,
}

enum Event {
    Remote(HostId, Result<Option<Vec<u8>>>),
    Local(std::io::Result<u8>),
}

type RecvFuture<'a> = Pin<Box<dyn Future<Output = (HostId, Result<Option<Vec<u8>>>)> + Send + 'a>>;

/// Tracks whether the next input byte starts an escape.
struct EscapeState {
    lookback: u8,
    pending: bool,
}

impl EscapeState {
    fn new() -> Self {
        Self {
            lookback: b'\n',
            pending: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InteractiveMultiplexer {
    raw_mode: Option<fn() -> Result<RawModeGuard>>,
}

impl InteractiveMultiplexer {
    /// `raw_mode` switches the local terminal to raw mode for the session.
    pub fn new(raw_mode: bool) -> Self {
        Self {
            raw_mode: raw_mode.then_some(RawModeGuard::enable as fn() -> Result<RawModeGuard>),
        }
    }

    /// Raw mode only when stdin is a real terminal.
    pub fn for_stdin() -> Self {
        Self::new(terminal::stdin_is_terminal())
    }

    /// Run one interactive session until escape, link loss or end of input.
    ///
    /// Every shell opened here is closed again before returning; sessions stay
    /// connected and the router is back in command mode.
    pub async fn run<I, O>(
        &self,
        registry: &mut HostRegistry,
        router: &mut CommandRouter,
        input: &mut I,
        output: &mut O,
    ) -> Result<InteractiveExit>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let opened = open_channels(registry).await;
        let result = if opened == 0 {
            tracing::warn!("No interactive shell could be opened");
            Ok(InteractiveExit::NoChannels)
        } else {
            tracing::info!("Interactive mode on {} hosts, @n to leave", opened);
            match self.raw_mode.map(|enable| enable()).transpose() {
                Ok(guard) => {
                    let exit = pump(registry, router, input, output).await;
                    drop(guard);
                    exit
                }
                Err(e) => Err(e),
            }
        };

        for host in registry.iter_mut() {
            host.close_channel().await;
        }
        router.leave_interactive();
        result
    }
}

async fn open_channels(registry: &mut HostRegistry) -> usize {
    let mut opened = 0;
    for host in registry
        .iter_mut()
        .filter(|h| h.is_connected() && !h.is_interactive())
    {
        let Some(session) = host.session() else {
            continue;
        };
        match session.open_interactive().await {
            Ok(channel) => match host.attach_channel(channel) {
                Ok(()) => opened += 1,
                Err(e) => tracing::warn!("Host {}: {}", host.address, e),
            },
            Err(e) => tracing::warn!("Can't open shell on {}: {}", host.address, e),
        }
    }
    opened
}

async fn pump<I, O>(
    registry: &mut HostRegistry,
    router: &mut CommandRouter,
    input: &mut I,
    output: &mut O,
) -> Result<InteractiveExit>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut escape = EscapeState::new();

    loop {
        let event = {
            let mut reads: Vec<RecvFuture<'_>> = Vec::new();
            for host in registry.iter_mut() {
                let id = host.id;
                if let Some(channel) = host.channel_mut() {
                    reads.push(Box::pin(async move { (id, channel.recv().await) }));
                }
            }

            // One byte at a time, so input after an escape stays in the reader
            tokio::select! {
                ((id, result), _, _) = futures::future::select_all(reads) => Event::Remote(id, result),
                result = input.read_u8() => Event::Local(result),
            }
        };

        match event {
            Event::Remote(_, Ok(Some(data))) => {
                output.write_all(&data).await?;
                output.flush().await?;
            }
            Event::Remote(id, Ok(None)) => {
                let host = address_of(registry, id);
                tracing::error!("Host {} closed the interactive session", host);
                return Ok(InteractiveExit::LinkLost { host });
            }
            Event::Remote(id, Err(e)) => {
                let host = address_of(registry, id);
                tracing::error!("Host {} interactive session failed: {}", host, e);
                return Ok(InteractiveExit::LinkLost { host });
            }
            Event::Local(Ok(byte)) => {
                if let Some(exit) = handle_byte(byte, &mut escape, registry, router, output).await? {
                    return Ok(exit);
                }
            }
            Event::Local(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(InteractiveExit::InputClosed);
            }
            Event::Local(Err(e)) => {
                tracing::warn!("stdin read error: {}", e);
                return Ok(InteractiveExit::InputClosed);
            }
        }
    }
}

/// Run one local byte through escape handling and mirror whatever remains.
async fn handle_byte<O>(
    byte: u8,
    escape: &mut EscapeState,
    registry: &mut HostRegistry,
    router: &mut CommandRouter,
    output: &mut O,
) -> Result<Option<InteractiveExit>>
where
    O: AsyncWrite + Unpin,
{
    let outgoing = if escape.pending {
        escape.pending = false;
        match router.resolve_escape(byte) {
            Action::Print(text) => {
                output.write_all(terminal::to_crlf(&text).as_bytes()).await?;
                output.flush().await?;
                Vec::new()
            }
            Action::Send(bytes) => bytes,
            Action::ExitInteractive => return Ok(Some(InteractiveExit::Escaped)),
            _ => Vec::new(),
        }
    } else if byte == b'@' && matches!(escape.lookback, b'\n' | b'\r') {
        escape.pending = true;
        Vec::new()
    } else {
        vec![byte]
    };
    escape.lookback = byte;

    match send_all(registry, &outgoing).await {
        Some(host) => Ok(Some(InteractiveExit::LinkLost { host })),
        None => Ok(None),
    }
}

/// Send to every open shell. Returns the address of the first shell that failed.
async fn send_all(registry: &mut HostRegistry, data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    for host in registry.iter_mut() {
        let address = host.address.clone();
        if let Some(channel) = host.channel_mut() {
            if let Err(e) = channel.send(data).await {
                tracing::error!("Host {} interactive session failed: {}", address, e);
                return Some(address);
            }
        }
    }
    None
}

fn address_of(registry: &HostRegistry, id: HostId) -> String {
    registry
        .get(id)
        .map(|h| h.address.clone())
        .unwrap_or_else(|| id.to_string())
}
