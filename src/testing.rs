//! Test doubles for the remote session capability.
//!
//! - `FakeConnector` - per-address connect outcomes, records created sessions
//! - `FakeSession` - scripted command output, records executed commands
//! - `FakeChannel` / `FakeRemote` - the two ends of an in-memory shell channel
//! - `StaticResolver` - name resolution from a fixed table

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Result, SshHerdError};
use crate::hostspec::Resolver;
use crate::session::{CommandOutput, Connector, Credential, InteractiveChannel, RemoteSession};

// ============================================================================
// Sessions
// ============================================================================

#[derive(Default)]
struct SessionState {
    stdout: String,
    stderr: String,
    transport_error: bool,
    refuse_interactive: bool,
    closed: AtomicBool,
    commands: Mutex<Vec<String>>,
    remotes: Mutex<Vec<FakeRemote>>,
}

/// A scripted session. Clones share state, so a test can keep a handle while
/// the host owns the session.
#[derive(Clone)]
pub struct FakeSession {
    state: Arc<SessionState>,
}

impl FakeSession {
    fn with_state(state: SessionState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Every command prints `ok` and nothing on stderr.
    pub fn healthy() -> Self {
        Self::with_state(SessionState {
            stdout: "ok\n".to_string(),
            ..SessionState::default()
        })
    }

    /// Every command writes to stderr.
    pub fn failing() -> Self {
        Self::with_state(SessionState {
            stderr: "boom\nsecond line\n".to_string(),
            ..SessionState::default()
        })
    }

    /// Every command fails at the transport level.
    pub fn broken() -> Self {
        Self::with_state(SessionState {
            transport_error: true,
            ..SessionState::default()
        })
    }

    /// Commands succeed but shells cannot be opened.
    pub fn no_shell() -> Self {
        Self::with_state(SessionState {
            stdout: "ok\n".to_string(),
            refuse_interactive: true,
            ..SessionState::default()
        })
    }

    pub fn into_session(self) -> Arc<dyn RemoteSession> {
        Arc::new(self)
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Remote ends of every shell opened on this session, oldest first.
    pub fn remotes(&self) -> Vec<FakeRemote> {
        self.state.remotes.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn execute(&self, command: &str) -> Result<CommandOutput> {
        self.state.commands.lock().unwrap().push(command.to_string());
        if self.state.transport_error {
            return Err(SshHerdError::Ssh("channel refused".to_string()));
        }
        Ok(CommandOutput::new(
            self.state.stdout.clone(),
            self.state.stderr.clone(),
        ))
    }

    async fn open_interactive(&self) -> Result<Box<dyn InteractiveChannel>> {
        if self.state.refuse_interactive {
            return Err(SshHerdError::Ssh("shell refused".to_string()));
        }
        let (channel, remote) = FakeChannel::pair();
        self.state.remotes.lock().unwrap().push(remote);
        Ok(Box::new(channel))
    }

    async fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Connects every address unless told otherwise.
#[derive(Default)]
pub struct FakeConnector {
    refused: HashSet<String>,
    scripted: HashMap<String, FakeSession>,
    created: Mutex<Vec<(String, FakeSession)>>,
    attempts: Mutex<Vec<(String, String, Credential)>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse(mut self, address: &str) -> Self {
        self.refused.insert(address.to_string());
        self
    }

    pub fn with_session(mut self, address: &str, session: FakeSession) -> Self {
        self.scripted.insert(address.to_string(), session);
        self
    }

    /// The session handed out for `address`, if it connected.
    pub fn session(&self, address: &str) -> Option<FakeSession> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, s)| s.clone())
    }

    /// `(address, username, credential)` of every connect call.
    pub fn attempts(&self) -> Vec<(String, String, Credential)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        address: &str,
        username: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn RemoteSession>> {
        self.attempts.lock().unwrap().push((
            address.to_string(),
            username.to_string(),
            credential.clone(),
        ));
        if self.refused.contains(address) {
            return Err(SshHerdError::Ssh(format!("Connection refused: {}", address)));
        }
        let session = self
            .scripted
            .get(address)
            .cloned()
            .unwrap_or_else(FakeSession::healthy);
        self.created
            .lock()
            .unwrap()
            .push((address.to_string(), session.clone()));
        Ok(session.into_session())
    }
}

// ============================================================================
// Channels
// ============================================================================

#[derive(Default)]
struct ChannelShared {
    sent: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

/// Local end of an in-memory shell channel.
pub struct FakeChannel {
    incoming: mpsc::UnboundedReceiver<Vec<u8>>,
    shared: Arc<ChannelShared>,
}

/// Remote end: feeds output to the local end and observes what it sent.
#[derive(Clone)]
pub struct FakeRemote {
    outgoing: Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>,
    shared: Arc<ChannelShared>,
}

impl FakeChannel {
    pub fn pair() -> (FakeChannel, FakeRemote) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(ChannelShared::default());
        (
            FakeChannel {
                incoming: rx,
                shared: shared.clone(),
            },
            FakeRemote {
                outgoing: Arc::new(Mutex::new(Some(tx))),
                shared,
            },
        )
    }
}

impl FakeRemote {
    pub fn output(&self, data: &[u8]) {
        if let Some(tx) = self.outgoing.lock().unwrap().as_ref() {
            let _ = tx.send(data.to_vec());
        }
    }

    /// Close the remote side; the local end reads EOF once drained.
    pub fn hang_up(&self) {
        self.outgoing.lock().unwrap().take();
    }

    pub fn received(&self) -> Vec<u8> {
        self.shared.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InteractiveChannel for FakeChannel {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.incoming.recv().await)
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.shared.sent.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    async fn close(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolves only the names it was given.
#[derive(Default)]
pub struct StaticResolver {
    names: HashMap<String, Ipv4Addr>,
}

impl StaticResolver {
    pub fn new(entries: &[(&str, [u8; 4])]) -> Self {
        Self {
            names: entries
                .iter()
                .map(|(name, octets)| (name.to_string(), Ipv4Addr::from(*octets)))
                .collect(),
        }
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self, name: &str) -> Option<Ipv4Addr> {
        self.names.get(name).copied()
    }
}
