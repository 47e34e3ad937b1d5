//! Connect to, and run commands on, many hosts at once.
//!
//! Per-host failures never escape a round: they become counts in the
//! returned report and log lines naming the host.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::hosts::{Host, HostId, HostRegistry};
use crate::pool::TaskPool;
use crate::session::{CommandOutput, Connector, RemoteSession};

/// Outcome of a connect round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectReport {
    pub connected: usize,
    pub failed: usize,
}

impl ConnectReport {
    /// Log the summary line, as a warning when any host was unreachable.
    pub fn log(&self) {
        if self.failed == 0 {
            tracing::info!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }
    }
}

impl fmt::Display for ConnectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connected: {}, failed: {}", self.connected, self.failed)
    }
}

/// Outcome of a broadcast. Hosts that were skipped are in neither count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub ok: usize,
    pub failed: usize,
}

impl BroadcastReport {
    fn record(&mut self, succeeded: bool) {
        if succeeded {
            self.ok += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Log the summary line at a level matching the outcome.
    pub fn log(&self) {
        if self.is_success() {
            tracing::info!("{}", self);
        } else {
            tracing::error!("{}", self);
        }
    }
}

impl fmt::Display for BroadcastReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failed == 0 {
            write!(f, "All {} hosts OK.", self.ok)
        } else {
            write!(f, "{} hosts OK, {} hosts failed.", self.ok, self.failed)
        }
    }
}

pub struct BroadcastExecutor {
    connector: Arc<dyn Connector>,
    pool: TaskPool,
}

impl BroadcastExecutor {
    pub fn new(connector: Arc<dyn Connector>, pool: TaskPool) -> Self {
        Self { connector, pool }
    }

    /// Connect every disconnected host, `pool.limit()` at a time.
    pub async fn connect_all(&self, registry: &mut HostRegistry) -> ConnectReport {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let tasks: Vec<_> = registry
            .iter()
            .filter(|host| !host.is_connected())
            .map(|host| {
                let connector = self.connector.clone();
                let tx = tx.clone();
                let id = host.id;
                let address = host.address.clone();
                let username = host.username.clone();
                let credential = host.credential().clone();
                async move {
                    tracing::debug!("Connecting to {}... ", address);
                    let result = connector.connect(&address, &username, &credential).await;
                    let _ = tx.send((id, address, result));
                }
            })
            .collect();
        drop(tx);

        tracing::debug!(
            "Connecting to {} hosts, {} at a time",
            tasks.len(),
            self.pool.limit()
        );
        self.pool.run(tasks).await;

        let mut report = ConnectReport::default();
        while let Ok((id, address, result)) = rx.try_recv() {
            match result {
                Ok(session) => match registry.get_mut(id) {
                    Some(host) => {
                        host.attach_session(session);
                        tracing::info!("Connection to {} successful!", address);
                        report.connected += 1;
                    }
                    None => session.close().await,
                },
                Err(e) => {
                    tracing::warn!("FAILED: {}", address);
                    tracing::debug!("{}: {}", address, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!("Finished connecting.");
        report
    }

    /// Run the same command on every connected host.
    pub async fn broadcast(
        &self,
        registry: &mut HostRegistry,
        command: &str,
        parallel: bool,
    ) -> BroadcastReport {
        self.execute_on(registry, parallel, |_| command.to_string())
            .await
    }

    /// Run `command_for(host)` on every connected host.
    ///
    /// Sequential runs visit hosts in registry order; parallel runs go through
    /// the task pool. Disconnected hosts are skipped.
    pub async fn execute_on<F>(
        &self,
        registry: &mut HostRegistry,
        parallel: bool,
        command_for: F,
    ) -> BroadcastReport
    where
        F: Fn(&Host) -> String,
    {
        if parallel {
            self.execute_parallel(registry, command_for).await
        } else {
            execute_sequential(registry, command_for).await
        }
    }

    async fn execute_parallel<F>(&self, registry: &mut HostRegistry, command_for: F) -> BroadcastReport
    where
        F: Fn(&Host) -> String,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<(HostId, bool)>();

        let tasks: Vec<_> = registry
            .iter()
            .filter_map(|host| {
                let session = host.session()?;
                let command = command_for(host);
                let address = host.address.clone();
                let id = host.id;
                let tx = tx.clone();
                Some(async move {
                    let succeeded = run_command(&*session, &address, &command).await;
                    let _ = tx.send((id, succeeded));
                })
            })
            .collect();
        drop(tx);

        self.pool.run(tasks).await;

        let mut report = BroadcastReport::default();
        while let Ok((id, succeeded)) = rx.try_recv() {
            if let Some(host) = registry.get_mut(id) {
                host.record_command(succeeded);
            }
            report.record(succeeded);
        }
        report
    }

    /// Run a command on a single host. A disconnected host counts as a failure.
    pub async fn execute_one(&self, host: &mut Host, command: &str) -> bool {
        let Some(session) = host.session() else {
            return false;
        };
        let succeeded = run_command(&*session, &host.address, command).await;
        host.record_command(succeeded);
        succeeded
    }
}

async fn execute_sequential<F>(registry: &mut HostRegistry, command_for: F) -> BroadcastReport
where
    F: Fn(&Host) -> String,
{
    let mut report = BroadcastReport::default();
    for host in registry.iter_mut() {
        let Some(session) = host.session() else {
            continue;
        };
        let command = command_for(&*host);
        let succeeded = run_command(&*session, &host.address, &command).await;
        host.record_command(succeeded);
        report.record(succeeded);
    }
    report
}

/// Execute and forward output: stdout at warn, stderr at error.
async fn run_command(session: &dyn RemoteSession, address: &str, command: &str) -> bool {
    match session.execute(command).await {
        Ok(output) => {
            forward_output(address, &output);
            output.succeeded()
        }
        Err(e) => {
            tracing::error!("Host {} error: {}", address, e);
            false
        }
    }
}

fn forward_output(address: &str, output: &CommandOutput) {
    for line in output.stdout.lines() {
        tracing::warn!("{}", line);
    }
    if let Some(status) = output.exit_status {
        tracing::debug!("Host {} exited with status {}", address, status);
    }
    if !output.stderr.is_empty() {
        tracing::error!("Host {} error: ", address);
        for line in output.stderr.lines() {
            tracing::error!(" {}", line);
        }
    }
}
