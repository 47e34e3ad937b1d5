//! The `sshherd#` prompt.

use console::style;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::broadcast::{BroadcastExecutor, BroadcastReport, ConnectReport};
use crate::error::Result;
use crate::hosts::HostRegistry;
use crate::interactive::{InteractiveExit, InteractiveMultiplexer};
use crate::router::{Action, CommandRouter};

pub const PROMPT: &str = "sshherd#";

/// Owns the host registry and drives commands and interactive sessions.
pub struct Repl {
    registry: HostRegistry,
    executor: BroadcastExecutor,
    router: CommandRouter,
    multiplexer: InteractiveMultiplexer,
}

impl Repl {
    pub fn new(
        registry: HostRegistry,
        executor: BroadcastExecutor,
        multiplexer: InteractiveMultiplexer,
    ) -> Self {
        Self {
            registry,
            executor,
            router: CommandRouter::new(),
            multiplexer,
        }
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    /// Connect every registered host.
    pub async fn connect(&mut self) -> ConnectReport {
        self.executor.connect_all(&mut self.registry).await
    }

    /// Run one command on every connected host, one after another.
    pub async fn run_once(&mut self, command: &str) -> BroadcastReport {
        let report = self
            .executor
            .broadcast(&mut self.registry, command, false)
            .await;
        self.log_report(&report);
        report
    }

    /// Read and dispatch lines until input ends.
    ///
    /// `input` is shared with interactive mode, so it must be buffered and
    /// readable byte-wise.
    pub async fn run<I, O>(&mut self, input: &mut I, output: &mut O) -> Result<()>
    where
        I: AsyncBufRead + AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            output
                .write_all(format!("{} ", style(PROMPT).bold()).as_bytes())
                .await?;
            output.flush().await?;

            line.clear();
            if input.read_line(&mut line).await? == 0 {
                return Ok(());
            }

            let text = line.trim_end_matches(['\n', '\r']);
            let action = self
                .router
                .handle_line(text, &mut self.registry, &self.executor)
                .await;

            match action {
                Action::None => {}
                Action::Print(text) => {
                    output.write_all(text.as_bytes()).await?;
                    output.flush().await?;
                }
                Action::Run { command, parallel } => {
                    let report = self
                        .executor
                        .broadcast(&mut self.registry, &command, parallel)
                        .await;
                    self.log_report(&report);
                }
                Action::EnterInteractive => {
                    let exit = self
                        .multiplexer
                        .run(&mut self.registry, &mut self.router, input, output)
                        .await?;
                    tracing::debug!("Interactive mode ended: {:?}", exit);
                    if exit == InteractiveExit::InputClosed {
                        return Ok(());
                    }
                    output.write_all(b"\n").await?;
                }
                // Only produced while interactive, which the multiplexer owns
                Action::ExitInteractive | Action::Send(_) => {}
            }
        }
    }

    fn log_report(&self, report: &BroadcastReport) {
        report.log();
        if !report.is_success() {
            let failed: Vec<_> = self
                .registry
                .iter()
                .filter(|h| h.is_connected() && !h.last_command_succeeded())
                .map(|h| h.address.as_str())
                .collect();
            tracing::error!("Failed on: {}", failed.join(", "));
        }
    }

    /// Leave interactive mode and disconnect every host.
    pub async fn shutdown(&mut self) {
        if self.router.is_interactive() {
            tracing::debug!("Leaving interactive mode");
            self.router.leave_interactive();
        }
        self.registry.disconnect_all().await;
    }
}
