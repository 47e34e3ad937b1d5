use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dialoguer::{Input, Password};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};

use crate::broadcast::BroadcastExecutor;
use crate::config::AppConfig;
use crate::error::{Result, SshHerdError};
use crate::hostfile;
use crate::hosts::HostRegistry;
use crate::hostspec::{HostSpecExpander, Resolver};
use crate::interactive::InteractiveMultiplexer;
use crate::pool::TaskPool;
use crate::repl::Repl;
use crate::session::Credential;
use crate::ssh::{SshConfig, SshConnector};

#[derive(Parser, Debug)]
#[command(name = "sshherd")]
#[command(version)]
#[command(about = "Connect via SSH to numerous hosts as to one. Use @? for help on special commands.")]
#[command(
    after_help = "Host specification may be a hostname, an IP address, a subnet in CIDR notation (10.1.1.0/24) or a range (myhost1-5). user@host is not supported."
)]
pub struct Cli {
    /// Space separated host specifications
    pub hosts: Vec<String>,

    /// Read hosts from file (one per line: "host user password")
    #[arg(short, long)]
    pub file: Option<String>,

    /// Execute just this command and exit
    #[arg(short, long)]
    pub command: Option<String>,

    /// Debug level from 0 (silent) to 4 (most verbose)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub debug: Option<u8>,

    /// Connect and run parallel commands on up to this many hosts at once
    #[arg(short, long)]
    pub pool: Option<usize>,

    /// Username for all command-line hosts
    #[arg(short = 'U', long)]
    pub username: Option<String>,

    /// Password for all command-line hosts
    #[arg(short = 'P', long, env = "SSHHERD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Interpret ranges as hexadecimal numbers
    #[arg(short = 'x', long)]
    pub hex: bool,

    /// SSH port for every host
    #[arg(long)]
    pub port: Option<u16>,

    /// Connect timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl Cli {
    /// Layer command-line flags over the config file.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(pool) = self.pool {
            config.pool = pool;
        }
        if let Some(debug) = self.debug {
            config.debug = debug;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(timeout) = self.timeout {
            config.connect_timeout_secs = timeout;
        }
        if self.username.is_some() {
            config.username = self.username.clone();
        }
    }

    /// Run the program and return the process exit code.
    pub async fn execute(self, config: AppConfig) -> Result<i32> {
        let expander = HostSpecExpander::system(self.hex);
        let registry = self.collect_hosts(&expander, &config)?;
        if registry.is_empty() {
            return Err(SshHerdError::NoHosts);
        }

        let connector = SshConnector::new(SshConfig::from(&config));
        let executor = BroadcastExecutor::new(Arc::new(connector), TaskPool::new(config.pool));
        let mut repl = Repl::new(registry, executor, InteractiveMultiplexer::for_stdin());

        let mut input = BufReader::new(tokio::io::stdin());
        let mut output = tokio::io::stdout();
        let code = drive(
            &mut repl,
            self.command.as_deref(),
            &mut input,
            &mut output,
            shutdown_signal(),
        )
        .await;

        if code != 0 {
            println!();
        }
        Ok(code)
    }

    /// Host file entries first, then command-line specifications.
    fn collect_hosts<R: Resolver>(
        &self,
        expander: &HostSpecExpander<R>,
        config: &AppConfig,
    ) -> Result<HostRegistry> {
        let mut registry = HostRegistry::new();

        if let Some(file) = &self.file {
            let path = PathBuf::from(shellexpand::tilde(file).to_string());
            for entry in hostfile::load(&path) {
                for address in expander.expand(&entry.spec) {
                    registry.add(address, entry.username.clone(), entry.credential.clone());
                }
            }
        }

        if !self.hosts.is_empty() {
            let username = match config.username.clone() {
                Some(username) => username,
                None => Input::new().with_prompt("Username").interact_text()?,
            };
            let credential = match &self.password {
                Some(password) => Credential::new(password.clone()),
                None => Credential::new(Password::new().with_prompt("Password").interact()?),
            };

            for spec in &self.hosts {
                for address in expander.expand(spec) {
                    registry.add(address, username.clone(), credential.clone());
                }
            }
        }

        Ok(registry)
    }
}

/// Connect, then run either the one-shot command or the prompt, until done or
/// `signal` fires. Every host is disconnected before returning the exit code.
async fn drive<I, O, S>(
    repl: &mut Repl,
    command: Option<&str>,
    input: &mut I,
    output: &mut O,
    signal: S,
) -> i32
where
    I: AsyncBufRead + AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let session = async {
        tracing::info!("Connecting to {} hosts...", repl.registry().len());
        repl.connect().await.log();

        match command {
            Some(command) => {
                repl.run_once(command).await;
                0
            }
            None => {
                if let Err(e) = repl.run(input, output).await {
                    tracing::error!("{}", e);
                }
                1
            }
        }
    };

    let code = tokio::select! {
        biased;
        _ = signal => 1,
        code = session => code,
    };

    repl.shutdown().await;
    code
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::debug!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::debug!("Received SIGTERM, shutting down...");
        }
    }
}
