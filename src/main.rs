mod broadcast;
mod cli;
mod config;
mod error;
mod hostfile;
mod hosts;
mod hostspec;
mod interactive;
mod pool;
mod repl;
mod router;
mod session;
mod ssh;
mod terminal;
#[cfg(test)]
mod testing;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use config::AppConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    cli.apply(&mut config);
    init_tracing(config.debug);

    let code = match cli.execute(config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            1
        }
    };

    // A pending stdin read would otherwise keep the runtime alive
    std::process::exit(code);
}

fn init_tracing(debug: u8) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("sshherd={}", level_for(debug)).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_target(false)
                .with_level(false),
        )
        .init();
}

/// Map the `--debug` level to a tracing filter directive.
fn level_for(debug: u8) -> &'static str {
    match debug {
        0 => "off",
        1 => "error",
        2 => "warn",
        3 => "info",
        _ => "debug",
    }
}
