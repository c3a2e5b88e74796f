#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod output;
mod shutdown;

use std::process;

use anyhow::Context;
use keywatch_core::{ProviderDescriptor, RemoteProvider};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{Cli, Command};
use crate::output::print_value;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "keywatch_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "keywatch_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "keywatch_cli::config";
pub const TRACING_TARGET_WATCH: &str = "keywatch_cli::watch";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = format!("{error:#}"),
            "keywatch terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    init_tracing()?;
    tracing::debug!(
        target: TRACING_TARGET_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "starting keywatch"
    );
    cli.log();

    let provider = cli.provider();
    let descriptor = cli.descriptor();

    match &cli.command {
        Command::Get { key } => {
            let value = provider
                .fetch_once(&descriptor)
                .await
                .with_context(|| format!("failed to read '{key}'"))?;
            print_value(Some(&value[..]))
        }
        Command::Wait { key } => {
            let value = provider
                .wait_for_change(&descriptor)
                .await
                .with_context(|| format!("failed to wait for '{key}'"))?;
            print_value(Some(&value[..]))
        }
        Command::Watch { key } => watch(&provider, &descriptor)
            .await
            .with_context(|| format!("failed to watch '{key}'")),
    }
}

/// Prints every observed value until the stream closes or a signal arrives.
async fn watch(
    provider: &impl RemoteProvider,
    descriptor: &ProviderDescriptor,
) -> anyhow::Result<()> {
    let (mut stream, handle) = provider.open_change_stream(descriptor).await;
    let shutdown = shutdown::shutdown_signal();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            () = &mut shutdown => {
                handle.cancel();
                break Ok(());
            }
            message = stream.recv() => {
                let Some(message) = message else {
                    tracing::info!(
                        target: TRACING_TARGET_WATCH,
                        key = descriptor.key_path(),
                        state = %handle.state(),
                        "change stream closed"
                    );
                    break Ok(());
                };
                match message.into_result() {
                    Ok(value) => print_value(value.as_deref())?,
                    Err(err) => break Err(err.into()),
                }
            }
        }
    };

    handle.cancel();
    handle.closed().await;
    result
}

/// Initializes tracing with environment-based filtering.
///
/// Logs go to stderr so that stdout only carries values.
fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to create env filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()
        .context("failed to initialize tracing")
}
