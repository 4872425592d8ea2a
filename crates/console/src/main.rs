//! Fingerprint portal binary.
//!
//! # Usage
//!
//! ```bash
//! # Enroll under the next free identity number
//! fingerprint-portal enroll --alias amy
//!
//! # Identify and keep the images
//! fingerprint-portal identify --image-dir ./captures
//!
//! # Point at another service through the environment
//! FINGERPRINT_PORTAL_ENDPOINT=http://scanner.local:8000 fingerprint-portal aliases
//!
//! # One view at a time, line by line
//! fingerprint-portal interactive
//! ```

use std::{io::IsTerminal, process::ExitCode};

use clap::Parser;
use fingerprint_portal_console::{
    commands,
    config::{generate_config_example, generate_config_schema, Cli, CliCommand, ConfigAction},
    error::{ClientSnafu, ConsoleError},
    shutdown::spawn_shutdown_watcher,
    LogFormat,
};
use fingerprint_portal_sdk::PortalClient;
use snafu::ResultExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        // Already rendered as part of the command output.
        Err(ConsoleError::CommandFailed { .. }) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<(), ConsoleError> {
    // Configuration output needs neither logging nor a backend.
    if let CliCommand::Config { action } = &cli.command {
        let text = match action {
            ConfigAction::Schema => generate_config_schema()?,
            ConfigAction::Example => generate_config_example()?,
        };
        print!("{text}");
        return Ok(());
    }

    let config = cli.overrides.resolve()?;
    init_logging(config.log_format);
    tracing::debug!(endpoint = %config.endpoint, timeout = ?config.timeout, "Configuration loaded");

    let client = PortalClient::new(config.client_config()?).context(ClientSnafu)?;
    let watcher = spawn_shutdown_watcher(client.clone());

    let mut stdout = std::io::stdout();
    let shutdown = client.cancellation_token();
    let result = commands::execute(
        &cli.command,
        &config.flow_settings(),
        client.clone(),
        &shutdown,
        &mut stdout,
    )
    .await;

    client.shutdown();
    let _ = watcher.await;
    result
}

/// Initializes logging on stderr; stdout carries command output.
///
/// `RUST_LOG` overrides the default `warn` filter.
fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let use_json = match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stderr().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
