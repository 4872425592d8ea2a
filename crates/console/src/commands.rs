//! One-shot subcommands.
//!
//! Every subcommand drives the same flow the interactive session uses, prints
//! the rendered view, and reports a failure as
//! [`ConsoleError::CommandFailed`] so the process exits non-zero. The error
//! text is already part of the rendered output.

use std::{io::Write, path::PathBuf};

use fingerprint_portal_sdk::Backend;
use fingerprint_portal_types::FingerprintId;
use snafu::ResultExt;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{generate_config_example, generate_config_schema, CliCommand, ConfigAction},
    error::{ConsoleError, Result, TerminalSnafu},
    flows::{
        DirectoryBrowser, FlowSettings, IdentificationFlow, ProposalState, RegistrationFlow,
        RevocationFlow,
    },
    render::{render_directory, render_identification, render_registration, render_revocation},
    router::ViewRouter,
    session::Session,
};

/// Runs `command` against `backend`, writing the rendered view to `out`.
///
/// `interactive` reads commands from stdin until `quit`, end of input, or
/// cancellation of `shutdown`.
///
/// # Errors
///
/// Returns [`ConsoleError::CommandFailed`] when the operation failed and
/// [`ConsoleError::Terminal`] when `out` cannot be written.
pub async fn execute<B, W>(
    command: &CliCommand,
    settings: &FlowSettings,
    backend: B,
    shutdown: &CancellationToken,
    out: &mut W,
) -> Result<()>
where
    B: Backend + Clone,
    W: Write,
{
    match command {
        CliCommand::Enroll { alias, id, auto } => {
            enroll(backend, settings, alias, *id, *auto, out).await
        },
        CliCommand::Propose => propose(backend, settings, out).await,
        CliCommand::Identify { image_dir } => {
            identify(backend, settings, image_dir.as_ref(), out).await
        },
        CliCommand::Matches { alias } => matches(backend, settings, alias, out).await,
        CliCommand::Aliases => aliases(backend, settings, out).await,
        CliCommand::Delete { id } => delete(backend, settings, id, out).await,
        CliCommand::Interactive => {
            let mut session = Session::new(ViewRouter::new(backend, settings.clone()))
                .with_shutdown(shutdown.clone());
            session.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
        },
        CliCommand::Config { action } => {
            let text = match action {
                ConfigAction::Schema => generate_config_schema()?,
                ConfigAction::Example => generate_config_example()?,
            };
            write_out(out, &text)
        },
    }
}

async fn enroll<B: Backend, W: Write>(
    backend: B,
    settings: &FlowSettings,
    alias: &str,
    id: Option<FingerprintId>,
    auto: bool,
    out: &mut W,
) -> Result<()> {
    let mut flow = RegistrationFlow::new(backend, settings);
    let result = if auto {
        flow.enroll_with_next_id(alias).await
    } else {
        if id.is_none() {
            flow.load().await;
        }
        flow.enroll(id, alias).await
    };
    write_out(out, &render_registration(&flow))?;
    result.map(drop).map_err(|failure| failed(failure.message()))
}

async fn propose<B: Backend, W: Write>(
    backend: B,
    settings: &FlowSettings,
    out: &mut W,
) -> Result<()> {
    let mut flow = RegistrationFlow::new(backend, settings);
    let state = flow.load().await.clone();
    write_out(out, &render_registration(&flow))?;
    match state {
        ProposalState::Failed(warning) => Err(failed(&warning)),
        _ => Ok(()),
    }
}

async fn identify<B: Backend, W: Write>(
    backend: B,
    settings: &FlowSettings,
    image_dir: Option<&PathBuf>,
    out: &mut W,
) -> Result<()> {
    let mut settings = settings.clone();
    if let Some(dir) = image_dir {
        settings.image_dir = Some(dir.clone());
    }
    let mut flow = IdentificationFlow::new(backend, &settings);
    let result = flow.identify().await;
    write_out(out, &render_identification(&flow))?;
    result.map(drop).map_err(|failure| failed(failure.message()))
}

async fn matches<B: Backend, W: Write>(
    backend: B,
    settings: &FlowSettings,
    alias: &str,
    out: &mut W,
) -> Result<()> {
    let mut flow = DirectoryBrowser::new(backend, settings);
    let result = flow.find_matches_by_alias(alias).await;
    write_out(out, &render_directory(&flow))?;
    result.map(drop).map_err(|message| failed(&message))
}

async fn aliases<B: Backend, W: Write>(
    backend: B,
    settings: &FlowSettings,
    out: &mut W,
) -> Result<()> {
    let mut flow = DirectoryBrowser::new(backend, settings);
    let result = flow.list_all_aliases().await;
    write_out(out, &render_directory(&flow))?;
    result.map(drop).map_err(|message| failed(&message))
}

async fn delete<B: Backend, W: Write>(
    backend: B,
    settings: &FlowSettings,
    id: &str,
    out: &mut W,
) -> Result<()> {
    let mut flow = RevocationFlow::new(backend, settings);
    flow.set_input(id);
    let result = flow.delete_identity().await;
    write_out(out, &render_revocation(&flow))?;
    result.map(drop).map_err(|failure| failed(failure.message()))
}

fn failed(message: &str) -> ConsoleError {
    ConsoleError::CommandFailed { message: message.to_string() }
}

fn write_out<W: Write>(out: &mut W, text: &str) -> Result<()> {
    out.write_all(text.as_bytes()).context(TerminalSnafu)?;
    out.flush().context(TerminalSnafu)
}
