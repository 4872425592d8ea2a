//! Line-oriented interactive session.
//!
//! Each input line is one command. View names (`register`, `identify`,
//! `browse`, `revoke`) switch the active view; the remaining commands act on
//! the active view only. After every command the active view is rendered.

use fingerprint_portal_sdk::Backend;
use fingerprint_portal_types::FingerprintId;
use snafu::ResultExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Result, TerminalSnafu},
    render::render_view,
    router::{View, ViewKind, ViewRouter},
};

/// Prompt printed before each command.
pub const PROMPT: &str = "> ";

const HELP: &str = "\
Views:
  register | identify | browse | revoke
Register:
  load                  propose the next identity number
  id N                  use N instead of the proposal
  enroll ALIAS          enroll under the chosen or proposed id
  auto ALIAS            propose and enroll, retrying on conflict
Identify:
  scan                  identify the fingerprint on the sensor
Browse:
  search ALIAS          match history of ALIAS
  aliases               list all aliases
  both ALIAS            search and list concurrently
Revoke:
  input TEXT            set the fingerprint id input
  delete [TEXT]         delete the id in the input
General:
  show | help | quit
";

/// A parsed session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Switch the active view.
    Select(ViewKind),
    /// Load a fresh id proposal.
    Load,
    /// Use a manual id for the next enrollment.
    ManualId(String),
    /// Enroll under the manual or proposed id.
    Enroll(String),
    /// Propose and enroll with conflict retry.
    AutoEnroll(String),
    /// Run one identification.
    Scan,
    /// Search the match history of an alias.
    Search(String),
    /// List all aliases.
    Aliases,
    /// Search and list concurrently.
    Both(String),
    /// Replace the revocation input.
    Input(String),
    /// Delete, optionally replacing the input first.
    Delete(Option<String>),
    /// Render the active view again.
    Show,
    /// Print the command list.
    Help,
    /// End the session.
    Quit,
}

impl SessionCommand {
    /// Parses one input line. Blank lines parse to [`SessionCommand::Show`].
    ///
    /// # Errors
    ///
    /// Returns a message for unknown commands or missing arguments.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let required = |name: &str| {
            if rest.is_empty() {
                Err(format!("`{name}` needs an argument"))
            } else {
                Ok(rest.to_string())
            }
        };

        if let Some(kind) = ViewKind::from_command(word) {
            return Ok(Self::Select(kind));
        }
        match word {
            "" | "show" => Ok(Self::Show),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            "load" => Ok(Self::Load),
            "id" => required("id").map(Self::ManualId),
            "enroll" => Ok(Self::Enroll(rest.to_string())),
            "auto" => Ok(Self::AutoEnroll(rest.to_string())),
            "scan" => Ok(Self::Scan),
            "search" => Ok(Self::Search(rest.to_string())),
            "aliases" => Ok(Self::Aliases),
            "both" => Ok(Self::Both(rest.to_string())),
            "input" => Ok(Self::Input(rest.to_string())),
            "delete" => Ok(Self::Delete((!rest.is_empty()).then(|| rest.to_string()))),
            other => Err(format!("unknown command `{other}`, try `help`")),
        }
    }
}

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Text to print; the session goes on.
    Continue(String),
    /// The session is over.
    Quit,
}

/// Interactive session over a [`ViewRouter`].
#[derive(Debug)]
pub struct Session<B> {
    router: ViewRouter<B>,
    manual_id: Option<FingerprintId>,
    shutdown: CancellationToken,
}

impl<B: Backend + Clone> Session<B> {
    /// Starts a session with nothing selected.
    pub fn new(router: ViewRouter<B>) -> Self {
        Self { router, manual_id: None, shutdown: CancellationToken::new() }
    }

    /// Ends [`Self::run`] once `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// The router driven by this session.
    #[must_use]
    pub fn router(&self) -> &ViewRouter<B> {
        &self.router
    }

    /// Executes one input line and returns what to print.
    pub async fn execute(&mut self, line: &str) -> Step {
        let command = match SessionCommand::parse(line) {
            Ok(command) => command,
            Err(message) => return Step::Continue(format!("Error: {message}\n")),
        };
        match command {
            SessionCommand::Quit => Step::Quit,
            SessionCommand::Help => Step::Continue(HELP.to_string()),
            command => match self.apply(command).await {
                Ok(()) => Step::Continue(render_view(self.router.active())),
                Err(message) => Step::Continue(format!("Error: {message}\n")),
            },
        }
    }

    async fn apply(&mut self, command: SessionCommand) -> std::result::Result<(), String> {
        match command {
            SessionCommand::Select(kind) => {
                self.manual_id = None;
                if let View::Registering(flow) = self.router.select(kind) {
                    flow.load().await;
                }
                return Ok(());
            },
            SessionCommand::Show => return Ok(()),
            _ => {},
        }

        let active = self.router.active_kind();
        match (command, self.router.active_mut()) {
            (SessionCommand::Load, View::Registering(flow)) => {
                flow.load().await;
            },
            (SessionCommand::ManualId(text), View::Registering(_)) => {
                let id = fingerprint_portal_types::parse_fingerprint_id(&text)
                    .map_err(|e| e.to_string())?;
                self.manual_id = Some(id);
            },
            (SessionCommand::Enroll(alias), View::Registering(flow)) => {
                // Failures are shown by the flow itself.
                if flow.enroll(self.manual_id, &alias).await.is_ok() {
                    self.manual_id = None;
                }
            },
            (SessionCommand::AutoEnroll(alias), View::Registering(flow)) => {
                let _ = flow.enroll_with_next_id(&alias).await;
            },
            (SessionCommand::Scan, View::Identifying(flow)) => {
                let _ = flow.identify().await;
            },
            (SessionCommand::Search(alias), View::Browsing(flow)) => {
                let _ = flow.find_matches_by_alias(&alias).await;
            },
            (SessionCommand::Aliases, View::Browsing(flow)) => {
                let _ = flow.list_all_aliases().await;
            },
            (SessionCommand::Both(alias), View::Browsing(flow)) => {
                flow.refresh_both(&alias).await;
            },
            (SessionCommand::Input(text), View::Revoking(flow)) => {
                flow.set_input(text);
            },
            (SessionCommand::Delete(text), View::Revoking(flow)) => {
                if let Some(text) = text {
                    flow.set_input(text);
                }
                let _ = flow.delete_identity().await;
            },
            (command, _) => {
                let name = command_name(&command);
                return Err(format!("`{name}` is not available in the {active} view"));
            },
        }
        Ok(())
    }

    /// Reads commands until `quit`, end of input, or cancellation of the
    /// shutdown token.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ConsoleError::Terminal`] if reading or
    /// writing fails.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let banner = format!("{}{PROMPT}", render_view(self.router.active()));
        output.write_all(banner.as_bytes()).await.context(TerminalSnafu)?;
        output.flush().await.context(TerminalSnafu)?;

        loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, leaving interactive session");
                    output.write_all(b"\n").await.context(TerminalSnafu)?;
                    output.flush().await.context(TerminalSnafu)?;
                    break;
                }
                next = lines.next_line() => next.context(TerminalSnafu)?,
            };
            let Some(line) = next else { break };
            match self.execute(&line).await {
                Step::Quit => break,
                Step::Continue(text) => {
                    output.write_all(text.as_bytes()).await.context(TerminalSnafu)?;
                    output.write_all(PROMPT.as_bytes()).await.context(TerminalSnafu)?;
                    output.flush().await.context(TerminalSnafu)?;
                },
            }
        }
        tracing::debug!("Interactive session ended");
        Ok(())
    }
}

fn command_name(command: &SessionCommand) -> &'static str {
    match command {
        SessionCommand::Select(_) => "select",
        SessionCommand::Load => "load",
        SessionCommand::ManualId(_) => "id",
        SessionCommand::Enroll(_) => "enroll",
        SessionCommand::AutoEnroll(_) => "auto",
        SessionCommand::Scan => "scan",
        SessionCommand::Search(_) => "search",
        SessionCommand::Aliases => "aliases",
        SessionCommand::Both(_) => "both",
        SessionCommand::Input(_) => "input",
        SessionCommand::Delete(_) => "delete",
        SessionCommand::Show => "show",
        SessionCommand::Help => "help",
        SessionCommand::Quit => "quit",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_view_names() {
        assert_eq!(SessionCommand::parse("register"), Ok(SessionCommand::Select(ViewKind::Registering)));
        assert_eq!(SessionCommand::parse("  revoke "), Ok(SessionCommand::Select(ViewKind::Revoking)));
    }

    #[test]
    fn test_parse_keeps_inner_spaces_of_alias() {
        assert_eq!(
            SessionCommand::parse("enroll Amy  Pond"),
            Ok(SessionCommand::Enroll("Amy  Pond".to_string()))
        );
        assert_eq!(SessionCommand::parse("search amy"), Ok(SessionCommand::Search("amy".into())));
    }

    #[test]
    fn test_parse_delete_argument_is_optional() {
        assert_eq!(SessionCommand::parse("delete"), Ok(SessionCommand::Delete(None)));
        assert_eq!(SessionCommand::parse("delete 7"), Ok(SessionCommand::Delete(Some("7".into()))));
    }

    #[test]
    fn test_parse_errors() {
        assert!(SessionCommand::parse("id").unwrap_err().contains("needs an argument"));
        assert!(SessionCommand::parse("fly").unwrap_err().contains("unknown command"));
        assert_eq!(SessionCommand::parse(""), Ok(SessionCommand::Show));
    }
}
