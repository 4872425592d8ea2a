//! Console error types.
//!
//! Flow failures never surface here: flows turn every backend error into a
//! displayable message. [`ConsoleError`] covers what happens around them:
//! loading configuration, building the client, terminal I/O and one-shot
//! commands that must exit non-zero.

use std::path::PathBuf;

use fingerprint_portal_sdk::SdkError;
use snafu::{Location, Snafu};

/// Result type alias for console operations.
pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;

/// Errors produced by the console outside the flows.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConsoleError {
    /// Configuration sources could not be read or merged.
    #[snafu(display("Failed to load configuration: {source}"))]
    LoadConfig {
        /// Underlying loader error.
        source: config::ConfigError,
    },

    /// A configuration value is out of range.
    #[snafu(display("Invalid configuration: {message}"))]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The backend client could not be constructed.
    #[snafu(display("Failed to create backend client: {source}"))]
    Client {
        /// SDK error.
        source: SdkError,
    },

    /// Reading from or writing to the terminal failed.
    #[snafu(display("Terminal I/O failed at {location}: {source}"))]
    Terminal {
        /// Underlying I/O error.
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    /// An identification image could not be written.
    #[snafu(display("Failed to save image to {}: {source}", path.display()))]
    SaveImage {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration schema or example could not be rendered.
    #[snafu(display("Failed to render configuration {what}: {message}"))]
    Render {
        /// `"schema"` or `"example"`.
        what: &'static str,
        /// Serializer message.
        message: String,
    },

    /// A one-shot command reported a failure to the user.
    #[snafu(display("{message}"))]
    CommandFailed {
        /// The message already shown to the user.
        message: String,
    },
}
