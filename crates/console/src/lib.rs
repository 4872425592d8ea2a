//! Terminal front end for the fingerprint identity workflow.
//!
//! Four flows (registration, identification, directory browsing and
//! revocation) run against any [`fingerprint_portal_sdk::Backend`]. A
//! [`router::ViewRouter`] keeps exactly one of them alive; the interactive
//! [`session::Session`] and the one-shot [`commands`] both drive flows
//! through it or directly, and [`render`] turns flow state into text.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod commands;
pub mod config;
pub mod error;
pub mod flows;
pub mod render;
pub mod router;
pub mod session;
pub mod shutdown;
pub mod ticket;

pub use config::{Cli, CliCommand, ConsoleConfig, LogFormat};
pub use error::{ConsoleError, Result};
