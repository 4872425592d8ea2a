//! Core types and input validation for the fingerprint portal.
//!
//! This crate provides the foundational types shared by the SDK and the console:
//! - Identifier newtypes ([`FingerprintId`], [`MatchId`])
//! - Directory records ([`AliasRecord`], [`MatchRecord`], [`AliasDirectory`])
//! - Identification results and the images attached to them
//! - Client-side validation of user input, run before any network call

pub mod config;
pub mod types;
pub mod validation;

pub use config::{ConfigError, ValidationConfig};
pub use types::*;
pub use validation::{
    parse_fingerprint_id, validate_alias, validate_fingerprint_id, ValidationError,
};
