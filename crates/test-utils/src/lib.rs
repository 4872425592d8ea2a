//! Shared test utilities for the fingerprint portal crates.
//!
//! - [`TestDir`]: scratch directory for saved images and config files
//! - [`assert_eventually`], [`assert_eventually_async`]: polling with a deadline
//! - [`strategies`]: proptest generators for aliases, ids and records

#![deny(unsafe_code)]

mod test_dir;
pub use test_dir::TestDir;

mod assertions;
pub use assertions::{assert_eventually, assert_eventually_async};

pub mod strategies;
