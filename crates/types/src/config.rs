//! Validation limits applied to user input.
//!
//! Limits are loaded as part of the console configuration and validated at
//! construction time via a fallible builder. Post-deserialization validation
//! is available through [`ValidationConfig::validate`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::{ensure, Snafu};

/// A limit outside its accepted range.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    /// The named value is out of range.
    #[snafu(display("validation limits: {message}"))]
    Validation {
        /// Which value and why.
        message: String,
    },
}

/// Smallest accepted value for `max_alias_bytes`.
const MIN_ALIAS_BYTES: usize = 1;

/// Largest accepted value for `max_alias_bytes`.
const MAX_ALIAS_BYTES: usize = 1024;

/// Default maximum alias length (64 bytes).
const fn default_max_alias_bytes() -> usize {
    64
}

/// Limits for client-side input validation.
///
/// # Example
///
/// ```no_run
/// # use fingerprint_portal_types::ValidationConfig;
/// let strict = ValidationConfig::builder().max_alias_bytes(32).build()?;
/// assert!(ValidationConfig::builder().max_alias_bytes(0).build().is_err());
/// # Ok::<(), fingerprint_portal_types::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationConfig {
    /// Maximum alias length in UTF-8 bytes.
    ///
    /// Must be between 1 and 1024. Default: 64.
    #[serde(default = "default_max_alias_bytes")]
    pub max_alias_bytes: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { max_alias_bytes: default_max_alias_bytes() }
    }
}

#[bon::bon]
impl ValidationConfig {
    /// Builds checked limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `max_alias_bytes` is outside `1..=1024`.
    #[builder]
    pub fn new(
        #[builder(default = default_max_alias_bytes())] max_alias_bytes: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self { max_alias_bytes };
        config.validate()?;
        Ok(config)
    }
}

impl ValidationConfig {
    /// Range check for values that bypassed the builder, e.g. deserialized
    /// ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bytes = self.max_alias_bytes;
        ensure!(
            (MIN_ALIAS_BYTES..=MAX_ALIAS_BYTES).contains(&bytes),
            ValidationSnafu {
                message: format!(
                    "max_alias_bytes must be between {MIN_ALIAS_BYTES} and {MAX_ALIAS_BYTES}, got {bytes}"
                ),
            }
        );
        Ok(())
    }
}
