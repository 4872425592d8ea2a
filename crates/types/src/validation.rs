//! Input validation for user-supplied fields.
//!
//! Validation runs client-side before any network call. A failure here never
//! reaches the backend.
//!
//! - Aliases: non-empty, no surrounding whitespace, no control characters,
//!   bounded length.
//! - Fingerprint ids typed by a user: a positive base-10 integer.

use std::fmt;

use crate::{config::ValidationConfig, types::FingerprintId};

/// Validation error with structured context.
///
/// Contains the specific constraint that was violated and the field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the violated constraint.
    pub constraint: String,
}

impl ValidationError {
    fn new(field: &str, constraint: impl Into<String>) -> Self {
        Self { field: field.to_string(), constraint: constraint.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.constraint)
    }
}

impl std::error::Error for ValidationError {}

/// Validates an alias submitted for enrollment or lookup.
///
/// Aliases must:
/// - Contain at least one non-whitespace character
/// - Not start or end with whitespace
/// - Not contain control characters
/// - Not exceed `config.max_alias_bytes` in UTF-8 byte length
///
/// Case is preserved; lookups are exact.
///
/// # Errors
///
/// Returns [`ValidationError`] naming the violated constraint.
pub fn validate_alias(alias: &str, config: &ValidationConfig) -> Result<(), ValidationError> {
    if alias.trim().is_empty() {
        return Err(ValidationError::new("alias", "must not be empty"));
    }
    if alias.len() > config.max_alias_bytes {
        return Err(ValidationError::new(
            "alias",
            format!(
                "length {} bytes exceeds maximum {} bytes",
                alias.len(),
                config.max_alias_bytes
            ),
        ));
    }
    if alias.trim() != alias {
        return Err(ValidationError::new("alias", "must not start or end with whitespace"));
    }
    if let Some(pos) = alias.find(char::is_control) {
        return Err(ValidationError::new(
            "alias",
            format!(
                "contains control character {:?} at byte offset {}",
                alias[pos..].chars().next().unwrap_or('\0'),
                pos
            ),
        ));
    }
    Ok(())
}

/// Checks that an identity number is usable for enrollment or deletion.
///
/// # Errors
///
/// Returns [`ValidationError`] if the id is below 1.
pub fn validate_fingerprint_id(id: FingerprintId) -> Result<(), ValidationError> {
    if !id.is_valid() {
        return Err(ValidationError::new(
            "fingerprint_id",
            format!("must be a positive integer, got {id}"),
        ));
    }
    Ok(())
}

/// Parses a fingerprint id typed by a user.
///
/// Surrounding whitespace is ignored. The remaining text must be a positive
/// base-10 integer that fits in 64 bits; signs, decimals and exponents are
/// rejected.
///
/// # Errors
///
/// Returns [`ValidationError`] if the input is empty, non-numeric, zero,
/// negative or out of range.
pub fn parse_fingerprint_id(input: &str) -> Result<FingerprintId, ValidationError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(ValidationError::new("fingerprint_id", "must not be empty"));
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::new(
            "fingerprint_id",
            format!("{text:?} is not a positive integer"),
        ));
    }
    let value: i64 = text.parse().map_err(|_| {
        ValidationError::new("fingerprint_id", format!("{text:?} is out of range"))
    })?;
    let id = FingerprintId::new(value);
    validate_fingerprint_id(id)?;
    Ok(id)
}
