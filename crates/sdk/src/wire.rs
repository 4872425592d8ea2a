//! JSON bodies exchanged with the backend.
//!
//! These types mirror the HTTP contract exactly and are shared by the client
//! and the mock server. Conversion into domain types happens here so the
//! client never hands a half-formed result to callers.

use fingerprint_portal_types::{
    AliasRecord, EncodedImage, FingerprintId, IdentificationResult, MatchRecord, MatchedIdentity,
};
use serde::{Deserialize, Serialize};

/// `POST /enroll` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollRequest {
    pub id: FingerprintId,
    pub alias: String,
}

/// `{ message }` success body of enrollment and deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `GET /aliases` success body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasesResponse {
    #[serde(default)]
    pub aliases: Vec<AliasRecord>,
}

/// `GET /matches/{alias}` success body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchesResponse {
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
}

/// `POST /match` success body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FingerprintId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_img_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_img_str: Option<String>,
}

impl IdentifyResponse {
    /// Converts the body into an [`IdentificationResult`].
    ///
    /// A body naming an id or alias must carry all three of id, alias and
    /// confidence. Empty image strings count as absent.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch for a partially populated match.
    pub fn into_result(self) -> Result<IdentificationResult, String> {
        let matched = match (self.id, self.alias, self.confidence) {
            (None, None, None) => None,
            (Some(id), Some(alias), Some(confidence)) => {
                if !confidence.is_finite() {
                    return Err(format!("confidence {confidence} is not a finite number"));
                }
                Some(MatchedIdentity { id, alias, confidence })
            },
            (id, alias, confidence) => {
                let missing: Vec<&str> = [
                    id.is_none().then_some("id"),
                    alias.is_none().then_some("alias"),
                    confidence.is_none().then_some("confidence"),
                ]
                .into_iter()
                .flatten()
                .collect();
                return Err(format!("match is missing {}", missing.join(", ")));
            },
        };

        Ok(IdentificationResult {
            message: self.message,
            matched,
            scanned_image: image(self.scanned_img_str),
            matched_image: image(self.matched_img_str),
        })
    }
}

fn image(text: Option<String>) -> Option<EncodedImage> {
    text.filter(|t| !t.trim().is_empty()).map(EncodedImage::new)
}

/// Error body: `{ "detail": ... }`.
///
/// `detail` is usually a string. Request validation failures carry a list of
/// `{ loc, msg, type }` entries instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Detail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Detail {
    Text(String),
    Items(Vec<DetailItem>),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailItem {
    pub msg: String,
}

impl ErrorBody {
    /// Creates a body with a plain-text detail.
    pub fn text(detail: impl Into<String>) -> Self {
        Self { detail: Some(Detail::Text(detail.into())) }
    }

    /// Parses an error body, tolerating anything that is not JSON.
    pub fn parse(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes).unwrap_or_default()
    }

    /// Flattens the detail into display text.
    pub fn into_message(self) -> Option<String> {
        let text = match self.detail? {
            Detail::Text(text) => text,
            Detail::Items(items) => {
                items.into_iter().map(|item| item.msg).collect::<Vec<_>>().join("; ")
            },
            Detail::Other(serde_json::Value::Null) => return None,
            Detail::Other(value) => value.to_string(),
        };
        (!text.trim().is_empty()).then_some(text)
    }
}
