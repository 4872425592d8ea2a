//! Core type definitions for the fingerprint portal.
//!
//! - Identifier types ([`FingerprintId`], [`MatchId`])
//! - Directory records and the alias set used for id allocation
//! - Identification results and their encoded images

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Identifier Types
// ============================================================================

/// Generates a newtype wrapper around a numeric type for type-safe identifiers.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord
/// - Serde with `#[serde(transparent)]` for wire format compatibility
/// - `From<inner>` and `Into<inner>` conversions
/// - `Display` printing the bare number, as users type and read it
/// - `new()` constructor and `value()` accessor
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $inner:ty
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Creates a new identifier from a raw value.
            #[inline]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw numeric value.
            #[inline]
            pub const fn value(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Numeric identity of an enrolled fingerprint.
    ///
    /// Valid identifiers are `>= 1`. The wire format accepts any integer so
    /// that a misbehaving backend does not break listing; user input is
    /// checked by [`crate::validation::parse_fingerprint_id`].
    FingerprintId, i64
);

define_id!(
    /// Identifier of one historical identification event.
    MatchId, i64
);

impl FingerprintId {
    /// The identity proposed for an empty directory.
    pub const FIRST: Self = Self(1);

    /// Returns `true` if the identifier is in the valid range (`>= 1`).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 1
    }

    /// Returns the identifier directly after this one, or `None` on overflow.
    #[inline]
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

// ============================================================================
// Directory Records
// ============================================================================

/// An enrolled identity as listed by the backend.
///
/// Aliases are human labels and are not guaranteed to be unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    /// Identity number.
    pub id: FingerprintId,
    /// Human-readable label.
    pub alias: String,
}

impl AliasRecord {
    /// Creates a new alias record.
    pub fn new(id: impl Into<FingerprintId>, alias: impl Into<String>) -> Self {
        Self { id: id.into(), alias: alias.into() }
    }
}

/// One past identification of an enrolled identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Identity that was matched.
    pub fingerprint_id: FingerprintId,
    /// Identifier of the identification event.
    pub match_id: MatchId,
    /// When the identification happened.
    pub timestamp: Timestamp,
}

/// A point in time reported by the backend, normalized to UTC.
///
/// Deserializes from any of:
/// - an RFC 3339 string (`2024-05-01T10:00:00+02:00`)
/// - a naive ISO-8601 date-time, read as UTC (`2024-05-01 08:00:00`)
/// - a number of Unix seconds, optionally fractional
///
/// Serializes as RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

/// Naive date-time layouts accepted when the backend omits an offset.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

impl Timestamp {
    /// Wraps a UTC date-time.
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Returns the wrapped UTC date-time.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parses any of the accepted textual forms.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(text) {
            return Some(Self(at.with_timezone(&Utc)));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .map(|naive| Self(naive.and_utc()))
    }

    fn from_unix_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos).map(Self)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl de::Visitor<'_> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an RFC 3339 string, a naive ISO-8601 date-time or Unix seconds")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Timestamp, E> {
                Timestamp::parse(value)
                    .ok_or_else(|| E::custom(format!("unrecognized timestamp {value:?}")))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Timestamp, E> {
                DateTime::from_timestamp(value, 0)
                    .map(Timestamp)
                    .ok_or_else(|| E::custom(format!("timestamp {value} out of range")))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Timestamp, E> {
                let seconds = i64::try_from(value)
                    .map_err(|_| E::custom(format!("timestamp {value} out of range")))?;
                self.visit_i64(seconds)
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Timestamp, E> {
                Timestamp::from_unix_seconds(value)
                    .ok_or_else(|| E::custom(format!("timestamp {value} out of range")))
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

/// The alias set as last fetched from the backend.
///
/// Preserves backend order. Used by the identity allocator to derive the next
/// unused identity number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasDirectory {
    records: Vec<AliasRecord>,
}

impl AliasDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the records in backend order.
    #[must_use]
    pub fn records(&self) -> &[AliasRecord] {
        &self.records
    }

    /// Consumes the directory, returning the records.
    #[must_use]
    pub fn into_records(self) -> Vec<AliasRecord> {
        self.records
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is enrolled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the largest identity number present.
    #[must_use]
    pub fn max_id(&self) -> Option<FingerprintId> {
        self.records.iter().map(|r| r.id).max()
    }

    /// Returns `true` if the identity number is already taken.
    #[must_use]
    pub fn contains(&self, id: FingerprintId) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    /// Returns the records carrying exactly this alias (case-sensitive).
    pub fn find_by_alias<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = &'a AliasRecord> {
        self.records.iter().filter(move |r| r.alias == alias)
    }

    /// Derives the next unused identity number.
    ///
    /// Returns [`FingerprintId::FIRST`] for an empty directory and
    /// `max(ids) + 1` otherwise. Backend ids below 1 never pull the proposal
    /// under [`FingerprintId::FIRST`]. Returns `None` only when the id space
    /// is exhausted.
    #[must_use]
    pub fn next_id(&self) -> Option<FingerprintId> {
        match self.max_id() {
            Some(max) if max.is_valid() => max.next(),
            _ => Some(FingerprintId::FIRST),
        }
    }
}

impl From<Vec<AliasRecord>> for AliasDirectory {
    fn from(records: Vec<AliasRecord>) -> Self {
        Self { records }
    }
}

impl FromIterator<AliasRecord> for AliasDirectory {
    fn from_iter<I: IntoIterator<Item = AliasRecord>>(iter: I) -> Self {
        Self { records: iter.into_iter().collect() }
    }
}

impl IntoIterator for AliasDirectory {
    type Item = AliasRecord;
    type IntoIter = std::vec::IntoIter<AliasRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

// ============================================================================
// Identification
// ============================================================================

/// The identity the backend matched, with its score.
///
/// Holding id, alias and confidence together makes "matched without a
/// confidence" unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedIdentity {
    /// Matched identity number.
    pub id: FingerprintId,
    /// Alias of the matched identity.
    pub alias: String,
    /// Opaque backend score. Display-only: never thresholded or normalized.
    pub confidence: f64,
}

/// Outcome of one identification attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentificationResult {
    /// Server message (e.g. `"Match found"`).
    pub message: String,
    /// The matched identity, if the backend reported one.
    pub matched: Option<MatchedIdentity>,
    /// The fingerprint image captured for this attempt.
    pub scanned_image: Option<EncodedImage>,
    /// The enrolled image the capture matched against.
    pub matched_image: Option<EncodedImage>,
}

impl IdentificationResult {
    /// Returns `true` if the result names a matched identity.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }

    /// Returns `true` if at least one image is attached.
    #[must_use]
    pub fn has_images(&self) -> bool {
        self.scanned_image.is_some() || self.matched_image.is_some()
    }
}

/// Raster image carried as base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    /// Wraps base64 text without decoding it.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Encodes raw image bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    /// Returns the base64 text as received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the image bytes.
    ///
    /// Accepts a `data:<mime>;base64,` prefix and embedded whitespace.
    ///
    /// # Errors
    ///
    /// Returns the decode error if the payload is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let payload = match self.0.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => self.0.as_str(),
        };
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD.decode(compact)
    }
}

/// Raster format detected from an image's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG / JFIF.
    Jpeg,
    /// Windows bitmap.
    Bmp,
    /// Graphics Interchange Format.
    Gif,
    /// Tagged Image File Format.
    Tiff,
    /// Anything else.
    Unknown,
}

impl ImageFormat {
    /// Detects the format from magic bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes {
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Self::Png,
            [0xFF, 0xD8, 0xFF, ..] => Self::Jpeg,
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Self::Gif,
            [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Self::Tiff,
            [b'B', b'M', ..] => Self::Bmp,
            _ => Self::Unknown,
        }
    }

    /// File extension conventionally used for the format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Bmp => "bmp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Unknown => "bin",
        }
    }
}
