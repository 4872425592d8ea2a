//! Proptest strategies for fingerprint portal domain types.
//!
//! Reusable generators for property-based testing across crates. Strategies produce
//! well-formed domain values while exploring edge cases through random variation.
//!
//! # Usage
//!
//! ```no_run
//! use fingerprint_portal_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(aliases in strategies::arb_alias_set()) {
//!         // test invariant with a randomly generated directory
//!     }
//! }
//! ```

use chrono::{DateTime, TimeZone, Utc};
use fingerprint_portal_types::{AliasRecord, FingerprintId, MatchId, MatchRecord, Timestamp};
use proptest::prelude::*;

/// Generates an alias that passes default validation.
///
/// 1-32 characters, letters, digits, inner spaces, `_`, `.` and `-`, never
/// starting or ending with a space.
pub fn arb_alias() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]([A-Za-z0-9 _.-]{0,30}[A-Za-z0-9_])?"
}

/// Generates an alias that must be rejected: blank, padded, or carrying a
/// control character.
pub fn arb_invalid_alias() -> impl Strategy<Value = String> {
    prop_oneof![
        "[ \t]{0,4}",
        arb_alias().prop_map(|a| format!(" {a}")),
        arb_alias().prop_map(|a| format!("{a}\t")),
        (arb_alias(), "[\u{0}-\u{8}\u{b}\u{c}\u{e}-\u{1f}]")
            .prop_map(|(a, c)| format!("{a}{c}{a}")),
    ]
}

/// Generates a valid [`FingerprintId`] in the range 1-999,999.
pub fn arb_fingerprint_id() -> impl Strategy<Value = FingerprintId> {
    (1i64..1_000_000).prop_map(FingerprintId::new)
}

/// Generates user input that is not a positive integer id.
pub fn arb_invalid_id_input() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "0{1,4}",
        "-[1-9][0-9]{0,5}",
        "[a-z]{1,6}",
        "[1-9][0-9]{0,3}\\.[0-9]{1,3}",
        "[1-9][0-9]{0,3}[a-z]{1,2}",
        "[1-9][0-9]{19,22}",
    ]
}

/// Generates 0-32 alias records with distinct ids, in arbitrary order.
///
/// Aliases may repeat, as they can on a real backend.
pub fn arb_alias_set() -> impl Strategy<Value = Vec<AliasRecord>> {
    proptest::collection::btree_set(1i64..10_000, 0..32)
        .prop_flat_map(|ids| {
            let ids: Vec<i64> = ids.into_iter().collect();
            let len = ids.len();
            (Just(ids), proptest::collection::vec(arb_alias(), len))
        })
        .prop_map(|(ids, aliases)| {
            ids.into_iter().zip(aliases).map(|(id, alias)| AliasRecord::new(id, alias)).collect()
        })
        .prop_shuffle()
}

/// Generates an arbitrary [`Timestamp`] between 2020-01-01 and 2030-01-01.
pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    (1_577_836_800i64..1_893_456_000i64).prop_map(|secs| {
        let at = Utc
            .timestamp_opt(secs, 0)
            .single()
            .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH));
        Timestamp::new(at)
    })
}

/// Generates an arbitrary [`MatchRecord`].
pub fn arb_match_record() -> impl Strategy<Value = MatchRecord> {
    (arb_fingerprint_id(), 1i64..1_000_000, arb_timestamp()).prop_map(
        |(fingerprint_id, match_id, timestamp)| MatchRecord {
            fingerprint_id,
            match_id: MatchId::new(match_id),
            timestamp,
        },
    )
}
