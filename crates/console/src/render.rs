//! Plain-text rendering of the views.
//!
//! Rendering reads flow state and never changes it. Errors are always shown
//! as `Error: <message>`.

use std::fmt::Write as _;

use fingerprint_portal_types::{AliasRecord, MatchRecord};

use crate::{
    flows::{
        AliasesRegion, DirectoryBrowser, IdentificationFlow, ImageRole, ImageSummary,
        MatchesRegion, ProposalState, RegistrationFlow, RevocationFlow, StatusLine,
    },
    router::View,
};

/// Renders whichever view is active.
#[must_use]
pub fn render_view<B>(view: &View<B>) -> String {
    match view {
        View::None => "Select a view: register, identify, browse, revoke\n".to_string(),
        View::Registering(flow) => render_registration(flow),
        View::Identifying(flow) => render_identification(flow),
        View::Browsing(flow) => render_directory(flow),
        View::Revoking(flow) => render_revocation(flow),
    }
}

/// Renders the registration view.
#[must_use]
pub fn render_registration<B>(flow: &RegistrationFlow<B>) -> String {
    let mut out = String::from("Register\n");
    match flow.proposal() {
        ProposalState::Idle => out.push_str("Proposed ID: not loaded\n"),
        ProposalState::Loading => out.push_str("Proposed ID: loading...\n"),
        ProposalState::Ready(id) => {
            let _ = writeln!(out, "Proposed ID: {id}");
        },
        ProposalState::Failed(warning) => {
            out.push_str("Proposed ID: unavailable, enter one manually\n");
            let _ = writeln!(out, "Warning: {warning}");
        },
        ProposalState::Stale => out.push_str("Proposed ID: outdated, load again\n"),
    }
    push_status(&mut out, flow.status());
    out
}

/// Renders the identification view.
///
/// Image lines appear only for images that are present.
#[must_use]
pub fn render_identification<B>(flow: &IdentificationFlow<B>) -> String {
    let view = flow.view();
    let mut out = String::from("Match Fingerprint\n");
    if view.pending {
        out.push_str("Scanning...\n");
    }
    if let Some(result) = &view.result {
        let _ = writeln!(out, "{}", result.message);
        if let Some(matched) = &result.matched {
            let _ = writeln!(out, "ID: {}", matched.id);
            let _ = writeln!(out, "Alias: {}", matched.alias);
            let _ = writeln!(out, "Confidence: {}", matched.confidence);
        }
    }
    for image in &view.images {
        push_image(&mut out, image);
    }
    if let Some(warning) = &view.image_warning {
        let _ = writeln!(out, "Warning: {warning}");
    }
    if let Some(error) = &view.error {
        let _ = writeln!(out, "Error: {error}");
    }
    out
}

fn push_image(out: &mut String, image: &ImageSummary) {
    let role = match image.role {
        ImageRole::Scanned => "Scanned image",
        ImageRole::Matched => "Matched image",
    };
    let _ = write!(out, "{role}: {}, {} bytes", image.format.extension(), image.bytes);
    if let Some(path) = &image.saved_to {
        let _ = write!(out, ", saved to {}", path.display());
    }
    out.push('\n');
}

/// Renders the browsing view: match history first, then all aliases.
#[must_use]
pub fn render_directory<B>(flow: &DirectoryBrowser<B>) -> String {
    let mut out = String::from("Search Matches by Alias\n");
    push_matches(&mut out, flow.matches());
    push_aliases(&mut out, flow.aliases());
    out
}

fn push_matches(out: &mut String, region: &MatchesRegion) {
    if let Some(error) = &region.error {
        let _ = writeln!(out, "Error: {error}");
    }
    if !region.matches.is_empty() {
        let alias = region.alias.as_deref().unwrap_or_default();
        let _ = writeln!(out, "Matches for Alias: {alias}");
        out.push_str(&match_table(&region.matches));
    } else if let Some(notice) = &region.notice {
        let _ = writeln!(out, "{notice}");
    } else if region.searched {
        let alias = region.alias.as_deref().unwrap_or_default();
        let _ = writeln!(out, "No matches for alias {alias}");
    }
}

fn push_aliases(out: &mut String, region: &AliasesRegion) {
    if !region.aliases.is_empty() {
        out.push_str("All Aliases\n");
        out.push_str(&alias_table(&region.aliases));
    } else if region.loaded {
        out.push_str("No aliases enrolled\n");
    }
    if let Some(error) = &region.error {
        let _ = writeln!(out, "Error: {error}");
    }
}

/// Renders the revocation view.
#[must_use]
pub fn render_revocation<B>(flow: &RevocationFlow<B>) -> String {
    let mut out = String::from("Delete Fingerprint\n");
    let _ = writeln!(out, "Fingerprint ID: {}", flow.input());
    push_status(&mut out, flow.status());
    out
}

fn push_status(out: &mut String, status: &StatusLine) {
    if let Some(message) = &status.message {
        let _ = writeln!(out, "{message}");
    }
    if let Some(error) = &status.error {
        let _ = writeln!(out, "Error: {error}");
    }
}

/// Formats match records as an aligned table.
#[must_use]
pub fn match_table(matches: &[MatchRecord]) -> String {
    let rows: Vec<[String; 3]> = matches
        .iter()
        .map(|m| [m.fingerprint_id.to_string(), m.match_id.to_string(), m.timestamp.to_string()])
        .collect();
    table(&["Fingerprint ID", "Match ID", "Timestamp"], &rows)
}

/// Formats alias records as an aligned table.
#[must_use]
pub fn alias_table(aliases: &[AliasRecord]) -> String {
    let rows: Vec<[String; 2]> =
        aliases.iter().map(|a| [a.id.to_string(), a.alias.clone()]).collect();
    table(&["ID", "Alias"], &rows)
}

fn table<const N: usize>(headers: &[&str; N], rows: &[[String; N]]) -> String {
    let mut widths = headers.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut line = |cells: [&str; N]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(padded.join("  ").trim_end());
        out.push('\n');
    };
    line(*headers);
    for row in rows {
        line(std::array::from_fn(|i| row[i].as_str()));
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use fingerprint_portal_sdk::MatchHistory;
    use fingerprint_portal_test_utils::strategies::arb_match_record;
    use fingerprint_portal_types::{FingerprintId, MatchId, Timestamp};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_alias_table_aligns_columns() {
        let table = alias_table(&[AliasRecord::new(1, "amy"), AliasRecord::new(12, "bob")]);
        assert_eq!(table, "ID  Alias\n1   amy\n12  bob\n");
    }

    #[test]
    fn test_match_table_formats_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let table = match_table(&[MatchRecord {
            fingerprint_id: FingerprintId::new(1),
            match_id: MatchId::new(3),
            timestamp: Timestamp::new(at),
        }]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Fingerprint ID  Match ID  Timestamp"));
        assert!(lines[1].contains("2024-05-01T08:00:00Z"));
    }

    #[test]
    fn test_empty_table_has_header_only() {
        assert_eq!(alias_table(&[]), "ID  Alias\n");
    }

    #[test]
    fn test_empty_search_result_lines() {
        let mut region = MatchesRegion::default();
        let ticket = region.begin("amy");
        assert!(region.complete(ticket, Ok(MatchHistory::default())));
        let mut out = String::new();
        push_matches(&mut out, &region);
        assert_eq!(out, "No matches for alias amy\n");

        region.notice = Some("Alias amy not found".to_string());
        out.clear();
        push_matches(&mut out, &region);
        assert_eq!(out, "Alias amy not found\n");

        let _ = region.begin("amy");
        out.clear();
        push_matches(&mut out, &region);
        assert!(out.is_empty(), "{out}");
    }

    proptest! {
        #[test]
        fn prop_match_table_has_one_row_per_record(
            records in proptest::collection::vec(arb_match_record(), 0..16),
        ) {
            let table = match_table(&records);
            let lines: Vec<&str> = table.lines().collect();
            prop_assert_eq!(lines.len(), records.len() + 1);
            for (line, record) in lines[1..].iter().zip(&records) {
                let cells: Vec<&str> = line.split_whitespace().collect();
                prop_assert_eq!(
                    cells,
                    vec![
                        record.fingerprint_id.to_string(),
                        record.match_id.to_string(),
                        record.timestamp.to_string(),
                    ]
                );
            }
        }
    }
}
