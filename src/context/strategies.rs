//! Renderers for each compression level, from verbatim to bare totals.

use super::classification::{categorize, CategoryCounts, FileCategory};
use super::importance::KeyChangeExtractor;
use crate::fragment::{total_line_stats, ChangeFragment};

/// Separator between per-file blocks
pub const FRAGMENT_DELIMITER: &str = "---";

/// Every fragment verbatim under a `File:` header
pub fn render_full(fragments: &[ChangeFragment]) -> String {
    fragments
        .iter()
        .map(|fragment| {
            format!(
                "File: {}\nChanges:\n{}\n{}",
                fragment.path, fragment.text, FRAGMENT_DELIMITER
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One stats line per fragment followed by its key changes
pub fn render_smart(fragments: &[ChangeFragment], extractor: &KeyChangeExtractor) -> String {
    let separator = format!("\n{}\n", FRAGMENT_DELIMITER);
    fragments
        .iter()
        .map(|fragment| {
            let stats = fragment.line_stats();
            let mut summary = format!(
                "File: {} [{}] (+{} -{})",
                fragment.path,
                categorize(&fragment.path),
                stats.added,
                stats.removed
            );

            let key_changes = extractor.extract(fragment);
            if !key_changes.is_empty() {
                summary.push_str("\nKey changes:");
                for change in key_changes {
                    summary.push_str(&format!("\n  {} {}", change.kind.marker(), change.content));
                }
            }
            summary
        })
        .collect::<Vec<_>>()
        .join(separator.as_str())
}

/// File counts per category plus overall line totals
pub fn render_minimal(fragments: &[ChangeFragment]) -> String {
    let counts = CategoryCounts::from_fragments(fragments);
    let stats = total_line_stats(fragments);

    let parts: Vec<String> = FileCategory::ALL
        .iter()
        .filter(|category| counts.get(**category) > 0)
        .map(|category| format!("{} {} files", counts.get(*category), category.display_name()))
        .collect();
    let files = if parts.is_empty() {
        "no files".to_string()
    } else {
        parts.join(", ")
    };

    format!("Modified: {} (+{} -{} lines)", files, stats.added, stats.removed)
}

/// Fragment count plus overall line totals
pub fn render_extreme(fragments: &[ChangeFragment]) -> String {
    let stats = total_line_stats(fragments);
    format!(
        "Modified {} files (+{} -{} lines)",
        fragments.len(),
        stats.added,
        stats.removed
    )
}
