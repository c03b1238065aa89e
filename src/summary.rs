//! Ranked summary strings such as `"Shanghai-8, Busan-3, Ningbo-1"`.

use crate::entity::AggregatedRow;

/// Default number of entries kept for truncated categories.
pub const DEFAULT_TOP_N: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    /// Keep the `n` highest counts.
    TopN(usize),
    /// Keep every entry.
    All,
}

/// Sort descending by count (stable, so ties keep input order), truncate,
/// and render as `label-count` joined by `", "`.
pub fn format_ranked(rows: &[AggregatedRow], truncation: Truncation) -> String {
    let mut ranked: Vec<&AggregatedRow> = rows.iter().collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));

    let keep = match truncation {
        Truncation::TopN(n) => n.min(ranked.len()),
        Truncation::All => ranked.len(),
    };

    ranked
        .into_iter()
        .take(keep)
        .map(|r| format!("{}-{}", r.key, r.count))
        .collect::<Vec<_>>()
        .join(", ")
}
