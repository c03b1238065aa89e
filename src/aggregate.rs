//! Merge rows that share a key, summing their counts.

use std::collections::HashMap;

use crate::entity::{AggregatedRow, CountRow};

/// Running key→count fold that remembers first-seen key order.
#[derive(Debug, Default, Clone)]
pub struct Aggregator {
    rows: Vec<AggregatedRow>,
    index: HashMap<String, usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one count to `key`.
    pub fn add(&mut self, key: &str, count: u64) {
        match self.index.get(key) {
            Some(&idx) => {
                let row = &mut self.rows[idx];
                row.count = row.count.saturating_add(count);
            }
            None => {
                self.index.insert(key.to_string(), self.rows.len());
                self.rows.push(AggregatedRow::new(key, count));
            }
        }
    }

    /// Fold normalized rows in.
    pub fn merge<'a>(&mut self, rows: impl IntoIterator<Item = &'a CountRow>) -> &mut Self {
        for row in rows {
            self.add(&row.key, row.count);
        }
        self
    }

    /// Fold a previous aggregation in.
    pub fn merge_aggregated<'a>(
        &mut self,
        rows: impl IntoIterator<Item = &'a AggregatedRow>,
    ) -> &mut Self {
        for row in rows {
            self.add(&row.key, row.count);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    pub fn into_rows(self) -> Vec<AggregatedRow> {
        self.rows
    }
}

/// Aggregate a single sequence of rows.
pub fn aggregate(rows: &[CountRow]) -> Vec<AggregatedRow> {
    let mut agg = Aggregator::new();
    agg.merge(rows);
    agg.into_rows()
}
