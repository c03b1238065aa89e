//! Port → country enrichment.
//!
//! Resolution runs in two stages:
//! 1. every port key is probed against the static alias table (first alias wins)
//! 2. whatever is still unresolved goes to the [`CountryService`] in a single batch
//!
//! A failed or unparseable service reply never loses the stage-1 results; they
//! travel back inside [`EnrichmentError`] so callers can degrade to them.

pub mod service;
pub mod table;

pub use service::{ChatCountryService, CountryService, CountryServiceError};
pub use table::CountryTable;

use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::aggregate::Aggregator;
use crate::entity::{AggregatedRow, CountryRow};

/// The service call failed; `partial` holds the statically resolved rows.
#[derive(Debug, Error)]
#[error("country enrichment failed: {source}")]
pub struct EnrichmentError {
    pub partial: Vec<CountryRow>,
    pub source: CountryServiceError,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub rows: Vec<CountryRow>,
    /// Whether the fallback service was called for this batch.
    pub service_called: bool,
}

pub struct CountryResolver<'a> {
    table: &'a CountryTable,
    service: Option<&'a dyn CountryService>,
}

impl<'a> CountryResolver<'a> {
    pub fn new(table: &'a CountryTable, service: Option<&'a dyn CountryService>) -> Self {
        Self { table, service }
    }

    /// Stage 1 only.
    pub fn resolve_static(&self, rows: &[AggregatedRow]) -> Vec<CountryRow> {
        rows.iter()
            .map(|row| CountryRow {
                key: row.key.clone(),
                count: row.count,
                country: self.table.lookup(&row.key).map(str::to_string),
            })
            .collect()
    }

    /// Both stages. The service is called at most once, and only when some
    /// row has no static match.
    pub async fn resolve(&self, rows: &[AggregatedRow]) -> Result<Resolution, EnrichmentError> {
        let mut resolved = self.resolve_static(rows);

        let unresolved: Vec<AggregatedRow> = resolved
            .iter()
            .filter(|r| r.country.is_none())
            .map(|r| AggregatedRow::new(r.key.clone(), r.count))
            .collect();

        let Some(service) = self.service.filter(|_| !unresolved.is_empty()) else {
            return Ok(Resolution {
                rows: resolved,
                service_called: false,
            });
        };

        debug!("{} of {} ports need the country service", unresolved.len(), resolved.len());

        let reply = match service.resolve_countries(&unresolved).await {
            Ok(reply) => reply,
            Err(source) => {
                return Err(EnrichmentError {
                    partial: resolved,
                    source,
                })
            }
        };

        // Only submitted keys are applied; the first reply entry per key wins.
        let mut answers: HashMap<&str, &str> = HashMap::new();
        for row in &reply {
            if let Some(country) = row.country.as_deref() {
                answers.entry(row.key.trim()).or_insert(country);
            }
        }

        let mut filled = 0;
        for row in resolved.iter_mut().filter(|r| r.country.is_none()) {
            if let Some(country) = answers.get(row.key.trim()) {
                row.country = Some((*country).to_string());
                filled += 1;
            }
        }
        debug!("Country service resolved {} of {} submitted ports", filled, unresolved.len());

        Ok(Resolution {
            rows: resolved,
            service_called: true,
        })
    }
}

/// Group rows by country, summing counts. Rows without a country are skipped.
pub fn aggregate_by_country(rows: &[CountryRow]) -> Vec<AggregatedRow> {
    let mut agg = Aggregator::new();
    for row in rows {
        if let Some(country) = &row.country {
            agg.add(country, row.count);
        }
    }
    agg.into_rows()
}
