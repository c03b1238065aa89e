//! Per-entity orchestration and the run loop.
//!
//! For every entity the pipeline resolves the importer page, then reads each
//! section in turn: summary, ocean lanes, air lanes, destination type, service
//! providers. Sections fail independently; a failure is logged against the
//! entity and leaves that field empty. Exactly one record is emitted per
//! entity no matter what failed.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::aggregate::{aggregate, Aggregator};
use crate::checkpoint::CheckpointTracker;
use crate::config::SourceConfig;
use crate::country::{aggregate_by_country, CountryResolver};
use crate::entity::{CountRow, Entity, EntityRecord};
use crate::identity::{Identity, IdentityResolver};
use crate::logger::RunLogger;
use crate::normalize::normalize_rows;
use crate::result_sink::ResultSink;
use crate::source::{DetailPage, ExtractionSource, SectionId, SourceError, SourceResult};
use crate::summary::{format_ranked, Truncation};

/// A unit of failure isolation on the detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    DetailPage,
    Summary,
    Lanes(SectionId),
    CountryEnrichment,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::DetailPage => write!(f, "detail page"),
            Section::Summary => write!(f, "summary"),
            Section::Lanes(id) => write!(f, "{}", id),
            Section::CountryEnrichment => write!(f, "country enrichment"),
        }
    }
}

/// Everything learned about one entity. Built fresh for each entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityOutcome {
    pub identity: Identity,
    pub record: EntityRecord,
    pub failed_sections: Vec<Section>,
    pub country_service_called: bool,
}

impl EntityOutcome {
    fn new(entity: &Entity) -> Self {
        Self {
            identity: Identity::NotFound,
            record: EntityRecord::empty_for(entity),
            failed_sections: Vec::new(),
            country_service_called: false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunOutcome {
    pub processed: usize,
    pub skipped: usize,
    pub interrupted: bool,
}

pub struct EntityPipeline<'a, S: ExtractionSource> {
    source: &'a S,
    countries: CountryResolver<'a>,
    config: &'a SourceConfig,
    top_n: usize,
    logger: RunLogger,
}

impl<'a, S: ExtractionSource> EntityPipeline<'a, S> {
    pub fn new(
        source: &'a S,
        countries: CountryResolver<'a>,
        config: &'a SourceConfig,
        top_n: usize,
        logger: RunLogger,
    ) -> Self {
        Self {
            source,
            countries,
            config,
            top_n,
            logger,
        }
    }

    /// Process one entity start to finish. Never fails.
    pub async fn process_entity(&self, entity: &Entity) -> EntityOutcome {
        let mut outcome = EntityOutcome::new(entity);

        let resolver = IdentityResolver::new(
            self.source,
            self.config.selectors.website_label.as_str(),
            self.config.fuzzy_search,
        );
        outcome.identity = resolver.resolve(entity).await;
        self.logger.record_identity(outcome.identity.url().is_some());

        let Some(url) = outcome.identity.url().map(str::to_string) else {
            self.logger.info(&format!("{}: no importer page found", entity.display_name()));
            return outcome;
        };
        self.logger.info(&format!("{}: {}", entity.display_name(), url));
        outcome.record.detail_url = url.clone();

        let page = match self.source.open_detail(&url).await {
            Ok(page) => page,
            Err(e) => {
                self.section_failed(&mut outcome, entity, Section::DetailPage, &e);
                return outcome;
            }
        };

        match self.read_summary(&page).await {
            Ok((clearances, shipments)) => {
                outcome.record.total_clearances = clearances;
                outcome.record.total_shipments = shipments;
            }
            Err(e) => self.section_failed(&mut outcome, entity, Section::Summary, &e),
        }

        let mut lanes = Aggregator::new();
        for id in [SectionId::OceanLanes, SectionId::AirLanes] {
            match self.read_counts(&page, id).await {
                Ok(rows) => {
                    lanes.merge(&rows);
                }
                Err(e) => self.section_failed(&mut outcome, entity, Section::Lanes(id), &e),
            }
        }
        outcome.record.trade_by_country = self.trade_by_country(&mut outcome, entity, lanes).await;

        match self.read_counts(&page, SectionId::DestinationType).await {
            Ok(rows) => {
                outcome.record.trade_by_destination_type = format_ranked(&aggregate(&rows), Truncation::All);
            }
            Err(e) => self.section_failed(&mut outcome, entity, Section::Lanes(SectionId::DestinationType), &e),
        }

        match self.read_counts(&page, SectionId::ServiceProviders).await {
            Ok(rows) => {
                outcome.record.top_service_providers =
                    format_ranked(&aggregate(&rows), Truncation::TopN(self.top_n));
            }
            Err(e) => self.section_failed(&mut outcome, entity, Section::Lanes(SectionId::ServiceProviders), &e),
        }

        outcome
    }

    async fn read_summary(&self, page: &S::Page) -> SourceResult<(String, String)> {
        let labels = &self.config.sections.summary;
        let clearances = page.read_field(&labels.clearances_label).await?;
        let shipments = page.read_field(&labels.shipments_label).await?;
        Ok((clearances.unwrap_or_default(), shipments.unwrap_or_default()))
    }

    async fn read_counts(&self, page: &S::Page, id: SectionId) -> SourceResult<Vec<CountRow>> {
        let rows = page.read_section(id, self.config.section(id).columns()).await?;
        Ok(normalize_rows(&rows))
    }

    /// Resolve lane ports to countries and rank the countries. A failed
    /// service call degrades to the statically resolved ports.
    async fn trade_by_country(&self, outcome: &mut EntityOutcome, entity: &Entity, lanes: Aggregator) -> String {
        if lanes.is_empty() {
            return String::new();
        }
        let ports = lanes.into_rows();

        let rows = match self.countries.resolve(&ports).await {
            Ok(resolution) => {
                if resolution.service_called {
                    outcome.country_service_called = true;
                    self.logger.record_country_service_call(false);
                }
                resolution.rows
            }
            Err(e) => {
                outcome.country_service_called = true;
                self.logger.record_country_service_call(true);
                warn!(
                    "{}: {} failed, using statically resolved ports only: {}",
                    entity.display_name(),
                    Section::CountryEnrichment,
                    e.source
                );
                outcome.failed_sections.push(Section::CountryEnrichment);
                e.partial
            }
        };

        format_ranked(&aggregate_by_country(&rows), Truncation::TopN(self.top_n))
    }

    fn section_failed(&self, outcome: &mut EntityOutcome, entity: &Entity, section: Section, error: &SourceError) {
        warn!("{}: {} skipped: {}", entity.display_name(), section, error);
        self.logger.record_section_failure();
        outcome.failed_sections.push(section);
    }

    /// Process entities in order, handing each record to the sink. Entities
    /// already recorded in the checkpoint are skipped. The interrupt flag is
    /// checked between entities; whatever is pending is flushed before returning.
    pub async fn run(
        &self,
        entities: &[Entity],
        sink: &mut ResultSink,
        mut tracker: Option<&mut CheckpointTracker>,
        interrupted: &AtomicBool,
    ) -> Result<RunOutcome> {
        let mut run = RunOutcome::default();
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        self.logger.start_progress(entities.len() as u64).await;

        for entity in entities {
            if interrupted.load(Ordering::SeqCst) {
                run.interrupted = true;
                break;
            }

            let seen = occurrences.entry(entity.identity_key()).or_insert(0);
            *seen += 1;
            let key = entity.checkpoint_key(*seen);
            if tracker.as_deref().is_some_and(|t| t.is_completed(&key)) {
                run.skipped += 1;
                self.logger.record_entity_skipped();
                self.logger.advance_progress(1).await;
                continue;
            }

            self.logger.update_progress(entity.display_name()).await;
            let outcome = self.process_entity(entity).await;
            if !outcome.failed_sections.is_empty() {
                let sections: Vec<String> = outcome.failed_sections.iter().map(Section::to_string).collect();
                self.logger.warn(&format!("{}: incomplete sections: {}", entity.display_name(), sections.join(", ")));
            }

            let batch_len = sink.pending() + 1;
            if let Some(t) = tracker.as_deref_mut() {
                t.record_added(&key);
            }
            if sink.add(outcome.record)? {
                self.logger.record_flush(batch_len);
                if let Some(t) = tracker.as_deref_mut() {
                    t.record_flushed()?;
                }
            }

            run.processed += 1;
            self.logger.record_entity_processed();
            self.logger.advance_progress(1).await;
        }

        let remaining = sink.flush()?;
        if remaining > 0 {
            self.logger.record_flush(remaining);
        }
        if let Some(t) = tracker.as_deref_mut() {
            t.record_flushed()?;
        }

        let message = if run.interrupted {
            format!("Interrupted after {} entities", run.processed)
        } else {
            format!("Processed {} entities ({} skipped)", run.processed, run.skipped)
        };
        self.logger.finish_progress(&message).await;

        Ok(run)
    }
}
