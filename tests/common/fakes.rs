//! In-memory stand-ins for the importer directory and the country service.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use vesselscout::country::{CountryService, CountryServiceError};
use vesselscout::entity::{AggregatedRow, CountryRow, RawRow};
use vesselscout::normalize::ColumnSpec;
use vesselscout::source::{
    CandidateLink, DetailPage, ExtractionSource, SearchMode, SectionId, SourceError, SourceResult,
};

/// How a scripted source call fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    Timeout,
    Missing,
    Disabled,
}

impl Failure {
    fn to_error(self, what: &str) -> SourceError {
        match self {
            Failure::Timeout => SourceError::Timeout {
                what: what.to_string(),
                secs: 3,
            },
            Failure::Missing => SourceError::MissingElement(what.to_string()),
            Failure::Disabled => SourceError::Disabled(what.to_string()),
        }
    }
}

/// Scripted contents of one detail page.
#[derive(Debug, Clone, Default)]
pub struct FakePageData {
    fields: HashMap<String, String>,
    sections: HashMap<SectionId, Result<Vec<RawRow>, Failure>>,
    field_failure: Option<Failure>,
    failing_fields: HashMap<String, Failure>,
}

impl FakePageData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn website(self, website: &str) -> Self {
        self.field("Company Website", website)
    }

    pub fn field(mut self, label: &str, value: &str) -> Self {
        self.fields.insert(label.to_lowercase(), value.to_string());
        self
    }

    /// Every `read_field` call fails.
    pub fn fields_fail(mut self, failure: Failure) -> Self {
        self.field_failure = Some(failure);
        self
    }

    /// Only reads of `label` fail.
    pub fn failing_field(mut self, label: &str, failure: Failure) -> Self {
        self.failing_fields.insert(label.to_lowercase(), failure);
        self
    }

    pub fn section(mut self, id: SectionId, rows: Vec<RawRow>) -> Self {
        self.sections.insert(id, Ok(rows));
        self
    }

    pub fn failing_section(mut self, id: SectionId, failure: Failure) -> Self {
        self.sections.insert(id, Err(failure));
        self
    }
}

#[derive(Default)]
pub struct FakeSource {
    results: HashMap<(String, SearchMode), Result<Vec<String>, Failure>>,
    pages: HashMap<String, FakePageData>,
    searches: Mutex<Vec<(String, SearchMode)>>,
    opened: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, term: &str, mode: SearchMode, urls: &[&str]) -> Self {
        self.results
            .insert((term.to_string(), mode), Ok(urls.iter().map(|u| u.to_string()).collect()));
        self
    }

    pub fn with_failing_search(mut self, term: &str, mode: SearchMode, failure: Failure) -> Self {
        self.results.insert((term.to_string(), mode), Err(failure));
        self
    }

    pub fn with_page(mut self, url: &str, page: FakePageData) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Every search issued so far, in order.
    pub fn searches(&self) -> Vec<(String, SearchMode)> {
        self.searches.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionSource for FakeSource {
    type Page = FakePage;

    async fn search(&self, term: &str, mode: SearchMode) -> SourceResult<Vec<CandidateLink>> {
        self.searches.lock().unwrap().push((term.to_string(), mode));
        match self.results.get(&(term.to_string(), mode)) {
            Some(Ok(urls)) => Ok(urls.iter().map(CandidateLink::new).collect()),
            Some(Err(failure)) => Err(failure.to_error("search results")),
            // Nothing listed: the result table never appears
            None => Err(Failure::Timeout.to_error("search results")),
        }
    }

    async fn open_detail(&self, url: &str) -> SourceResult<FakePage> {
        self.opened.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(data) => Ok(FakePage { data: data.clone() }),
            None => Err(SourceError::Navigation {
                url: url.to_string(),
                reason: "404".to_string(),
            }),
        }
    }
}

pub struct FakePage {
    data: FakePageData,
}

#[async_trait]
impl DetailPage for FakePage {
    async fn read_section(&self, section: SectionId, _columns: ColumnSpec) -> SourceResult<Vec<RawRow>> {
        match self.data.sections.get(&section) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(failure)) => Err(failure.to_error(section.config_key())),
            None => Err(Failure::Missing.to_error(section.config_key())),
        }
    }

    async fn read_field(&self, label: &str) -> SourceResult<Option<String>> {
        if let Some(failure) = self.data.field_failure {
            return Err(failure.to_error(label));
        }
        if let Some(failure) = self.data.failing_fields.get(&label.to_lowercase()) {
            return Err(failure.to_error(label));
        }
        Ok(self.data.fields.get(&label.to_lowercase()).cloned())
    }
}

/// Replies with a fixed answer (or a malformed-reply error) and records what it was asked.
pub struct ScriptedCountryService {
    reply: Result<Vec<CountryRow>, String>,
    calls: AtomicUsize,
    submitted: Mutex<Vec<AggregatedRow>>,
}

impl ScriptedCountryService {
    pub fn replying(rows: Vec<CountryRow>) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(rows),
            calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        })
    }

    pub fn malformed(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<AggregatedRow> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CountryService for ScriptedCountryService {
    async fn resolve_countries(&self, rows: &[AggregatedRow]) -> Result<Vec<CountryRow>, CountryServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().extend_from_slice(rows);
        self.reply
            .clone()
            .map_err(CountryServiceError::MalformedReply)
    }
}
