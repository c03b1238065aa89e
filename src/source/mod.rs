//! Extraction source: the remote importer directory the trade data is read from.
//!
//! The pipeline only talks to the [`ExtractionSource`] and [`DetailPage`]
//! traits. `browser` drives the real site with headless Chrome; `html` holds
//! the pure parsing helpers it uses.

pub mod browser;
pub mod html;

use async_trait::async_trait;
use thiserror::Error;

use crate::entity::RawRow;
use crate::normalize::ColumnSpec;

pub use browser::BrowserSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("Element not found: {0}")]
    MissingElement(String),

    #[error("Control is disabled: {0}")]
    Disabled(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Browser error: {0}")]
    Browser(String),
}

impl SourceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SourceError::Timeout { .. })
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Tabular sections of an importer's detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionId {
    OceanLanes,
    AirLanes,
    DestinationType,
    ServiceProviders,
}

impl SectionId {
    pub const ALL: [SectionId; 4] = [
        SectionId::OceanLanes,
        SectionId::AirLanes,
        SectionId::DestinationType,
        SectionId::ServiceProviders,
    ];

    /// Key of this section's table in the config file
    pub fn config_key(&self) -> &'static str {
        match self {
            SectionId::OceanLanes => "ocean_lanes",
            SectionId::AirLanes => "air_lanes",
            SectionId::DestinationType => "destination_type",
            SectionId::ServiceProviders => "service_providers",
        }
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionId::OceanLanes => write!(f, "ocean trade lanes"),
            SectionId::AirLanes => write!(f, "air trade lanes"),
            SectionId::DestinationType => write!(f, "destination type"),
            SectionId::ServiceProviders => write!(f, "service providers"),
        }
    }
}

/// Which search listing to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    Exact,
    Fuzzy,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Exact => write!(f, "exact"),
            SearchMode::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// A search hit pointing at an importer detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub url: String,
    pub label: Option<String>,
}

impl CandidateLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: None,
        }
    }
}

/// Outcome of a single lookup probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Found(T),
    NotFound,
    TimedOut,
}

impl<T> Probe<T> {
    /// Fold a source call into a probe: timeouts and absent results are
    /// ordinary outcomes, other errors read as "nothing found".
    pub fn from_result(result: SourceResult<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Probe::Found(value),
            Ok(None) => Probe::NotFound,
            Err(e) if e.is_timeout() => Probe::TimedOut,
            Err(_) => Probe::NotFound,
        }
    }
}

/// Search and navigation over the importer directory.
#[async_trait]
pub trait ExtractionSource: Send + Sync {
    type Page: DetailPage;

    async fn search(&self, term: &str, mode: SearchMode) -> SourceResult<Vec<CandidateLink>>;

    async fn open_detail(&self, url: &str) -> SourceResult<Self::Page>;
}

/// An opened importer detail page.
#[async_trait]
pub trait DetailPage: Send + Sync {
    async fn read_section(&self, section: SectionId, columns: ColumnSpec) -> SourceResult<Vec<RawRow>>;

    async fn read_field(&self, label: &str) -> SourceResult<Option<String>>;
}
