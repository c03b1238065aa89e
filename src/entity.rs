use serde::{Deserialize, Serialize};

/// Placeholder used for any entity field missing from the input file.
pub const SENTINEL: &str = "N/A";

/// A target company to look up. Identity is `(company_name, domain)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub company_name: String,
    pub legal_name: String,
    pub domain: String,
    pub location: String,
}

impl Entity {
    pub fn new(
        company_name: impl Into<String>,
        legal_name: impl Into<String>,
        domain: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            legal_name: legal_name.into(),
            domain: domain.into(),
            location: location.into(),
        }
    }

    /// Stable key used by the checkpoint to recognise already-written entities.
    pub fn identity_key(&self) -> String {
        format!("{}|{}", self.company_name, self.domain)
    }

    /// Checkpoint key for the `occurrence`-th (1-based) appearance of this
    /// identity in the input. Repeats get a suffix so each one is tracked.
    pub fn checkpoint_key(&self, occurrence: usize) -> String {
        match occurrence {
            0 | 1 => self.identity_key(),
            n => format!("{}#{}", self.identity_key(), n),
        }
    }

    /// Label for log lines: company name, falling back to the domain.
    pub fn display_name(&self) -> &str {
        if is_sentinel(&self.company_name) {
            &self.domain
        } else {
            &self.company_name
        }
    }
}

/// True when a field holds no usable value.
pub fn is_sentinel(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == SENTINEL
}

/// One raw table row after column projection. Either cell may be unreadable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    pub key: Option<String>,
    pub value_text: Option<String>,
}

impl RawRow {
    pub fn new(key: Option<&str>, value_text: Option<&str>) -> Self {
        Self {
            key: key.map(str::to_string),
            value_text: value_text.map(str::to_string),
        }
    }
}

/// A normalized `(key, count)` pair, not yet merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRow {
    pub key: String,
    pub count: u64,
}

impl CountRow {
    pub fn new(key: impl Into<String>, count: u64) -> Self {
        Self { key: key.into(), count }
    }
}

/// Result of merging `CountRow`s: keys are unique within one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub key: String,
    pub count: u64,
}

impl AggregatedRow {
    pub fn new(key: impl Into<String>, count: u64) -> Self {
        Self { key: key.into(), count }
    }
}

/// A port row with its resolved country, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRow {
    pub key: String,
    pub count: u64,
    pub country: Option<String>,
}

impl CountryRow {
    pub fn unresolved(row: &AggregatedRow) -> Self {
        Self {
            key: row.key.clone(),
            count: row.count,
            country: None,
        }
    }
}

/// Pipeline output for one entity. Summary fields are pre-rendered ranked strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub company_name: String,
    pub detail_url: String,
    pub total_clearances: String,
    pub total_shipments: String,
    pub top_service_providers: String,
    pub trade_by_country: String,
    pub trade_by_destination_type: String,
}

impl EntityRecord {
    /// A record carrying only the company name; every other field is empty.
    pub fn empty_for(entity: &Entity) -> Self {
        Self {
            company_name: entity.company_name.clone(),
            ..Self::default()
        }
    }
}
