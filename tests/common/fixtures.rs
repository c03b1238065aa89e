use std::path::PathBuf;

use vesselscout::entity::{AggregatedRow, CountryRow, Entity, RawRow};

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

pub fn entity(company: &str, domain: &str) -> Entity {
    Entity::new(company, "N/A", domain, "N/A")
}

/// Table rows as `(key, count)` pairs.
pub fn raw_rows(pairs: &[(&str, &str)]) -> Vec<RawRow> {
    pairs.iter().map(|(k, v)| RawRow::new(Some(k), Some(v))).collect()
}

pub fn aggregated(pairs: &[(&str, u64)]) -> Vec<AggregatedRow> {
    pairs.iter().map(|(k, c)| AggregatedRow::new(*k, *c)).collect()
}

pub fn country_row(key: &str, count: u64, country: Option<&str>) -> CountryRow {
    CountryRow {
        key: key.to_string(),
        count,
        country: country.map(str::to_string),
    }
}

/// The shipped default configuration.
pub fn default_config() -> vesselscout::config::AppConfig {
    toml::from_str(vesselscout::config::DEFAULT_CONFIG).expect("default config parses")
}
