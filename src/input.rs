//! Entity list loading from CSV or JSON files
//!
//! Supports:
//! - CSV with a header row (`companyName`, `domain`, `legalName`, `location`,
//!   plus a few common spellings of each)
//! - CSV with one domain per line and no header
//! - JSON: an array of objects, an array of domain strings, or `{"entities": [...]}`
//!
//! Missing fields become the `N/A` placeholder. Domains are reduced to a bare
//! hostname. Rows with neither a domain nor a company name are skipped.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::domain_utils::normalize_hostname;
use crate::entity::{is_sentinel, Entity, SENTINEL};

const COMPANY_COLUMNS: &[&str] = &["companyname", "company_name", "company", "name"];
const DOMAIN_COLUMNS: &[&str] = &["domain", "website"];
const LEGAL_NAME_COLUMNS: &[&str] = &["legalname", "legal_name"];
const LOCATION_COLUMNS: &[&str] = &["location"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("csv") => Some(Self::Csv),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Load the entity list from a file (format from extension)
pub fn load_entities(path: &Path) -> Result<Vec<Entity>> {
    let format = InputFormat::from_path(path).with_context(|| {
        format!("Cannot determine input format from file extension. Expected .csv or .json: {}", path.display())
    })?;

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    match format {
        InputFormat::Csv => parse_csv_entities(&content),
        InputFormat::Json => parse_json_entities(&content),
    }
}

/// Trimmed value or the placeholder.
fn field_or_sentinel(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| SENTINEL.to_string())
}

/// Build an entity from raw field values, or `None` if it cannot be looked up at all.
fn build_entity(
    company_name: Option<&str>,
    domain: Option<&str>,
    legal_name: Option<&str>,
    location: Option<&str>,
) -> Option<Entity> {
    let domain = domain
        .and_then(normalize_hostname)
        .unwrap_or_else(|| SENTINEL.to_string());
    let company_name = field_or_sentinel(company_name);

    if is_sentinel(&domain) && is_sentinel(&company_name) {
        return None;
    }

    Some(Entity::new(
        company_name,
        field_or_sentinel(legal_name),
        domain,
        field_or_sentinel(location),
    ))
}

fn column_index(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
}

/// Parse entities from CSV content
pub fn parse_csv_entities(content: &str) -> Result<Vec<Entity>> {
    let Some(first_line) = content.lines().find(|l| !l.trim().is_empty()) else {
        return Ok(Vec::new());
    };

    let first_cells: Vec<String> = first_line.split(',').map(|c| c.trim().trim_matches('"').to_lowercase()).collect();
    let has_header = first_cells.iter().any(|c| {
        COMPANY_COLUMNS.contains(&c.as_str()) || DOMAIN_COLUMNS.contains(&c.as_str())
    });

    let mut entities = Vec::new();

    if !has_header {
        for line in content.lines() {
            let domain = line.split(',').next().unwrap_or(line).trim();
            if domain.is_empty() || domain.starts_with('#') {
                continue;
            }
            if let Some(entity) = build_entity(None, Some(domain), None, None) {
                entities.push(entity);
            }
        }
        return Ok(entities);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers().context("Failed to read CSV headers")?.clone();
    let company_idx = column_index(&headers, COMPANY_COLUMNS);
    let domain_idx = column_index(&headers, DOMAIN_COLUMNS);
    let legal_idx = column_index(&headers, LEGAL_NAME_COLUMNS);
    let location_idx = column_index(&headers, LOCATION_COLUMNS);

    for result in reader.records() {
        let record = result.context("Failed to parse CSV record")?;
        let get = |idx: Option<usize>| idx.and_then(|i| record.get(i));
        if let Some(entity) = build_entity(get(company_idx), get(domain_idx), get(legal_idx), get(location_idx)) {
            entities.push(entity);
        }
    }

    Ok(entities)
}

/// Parse entities from JSON content
pub fn parse_json_entities(content: &str) -> Result<Vec<Entity>> {
    let value: Value = serde_json::from_str(content).context("Failed to parse JSON content")?;

    let items = match &value {
        Value::Array(arr) => arr,
        Value::Object(obj) => match obj.get("entities") {
            Some(Value::Array(arr)) => arr,
            Some(_) => bail!("'entities' field must be an array"),
            None => bail!("JSON object must have an 'entities' array field"),
        },
        _ => bail!("JSON must be an array of entities or an object with an 'entities' field"),
    };

    Ok(items.iter().filter_map(json_entity).collect())
}

fn json_field<'v>(obj: &'v Map<String, Value>, names: &[&str]) -> Option<&'v str> {
    obj.iter()
        .find(|(k, _)| names.contains(&k.to_lowercase().as_str()))
        .and_then(|(_, v)| v.as_str())
}

fn json_entity(item: &Value) -> Option<Entity> {
    match item {
        Value::String(domain) => build_entity(None, Some(domain), None, None),
        Value::Object(obj) => build_entity(
            json_field(obj, COMPANY_COLUMNS),
            json_field(obj, DOMAIN_COLUMNS),
            json_field(obj, LEGAL_NAME_COLUMNS),
            json_field(obj, LOCATION_COLUMNS),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_with_header() {
        let csv = "companyName,domain,legalName,location\n\
                   Acme,https://www.acme.com/about,Acme Widgets Inc,\"Austin, TX\"\n\
                   Globex,globex.com,,\n";
        let entities = parse_csv_entities(csv).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].domain, "acme.com");
        assert_eq!(entities[0].location, "Austin, TX");
        assert_eq!(entities[1].legal_name, SENTINEL);
        assert_eq!(entities[1].location, SENTINEL);
    }

    #[test]
    fn test_csv_header_aliases_and_order() {
        let csv = "Website,Name\nacme.com,Acme\n";
        let entities = parse_csv_entities(csv).unwrap();
        assert_eq!(entities[0].company_name, "Acme");
        assert_eq!(entities[0].domain, "acme.com");
    }

    #[test]
    fn test_csv_one_domain_per_line() {
        let csv = "acme.com\n# comment\n\nwww.globex.com\n";
        let entities = parse_csv_entities(csv).unwrap();
        let domains: Vec<&str> = entities.iter().map(|e| e.domain.as_str()).collect();
        assert_eq!(domains, vec!["acme.com", "globex.com"]);
        assert_eq!(entities[0].company_name, SENTINEL);
    }

    #[test]
    fn test_rows_without_name_or_domain_are_skipped() {
        let csv = "companyName,domain\n,\nInitech,\n";
        let entities = parse_csv_entities(csv).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].company_name, "Initech");
        assert_eq!(entities[0].domain, SENTINEL);
    }

    #[test]
    fn test_json_shapes() {
        let objects = r#"[{"companyName": "Acme", "domain": "acme.com", "legal_name": "Acme Inc"}]"#;
        let e = parse_json_entities(objects).unwrap();
        assert_eq!(e[0].legal_name, "Acme Inc");

        let strings = r#"["acme.com", "", 42, "globex.com"]"#;
        assert_eq!(parse_json_entities(strings).unwrap().len(), 2);

        let wrapped = r#"{"entities": [{"name": "Acme", "website": "http://acme.com"}]}"#;
        let e = parse_json_entities(wrapped).unwrap();
        assert_eq!(e[0].domain, "acme.com");
    }

    #[test]
    fn test_json_invalid_root() {
        assert!(parse_json_entities(r#"{"domains": []}"#).is_err());
        assert!(parse_json_entities("\"acme.com\"").is_err());
    }

    #[test]
    fn test_unknown_extension() {
        assert!(load_entities(Path::new("companies.txt")).is_err());
    }
}
