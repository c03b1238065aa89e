//! Static port alias → country table.
//!
//! Shipped as `config/port_countries.json` and embedded in the binary; a
//! user-supplied file with the same shape can replace it at startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Embedded default table.
pub const DEFAULT_TABLE: &str = include_str!("../../config/port_countries.json");

/// On-disk table format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortCountryDatabase {
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Map of port alias -> country
    pub ports: HashMap<String, String>,
}

/// Case-insensitive alias lookup, loaded once per process.
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    aliases: HashMap<String, String>,
}

impl CountryTable {
    pub fn from_database(db: PortCountryDatabase) -> Self {
        let aliases = db
            .ports
            .into_iter()
            .filter_map(|(alias, country)| {
                let alias = normalize_alias(&alias);
                let country = country.trim().to_string();
                if alias.is_empty() || country.is_empty() {
                    None
                } else {
                    Some((alias, country))
                }
            })
            .collect();
        Self { aliases }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let ports = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        Self::from_database(PortCountryDatabase {
            version: "inline".to_string(),
            description: String::new(),
            ports,
        })
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let db: PortCountryDatabase =
            serde_json::from_str(content).context("Failed to parse port country table")?;
        Ok(Self::from_database(db))
    }

    /// The table compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_json(DEFAULT_TABLE)
    }

    /// Load from `path` if given, otherwise use the embedded table.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read port country table: {}", p.display()))?;
                let table = Self::from_json(&content)?;
                debug!("Loaded {} port aliases from {}", table.len(), p.display());
                Ok(table)
            }
            None => Self::embedded(),
        }
    }

    /// Look up a single alias.
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.aliases.get(&normalize_alias(alias)).map(String::as_str)
    }

    /// Look up a port key that may list several `;`-separated aliases.
    /// Aliases are probed left to right and the first hit wins.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        key.split(';')
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .find_map(|alias| self.get(alias))
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

fn normalize_alias(alias: &str) -> String {
    alias.trim().to_lowercase()
}
