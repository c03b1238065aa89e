//! Configuration management for vesselscout
//!
//! All configuration is loaded from `./config/vesselscout.toml`.
//! Defaults live in the config template, which is embedded in the binary.

use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::normalize::ColumnSpec;
use crate::source::SectionId;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/vesselscout.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/vesselscout.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid CSS selector in '{field}': {selector}")]
    InvalidSelector { field: String, selector: String },

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be greater than zero")]
    ZeroValue { field: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub country_service: CountryServiceConfig,
    #[serde(default)]
    pub country_table: CountryTableConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Remote site the trade data is read from
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    pub login_path: String,
    pub search_path: String,
    #[serde(default)]
    pub fuzzy_search_path: Option<String>,
    pub username_env: String,
    pub password_env: String,
    #[serde(default = "default_true")]
    pub headless: bool,
    pub element_timeout_secs: u64,
    pub section_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub fuzzy_search: bool,
    pub selectors: SelectorConfig,
    pub sections: SectionsConfig,
}

impl SourceConfig {
    /// Join a configured path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn section(&self, id: SectionId) -> &SectionConfig {
        match id {
            SectionId::OceanLanes => &self.sections.ocean_lanes,
            SectionId::AirLanes => &self.sections.air_lanes,
            SectionId::DestinationType => &self.sections.destination_type,
            SectionId::ServiceProviders => &self.sections.service_providers,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    pub email_input: String,
    pub password_input: String,
    pub submit_button: String,
    pub search_box: String,
    pub result_link: String,
    /// Label of the detail-page field holding the company's website
    pub website_label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionsConfig {
    pub summary: SummarySectionConfig,
    pub ocean_lanes: SectionConfig,
    pub air_lanes: SectionConfig,
    pub destination_type: SectionConfig,
    pub service_providers: SectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarySectionConfig {
    pub clearances_label: String,
    pub shipments_label: String,
}

/// One tabular section of the detail page
#[derive(Debug, Clone, Deserialize)]
pub struct SectionConfig {
    /// Tab or toggle clicked before the rows are read
    #[serde(default)]
    pub activate: Option<String>,
    /// Selector matching each table row
    pub rows: String,
    pub key_column: usize,
    pub value_column: usize,
}

impl SectionConfig {
    pub fn columns(&self) -> ColumnSpec {
        ColumnSpec::new(self.key_column, self.value_column)
    }
}

/// Fallback country inference service
#[derive(Debug, Clone, Deserialize)]
pub struct CountryServiceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_service_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_service_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_service_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_service_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_service_timeout_secs() -> u64 {
    30
}

impl Default for CountryServiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_service_endpoint(),
            model: default_service_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_service_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryTableConfig {
    /// JSON file replacing the embedded port table
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_batch_size() -> usize {
    2
}

fn default_top_n() -> usize {
    crate::summary::DEFAULT_TOP_N
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            top_n: default_top_n(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let source = &self.source;

        if !source.base_url.starts_with("https://") && !source.base_url.starts_with("http://") {
            return Err(ConfigError::InvalidUrl {
                field: "source.base_url".to_string(),
                url: source.base_url.clone(),
            });
        }
        require_non_empty("source.search_path", &source.search_path)?;
        require_non_empty("source.login_path", &source.login_path)?;
        require_non_empty("source.username_env", &source.username_env)?;
        require_non_empty("source.password_env", &source.password_env)?;
        require_positive("source.element_timeout_secs", source.element_timeout_secs as usize)?;
        require_positive("source.section_timeout_secs", source.section_timeout_secs as usize)?;

        let selectors = &source.selectors;
        validate_selector("source.selectors.email_input", &selectors.email_input)?;
        validate_selector("source.selectors.password_input", &selectors.password_input)?;
        validate_selector("source.selectors.submit_button", &selectors.submit_button)?;
        validate_selector("source.selectors.search_box", &selectors.search_box)?;
        validate_selector("source.selectors.result_link", &selectors.result_link)?;
        require_non_empty("source.selectors.website_label", &selectors.website_label)?;

        require_non_empty("source.sections.summary.clearances_label", &source.sections.summary.clearances_label)?;
        require_non_empty("source.sections.summary.shipments_label", &source.sections.summary.shipments_label)?;
        for id in SectionId::ALL {
            let section = source.section(id);
            let field = format!("source.sections.{}", id.config_key());
            validate_selector(&format!("{}.rows", field), &section.rows)?;
            if let Some(activate) = &section.activate {
                validate_selector(&format!("{}.activate", field), activate)?;
            }
        }

        if self.country_service.enabled {
            if !self.country_service.endpoint.starts_with("https://")
                && !self.country_service.endpoint.starts_with("http://")
            {
                return Err(ConfigError::InvalidUrl {
                    field: "country_service.endpoint".to_string(),
                    url: self.country_service.endpoint.clone(),
                });
            }
            require_non_empty("country_service.model", &self.country_service.model)?;
            require_positive("country_service.timeout_secs", self.country_service.timeout_secs as usize)?;
        }

        require_positive("output.batch_size", self.output.batch_size)?;
        require_positive("output.top_n", self.output.top_n)?;

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        Self::create_default_config_at(Path::new(CONFIG_PATH))
    }

    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is an interactive terminal
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config() -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config()?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyRequired {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require_positive(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroValue {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_selector(field: &str, selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() || scraper::Selector::parse(selector).is_err() {
        return Err(ConfigError::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
        });
    }
    Ok(())
}
