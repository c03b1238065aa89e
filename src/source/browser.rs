//! headless Chrome implementation of the extraction source.
//!
//! headless_chrome is blocking, so every page interaction runs on the tokio
//! blocking pool. One tab is reused for the whole run; callers await each
//! operation before issuing the next.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::html::{self, ControlState};
use super::{CandidateLink, DetailPage, ExtractionSource, SearchMode, SectionId, SourceError, SourceResult};
use crate::config::SourceConfig;
use crate::entity::RawRow;
use crate::normalize::ColumnSpec;

/// Pause after clicking a tab so client-side rendering can swap the table.
const RENDER_SETTLE: Duration = Duration::from_millis(500);

/// How often a page snapshot is re-read while waiting for content to render.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Keep the DevTools connection open across slow steps such as the country service call.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

fn browser_err(e: impl std::fmt::Display) -> SourceError {
    SourceError::Browser(e.to_string())
}

/// Run a blocking tab operation off the async runtime.
async fn with_tab<T, F>(tab: &Arc<Tab>, op: F) -> SourceResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Tab) -> SourceResult<T> + Send + 'static,
{
    let tab = Arc::clone(tab);
    tokio::task::spawn_blocking(move || op(&tab))
        .await
        .map_err(|e| SourceError::Browser(format!("Blocking task panicked: {}", e)))?
}

fn navigate(tab: &Tab, url: &str) -> SourceResult<()> {
    tab.navigate_to(url)
        .and_then(|t| t.wait_until_navigated())
        .map_err(|e| SourceError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(())
}

fn wait_for<'a>(tab: &'a Tab, selector: &str, timeout: Duration) -> SourceResult<headless_chrome::Element<'a>> {
    tab.wait_for_element_with_custom_timeout(selector, timeout)
        .map_err(|_| SourceError::Timeout {
            what: selector.to_string(),
            secs: timeout.as_secs(),
        })
}

/// Call `attempt` until it yields a value or `timeout` passes. At least one
/// attempt is always made.
fn poll_until<T>(
    what: &str,
    timeout: Duration,
    mut attempt: impl FnMut() -> SourceResult<Option<T>>,
) -> SourceResult<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = attempt()? {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            return Err(SourceError::Timeout {
                what: what.to_string(),
                secs: timeout.as_secs(),
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// The importer directory driven through a headless Chrome tab.
pub struct BrowserSource {
    _browser: Browser,
    tab: Arc<Tab>,
    config: Arc<SourceConfig>,
}

impl BrowserSource {
    /// Launch Chrome and open a tab.
    /// Disables the sandbox inside containers (detected via /.dockerenv or
    /// VESSELSCOUT_CONTAINER) and honours CHROME_PATH.
    pub fn launch(config: &SourceConfig) -> Result<Self> {
        let is_container = std::env::var("VESSELSCOUT_CONTAINER").is_ok()
            || std::path::Path::new("/.dockerenv").exists();
        let chrome_path: Option<PathBuf> = std::env::var("CHROME_PATH").ok().map(PathBuf::from);

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(!is_container)
            .path(chrome_path)
            .window_size(Some((1440, 900)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("Failed to build Chrome launch options: {}", e))?;

        let browser = Browser::new(options).map_err(|e| anyhow!("Failed to launch headless Chrome: {}", e))?;
        let tab = browser.new_tab().map_err(|e| anyhow!("Failed to create browser tab: {}", e))?;

        Ok(Self {
            _browser: browser,
            tab,
            config: Arc::new(config.clone()),
        })
    }

    /// Sign in with credentials from the configured environment variables.
    pub async fn sign_in_from_env(&self) -> Result<()> {
        let username = std::env::var(&self.config.username_env)
            .with_context(|| format!("Environment variable {} is not set", self.config.username_env))?;
        let password = std::env::var(&self.config.password_env)
            .with_context(|| format!("Environment variable {} is not set", self.config.password_env))?;
        self.sign_in(&username, &password).await
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<()> {
        let config = Arc::clone(&self.config);
        let username = username.to_string();
        let password = password.to_string();

        with_tab(&self.tab, move |tab| {
            let login_url = config.url(&config.login_path);
            let timeout = Duration::from_secs(config.element_timeout_secs);
            navigate(tab, &login_url)?;

            wait_for(tab, &config.selectors.email_input, timeout)?
                .click()
                .and_then(|el| el.type_into(&username))
                .map_err(browser_err)?;
            wait_for(tab, &config.selectors.password_input, timeout)?
                .click()
                .and_then(|el| el.type_into(&password))
                .map_err(browser_err)?;
            wait_for(tab, &config.selectors.submit_button, timeout)?
                .click()
                .map_err(browser_err)?;
            tab.wait_until_navigated().map_err(browser_err)?;
            Ok(())
        })
        .await
        .context("Sign-in failed")
    }
}

#[async_trait]
impl ExtractionSource for BrowserSource {
    type Page = BrowserPage;

    async fn search(&self, term: &str, mode: SearchMode) -> SourceResult<Vec<CandidateLink>> {
        let config = Arc::clone(&self.config);
        let term = term.to_string();

        with_tab(&self.tab, move |tab| {
            let path = match mode {
                SearchMode::Exact => config.search_path.as_str(),
                SearchMode::Fuzzy => config.fuzzy_search_path.as_deref().unwrap_or(&config.search_path),
            };
            let search_url = config.url(path);
            let timeout = Duration::from_secs(config.element_timeout_secs);

            debug!("Searching {} for '{}' ({})", search_url, term, mode);
            navigate(tab, &search_url)?;

            wait_for(tab, &config.selectors.search_box, timeout)?
                .click()
                .and_then(|el| el.type_into(&term))
                .map_err(browser_err)?;

            wait_for(tab, &config.selectors.result_link, timeout)?;
            let content = tab.get_content().map_err(browser_err)?;
            Ok(html::extract_links(&content, &config.selectors.result_link, &search_url))
        })
        .await
    }

    async fn open_detail(&self, url: &str) -> SourceResult<BrowserPage> {
        let target = url.to_string();
        with_tab(&self.tab, move |tab| navigate(tab, &target)).await?;

        Ok(BrowserPage {
            tab: Arc::clone(&self.tab),
            config: Arc::clone(&self.config),
        })
    }
}

/// A detail page currently loaded in the shared tab.
pub struct BrowserPage {
    tab: Arc<Tab>,
    config: Arc<SourceConfig>,
}

#[async_trait]
impl DetailPage for BrowserPage {
    async fn read_section(&self, section: SectionId, columns: ColumnSpec) -> SourceResult<Vec<RawRow>> {
        let config = Arc::clone(&self.config);

        with_tab(&self.tab, move |tab| {
            let section_config = config.section(section);
            let timeout = Duration::from_secs(config.section_timeout_secs);

            if let Some(activate) = &section_config.activate {
                let content = tab.get_content().map_err(browser_err)?;
                match html::control_state(&content, activate) {
                    ControlState::Missing => return Err(SourceError::MissingElement(activate.clone())),
                    ControlState::Disabled => return Err(SourceError::Disabled(activate.clone())),
                    ControlState::Enabled => {}
                }
                wait_for(tab, activate, timeout)?.click().map_err(browser_err)?;
                std::thread::sleep(RENDER_SETTLE);
            }

            wait_for(tab, &section_config.rows, timeout)?;
            let content = tab.get_content().map_err(browser_err)?;
            let rows = html::extract_table_rows(&content, &section_config.rows)
                .iter()
                .map(|cells| columns.project(cells))
                .collect();
            Ok(rows)
        })
        .await
    }

    /// Waits for the label to render; a rendered label with no value reads as `None`.
    async fn read_field(&self, label: &str) -> SourceResult<Option<String>> {
        let label = label.to_string();
        let timeout = Duration::from_secs(self.config.section_timeout_secs);
        with_tab(&self.tab, move |tab| {
            poll_until(&label, timeout, || {
                let content = tab.get_content().map_err(browser_err)?;
                Ok(html::has_label(&content, &label).then(|| html::extract_labeled_field(&content, &label)))
            })
        })
        .await
    }
}
