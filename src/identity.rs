//! Identity resolution: find the importer detail page belonging to an entity.
//!
//! Lookups run in a fixed order (domain, then name variants, then the same
//! variants against fuzzy search). Every candidate is verified by comparing
//! the detail page's company website with the entity's own domain, so a
//! permissive name search can never produce a match on its own.

use tracing::{debug, info};

use crate::domain_utils::{domains_match, normalize_hostname};
use crate::entity::{is_sentinel, Entity};
use crate::source::{CandidateLink, DetailPage, ExtractionSource, Probe, SearchMode};

/// Which entity field a search term came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Domain,
    LegalName,
    CompanyName,
    CompanyNameCompact,
    LegalNameCompact,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Domain => write!(f, "domain"),
            Strategy::LegalName => write!(f, "legal name"),
            Strategy::CompanyName => write!(f, "company name"),
            Strategy::CompanyNameCompact => write!(f, "company name without spaces"),
            Strategy::LegalNameCompact => write!(f, "legal name without spaces"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupStep {
    pub strategy: Strategy,
    pub mode: SearchMode,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Found { url: String, step: LookupStep },
    NotFound,
}

impl Identity {
    pub fn url(&self) -> Option<&str> {
        match self {
            Identity::Found { url, .. } => Some(url),
            Identity::NotFound => None,
        }
    }
}

/// Name variants in lookup order. Blank and placeholder values are skipped,
/// as are repeats of an earlier term.
fn name_variants(entity: &Entity) -> Vec<(Strategy, String)> {
    let compact = |s: &str| s.split_whitespace().collect::<String>();
    let candidates = [
        (Strategy::LegalName, entity.legal_name.trim().to_string()),
        (Strategy::CompanyName, entity.company_name.trim().to_string()),
        (Strategy::CompanyNameCompact, compact(&entity.company_name)),
        (Strategy::LegalNameCompact, compact(&entity.legal_name)),
    ];

    let mut seen: Vec<String> = Vec::new();
    let mut variants = Vec::new();
    for (strategy, term) in candidates {
        if is_sentinel(&term) || seen.iter().any(|s| s.eq_ignore_ascii_case(&term)) {
            continue;
        }
        seen.push(term.clone());
        variants.push((strategy, term));
    }
    variants
}

/// Full ordered lookup plan for an entity.
pub fn lookup_plan(entity: &Entity, fuzzy: bool) -> Vec<LookupStep> {
    let mut steps = Vec::new();

    if let Some(domain) = normalize_hostname(&entity.domain) {
        steps.push(LookupStep {
            strategy: Strategy::Domain,
            mode: SearchMode::Exact,
            term: domain,
        });
    }

    let variants = name_variants(entity);
    let modes: &[SearchMode] = if fuzzy {
        &[SearchMode::Exact, SearchMode::Fuzzy]
    } else {
        &[SearchMode::Exact]
    };
    for &mode in modes {
        for (strategy, term) in &variants {
            steps.push(LookupStep {
                strategy: *strategy,
                mode,
                term: term.clone(),
            });
        }
    }

    steps
}

pub struct IdentityResolver<'a, S: ExtractionSource> {
    source: &'a S,
    website_label: String,
    fuzzy: bool,
}

impl<'a, S: ExtractionSource> IdentityResolver<'a, S> {
    pub fn new(source: &'a S, website_label: impl Into<String>, fuzzy: bool) -> Self {
        Self {
            source,
            website_label: website_label.into(),
            fuzzy,
        }
    }

    /// Walk the lookup plan until a verified candidate turns up.
    pub async fn resolve(&self, entity: &Entity) -> Identity {
        if normalize_hostname(&entity.domain).is_none() {
            info!("{}: no usable domain, cannot verify any candidate", entity.display_name());
            return Identity::NotFound;
        }

        for step in lookup_plan(entity, self.fuzzy) {
            match self.probe(&step, &entity.domain).await {
                Probe::Found(url) => {
                    info!(
                        "{}: matched via {} ({} search) -> {}",
                        entity.display_name(),
                        step.strategy,
                        step.mode,
                        url
                    );
                    return Identity::Found { url, step };
                }
                Probe::TimedOut => {
                    debug!("{}: {} search for '{}' timed out", entity.display_name(), step.mode, step.term);
                }
                Probe::NotFound => {
                    debug!("{}: no verified match for '{}' ({})", entity.display_name(), step.term, step.mode);
                }
            }
        }

        info!("{}: no importer page found", entity.display_name());
        Identity::NotFound
    }

    /// Search once and verify each candidate against `domain`.
    pub async fn probe(&self, step: &LookupStep, domain: &str) -> Probe<String> {
        let candidates = match Probe::from_result(self.source.search(&step.term, step.mode).await.map(Some)) {
            Probe::Found(c) => c,
            Probe::NotFound => return Probe::NotFound,
            Probe::TimedOut => return Probe::TimedOut,
        };

        for candidate in candidates {
            if self.verify(&candidate, domain).await {
                return Probe::Found(candidate.url);
            }
        }
        Probe::NotFound
    }

    /// Open a candidate and compare its company website with `domain`.
    pub async fn verify(&self, candidate: &CandidateLink, domain: &str) -> bool {
        let page = match self.source.open_detail(&candidate.url).await {
            Ok(page) => page,
            Err(e) => {
                debug!("Could not open candidate {}: {}", candidate.url, e);
                return false;
            }
        };

        match page.read_field(&self.website_label).await {
            Ok(Some(website)) => {
                let matched = domains_match(&website, domain);
                debug!(
                    "Candidate {} ({}) website '{}' vs '{}': {}",
                    candidate.label.as_deref().unwrap_or("unlabelled"),
                    candidate.url,
                    website,
                    domain,
                    matched
                );
                matched
            }
            Ok(None) => false,
            Err(e) => {
                debug!("Could not read website of {}: {}", candidate.url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SENTINEL;

    #[test]
    fn test_lookup_plan_order() {
        let entity = Entity::new("Acme Widgets", "Acme Widgets Holdings Inc", "https://www.acme.com", "US");
        let plan = lookup_plan(&entity, true);
        let steps: Vec<(Strategy, SearchMode, &str)> =
            plan.iter().map(|s| (s.strategy, s.mode, s.term.as_str())).collect();
        assert_eq!(
            steps,
            vec![
                (Strategy::Domain, SearchMode::Exact, "acme.com"),
                (Strategy::LegalName, SearchMode::Exact, "Acme Widgets Holdings Inc"),
                (Strategy::CompanyName, SearchMode::Exact, "Acme Widgets"),
                (Strategy::CompanyNameCompact, SearchMode::Exact, "AcmeWidgets"),
                (Strategy::LegalNameCompact, SearchMode::Exact, "AcmeWidgetsHoldingsInc"),
                (Strategy::LegalName, SearchMode::Fuzzy, "Acme Widgets Holdings Inc"),
                (Strategy::CompanyName, SearchMode::Fuzzy, "Acme Widgets"),
                (Strategy::CompanyNameCompact, SearchMode::Fuzzy, "AcmeWidgets"),
                (Strategy::LegalNameCompact, SearchMode::Fuzzy, "AcmeWidgetsHoldingsInc"),
            ]
        );
    }

    #[test]
    fn test_lookup_plan_skips_placeholders_and_repeats() {
        let entity = Entity::new("Acme", SENTINEL, "acme.com", SENTINEL);
        let plan = lookup_plan(&entity, false);
        let terms: Vec<&str> = plan.iter().map(|s| s.term.as_str()).collect();
        // compact "Acme" equals "Acme"
        assert_eq!(terms, vec!["acme.com", "Acme"]);
    }

    #[test]
    fn test_lookup_plan_without_domain() {
        let entity = Entity::new("Acme", "Acme Inc", SENTINEL, SENTINEL);
        let plan = lookup_plan(&entity, false);
        assert!(plan.iter().all(|s| s.strategy != Strategy::Domain));
    }
}
