//! HTML extraction helpers for importer pages.
//!
//! Everything here works on a rendered page snapshot, so it can be tested
//! without a browser.

use scraper::{ElementRef, Html, Selector};

use super::CandidateLink;

/// Tags that can carry a field label on a detail page.
const LABEL_TAGS: &str = "dt, th, td, label, span, div, p, strong, b, h3, h4, h5";

/// State of a clickable control (tab, toggle) on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Missing,
    Disabled,
    Enabled,
}

fn parse_selector(selector: &str) -> Option<Selector> {
    Selector::parse(selector).ok()
}

/// Collapse runs of whitespace and trim.
fn clean_text(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_label(text: &str) -> String {
    text.trim().trim_end_matches(':').trim().to_lowercase()
}

/// Read every row matched by `row_selector` as a list of cell texts.
/// Blank cells read as `None`.
pub fn extract_table_rows(html: &str, row_selector: &str) -> Vec<Vec<Option<String>>> {
    let (Some(rows), Some(cells)) = (parse_selector(row_selector), parse_selector("td, th")) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    document
        .select(&rows)
        .map(|row| {
            row.select(&cells)
                .map(|cell| {
                    let text = clean_text(&cell);
                    if text.is_empty() {
                        None
                    } else {
                        Some(text)
                    }
                })
                .collect()
        })
        .filter(|cells: &Vec<Option<String>>| !cells.is_empty())
        .collect()
}

/// Collect search-result links, resolved against `base_url`, deduplicated in page order.
pub fn extract_links(html: &str, link_selector: &str, base_url: &str) -> Vec<CandidateLink> {
    let Some(selector) = parse_selector(link_selector) else {
        return Vec::new();
    };
    let base = url::Url::parse(base_url).ok();
    let document = Html::parse_document(html);
    let mut links: Vec<CandidateLink> = Vec::new();

    for el in document.select(&selector) {
        let Some(href) = el.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        let resolved = match &base {
            Some(base) => base.join(href).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        };
        if links.iter().any(|l| l.url == resolved) {
            continue;
        }
        let label = clean_text(&el);
        links.push(CandidateLink {
            url: resolved,
            label: if label.is_empty() { None } else { Some(label) },
        });
    }

    links
}

/// Whether an element carrying `label` has been rendered yet.
pub fn has_label(html: &str, label: &str) -> bool {
    let Some(selector) = parse_selector(LABEL_TAGS) else {
        return false;
    };
    let wanted = normalize_label(label);
    Html::parse_document(html)
        .select(&selector)
        .any(|el| normalize_label(&clean_text(&el)) == wanted)
}

/// Find the value shown next to a field label, e.g. `Company Website: acme.com`.
///
/// The value is taken from the label's next sibling element, or failing that
/// the next sibling of the label's parent. Link text wins over `href` unless
/// the link text is empty.
pub fn extract_labeled_field(html: &str, label: &str) -> Option<String> {
    let selector = parse_selector(LABEL_TAGS)?;
    let wanted = normalize_label(label);
    let document = Html::parse_document(html);

    for el in document.select(&selector) {
        if normalize_label(&clean_text(&el)) != wanted {
            continue;
        }
        // A wrapper whose child carries the label; the child is matched later.
        let child_has_label = el
            .children()
            .filter_map(ElementRef::wrap)
            .any(|c| selector.matches(&c) && normalize_label(&clean_text(&c)) == wanted);
        if child_has_label {
            continue;
        }

        let value_el = el.next_siblings().find_map(ElementRef::wrap).or_else(|| {
            el.parent()
                .and_then(ElementRef::wrap)
                .and_then(|p| p.next_siblings().find_map(ElementRef::wrap))
        });

        if let Some(value) = value_el.and_then(|v| element_value(&v)) {
            return Some(value);
        }
    }

    None
}

fn element_value(el: &ElementRef) -> Option<String> {
    let text = clean_text(el);
    if !text.is_empty() {
        return Some(text);
    }
    let anchor = parse_selector("a[href]")?;
    if el.value().name() == "a" {
        return el.value().attr("href").map(|h| h.trim().to_string()).filter(|h| !h.is_empty());
    }
    el.select(&anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

/// Whether a control exists and can be clicked.
pub fn control_state(html: &str, selector: &str) -> ControlState {
    let Some(selector) = parse_selector(selector) else {
        return ControlState::Missing;
    };
    let document = Html::parse_document(html);
    let Some(el) = document.select(&selector).next() else {
        return ControlState::Missing;
    };

    let attrs = el.value();
    let disabled = attrs.attr("disabled").is_some()
        || attrs.attr("aria-disabled") == Some("true")
        || attrs.classes().any(|c| c == "disabled" || c.ends_with(":disabled"));

    if disabled {
        ControlState::Disabled
    } else {
        ControlState::Enabled
    }
}
