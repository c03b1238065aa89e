/// Reduce a URL, hostname or free-text website value to a bare lowercase hostname.
///
/// `https://www.Acme.com/about` → `acme.com`. Returns `None` when nothing
/// host-like remains.
pub fn normalize_hostname(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let host = match url::Url::parse(&with_scheme) {
        Ok(parsed) => parsed.host_str()?.to_lowercase(),
        // Fall back to manual splitting for values url rejects (e.g. spaces)
        Err(_) => trimmed
            .split("://")
            .last()
            .unwrap_or(trimmed)
            .split(['/', '?', '#'])
            .next()
            .unwrap_or("")
            .split(':')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase(),
    };

    let host = strip_www(&host).to_string();
    if host.is_empty() || !host.contains('.') {
        return None;
    }
    Some(host)
}

/// Strip a single leading `www.`
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Compare a scraped website value with an entity's known domain.
pub fn domains_match(scraped: &str, known_domain: &str) -> bool {
    match (normalize_hostname(scraped), normalize_hostname(known_domain)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
