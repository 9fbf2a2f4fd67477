//! Registrable-domain extraction for scope identifiers
//!
//! Scope identifiers come as URLs (`https://app.example.com/login`), bare
//! hosts, or wildcards (`*.example.com`). Subdomain enumeration wants the
//! registrable domain (eTLD+1) of each, looked up in the public suffix list.

use std::collections::HashSet;

/// Reduce a scope identifier to its registrable domain
///
/// Strips the scheme, path, port and a leading wildcard label. Falls back to
/// the cleaned host when the public suffix list has no answer. Returns an
/// empty string for empty input.
pub fn extract_domain(identifier: &str) -> String {
    let host = clean_host(identifier);
    if host.is_empty() {
        return String::new();
    }

    match psl::domain_str(&host) {
        Some(domain) => domain.to_string(),
        None => host,
    }
}

/// Registrable domains of a set of identifiers, deduplicated, empties dropped
pub fn registrable_domains<'a, I>(identifiers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = HashSet::new();
    identifiers
        .into_iter()
        .map(|identifier| extract_domain(identifier))
        .filter(|domain| !domain.is_empty())
        .filter(|domain| seen.insert(domain.clone()))
        .collect()
}

fn clean_host(identifier: &str) -> String {
    let trimmed = identifier.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);

    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    // userinfo@host
    let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
    let host = host.split(':').next().unwrap_or_default();
    // Wildcards may repeat (`*.*.example.com`)
    let mut host = host;
    while let Some(rest) = host.strip_prefix("*.") {
        host = rest;
    }

    host.trim_end_matches('.').to_ascii_lowercase()
}
