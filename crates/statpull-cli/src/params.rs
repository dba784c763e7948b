//! `-p key=value` handling.

use std::collections::HashSet;

use statpull::QueryParams;

/// clap value parser for a single `key=value` pair.
pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

/// Start from `defaults` and apply user pairs on top.
///
/// The first user pair for a key replaces its default; later pairs with
/// the same key extend it into a list.
pub fn merge(defaults: &[(&str, &str)], pairs: &[(String, String)]) -> QueryParams {
    let mut params = QueryParams::new();
    for (key, value) in defaults {
        params.insert(key, *value);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (key, value) in pairs {
        if seen.insert(key.as_str()) {
            params.insert(key, value.as_str());
        } else {
            params.push(key, value);
        }
    }
    params
}
