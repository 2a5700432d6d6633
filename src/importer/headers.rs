use std::collections::HashSet;

use indexmap::IndexMap;

pub const BROWSER_HEADERS: &[&str] = &[
    "host",
    "user-agent",
    "accept-encoding",
    "connection",
    "referer",
    "origin",
    "dnt",
    "priority",
    "pragma",
    "cache-control",
    "te",
    "content-length",
];

pub fn strip_browser_headers(headers: IndexMap<String, String>) -> IndexMap<String, String> {
    headers
        .into_iter()
        .filter(|(name, _)| !is_browser_header(name))
        .collect()
}

fn is_browser_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with(':') || lower.starts_with("sec-") || BROWSER_HEADERS.contains(&lower.as_str())
}

pub fn apply_header_rules(
    headers: IndexMap<String, String>,
    include: Option<&[String]>,
    exclude: Option<&[String]>,
    append: Option<&IndexMap<String, String>>,
) -> IndexMap<String, String> {
    let include_set = include.filter(|slice| !slice.is_empty()).map(lowercase_set);
    let exclude_set = exclude.filter(|slice| !slice.is_empty()).map(lowercase_set);

    let mut present: HashSet<String> = HashSet::new();
    let mut result = IndexMap::with_capacity(headers.len());

    for (name, value) in headers {
        let lower = name.to_ascii_lowercase();
        if let Some(ref include) = include_set {
            if !include.contains(&lower) {
                continue;
            }
        }
        if let Some(ref exclude) = exclude_set {
            if exclude.contains(&lower) {
                continue;
            }
        }
        present.insert(lower);
        result.insert(name, value);
    }

    if let Some(map) = append {
        for (name, value) in map {
            if present.insert(name.to_ascii_lowercase()) {
                result.insert(name.clone(), value.clone());
            }
        }
    }

    result
}

fn lowercase_set(names: &[String]) -> HashSet<String> {
    names.iter().map(|s| s.to_ascii_lowercase()).collect()
}
