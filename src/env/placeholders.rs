use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::env::VarMap;

static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("valid regex"));

// Single pass: inserted values are never re-scanned.
pub fn resolve(input: &str, variables: &VarMap) -> String {
    if !input.contains("{{") {
        return input.to_string();
    }

    PLACEHOLDER_PATTERN
        .replace_all(input, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

pub fn find_unresolved(input: &str) -> IndexSet<String> {
    PLACEHOLDER_PATTERN
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .collect()
}
