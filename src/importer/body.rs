use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub(crate) const RAW_BODY_KEY: &str = "data";

// Fallback for payloads that look like objects but are not valid JSON,
// e.g. single-quoted shell fragments with trailing commas.
static LOOSE_PAIR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"]+)"\s*:\s*"([^"]+)"|"([^"]+)"\s*:\s*([^,}]+)"#).expect("valid regex")
});

pub(crate) fn looks_like_object(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

// Top level only; non-string values keep their compact JSON text.
pub(crate) fn flatten_json_object(text: &str) -> Option<IndexMap<String, String>> {
    let Value::Object(map) = serde_json::from_str::<Value>(text.trim()).ok()? else {
        return None;
    };

    Some(
        map.into_iter()
            .map(|(key, value)| {
                let flat = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, flat)
            })
            .collect(),
    )
}

pub(crate) fn scan_loose_pairs(text: &str) -> IndexMap<String, String> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(trimmed);

    LOOSE_PAIR_PATTERN
        .captures_iter(inner)
        .filter_map(|caps| {
            let key = caps.get(1).or_else(|| caps.get(3))?;
            let value = caps.get(2).or_else(|| caps.get(4))?;
            Some((key.as_str().trim().to_string(), value.as_str().trim().to_string()))
        })
        .collect()
}

pub(crate) fn raw_body(text: &str) -> IndexMap<String, String> {
    let mut body = IndexMap::new();
    body.insert(RAW_BODY_KEY.to_string(), text.to_string());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_json_object_stringifies_non_strings() {
        let body =
            flatten_json_object(r#"{"name":"ada","age":36,"admin":true,"tags":["a"],"meta":{"k":1},"nick":null}"#)
                .unwrap();
        assert_eq!(body["name"], "ada");
        assert_eq!(body["age"], "36");
        assert_eq!(body["admin"], "true");
        assert_eq!(body["tags"], r#"["a"]"#);
        assert_eq!(body["meta"], r#"{"k":1}"#);
        assert_eq!(body["nick"], "null");
        assert_eq!(
            body.keys().collect::<Vec<_>>(),
            vec!["name", "age", "admin", "tags", "meta", "nick"]
        );
    }

    #[test]
    fn flatten_json_object_rejects_non_objects() {
        assert!(flatten_json_object("[1,2]").is_none());
        assert!(flatten_json_object("{not json}").is_none());
    }

    #[test]
    fn scan_loose_pairs_reads_quoted_and_bare_values() {
        let body = scan_loose_pairs(r#"{"a": "b", "n": 12, "flag": true,}"#);
        assert_eq!(body["a"], "b");
        assert_eq!(body["n"], "12");
        assert_eq!(body["flag"], "true");
    }
}
