use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::model::{Method, Request};

use super::body::{flatten_json_object, looks_like_object, raw_body};
use super::naming::generate_name;

const SUMMARY_URL_LIMIT: usize = 80;

#[derive(Debug, Deserialize)]
struct HarEntry {
    request: Option<HarRequest>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct HarRequest {
    method: Option<String>,
    url: Option<String>,
    headers: Vec<HarNameValue>,
    #[serde(rename = "postData")]
    post_data: Option<HarPostData>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct HarNameValue {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct HarPostData {
    text: Option<String>,
    params: Option<Vec<HarNameValue>>,
}

/// One request per usable entry, in entry order. Malformed entries are
/// skipped; only an archive yielding no requests is an error.
pub fn parse_har(text: &str) -> Result<Vec<Request>, ParseError> {
    let entries = read_entries(text)?;

    let mut requests = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match convert_entry(entry) {
            Ok(Some(request)) => requests.push(request),
            Ok(None) => tracing::debug!(index, "skipping HAR entry without request url"),
            Err(err) => tracing::warn!(index, error = %err, "failed to parse HAR entry"),
        }
    }

    if requests.is_empty() {
        return Err(ParseError::new("No valid HTTP requests found in HAR file"));
    }
    Ok(requests)
}

pub fn har_entry_summaries(text: &str) -> Result<Vec<String>, ParseError> {
    let entries = read_entries(text)?;
    if entries.is_empty() {
        return Err(ParseError::new("No entries found in HAR file"));
    }

    Ok(entries
        .iter()
        .map(|entry| {
            let request = entry.get("request");
            let method = request
                .and_then(|r| r.get("method"))
                .and_then(Value::as_str)
                .unwrap_or("GET");
            let url = request
                .and_then(|r| r.get("url"))
                .and_then(Value::as_str)
                .unwrap_or("");
            format!("{method} {}", truncate(url, SUMMARY_URL_LIMIT))
        })
        .collect())
}

fn read_entries(text: &str) -> Result<Vec<Value>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::new("HAR content cannot be empty"));
    }

    let mut document: Value = serde_json::from_str(text)
        .map_err(|err| ParseError::new(format!("Failed to parse HAR file: {err}")))?;

    let log = document
        .get_mut("log")
        .filter(|log| log.is_object())
        .ok_or_else(|| ParseError::new("Invalid HAR format: missing 'log' object"))?;

    match log.get_mut("entries").map(Value::take) {
        Some(Value::Array(entries)) => Ok(entries),
        _ => Err(ParseError::new(
            "Invalid HAR format: missing 'entries' array",
        )),
    }
}

fn convert_entry(entry: Value) -> Result<Option<Request>, serde_json::Error> {
    let entry: HarEntry = serde_json::from_value(entry)?;
    let Some(request) = entry.request else {
        return Ok(None);
    };

    let url = request.url.unwrap_or_default();
    if url.is_empty() {
        return Ok(None);
    }

    let mut headers = IndexMap::new();
    for header in request.headers {
        if !header.name.is_empty() {
            headers.insert(header.name, header.value);
        }
    }

    let body = request.post_data.map(body_from_post_data).unwrap_or_default();

    Ok(Some(Request {
        name: generate_name(&url),
        method: request.method.as_deref().map(Method::parse).unwrap_or_default(),
        url,
        headers,
        body,
        group: None,
    }))
}

fn body_from_post_data(post_data: HarPostData) -> IndexMap<String, String> {
    if let Some(flat) = post_data
        .text
        .as_deref()
        .filter(|text| looks_like_object(text))
        .and_then(flatten_json_object)
    {
        return flat;
    }

    if let Some(params) = post_data.params.filter(|params| !params.is_empty()) {
        return params
            .into_iter()
            .filter(|param| !param.name.is_empty())
            .map(|param| (param.name, param.value))
            .collect();
    }

    match post_data.text {
        Some(text) if !text.is_empty() => raw_body(&text),
        _ => IndexMap::new(),
    }
}

fn truncate(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        value.to_string()
    } else {
        let cut: String = value.chars().take(limit).collect();
        format!("{cut}...")
    }
}
