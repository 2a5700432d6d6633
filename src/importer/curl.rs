use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use shell_words::split;

use crate::error::ParseError;
use crate::model::{Method, Request};

use super::body::{flatten_json_object, looks_like_object, raw_body, scan_loose_pairs};
use super::naming::generate_name;

static LINE_CONTINUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\s*\r?\n\s*").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

const DATA_OPTIONS: &[&str] = &[
    "-d",
    "--data",
    "--data-raw",
    "--data-binary",
    "--data-ascii",
    "--json",
];

// Options we ignore but whose argument must not be mistaken for the URL.
const IGNORED_VALUE_OPTIONS: &[&str] = &[
    "-A",
    "--user-agent",
    "-b",
    "--cookie",
    "-c",
    "--cookie-jar",
    "-e",
    "--referer",
    "-E",
    "--cert",
    "--key",
    "--cacert",
    "-F",
    "--form",
    "-m",
    "--max-time",
    "--connect-timeout",
    "-o",
    "--output",
    "-r",
    "--range",
    "--resolve",
    "--retry",
    "-T",
    "--upload-file",
    "-u",
    "--user",
    "-w",
    "--write-out",
    "-x",
    "--proxy",
    "--data-urlencode",
];

#[derive(Debug, Default)]
struct ParsedCurl {
    method: Option<String>,
    url: Option<String>,
    headers: IndexMap<String, String>,
    data: Option<String>,
    json: bool,
}

pub fn parse_curl(command: &str) -> Result<Request, ParseError> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(ParseError::new("cURL command cannot be empty"));
    }

    let joined = LINE_CONTINUATION.replace_all(trimmed, " ");
    let normalized = WHITESPACE.replace_all(&joined, " ");

    let tokens = split(normalized.trim())
        .map_err(|err| ParseError::new(format!("Failed to tokenize cURL command: {err}")))?;
    match tokens.first() {
        Some(program) if is_curl_program(program) => {}
        _ => return Err(ParseError::new("Command must start with 'curl'")),
    }

    let parsed = parse_tokens(&tokens)?;
    let url = parsed
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ParseError::new("Could not extract URL from cURL command"))?;

    let method = match (&parsed.method, &parsed.data) {
        (Some(explicit), _) => Method::parse(explicit),
        (None, Some(_)) => Method::Post,
        (None, None) => Method::Get,
    };

    let mut headers = parsed.headers;
    if parsed.json
        && !headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("content-type"))
    {
        headers.insert("Content-Type".to_string(), "application/json".to_string());
    }

    let body = parsed.data.as_deref().map(body_from_data).unwrap_or_default();

    Ok(Request {
        name: generate_name(&url),
        url,
        method,
        headers,
        body,
        group: None,
    })
}

fn is_curl_program(token: &str) -> bool {
    let program = token.rsplit(['/', '\\']).next().unwrap_or(token);
    program.eq_ignore_ascii_case("curl") || program.eq_ignore_ascii_case("curl.exe")
}

fn parse_tokens(tokens: &[String]) -> Result<ParsedCurl, ParseError> {
    let mut parsed = ParsedCurl::default();
    let mut index = 1;

    while index < tokens.len() {
        let token = tokens[index].as_str();

        if token == "--" {
            if parsed.url.is_none() {
                parsed.url = tokens.get(index + 1).cloned();
            }
            break;
        }

        if !token.starts_with('-') || token == "-" {
            if parsed.url.is_none() {
                parsed.url = Some(token.to_string());
            } else {
                tracing::debug!(argument = token, "ignoring extra positional argument");
            }
            index += 1;
            continue;
        }

        match token {
            "-X" | "--request" => {
                parsed.method = Some(next_value(tokens, &mut index)?);
            }
            opt if opt.starts_with("--request=") => {
                parsed.method = Some(opt["--request=".len()..].to_string());
                index += 1;
            }
            opt if opt.starts_with("-X") => {
                parsed.method = Some(opt[2..].to_string());
                index += 1;
            }
            "-H" | "--header" => {
                let value = next_value(tokens, &mut index)?;
                push_header(&mut parsed.headers, &value);
            }
            opt if opt.starts_with("--header=") => {
                push_header(&mut parsed.headers, &opt["--header=".len()..]);
                index += 1;
            }
            opt if opt.starts_with("-H") => {
                push_header(&mut parsed.headers, &opt[2..]);
                index += 1;
            }
            "--url" => {
                let value = next_value(tokens, &mut index)?;
                parsed.url.get_or_insert(value);
            }
            opt if opt.starts_with("--url=") => {
                parsed
                    .url
                    .get_or_insert_with(|| opt["--url=".len()..].to_string());
                index += 1;
            }
            option if DATA_OPTIONS.contains(&option) => {
                let value = next_value(tokens, &mut index)?;
                record_data(&mut parsed, option, value);
            }
            option
                if option.starts_with("--")
                    && option.contains('=')
                    && DATA_OPTIONS
                        .iter()
                        .any(|name| option.split_once('=').map(|(n, _)| n) == Some(*name)) =>
            {
                let (name, value) = option.split_once('=').unwrap_or((option, ""));
                record_data(&mut parsed, name, value.to_string());
                index += 1;
            }
            opt if opt.starts_with("-d") && opt.len() > 2 => {
                record_data(&mut parsed, "-d", opt[2..].to_string());
                index += 1;
            }
            option if IGNORED_VALUE_OPTIONS.contains(&option) => {
                tracing::debug!(option, "ignoring curl option");
                index += 2;
            }
            option => {
                tracing::debug!(option, "ignoring curl flag");
                index += 1;
            }
        }
    }

    Ok(parsed)
}

fn next_value(tokens: &[String], index: &mut usize) -> Result<String, ParseError> {
    let value_pos = *index + 1;
    let Some(value) = tokens.get(value_pos) else {
        return Err(ParseError::new(format!(
            "Option '{}' missing value",
            tokens[*index]
        )));
    };
    *index += 2;
    Ok(value.clone())
}

fn record_data(parsed: &mut ParsedCurl, option: &str, value: String) {
    if option == "--json" {
        parsed.json = true;
    }
    if parsed.data.is_none() {
        parsed.data = Some(value);
    } else {
        tracing::debug!(option, "only the first data payload is imported");
    }
}

fn push_header(headers: &mut IndexMap<String, String>, raw: &str) {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            headers.insert(name.trim().to_string(), value.trim().to_string());
        }
        _ => tracing::warn!(header = raw, "skipping unrecognised header"),
    }
}

fn body_from_data(data: &str) -> IndexMap<String, String> {
    if !looks_like_object(data) {
        return raw_body(data);
    }

    if let Some(flat) = flatten_json_object(data) {
        return flat;
    }

    let loose = scan_loose_pairs(data);
    if loose.is_empty() {
        raw_body(data)
    } else {
        loose
    }
}
