use std::fmt::Write;

use serde_json::Value;

use crate::env::resolve;
use crate::model::{CallResult, Environment, Request};

const RULE: &str = "===============================================================";
const SECTION_RULE: &str = "---------------------------------------------------------------";

// Resolves placeholders again, independently of the execution.
pub fn render_report(request: &Request, environment: &Environment, result: &CallResult) -> String {
    let variables = &environment.variables;
    let mut out = String::new();

    let _ = writeln!(out, "{RULE}\nAPI CALL OUTPUT\n{RULE}\n");
    let _ = writeln!(out, "Environment: {}", environment.name);
    let _ = writeln!(out, "Name: {}", request.name);
    let _ = writeln!(out, "URL: {}", resolve(&request.url, variables));
    let _ = writeln!(out, "Method: {}\n", request.method);

    section(&mut out, "ENVIRONMENT VARIABLES");
    if variables.is_empty() {
        out.push_str("(No environment variables)\n");
    } else {
        for (key, value) in variables {
            let _ = writeln!(out, "{key}: {value}");
        }
    }
    out.push('\n');

    section(&mut out, "HEADERS");
    if request.headers.is_empty() {
        out.push_str("(No headers)\n");
    } else {
        for (name, value) in &request.headers {
            let _ = writeln!(out, "{}: {}", resolve(name, variables), resolve(value, variables));
        }
    }
    out.push('\n');

    section(&mut out, "BODY");
    if !request.method.carries_body() {
        out.push_str("(No body)\n");
    } else if request.body.is_empty() {
        out.push_str("{}\n");
    } else {
        for (key, value) in &request.body {
            let _ = writeln!(out, "{}: {}", resolve(key, variables), resolve(value, variables));
        }
    }
    out.push('\n');

    section(&mut out, "RESPONSE");
    out.push_str(&render_response(result));
    let _ = writeln!(out, "\n{RULE}");
    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{SECTION_RULE}\n{title}:\n{SECTION_RULE}");
}

fn render_response(result: &CallResult) -> String {
    let mut out = String::new();
    if let Some(error) = &result.error {
        let _ = writeln!(out, "Error: {error}");
        return out;
    }

    let _ = writeln!(out, "Status: {}", result.status_code);
    let _ = writeln!(out, "Duration: {} ms\n", result.duration_ms);

    out.push_str("Response Headers:\n");
    if result.headers.is_empty() {
        out.push_str("(No headers)\n");
    } else {
        for (name, values) in &result.headers {
            let _ = writeln!(out, "{name}: {}", values.join(", "));
        }
    }

    out.push_str("\nResponse Body:\n");
    if result.body.is_empty() {
        out.push_str("(Empty response)\n");
    } else if is_json_response(result) {
        let _ = writeln!(out, "{}", pretty_json(&result.body));
    } else {
        let _ = writeln!(out, "{}", result.body);
    }
    out
}

fn is_json_response(result: &CallResult) -> bool {
    result
        .headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .flat_map(|(_, values)| values)
        .any(|value| {
            let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
}

fn pretty_json(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| body.to_string())
}

#[cfg(feature = "cli")]
pub fn print_call_result(request: &Request, environment: &Environment, result: &CallResult) {
    use colored::{Color, Colorize};

    let status_color = if result.status_code == 0 || result.status_code >= 400 {
        Color::Red
    } else if result.status_code >= 300 {
        Color::Yellow
    } else {
        Color::Green
    };

    for line in render_report(request, environment, result).lines() {
        if line.starts_with("Status: ") || line.starts_with("Error: ") {
            println!("{}", line.color(status_color).bold());
        } else if line.ends_with(':') && line.chars().all(|c| c.is_ascii_uppercase() || c == ' ' || c == ':') {
            println!("{}", line.bold());
        } else if line.starts_with("Duration: ") {
            println!("{}", line.dimmed());
        } else {
            println!("{line}");
        }
    }
}
