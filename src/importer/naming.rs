use once_cell::sync::Lazy;
use regex::Regex;

pub const FALLBACK_NAME: &str = "Imported cURL";

static PATH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^/]+/(.+?)(?:\?|$)").expect("valid regex"));
static HOST_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://([^/]+)").expect("valid regex"));

/// `https://x.io/api/user-profile` becomes `User Profile`.
pub fn generate_name(url: &str) -> String {
    if let Some(caps) = PATH_PATTERN.captures(url) {
        if let Some(segment) = caps[1].split('/').filter(|s| !s.is_empty()).last() {
            return title_case(segment);
        }
    }

    HOST_PATTERN
        .captures(url)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}

fn title_case(segment: &str) -> String {
    let spaced = segment.replace(['-', '_'], " ");
    let mut output = String::with_capacity(spaced.len());
    let mut capitalize_next = true;

    for ch in spaced.chars() {
        if ch.is_whitespace() {
            capitalize_next = true;
            output.push(ch);
        } else if capitalize_next {
            output.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            output.push(ch);
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_name_title_cases_last_segment() {
        assert_eq!(generate_name("https://api.example.com/v1/user-profile"), "User Profile");
        assert_eq!(generate_name("https://api.example.com/v1/order_items?page=2"), "Order Items");
        assert_eq!(generate_name("http://localhost:8080/health/"), "Health");
    }

    #[test]
    fn generate_name_falls_back_to_host() {
        assert_eq!(generate_name("https://api.example.com"), "api.example.com");
        assert_eq!(generate_name("https://api.example.com/"), "api.example.com");
        assert_eq!(generate_name("http://localhost:3000//"), "localhost:3000");
    }

    #[test]
    fn generate_name_uses_fixed_fallback() {
        assert_eq!(generate_name(""), FALLBACK_NAME);
        assert_eq!(generate_name("{{base}}/users"), FALLBACK_NAME);
        assert_eq!(generate_name("ftp://files.example.com/a"), FALLBACK_NAME);
    }

    #[test]
    fn generate_name_keeps_placeholders_in_segments() {
        assert_eq!(generate_name("https://{{host}}/users/{{id}}"), "{{id}}");
    }
}
