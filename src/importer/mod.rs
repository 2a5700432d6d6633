//! Converts external request representations (curl invocations and HAR
//! captures) into [`Request`](crate::model::Request) values.

mod body;
mod curl;
mod har;
mod headers;
mod naming;

pub use curl::parse_curl;
pub use har::{har_entry_summaries, parse_har};
pub use headers::{apply_header_rules, strip_browser_headers, BROWSER_HEADERS};
pub use naming::{generate_name, FALLBACK_NAME};
