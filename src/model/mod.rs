mod method;

pub use method::Method;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A saved API call. Any string field may carry `{{name}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Request {
    pub name: String,
    pub url: String,
    #[serde(rename = "httpMethod")]
    pub method: Method,
    pub headers: IndexMap<String, String>,
    pub body: IndexMap<String, String>,
    #[serde(rename = "groupName", skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Request {
    pub fn new(name: impl Into<String>, method: Method, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }
}

/// Named variables used to resolve placeholders. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Environment {
    pub name: String,
    pub variables: IndexMap<String, String>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: IndexMap::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// Outcome of a single execution. A `status_code` of 0 means no HTTP
/// response was obtained and `error` says why.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallResult {
    pub status_code: u16,
    pub body: String,
    pub headers: IndexMap<String, Vec<String>>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl CallResult {
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status_code: 0,
            body: String::new(),
            headers: IndexMap::new(),
            duration_ms,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status_code)
    }
}
