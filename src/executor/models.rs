use std::time::Duration;

use indexmap::IndexMap;
use url::Url;

use crate::model::{Environment, Method};

use super::transport::TransportSelector;

pub struct ExecutionOptions<'a> {
    pub environment: &'a Environment,
    pub selector: &'a dyn TransportSelector,
}

/// A request after placeholder substitution, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub method: Method,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: IndexMap<String, String>,
    pub body: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InboundResponse {
    pub status: u16,
    pub headers: IndexMap<String, Vec<String>>,
    pub body: String,
}
