use std::{fmt, net::SocketAddr};

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::{header::HeaderMap, redirect, Client, ClientBuilder};
use tokio::net::lookup_host;
use url::{Host, Url};

use crate::error::TransportError;

use super::models::{InboundResponse, OutboundRequest};
use super::runner::REQUEST_TIMEOUT;

// Matched against the whole URL, not just the host.
const LOCAL_MARKERS: &[&str] = &["localhost", "127.0.0.1", "::1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Verifies certificate chains and hostnames.
    Standard,
    /// Trusts any certificate and skips hostname verification.
    Relaxed,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Standard => f.write_str("standard"),
            TransportKind::Relaxed => f.write_str("relaxed"),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError>;
}

#[async_trait]
pub trait TransportSelector: Send + Sync {
    async fn select(&self, url: &Url) -> Result<Box<dyn Transport>, TransportError>;
}

pub struct ReqwestTransport {
    client: Client,
    kind: TransportKind,
}

impl ReqwestTransport {
    pub fn new(client: Client, kind: TransportKind) -> Self {
        Self { client, kind }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        let timeout = request.timeout;
        let mut request_builder = self
            .client
            .request(request.method.into(), request.url)
            .timeout(timeout);

        for (name, value) in &request.headers {
            request_builder = request_builder.header(name, value);
        }

        if let Some(body) = request.body {
            request_builder = request_builder.body(body);
        }

        let response = request_builder.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Request(TransportError::describe(&err))
            }
        })?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Body(TransportError::describe(&err))
            }
        })?;

        Ok(InboundResponse {
            status,
            headers,
            body,
        })
    }
}

/// Verifying client for remote endpoints; a per-call relaxed client for
/// loopback endpoints the system resolver can resolve.
pub struct TransportPolicy {
    standard: Client,
}

impl TransportPolicy {
    pub fn new() -> Result<Self, TransportError> {
        let standard = base_builder()
            .build()
            .map_err(|err| TransportError::Client(TransportError::describe(&err)))?;
        Ok(Self { standard })
    }

    fn standard(&self) -> Box<dyn Transport> {
        Box::new(ReqwestTransport::new(
            self.standard.clone(),
            TransportKind::Standard,
        ))
    }
}

#[async_trait]
impl TransportSelector for TransportPolicy {
    async fn select(&self, url: &Url) -> Result<Box<dyn Transport>, TransportError> {
        if !is_local_target(url.as_str()) {
            return Ok(self.standard());
        }

        let Some(addrs) = resolve_host(url).await else {
            tracing::debug!(url = %url, "local target did not resolve, using standard transport");
            return Ok(self.standard());
        };

        tracing::debug!(url = %url, addrs = ?addrs, "using relaxed transport for local target");
        let client = relaxed_client(url, &addrs)?;
        Ok(Box::new(ReqwestTransport::new(client, TransportKind::Relaxed)))
    }
}

pub fn is_local_target(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    LOCAL_MARKERS.iter().any(|marker| lower.contains(marker))
}

// Never follows redirects; a 3xx is returned as the result.
fn base_builder() -> ClientBuilder {
    Client::builder()
        .redirect(redirect::Policy::none())
        .connect_timeout(REQUEST_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
}

fn relaxed_client(url: &Url, addrs: &[SocketAddr]) -> Result<Client, TransportError> {
    let mut builder = base_builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true);

    // Pin the domain to what the system resolver (hosts file included) returned.
    if let Some(Host::Domain(domain)) = url.host() {
        builder = builder.resolve_to_addrs(domain, addrs);
    }

    builder
        .build()
        .map_err(|err| TransportError::Client(TransportError::describe(&err)))
}

async fn resolve_host(url: &Url) -> Option<Vec<SocketAddr>> {
    let host = match url.host()? {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => addr.to_string(),
    };
    let port = url.port_or_known_default()?;

    let looked_up = lookup_host((host.as_str(), port)).await;
    match looked_up {
        Ok(addrs) => {
            let addrs: Vec<SocketAddr> = addrs.collect();
            (!addrs.is_empty()).then_some(addrs)
        }
        Err(err) => {
            tracing::debug!(host = %host, error = %err, "host resolution failed");
            None
        }
    }
}

fn collect_headers(headers: &HeaderMap) -> IndexMap<String, Vec<String>> {
    let mut collected: IndexMap<String, Vec<String>> = IndexMap::new();
    for (name, value) in headers {
        collected
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_local_target_matches_loopback_markers_anywhere() {
        assert!(is_local_target("https://localhost:8443/api"));
        assert!(is_local_target("https://LOCALHOST/api"));
        assert!(is_local_target("http://127.0.0.1:3000"));
        assert!(is_local_target("https://[::1]:8443/"));
        assert!(is_local_target("https://api.example.com/?next=localhost"));
        assert!(!is_local_target("https://api.example.com/users"));
        assert!(!is_local_target("http://10.0.0.1/"));
    }

    #[test]
    fn collect_headers_keeps_every_value_in_order() {
        let mut map = HeaderMap::new();
        map.append("set-cookie", "a=1".parse().unwrap());
        map.append("set-cookie", "b=2".parse().unwrap());
        map.insert("content-type", "application/json".parse().unwrap());

        let headers = collect_headers(&map);
        assert_eq!(
            headers.get("set-cookie"),
            Some(&vec!["a=1".to_string(), "b=2".to_string()])
        );
        assert_eq!(
            headers.get("content-type"),
            Some(&vec!["application/json".to_string()])
        );
    }

    #[tokio::test]
    async fn select_uses_standard_transport_for_remote_hosts() {
        let policy = TransportPolicy::new().unwrap();
        let url = Url::parse("https://api.example.com/users").unwrap();
        let transport = policy.select(&url).await.unwrap();
        assert_eq!(transport.kind(), TransportKind::Standard);
    }

    #[tokio::test]
    async fn select_relaxes_resolvable_loopback_hosts() {
        let policy = TransportPolicy::new().unwrap();

        let ip = Url::parse("https://127.0.0.1:8443/health").unwrap();
        assert_eq!(policy.select(&ip).await.unwrap().kind(), TransportKind::Relaxed);

        let v6 = Url::parse("https://[::1]:8443/health").unwrap();
        assert_eq!(policy.select(&v6).await.unwrap().kind(), TransportKind::Relaxed);
    }

    #[tokio::test]
    async fn select_falls_back_when_local_looking_host_does_not_resolve() {
        let policy = TransportPolicy::new().unwrap();
        let url = Url::parse("https://localhost.invalid/health").unwrap();
        let transport = policy.select(&url).await.unwrap();
        assert_eq!(transport.kind(), TransportKind::Standard);
    }
}
