use std::time::{Duration, Instant};

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde_json::Value;
use url::Url;

use crate::env::{find_unresolved, resolve, VarMap};
use crate::error::{ExecutionError, TransportError};
use crate::model::{CallResult, Environment, Request};

use super::models::{ExecutionOptions, OutboundRequest, ResolvedRequest};
use super::transport::TransportPolicy;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct StageFailure {
    error: ExecutionError,
    elapsed_ms: u64,
}

impl From<ExecutionError> for StageFailure {
    fn from(error: ExecutionError) -> Self {
        Self {
            error,
            elapsed_ms: 0,
        }
    }
}

static SHARED_POLICY: OnceCell<TransportPolicy> = OnceCell::new();

// Built on first use; a failed build is retried on the next call.
fn shared_policy() -> Result<&'static TransportPolicy, TransportError> {
    SHARED_POLICY.get_or_try_init(TransportPolicy::new)
}

pub async fn execute(request: &Request, environment: &Environment) -> CallResult {
    let policy = match shared_policy() {
        Ok(policy) => policy,
        Err(err) => return CallResult::failure(err.to_string(), 0),
    };

    execute_request(
        request,
        ExecutionOptions {
            environment,
            selector: policy,
        },
    )
    .await
}

pub async fn execute_request(request: &Request, options: ExecutionOptions<'_>) -> CallResult {
    match run_stages(request, &options).await {
        Ok(result) => result,
        Err(StageFailure { error, elapsed_ms }) => {
            tracing::warn!(request = %request.name, error = %error, "request failed");
            CallResult::failure(error.to_string(), elapsed_ms)
        }
    }
}

async fn run_stages(
    request: &Request,
    options: &ExecutionOptions<'_>,
) -> Result<CallResult, StageFailure> {
    let variables = &options.environment.variables;

    let resolved = resolve_request(request, variables);
    let url = validate_url(&resolved, variables)?;
    let outbound = build_outbound(resolved, url);

    let transport = options
        .selector
        .select(&outbound.url)
        .await
        .map_err(ExecutionError::from)?;
    tracing::debug!(
        request = %request.name,
        method = %outbound.method,
        url = %outbound.url,
        transport = %transport.kind(),
        "sending request"
    );

    let start = Instant::now();
    let sent = transport.send(outbound).await;
    let elapsed_ms = elapsed_millis(start);

    let response = sent.map_err(|err| StageFailure {
        error: err.into(),
        elapsed_ms,
    })?;

    tracing::debug!(status = response.status, duration_ms = elapsed_ms, "response received");
    Ok(CallResult {
        status_code: response.status,
        body: response.body,
        headers: response.headers,
        duration_ms: elapsed_ms,
        error: None,
    })
}

pub fn resolve_request(request: &Request, variables: &VarMap) -> ResolvedRequest {
    ResolvedRequest {
        method: request.method,
        url: resolve(&request.url, variables),
        headers: resolve_map(&request.headers, variables),
        body: resolve_map(&request.body, variables),
    }
}

fn resolve_map(map: &IndexMap<String, String>, variables: &VarMap) -> IndexMap<String, String> {
    map.iter()
        .map(|(key, value)| (resolve(key, variables), resolve(value, variables)))
        .collect()
}

// Only the URL must be fully resolved; headers and body go out as-is.
pub fn validate_url(resolved: &ResolvedRequest, variables: &VarMap) -> Result<Url, ExecutionError> {
    let missing = find_unresolved(&resolved.url);
    if !missing.is_empty() {
        return Err(ExecutionError::UnresolvedVariables {
            missing: missing.into_iter().collect(),
            available: variables.keys().cloned().collect(),
        });
    }

    Url::parse(resolved.url.trim()).map_err(|err| ExecutionError::InvalidUrl {
        url: resolved.url.clone(),
        reason: err.to_string(),
    })
}

pub fn build_outbound(resolved: ResolvedRequest, url: Url) -> OutboundRequest {
    let mut headers = resolved.headers;

    let body = if resolved.method.carries_body() {
        if !headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("content-type"))
        {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        Some(json_object(resolved.body))
    } else {
        None
    };

    OutboundRequest {
        method: resolved.method,
        url,
        headers,
        body,
        timeout: REQUEST_TIMEOUT,
    }
}

fn json_object(body: IndexMap<String, String>) -> String {
    Value::Object(
        body.into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    )
    .to_string()
}

fn elapsed_millis(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::models::InboundResponse;
    use crate::executor::transport::{Transport, TransportKind, TransportSelector};
    use crate::importer::{parse_curl, parse_har};
    use crate::model::Method;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    #[derive(Default)]
    struct RecordingSelector {
        selections: AtomicUsize,
        sent: Arc<Mutex<Vec<OutboundRequest>>>,
        fail_with: Option<String>,
    }

    struct RecordingTransport {
        sent: Arc<Mutex<Vec<OutboundRequest>>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Standard
        }

        async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
            self.sent.lock().unwrap().push(request);
            if let Some(message) = &self.fail_with {
                return Err(TransportError::Request(message.clone()));
            }
            let mut headers = IndexMap::new();
            headers.insert(
                "x-multi".to_string(),
                vec!["one".to_string(), "two".to_string()],
            );
            Ok(InboundResponse {
                status: 201,
                headers,
                body: "created".to_string(),
            })
        }
    }

    #[async_trait]
    impl TransportSelector for RecordingSelector {
        async fn select(&self, _url: &Url) -> Result<Box<dyn Transport>, TransportError> {
            self.selections.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingTransport {
                sent: Arc::clone(&self.sent),
                fail_with: self.fail_with.clone(),
            }))
        }
    }

    impl RecordingSelector {
        fn sent(&self) -> Vec<OutboundRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    async fn run(request: &Request, environment: &Environment, selector: &RecordingSelector) -> CallResult {
        execute_request(
            request,
            ExecutionOptions {
                environment,
                selector,
            },
        )
        .await
    }

    #[tokio::test]
    async fn unresolved_url_fails_without_network() {
        let selector = RecordingSelector::default();
        let request = Request::new("x", Method::Get, "{{host}}/x");
        let environment = Environment::new("empty");

        let result = run(&request, &environment, &selector).await;

        assert_eq!(result.status_code, 0);
        assert_eq!(result.duration_ms, 0);
        let error = result.error.unwrap();
        assert!(error.contains("unresolved environment variables: host"));
        assert_eq!(selector.selections.load(Ordering::SeqCst), 0);
        assert!(selector.sent().is_empty());
    }

    #[tokio::test]
    async fn unresolved_error_lists_available_variables() {
        let selector = RecordingSelector::default();
        let request = Request::new("x", Method::Get, "https://{{host}}/{{version}}");
        let environment = Environment::new("dev").with_variable("token", "abc");

        let result = run(&request, &environment, &selector).await;

        let error = result.error.unwrap();
        assert!(error.contains("host, version"));
        assert!(error.contains("Available variables: [token]"));
    }

    #[tokio::test]
    async fn malformed_url_is_reported() {
        let selector = RecordingSelector::default();
        let request = Request::new("x", Method::Get, "not a url");

        let result = run(&request, &Environment::default(), &selector).await;

        assert_eq!(result.status_code, 0);
        assert!(result.error.unwrap().starts_with("Invalid URL 'not a url'"));
        assert_eq!(selector.selections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn get_never_carries_a_body() {
        let selector = RecordingSelector::default();
        let request = Request::new("x", Method::Get, "https://example.com/items")
            .with_body_field("ignored", "value");

        let result = run(&request, &Environment::default(), &selector).await;

        assert!(result.is_success());
        let sent = selector.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, None);
        assert!(sent[0].headers.is_empty());
    }

    #[tokio::test]
    async fn post_with_empty_body_sends_empty_object() {
        let selector = RecordingSelector::default();
        let request = Request::new("x", Method::Post, "https://example.com/items");

        run(&request, &Environment::default(), &selector).await;

        let sent = selector.sent();
        assert_eq!(sent[0].body.as_deref(), Some("{}"));
        assert_eq!(
            sent[0].headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(sent[0].timeout, REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn explicit_content_type_is_kept() {
        let selector = RecordingSelector::default();
        let request = Request::new("x", Method::Patch, "https://example.com/items/1")
            .with_header("content-type", "application/merge-patch+json")
            .with_body_field("name", "{{name}}");
        let environment = Environment::new("dev").with_variable("name", "widget");

        run(&request, &environment, &selector).await;

        let sent = selector.sent();
        assert_eq!(sent[0].headers.len(), 1);
        assert_eq!(
            sent[0].headers.get("content-type").map(String::as_str),
            Some("application/merge-patch+json")
        );
        assert_eq!(sent[0].body.as_deref(), Some(r#"{"name":"widget"}"#));
    }

    #[tokio::test]
    async fn head_and_options_carry_no_body() {
        for method in [Method::Head, Method::Options, Method::Delete] {
            let selector = RecordingSelector::default();
            let request =
                Request::new("x", method, "https://example.com/a").with_body_field("k", "v");
            run(&request, &Environment::default(), &selector).await;
            assert_eq!(selector.sent()[0].body, None, "{method}");
        }
    }

    #[tokio::test]
    async fn unresolved_header_placeholders_are_sent_literally() {
        let selector = RecordingSelector::default();
        let request = Request::new("x", Method::Get, "https://{{host}}/a")
            .with_header("Authorization", "Bearer {{token}}")
            .with_header("{{trace_header}}", "1");
        let environment = Environment::new("dev")
            .with_variable("host", "example.com")
            .with_variable("trace_header", "X-Trace");

        let result = run(&request, &environment, &selector).await;

        assert!(result.is_success());
        let sent = selector.sent();
        assert_eq!(sent[0].url.as_str(), "https://example.com/a");
        assert_eq!(
            sent[0].headers.get("Authorization").map(String::as_str),
            Some("Bearer {{token}}")
        );
        assert_eq!(sent[0].headers.get("X-Trace").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn successful_result_carries_status_headers_and_body() {
        let selector = RecordingSelector::default();
        let request = Request::new("x", Method::Put, "https://example.com/a");

        let result = run(&request, &Environment::default(), &selector).await;

        assert_eq!(result.status_code, 201);
        assert_eq!(result.body, "created");
        assert_eq!(
            result.headers.get("x-multi"),
            Some(&vec!["one".to_string(), "two".to_string()])
        );
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn transport_errors_become_failed_results() {
        let selector = RecordingSelector {
            fail_with: Some("connection refused".to_string()),
            ..RecordingSelector::default()
        };
        let request = Request::new("x", Method::Get, "https://example.com/a");

        let result = run(&request, &Environment::default(), &selector).await;

        assert_eq!(result.status_code, 0);
        assert_eq!(result.error.as_deref(), Some("Request failed: connection refused"));
        assert!(!result.is_success());
    }

    #[test]
    fn resolve_stage_leaves_imported_requests_without_placeholders_untouched() {
        let from_curl = parse_curl(
            r#"curl -X PATCH 'https://api.example.com/v2/items/9?x=1' -H 'Accept: */*' -H 'X-Trace: a{b}c' -d '{"name":"gear","qty":3}'"#,
        )
        .unwrap();
        let from_har = parse_har(
            r#"{"log":{"entries":[{"request":{"method":"POST","url":"https://api.example.com/login",
                "headers":[{"name":"Content-Type","value":"application/x-www-form-urlencoded"}],
                "postData":{"params":[{"name":"user","value":"ada"},{"name":"pass","value":"}{"}]}}}]}}"#,
        )
        .unwrap();

        let variables = VarMap::from([("unused".to_string(), "value".to_string())]);
        for request in std::iter::once(from_curl).chain(from_har) {
            let resolved = resolve_request(&request, &variables);
            assert_eq!(resolved.method, request.method);
            assert_eq!(resolved.url, request.url);
            assert_eq!(resolved.headers, request.headers);
            assert_eq!(resolved.body, request.body);
        }
    }

    #[test]
    fn execute_reuses_one_verifying_policy() {
        let first = shared_policy().unwrap();
        let second = shared_policy().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[tokio::test]
    async fn redirects_are_returned_not_followed() {
        let server = MockServer::start_async().await;
        let start = server
            .mock_async(|when, then| {
                when.method(GET).path("/start");
                then.status(302).header("location", "/target");
            })
            .await;
        let target = server
            .mock_async(|when, then| {
                when.method(GET).path("/target");
                then.status(200).body("followed");
            })
            .await;

        let request = Request::new("start", Method::Get, server.url("/start"));
        let result = execute(&request, &Environment::default()).await;

        start.assert_async().await;
        assert_eq!(target.hits_async().await, 0);
        assert_eq!(result.status_code, 302);
        assert!(result.error.is_none());
        assert!(!result.is_success());
        assert_eq!(
            result.headers.get("location"),
            Some(&vec!["/target".to_string()])
        );
    }

    #[tokio::test]
    async fn executes_against_a_live_server() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/widgets")
                    .header("authorization", "Bearer secret")
                    .header("content-type", "application/json")
                    .json_body(serde_json::json!({"name": "gear"}));
                then.status(201)
                    .header("content-type", "application/json")
                    .body(r#"{"id":7}"#);
            })
            .await;

        let request = Request::new("create", Method::Post, "{{base}}/widgets")
            .with_header("Authorization", "Bearer {{token}}")
            .with_body_field("name", "gear");
        let environment = Environment::new("local")
            .with_variable("base", server.base_url())
            .with_variable("token", "secret");

        let result = execute(&request, &environment).await;

        mock.assert_async().await;
        assert_eq!(result.status_code, 201);
        assert_eq!(result.body, r#"{"id":7}"#);
        assert_eq!(
            result.headers.get("content-type"),
            Some(&vec!["application/json".to_string()])
        );
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn connection_failures_are_folded_into_the_result() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let request = Request::new("down", Method::Get, format!("http://127.0.0.1:{port}/"));
        let result = execute(&request, &Environment::default()).await;

        assert_eq!(result.status_code, 0);
        assert!(result.error.unwrap().starts_with("Request failed"));
    }
}
