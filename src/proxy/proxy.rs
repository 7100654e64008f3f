// ────────────────────────────────
// src/proxy/proxy.rs
// Forwards a request to one backend and relays its response.
// ────────────────────────────────

use hyper::body::HttpBody;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE, HOST};
use hyper::{Body, HeaderMap, Request, Response, StatusCode};
use reqwest::{redirect, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use url::Url;

use super::backend::Backend;
use crate::metrics::MetricsCollector;

/// Connection-scoped headers that describe a single hop, not the message.
const HOP_BY_HOP: [&str; 5] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
];

/// The outbound client shared by forwarding and health checks.
///
/// Redirects are handed back to the caller rather than followed.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(redirect::Policy::none())
        .build()
}

pub struct Proxy {
    client: Client,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Proxy {
    pub fn new(client: Client, metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self { client, metrics }
    }

    /// Forward `req` to `backend`, turning any failure into an error response.
    pub async fn handle(&self, backend: &Backend, req: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let result = self.forward(backend, req).await;

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "forwarded",
                Err(ProxyError::Upstream { .. }) => "unreachable",
                Err(_) => "invalid_request",
            };
            metrics.record_backend_request(backend.name(), outcome, start.elapsed());
        }

        match result {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    ProxyError::Upstream { .. } => warn!(backend = backend.name(), %err, "proxy error"),
                    _ => error!(backend = backend.name(), %err, "proxy error"),
                }
                err.into()
            }
        }
    }

    pub async fn forward(
        &self,
        backend: &Backend,
        req: Request<Body>,
    ) -> Result<Response<Body>, ProxyError> {
        let (parts, body) = req.into_parts();

        let target = backend.target(parts.uri.path(), parts.uri.query());
        let url = Url::parse(&target).map_err(|source| ProxyError::InvalidTarget {
            target: target.clone(),
            source,
        })?;

        // The client derives Host from the target URL.
        let mut headers = parts.headers;
        headers.remove(HOST);

        let mut builder = self.client.request(parts.method, url).headers(headers);
        if !body.is_end_stream() {
            builder = builder.body(reqwest::Body::wrap_stream(body));
        }
        let outbound = builder.build().map_err(ProxyError::RequestBuild)?;

        debug!(backend = backend.name(), method = %outbound.method(), url = %outbound.url(), "forwarding request");

        let upstream = self
            .client
            .execute(outbound)
            .await
            .map_err(|source| ProxyError::Upstream {
                backend: backend.name().to_string(),
                source,
            })?;

        let status = upstream.status();
        let upstream_headers = upstream.headers().clone();

        let mut response = Response::new(Body::wrap_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        copy_end_to_end_headers(&upstream_headers, response.headers_mut());

        Ok(response)
    }
}

fn copy_end_to_end_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if !is_hop_by_hop(name) {
            to.append(name.clone(), value.clone());
        }
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid target URL {target}: {source}")]
    InvalidTarget {
        target: String,
        source: url::ParseError,
    },

    #[error("failed to build outbound request: {0}")]
    RequestBuild(#[source] reqwest::Error),

    #[error("{backend} backend request failed: {source}")]
    Upstream {
        backend: String,
        source: reqwest::Error,
    },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidTarget { .. } | ProxyError::RequestBuild(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ProxyError::InvalidTarget { .. } | ProxyError::RequestBuild(_) => {
                "Failed to create request"
            }
            ProxyError::Upstream { .. } => "Service unavailable",
        }
    }
}

// Proxy failures answer in plain text, never JSON.
impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let mut response = Response::new(Body::from(format!("{}\n", err.message())));
        *response.status_mut() = err.status();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.headers_mut().insert(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn proxy() -> Proxy {
        Proxy::new(build_client(Duration::from_secs(5)).unwrap(), None)
    }

    #[tokio::test]
    async fn forwards_method_path_query_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/api/orders/123".to_string()))
            .match_query(Matcher::UrlEncoded("x".into(), "1".into()))
            .match_header("x-request-source", "test-suite")
            .match_body("")
            .with_status(201)
            .with_header("x-backend", "orders")
            .with_body(r#"{"id":"123"}"#)
            .create_async()
            .await;

        let backend = Backend::new("orders", &server.url()).unwrap();
        let req = Request::get("/api/orders/123?x=1")
            .header("x-request-source", "test-suite")
            .body(Body::empty())
            .unwrap();

        let response = proxy().forward(&backend, req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-backend"], "orders");
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], br#"{"id":"123"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn forwards_request_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/orders/")
            .match_body(r#"{"product_id":"prod-001","quantity":2}"#)
            .with_status(201)
            .create_async()
            .await;

        let backend = Backend::new("orders", &server.url()).unwrap();
        let payload = r#"{"product_id":"prod-001","quantity":2}"#;
        let req = Request::post("/api/orders/")
            .header("content-type", "application/json")
            .header("content-length", payload.len())
            .body(Body::from(payload))
            .unwrap();

        let response = proxy().forward(&backend, req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn backend_error_status_is_relayed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/products/missing")
            .with_status(404)
            .with_body(r#"{"error":"Product not found"}"#)
            .create_async()
            .await;

        let backend = Backend::new("products", &server.url()).unwrap();
        let req = Request::get("/api/products/missing").body(Body::empty()).unwrap();

        let response = proxy().handle(&backend, req).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unreachable_backend_is_bad_gateway() {
        let backend = Backend::new("orders", "http://127.0.0.1:1").unwrap();
        let req = Request::get("/api/orders/anything").body(Body::empty()).unwrap();

        let err = proxy().forward(&backend, req).await.unwrap_err();
        assert!(matches!(err, ProxyError::Upstream { .. }));

        let response: Response<Body> = err.into();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"Service unavailable\n");
    }

    #[tokio::test]
    async fn construction_failure_is_internal_error() {
        let err = ProxyError::InvalidTarget {
            target: "http:///api/orders/".to_string(),
            source: url::ParseError::EmptyHost,
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response: Response<Body> = err.into();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"Failed to create request\n");
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let mut from = HeaderMap::new();
        from.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        from.insert("connection", HeaderValue::from_static("keep-alive"));
        from.append("set-cookie", HeaderValue::from_static("a=1"));
        from.append("set-cookie", HeaderValue::from_static("b=2"));

        let mut to = HeaderMap::new();
        copy_end_to_end_headers(&from, &mut to);

        assert!(!to.contains_key("transfer-encoding"));
        assert!(!to.contains_key("connection"));
        assert_eq!(to.get_all("set-cookie").iter().count(), 2);
    }
}
