// src/health/checker.rs
use crate::metrics::MetricsCollector;
use crate::proxy::{Backend, Backends};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::status::HealthReport;

/// Probes backend health endpoints on demand. Nothing is cached between calls.
pub struct HealthChecker {
    client: Client,
    backends: Backends,
    metrics: Option<Arc<MetricsCollector>>,
}

#[derive(Debug)]
pub struct HealthCheckResult {
    pub backend: String,
    pub healthy: bool,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

impl HealthChecker {
    pub fn new(
        client: Client,
        backends: Backends,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            client,
            backends,
            metrics,
        }
    }

    /// Check orders and products at the same time.
    pub async fn check_all(&self) -> HealthReport {
        let (orders, products) = futures::join!(
            self.check(&self.backends.orders),
            self.check(&self.backends.products),
        );

        HealthReport {
            orders: orders.healthy,
            products: products.healthy,
        }
    }

    /// GET `<base>/healthz`; only a 200 counts as healthy.
    pub async fn check(&self, backend: &Backend) -> HealthCheckResult {
        let start = Instant::now();

        let (healthy, error) = match self.client.get(backend.health_url()).send().await {
            Ok(response) if response.status() == StatusCode::OK => (true, None),
            Ok(response) => (false, Some(format!("HTTP {}", response.status()))),
            Err(e) if e.is_timeout() => (false, Some("Request timeout".to_string())),
            Err(e) => (false, Some(e.to_string())),
        };

        let response_time_ms = start.elapsed().as_millis() as u64;

        if let Some(metrics) = &self.metrics {
            metrics.update_backend_health(backend.name(), healthy);
        }

        if healthy {
            debug!(backend = backend.name(), response_time_ms, "backend is healthy");
        } else {
            warn!(
                backend = backend.name(),
                response_time_ms,
                "backend is unhealthy: {}",
                error.as_deref().unwrap_or("unknown error")
            );
        }

        HealthCheckResult {
            backend: backend.name().to_string(),
            healthy,
            response_time_ms,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::build_client;
    use std::time::Duration;

    fn checker(orders: &str, products: &str) -> HealthChecker {
        HealthChecker::new(
            build_client(Duration::from_secs(5)).unwrap(),
            Backends::new(orders, products).unwrap(),
            None,
        )
    }

    #[tokio::test]
    async fn ok_status_is_healthy() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/healthz")
            .with_status(200)
            .with_body(r#"{"status":"healthy"}"#)
            .create_async()
            .await;

        let checker = checker(&server.url(), &server.url());
        let result = checker.check(&checker.backends.orders).await;

        assert!(result.healthy);
        assert_eq!(result.backend, "orders");
        assert!(result.error.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn other_success_codes_are_unhealthy() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(204)
            .create_async()
            .await;

        let checker = checker(&server.url(), &server.url());
        let result = checker.check(&checker.backends.products).await;

        assert!(!result.healthy);
        assert_eq!(result.error.as_deref(), Some("HTTP 204 No Content"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_unhealthy() {
        let checker = checker("http://127.0.0.1:1", "http://127.0.0.1:1");
        let report = checker.check_all().await;

        assert!(!report.orders);
        assert!(!report.products);
        assert!(!report.is_ready());
    }

    #[tokio::test]
    async fn silent_backend_times_out_as_unhealthy() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let checker = HealthChecker::new(
            build_client(Duration::from_secs(1)).unwrap(),
            Backends::new(&url, &url).unwrap(),
            None,
        );
        let result = checker.check(&checker.backends.orders).await;

        assert!(!result.healthy);
        assert_eq!(result.error.as_deref(), Some("Request timeout"));
    }

    #[tokio::test]
    async fn backends_are_reported_independently() {
        let mut orders = mockito::Server::new_async().await;
        orders
            .mock("GET", "/healthz")
            .with_status(200)
            .create_async()
            .await;
        let mut products = mockito::Server::new_async().await;
        products
            .mock("GET", "/healthz")
            .with_status(500)
            .create_async()
            .await;

        let report = checker(&orders.url(), &products.url()).check_all().await;

        assert!(report.orders);
        assert!(!report.products);
        assert!(!report.is_ready());
    }
}
