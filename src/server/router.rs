// ────────────────────────────────
// src/server/router.rs
// Path-based dispatch to the info, health and proxy handlers.
// ────────────────────────────────
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use hyper::{Body, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::response;
use crate::config::Config;
use crate::health::{HealthChecker, LivenessResponse, ReadinessResponse};
use crate::metrics::MetricsCollector;
use crate::proxy::{build_client, Backends, Proxy};

pub const SERVICE_NAME: &str = "frontend";

const ORDERS_PREFIX: &str = "/api/orders/";
const PRODUCTS_PREFIX: &str = "/api/products/";

const VERSION_BODY: &str = r#"{"version": "1.1.0", "service": "frontend"}"#;

#[derive(Debug, Serialize)]
struct ServiceDescriptor {
    service: &'static str,
    version: &'static str,
    message: &'static str,
}

const DESCRIPTOR: ServiceDescriptor = ServiceDescriptor {
    service: SERVICE_NAME,
    version: "1.0.0",
    message: "GKE GitOps Platform - Frontend Service",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    Liveness,
    Readiness,
    Status,
    Version,
    Orders,
    Products,
    /// Prefix requested without its trailing slash.
    Redirect(&'static str),
}

impl Route {
    /// Exact paths win; `/` catches everything else.
    pub fn resolve(path: &str) -> Self {
        match path {
            "/healthz" => Route::Liveness,
            "/readyz" => Route::Readiness,
            "/status" => Route::Status,
            "/version" => Route::Version,
            "/api/orders" => Route::Redirect(ORDERS_PREFIX),
            "/api/products" => Route::Redirect(PRODUCTS_PREFIX),
            p if p.starts_with(ORDERS_PREFIX) => Route::Orders,
            p if p.starts_with(PRODUCTS_PREFIX) => Route::Products,
            _ => Route::Root,
        }
    }

    /// Bounded label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Route::Root => "root",
            Route::Liveness => "healthz",
            Route::Readiness => "readyz",
            Route::Status => "status",
            Route::Version => "version",
            Route::Orders => "orders",
            Route::Products => "products",
            Route::Redirect(_) => "redirect",
        }
    }
}

pub struct Router {
    backends: Backends,
    proxy: Proxy,
    health: HealthChecker,
}

impl Router {
    pub fn new(backends: Backends, proxy: Proxy, health: HealthChecker) -> Self {
        Self {
            backends,
            proxy,
            health,
        }
    }

    /// Wire the backends and one shared outbound client from configuration.
    pub fn from_config(config: &Config, metrics: Option<Arc<MetricsCollector>>) -> Result<Self> {
        let backends = config.backends()?;
        let client = build_client(config.client_timeout()).context("Failed to create HTTP client")?;

        let proxy = Proxy::new(client.clone(), metrics.clone());
        let health = HealthChecker::new(client, backends.clone(), metrics);

        Ok(Self::new(backends, proxy, health))
    }

    pub async fn route(&self, req: Request<Body>) -> Response<Body> {
        let route = Route::resolve(req.uri().path());
        self.dispatch(route, req).await
    }

    pub async fn dispatch(&self, route: Route, req: Request<Body>) -> Response<Body> {
        match route {
            Route::Root => response::json(StatusCode::OK, &DESCRIPTOR),
            Route::Liveness => liveness(),
            Route::Readiness => self.readiness().await,
            Route::Status => self.status().await,
            Route::Version => response::raw_json(StatusCode::OK, VERSION_BODY),
            Route::Orders => self.proxy.handle(&self.backends.orders, req).await,
            Route::Products => self.proxy.handle(&self.backends.products, req).await,
            Route::Redirect(prefix) => {
                let location = match req.uri().query() {
                    Some(query) => format!("{}?{}", prefix, query),
                    None => prefix.to_string(),
                };
                response::moved_permanently(&location)
            }
        }
    }

    async fn readiness(&self) -> Response<Body> {
        let report = self.health.check_all().await;
        let status = if report.is_ready() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        response::json(
            status,
            &ReadinessResponse {
                status: report.readiness(),
            },
        )
    }

    async fn status(&self) -> Response<Body> {
        let report = self.health.check_all().await;
        response::json(StatusCode::OK, &report.summary())
    }
}

fn liveness() -> Response<Body> {
    response::json(
        StatusCode::OK,
        &LivenessResponse {
            status: "healthy",
            service: SERVICE_NAME,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exact_paths() {
        assert_eq!(Route::resolve("/"), Route::Root);
        assert_eq!(Route::resolve("/healthz"), Route::Liveness);
        assert_eq!(Route::resolve("/readyz"), Route::Readiness);
        assert_eq!(Route::resolve("/status"), Route::Status);
        assert_eq!(Route::resolve("/version"), Route::Version);
    }

    #[test]
    fn resolves_proxy_prefixes() {
        assert_eq!(Route::resolve("/api/orders/"), Route::Orders);
        assert_eq!(Route::resolve("/api/orders/123"), Route::Orders);
        assert_eq!(Route::resolve("/api/products/prod-001"), Route::Products);
        assert_eq!(Route::resolve("/api/orders"), Route::Redirect("/api/orders/"));
        assert_eq!(Route::resolve("/api/products"), Route::Redirect("/api/products/"));
    }

    #[test]
    fn unknown_paths_fall_back_to_root() {
        assert_eq!(Route::resolve("/nope"), Route::Root);
        assert_eq!(Route::resolve("/healthz/extra"), Route::Root);
        assert_eq!(Route::resolve("/api/ordersx"), Route::Root);
        assert_eq!(Route::resolve("/api/"), Route::Root);
    }

    #[tokio::test]
    async fn liveness_reports_rfc3339_utc_timestamp() {
        let response = liveness();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], SERVICE_NAME);

        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }
}
