// src/metrics/collector.rs
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Text exposition of every registered family.
    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        buffer
    }
}

pub struct MetricsCollector {
    // Inbound
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,

    // Backends
    pub backend_requests_total: IntCounterVec,
    pub backend_request_duration_seconds: HistogramVec,
    pub backend_health_status: IntGaugeVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new("frontend_requests_total", "Total number of inbound requests"),
            &["route", "method", "status_code"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "frontend_request_duration_seconds",
                "Inbound request duration in seconds, up to response headers",
            ),
            &["route"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let backend_requests_total = IntCounterVec::new(
            Opts::new("frontend_backend_requests_total", "Total proxied backend requests"),
            &["backend", "outcome"],
        )?;
        registry.register(Box::new(backend_requests_total.clone()))?;

        let backend_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "frontend_backend_request_duration_seconds",
                "Proxied backend request duration",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(backend_request_duration_seconds.clone()))?;

        let backend_health_status = IntGaugeVec::new(
            Opts::new(
                "frontend_backend_health_status",
                "Result of the latest backend health check (1=healthy, 0=unhealthy)",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(backend_health_status.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            backend_requests_total,
            backend_request_duration_seconds,
            backend_health_status,
        })
    }

    pub fn record_request(&self, route: &str, method: &str, status_code: u16, duration: Duration) {
        let status = status_code.to_string();
        self.requests_total
            .with_label_values(&[route, method, status.as_str()])
            .inc();

        self.request_duration_seconds
            .with_label_values(&[route])
            .observe(duration.as_secs_f64());
    }

    pub fn record_backend_request(&self, backend: &str, outcome: &str, duration: Duration) {
        self.backend_requests_total
            .with_label_values(&[backend, outcome])
            .inc();

        self.backend_request_duration_seconds
            .with_label_values(&[backend])
            .observe(duration.as_secs_f64());
    }

    pub fn update_backend_health(&self, backend: &str, healthy: bool) {
        let value = if healthy { 1 } else { 0 };
        self.backend_health_status
            .with_label_values(&[backend])
            .set(value);
    }
}
