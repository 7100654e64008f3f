// src/server/handler.rs
use hyper::{Body, Request, Response};
use std::sync::Arc;
use std::time::Instant;
use tower::Service;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use super::router::{Route, Router};
use crate::metrics::MetricsCollector;

/// Per-connection `tower::Service` wrapping the shared [`Router`].
#[derive(Clone)]
pub struct RequestHandler {
    router: Arc<Router>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RequestHandler {
    pub fn new(router: Arc<Router>, metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self { router, metrics }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Box<dyn std::error::Error + Send + Sync>;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let router = self.router.clone();
        let metrics = self.metrics.clone();

        let route = Route::resolve(req.uri().path());
        let method = req.method().clone();
        let span = info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %method,
            path = %req.uri().path(),
        );

        Box::pin(
            async move {
                let start = Instant::now();
                let response = router.dispatch(route, req).await;
                let elapsed = start.elapsed();

                info!(
                    route = route.label(),
                    status = response.status().as_u16(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "request completed"
                );
                if let Some(metrics) = &metrics {
                    metrics.record_request(
                        route.label(),
                        method.as_str(),
                        response.status().as_u16(),
                        elapsed,
                    );
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}
