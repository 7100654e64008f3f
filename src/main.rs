// src/main.rs
use anyhow::{Context, Result};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tracing::{error, info};

use frontend_edge::{
    config::{self, Config},
    metrics::MetricsRegistry,
    server::{RequestHandler, Router, ServerBuilder},
};

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("frontend_edge=info,hyper=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run().await {
        error!("Server failed: {:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Optional config file as the first argument; the environment always applies.
    let config_path = std::env::args().nth(1);
    if let Some(path) = &config_path {
        info!("Loading configuration from: {}", path);
    }
    let config = config::load_config(config_path.as_deref().map(Path::new))?;

    let metrics_registry = MetricsRegistry::new()?;
    let metrics = metrics_registry.collector();

    let router = Arc::new(Router::from_config(&config, Some(metrics.clone()))?);
    info!(
        orders = %config.order_service_url,
        products = %config.product_service_url,
        "Configured backends"
    );

    if config.metrics.enabled {
        start_metrics_server(&config, metrics_registry)?;
    }

    let handler = ServiceBuilder::new()
        .timeout(config.write_timeout())
        .service(RequestHandler::new(router, Some(metrics)));

    info!("Frontend service starting on port {}", config.port);

    ServerBuilder::new(config.listen_addr())
        .with_handler(handler)
        .with_header_read_timeout(config.read_timeout())
        .with_idle_timeout(config.idle_timeout())
        .serve(shutdown_signal())
        .await
}

fn start_metrics_server(config: &Config, registry: MetricsRegistry) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(config.metrics.path.clone());
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    let response = if req.uri().path() == path.as_str() {
                        let mut response = Response::new(Body::from(registry.gather()));
                        response.headers_mut().insert(
                            CONTENT_TYPE,
                            HeaderValue::from_static("text/plain; version=0.0.4"),
                        );
                        response
                    } else {
                        let mut response = Response::new(Body::from("Not Found"));
                        *response.status_mut() = StatusCode::NOT_FOUND;
                        response
                    };
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind metrics listener on {}", addr))?
        .serve(make_service);

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
