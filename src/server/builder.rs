// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::listener::bind_tcp;
use anyhow::{anyhow, Result};
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::Service;

/// Pause after a failed accept so persistent errors (EMFILE) don't spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Builder pattern so `main.rs` can inject its request handler.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
    header_read_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: None,
            header_read_timeout: None,
            idle_timeout: None,
        }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Bounds how long a client may take to deliver request headers once it
    /// starts sending them.
    pub fn with_header_read_timeout(mut self, timeout: Duration) -> Self {
        self.header_read_timeout = Some(timeout);
        self
    }

    /// Close a connection gracefully once no new request has arrived on it
    /// for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Bind the TCP socket without accepting yet.
    pub async fn bind(self) -> Result<BoundServer<H>> {
        let handler = self
            .handler
            .ok_or_else(|| anyhow!("handler must be set via with_handler()"))?;

        let listener = bind_tcp(self.addr).await?;
        let local_addr = listener.local_addr()?;

        let mut http = Http::new();
        if let Some(timeout) = self.header_read_timeout {
            http.http1_header_read_timeout(timeout);
        }

        Ok(BoundServer {
            listener,
            local_addr,
            handler,
            http,
            idle_timeout: self.idle_timeout,
        })
    }

    /// Bind, then serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.bind().await?.serve(shutdown).await
    }
}

pub struct BoundServer<H> {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: H,
    http: Http,
    idle_timeout: Option<Duration>,
}

impl<H> BoundServer<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections, one Tokio task each, until `shutdown` resolves.
    /// Connections already accepted are left to finish on their own.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("HTTP server listening on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(err) => {
                            tracing::warn!(%err, "failed to accept connection");
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                            continue;
                        }
                    };
                    let svc = self.handler.clone();
                    let http = self.http.clone();
                    let idle_timeout = self.idle_timeout;

                    tokio::spawn(async move {
                        if let Err(err) = serve_connection(http, stream, svc, idle_timeout).await {
                            tracing::debug!(%peer, %err, "connection error");
                        }
                    });
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Drive one connection. With an idle timeout, every request pushes the
/// deadline back; when it passes, the connection finishes any in-flight
/// request and closes.
async fn serve_connection<H>(
    http: Http,
    stream: tokio::net::TcpStream,
    svc: H,
    idle_timeout: Option<Duration>,
) -> Result<(), hyper::Error>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    let idle_timeout = match idle_timeout {
        Some(timeout) => timeout,
        None => return http.serve_connection(stream, svc).await,
    };

    let (activity_tx, mut activity_rx) = watch::channel(());
    let conn = http.serve_connection(
        stream,
        TrackActivity {
            inner: svc,
            activity: activity_tx,
        },
    );
    tokio::pin!(conn);

    loop {
        tokio::select! {
            result = conn.as_mut() => return result,
            changed = activity_rx.changed() => {
                if changed.is_err() {
                    return conn.await;
                }
            }
            _ = tokio::time::sleep(idle_timeout) => {
                tracing::debug!(?idle_timeout, "closing idle connection");
                conn.as_mut().graceful_shutdown();
                return conn.await;
            }
        }
    }
}

/// Signals every request it forwards to the wrapped service.
struct TrackActivity<S> {
    inner: S,
    activity: watch::Sender<()>,
}

impl<S> Service<Request<Body>> for TrackActivity<S>
where
    S: Service<Request<Body>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let _ = self.activity.send(());
        self.inner.call(req)
    }
}
