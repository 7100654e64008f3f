// src/config/models.rs
use anyhow::{bail, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::proxy::Backends;

pub const DEFAULT_ORDER_SERVICE_URL: &str = "http://order-service:8081";
pub const DEFAULT_PRODUCT_SERVICE_URL: &str = "http://product-service:8082";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_order_service_url")]
    pub order_service_url: String,

    #[serde(default = "default_product_service_url")]
    pub product_service_url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Applies to every outbound call, health checks and forwarded requests alike.
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,

    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,

    /// How long a keep-alive connection may sit without a new request.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,

    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            order_service_url: default_order_service_url(),
            product_service_url: default_product_service_url(),
            port: default_port(),
            client_timeout_secs: default_client_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("port must be non-zero");
        }
        if self.client_timeout_secs == 0 {
            bail!("client_timeout_secs must be greater than 0");
        }
        if self.read_timeout_secs == 0
            || self.write_timeout_secs == 0
            || self.idle_timeout_secs == 0
        {
            bail!("read, write and idle timeouts must be greater than 0");
        }
        if self.metrics.enabled {
            if self.metrics.port == 0 {
                bail!("metrics.port must be non-zero");
            }
            if self.metrics.port == self.port {
                bail!("metrics.port must differ from port ({})", self.port);
            }
            if !self.metrics.path.starts_with('/') {
                bail!("metrics.path must start with '/', got {:?}", self.metrics.path);
            }
        }

        self.backends()?;
        Ok(())
    }

    /// Resolve the orders and products base URLs into backend references.
    pub fn backends(&self) -> Result<Backends> {
        Backends::new(&self.order_service_url, &self.product_service_url)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        ([0, 0, 0, 0], self.port).into()
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn default_order_service_url() -> String {
    DEFAULT_ORDER_SERVICE_URL.to_string()
}

fn default_product_service_url() -> String {
    DEFAULT_PRODUCT_SERVICE_URL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_client_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    10
}

fn default_write_timeout_secs() -> u64 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    30
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
