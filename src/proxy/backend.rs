// src/proxy/backend.rs
use anyhow::{bail, Context, Result};
use url::Url;

/// Path every backend answers health probes on.
pub const HEALTH_PATH: &str = "/healthz";

/// A downstream service addressed by its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    name: String,
    base_url: String,
}

impl Backend {
    pub fn new(name: impl Into<String>, base_url: &str) -> Result<Self> {
        let name = name.into();
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("{} backend URL is empty", name);
        }

        let url = Url::parse(trimmed)
            .with_context(|| format!("{} backend URL {:?} is not a valid URL", name, base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("{} backend URL must use http or https, got {}", name, url.scheme());
        }
        if url.host_str().is_none() {
            bail!("{} backend URL {:?} has no host", name, base_url);
        }

        Ok(Self {
            name,
            base_url: trimmed.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL + request path + raw query, joined as plain strings.
    pub fn target(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(query) if !query.is_empty() => format!("{}{}?{}", self.base_url, path, query),
            _ => format!("{}{}", self.base_url, path),
        }
    }

    pub fn health_url(&self) -> String {
        self.target(HEALTH_PATH, None)
    }
}

/// The two services the frontend fronts.
#[derive(Debug, Clone)]
pub struct Backends {
    pub orders: Backend,
    pub products: Backend,
}

impl Backends {
    pub fn new(orders_url: &str, products_url: &str) -> Result<Self> {
        Ok(Self {
            orders: Backend::new("orders", orders_url)?,
            products: Backend::new("products", products_url)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_keeps_path_and_query() {
        let backend = Backend::new("orders", "http://order-service:8081").unwrap();
        assert_eq!(
            backend.target("/api/orders/123", Some("x=1")),
            "http://order-service:8081/api/orders/123?x=1"
        );
        assert_eq!(
            backend.target("/api/orders/", None),
            "http://order-service:8081/api/orders/"
        );
        assert_eq!(
            backend.target("/api/orders/", Some("")),
            "http://order-service:8081/api/orders/"
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = Backend::new("products", "http://product-service:8082/").unwrap();
        assert_eq!(backend.base_url(), "http://product-service:8082");
        assert_eq!(backend.health_url(), "http://product-service:8082/healthz");
    }

    #[test]
    fn rejects_unusable_urls() {
        assert!(Backend::new("orders", "").is_err());
        assert!(Backend::new("orders", "   ").is_err());
        assert!(Backend::new("orders", "order-service:8081").is_err());
        assert!(Backend::new("orders", "ftp://order-service").is_err());
    }
}
