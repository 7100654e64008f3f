// src/health/status.rs
use serde::Serialize;

/// Outcome of one round of backend checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub orders: bool,
    pub products: bool,
}

impl HealthReport {
    pub fn is_ready(&self) -> bool {
        self.orders && self.products
    }

    pub fn readiness(&self) -> Readiness {
        if self.is_ready() {
            Readiness::Ready
        } else {
            Readiness::NotReady
        }
    }

    pub fn summary(&self) -> StatusSummary {
        StatusSummary {
            frontend: ServiceState::Ok,
            orders: ServiceState::from_healthy(self.orders),
            products: ServiceState::from_healthy(self.products),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Ok,
    Unreachable,
}

impl ServiceState {
    pub fn from_healthy(healthy: bool) -> Self {
        if healthy {
            ServiceState::Ok
        } else {
            ServiceState::Unreachable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Readiness {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "not ready")]
    NotReady,
}

/// Body of `/readyz`.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: Readiness,
}

/// Body of `/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub frontend: ServiceState,
    pub orders: ServiceState,
    pub products: ServiceState,
}

/// Body of `/healthz`.
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
}
