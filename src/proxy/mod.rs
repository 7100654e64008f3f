//
// src/proxy/mod.rs
//
mod backend;
mod proxy;

pub use backend::{Backend, Backends, HEALTH_PATH};
pub use proxy::{build_client, Proxy, ProxyError};
