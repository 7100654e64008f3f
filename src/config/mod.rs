// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Load configuration from built-in defaults, an optional file (YAML or JSON,
/// by extension) and the process environment, later sources winning.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    load_config_with_env(path, None)
}

/// Same as [`load_config`], reading variables from `env` instead of the
/// process environment when it is given.
pub fn load_config_with_env(
    path: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<Config> {
    let mut builder = ::config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(::config::File::from(path).required(true));
    }

    builder = builder.add_source(
        ::config::Environment::default()
            .separator("__")
            .try_parsing(true)
            .ignore_empty(true)
            .source(env),
    );

    let config: Config = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    config.validate()?;
    Ok(config)
}
