use std::net::SocketAddr;

use lookup_common::upstream::LookupClientConfig;

use crate::error::AppError;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_BASIC_TYPE: &str = "P5151E";

/// Application configuration loaded explicitly from environment variables.
///
/// Upstream credentials are never compiled in; see [`LookupClientConfig::from_env`]
/// for the `LOOKUP_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for the HTTP relay.
    pub bind_addr: SocketAddr,
    /// Basic type used when a request omits `basic_type`.
    pub default_basic_type: String,
    pub lookup: LookupClientConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `RELAY_BIND_ADDR` (default "0.0.0.0:8000")
    /// - `RELAY_DEFAULT_BASIC_TYPE` (default "P5151E")
    ///
    /// Plus the required `LOOKUP_*` variables of the upstream client.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let bind_raw = var("RELAY_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.trim().parse::<SocketAddr>().map_err(|e| {
            AppError::Config(format!("RELAY_BIND_ADDR is not a socket address ({bind_raw}): {e}"))
        })?;

        let default_basic_type = var("RELAY_DEFAULT_BASIC_TYPE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASIC_TYPE.to_string());

        let lookup = LookupClientConfig::from_vars(&var)?;

        Ok(Self {
            bind_addr,
            default_basic_type,
            lookup,
        })
    }
}
