//! Environment-driven runtime configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// How long a hold stays live before the sweep may expire it.
    pub hold_ttl: chrono::Duration,
    /// Time between expiry sweeps.
    pub sweep_interval: Duration,
    /// Deadline on a single gateway charge call.
    pub gateway_timeout: Duration,
    /// Use Postgres-backed stores instead of in-memory ones.
    pub use_persistent_stores: bool,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            hold_ttl: chrono::Duration::seconds(env_parsed("HOLD_TTL_SECS", 300)),
            sweep_interval: Duration::from_millis(env_parsed("EXPIRY_SWEEP_INTERVAL_MS", 1000)),
            gateway_timeout: Duration::from_millis(env_parsed("GATEWAY_TIMEOUT_MS", 5000)),
            use_persistent_stores: std::env::var("USE_PERSISTENT_STORES")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, raw = %raw, "unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}
