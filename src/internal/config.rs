//! Process configuration via environment variables, with defaults that
//! make a local two-process setup work out of the box.

use std::env;
use std::time::Duration;

const DEFAULT_BACKEND_BIND: &str = "0.0.0.0:7501";
const DEFAULT_GATEWAY_BIND: &str = "0.0.0.0:7500";
const DEFAULT_BACKEND_URL: &str = "http://localhost:7501";
const DEFAULT_GATEWAY_URL: &str = "http://localhost:7500";
const DEFAULT_DB_URL: &str = "sqlite://modelcheck.db?mode=rwc";
const DEFAULT_POLL_TIMEOUT_MS: u64 = 5000;

pub fn backend_bind_addr() -> String {
    env::var("MODELCHECK_BACKEND_BIND").unwrap_or_else(|_| DEFAULT_BACKEND_BIND.to_string())
}

pub fn gateway_bind_addr() -> String {
    env::var("MODELCHECK_GATEWAY_BIND").unwrap_or_else(|_| DEFAULT_GATEWAY_BIND.to_string())
}

/// Where the gateway reaches the backend.
pub fn backend_url() -> String {
    env::var("MODELCHECK_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string())
}

/// Where checkctl reaches the gateway.
pub fn gateway_url() -> String {
    env::var("MODELCHECK_GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string())
}

/// SQLite url for the gateway's durable store. `mode=rwc` creates the
/// file on first start.
pub fn database_url() -> String {
    env::var("MODELCHECK_DB").unwrap_or_else(|_| DEFAULT_DB_URL.to_string())
}

/// Timeout for each gateway-to-backend request. Keeping this short makes
/// a down backend surface as "still running" quickly instead of hanging
/// client polls.
pub fn poll_timeout() -> Duration {
    let ms = env::var("MODELCHECK_POLL_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_POLL_TIMEOUT_MS);
    Duration::from_millis(ms)
}
