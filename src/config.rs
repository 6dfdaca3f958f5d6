use std::{env, net::SocketAddr, time::Duration};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub credential_cache_ttl: Duration,
    pub route_cache_ttl: Duration,
    pub service_cache_ttl: Duration,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    pub metrics_flush_interval: Duration,
    pub forward_timeout: Duration,
    pub log_queue_capacity: usize,
    pub default_rate_limit: u32,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .context("invalid BIND_ADDR")?;

        Ok(Self {
            bind_addr,
            credential_cache_ttl: Duration::from_secs(parse_env(
                "CREDENTIAL_CACHE_TTL_SECS",
                10u64,
            )),
            route_cache_ttl: Duration::from_secs(parse_env("ROUTE_CACHE_TTL_SECS", 5u64)),
            service_cache_ttl: Duration::from_secs(parse_env("SERVICE_CACHE_TTL_SECS", 5u64)),
            health_check_interval: Duration::from_secs(parse_env(
                "HEALTH_CHECK_INTERVAL_SECS",
                10u64,
            )),
            health_check_timeout: Duration::from_secs(parse_env(
                "HEALTH_CHECK_TIMEOUT_SECS",
                5u64,
            )),
            metrics_flush_interval: Duration::from_secs(parse_env(
                "METRICS_FLUSH_INTERVAL_SECS",
                5u64,
            )),
            forward_timeout: Duration::from_secs(parse_env("FORWARD_TIMEOUT_SECS", 30u64)),
            log_queue_capacity: parse_env("LOG_QUEUE_CAPACITY", 1024usize),
            default_rate_limit: parse_env("DEFAULT_RATE_LIMIT_PER_MINUTE", 100u32),
        })
    }
}

// Unparsable values fall back to the default rather than aborting boot.
fn parse_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}
