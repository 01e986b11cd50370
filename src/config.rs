use std::{fmt::Display, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};

use crate::payments::{RetryPolicy, TransportErrorPolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,

    pub gateway_url: String,
    pub gateway_api_key: Option<String>,
    pub poll_policy: RetryPolicy,

    pub event_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let poll_policy = RetryPolicy {
            interval: Duration::from_secs(var_or("PAYMENT_POLL_INTERVAL_SECS", 3u64)?),
            max_attempts: var_or("PAYMENT_POLL_MAX_ATTEMPTS", 20u32)?,
            on_transport_error: var_or("PAYMENT_TRANSPORT_ERRORS", TransportErrorPolicy::Abort)?,
        };
        if poll_policy.max_attempts == 0 {
            return Err(anyhow!("PAYMENT_POLL_MAX_ATTEMPTS must be at least 1"));
        }

        Ok(Config {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080".to_owned())?,
            database_url: var_or("DATABASE_URL", "sqlite://servicehub.db?mode=rwc".to_owned())?,
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 16u32)?,

            gateway_url: dotenv::var("GATEWAY_URL").context("GATEWAY_URL must be set")?,
            gateway_api_key: dotenv::var("GATEWAY_API_KEY").ok(),
            poll_policy,

            event_channel_capacity: var_or("EVENT_CHANNEL_CAPACITY", 256usize)?,
        })
    }
}

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match dotenv::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow!("invalid {key}={raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}
