//! Process configuration, read once at startup from the environment.
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `BN_REDIS_URL` | yes | |
//! | `BN_DB_URL` | yes | |
//! | `BN_KEY_PREFIX` | no | `tmvh-transaction-` |
//! | `BN_SCAN_COUNT` | no | `100` |
//! | `BN_WAIT_INTERVAL_SECS` | no | `17` |

use std::time::Duration;

use thiserror::Error;
use txworker_core::{DEFAULT_KEY_PREFIX, KeyNamespace};

use crate::db::PostgresPoolConfig;
use crate::external::DEFAULT_NOTIFY_TIMEOUT;
use crate::workers::DispatchConfig;

pub const REDIS_URL_VAR: &str = "BN_REDIS_URL";
pub const DB_URL_VAR: &str = "BN_DB_URL";
pub const KEY_PREFIX_VAR: &str = "BN_KEY_PREFIX";
pub const SCAN_COUNT_VAR: &str = "BN_SCAN_COUNT";
pub const WAIT_INTERVAL_VAR: &str = "BN_WAIT_INTERVAL_SECS";

/// Confirmation markers expire after ten days.
pub const MARKER_TTL: Duration = Duration::from_secs(240 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Everything the daemon needs to start.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub redis_url: String,
    pub database_url: String,
    pub namespace: KeyNamespace,
    pub dispatch: DispatchConfig,
    pub marker_ttl: Duration,
    pub notify_timeout: Duration,
    pub db_pool: PostgresPoolConfig,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let redis_url = get(REDIS_URL_VAR).ok_or(ConfigError::Missing(REDIS_URL_VAR))?;
        let database_url = get(DB_URL_VAR).ok_or(ConfigError::Missing(DB_URL_VAR))?;

        let prefix = get(KEY_PREFIX_VAR).unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
        let namespace = KeyNamespace::new(prefix).map_err(|e| ConfigError::Invalid {
            var: KEY_PREFIX_VAR,
            reason: e.to_string(),
        })?;

        let mut dispatch = DispatchConfig::default();
        if let Some(raw) = get(SCAN_COUNT_VAR) {
            dispatch.page_size = parse_positive(SCAN_COUNT_VAR, &raw)?;
        }
        if let Some(raw) = get(WAIT_INTERVAL_VAR) {
            dispatch.wait_interval = Duration::from_secs(parse_positive(WAIT_INTERVAL_VAR, &raw)?);
        }

        Ok(Self {
            redis_url: normalize_redis_url(&redis_url),
            database_url,
            namespace,
            dispatch,
            marker_ttl: MARKER_TTL,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            db_pool: PostgresPoolConfig::default(),
        })
    }
}

/// Accept a bare `host:port` address as well as a full URL.
fn normalize_redis_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("redis://{raw}")
    }
}

fn parse_positive<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
