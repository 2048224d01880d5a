use std::{net::SocketAddr, str::FromStr};

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load configuration from the process environment after reading `.env`.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Like [`load_app_config`] but without touching `.env`.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Builds the config from an arbitrary env lookup so tests can feed a map.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url =
        lookup("DATABASE_URL").map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".into()))?;
    let env = parse_environment(&or_default("TILECRM_ENV", "development"))?;

    let bind_addr: SocketAddr = setting(&lookup, "TILECRM_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("TILECRM_LOG_LEVEL", "info");
    let api_keys = parse_api_keys(&or_default("TILECRM_API_KEYS", ""));

    let db_max_connections: u32 = setting(&lookup, "TILECRM_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections: u32 = setting(&lookup, "TILECRM_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs: u64 = setting(&lookup, "TILECRM_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let rate_limit_max_requests: usize = setting(&lookup, "TILECRM_RATE_LIMIT_MAX", "120")?;
    let rate_limit_window_secs: u64 = setting(&lookup, "TILECRM_RATE_LIMIT_WINDOW_SECS", "60")?;

    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "TILECRM_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }
    if rate_limit_max_requests == 0 || rate_limit_window_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "TILECRM_RATE_LIMIT_MAX".to_string(),
            reason: "rate limit and window must both be positive".to_string(),
        });
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        api_keys,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        rate_limit_max_requests,
        rate_limit_window_secs,
    })
}

/// Parses `var`, falling back to `default` when unset.
fn setting<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

/// Comma-separated bearer tokens, trimmed and deduplicated.
fn parse_api_keys(raw: &str) -> Vec<String> {
    let mut keys: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TILECRM_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
