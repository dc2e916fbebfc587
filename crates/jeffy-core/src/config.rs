use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can feed a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let api_key_hash_salt = require("JEFFY_API_KEY_HASH_SALT")?;

    let env = parse_environment(&or_default("JEFFY_ENV", "development"))?;

    let bind_addr = parse("JEFFY_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("JEFFY_LOG_LEVEL", "info");
    let catalog_path = PathBuf::from(or_default("JEFFY_CATALOG_PATH", "./config/catalog.yaml"));
    let default_currency = parse_currency(&or_default("JEFFY_DEFAULT_CURRENCY", "GBP"))?;

    let db_max_connections = parse_u32("JEFFY_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("JEFFY_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("JEFFY_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let maps_api_key = lookup("GOOGLE_MAPS_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    let maps_timeout_secs = parse_u64("JEFFY_MAPS_TIMEOUT_SECS", "15")?;
    let maps_max_retries = parse_u32("JEFFY_MAPS_MAX_RETRIES", "3")?;

    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "JEFFY_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        catalog_path,
        api_key_hash_salt,
        default_currency,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        maps_api_key,
        maps_timeout_secs,
        maps_max_retries,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "JEFFY_ENV".to_string(),
            reason: format!("expected development, test or production, got '{other}'"),
        }),
    }
}

/// Accepts a three-letter ISO 4217 code and normalizes it to upper case.
fn parse_currency(s: &str) -> Result<String, ConfigError> {
    let code = s.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(ConfigError::InvalidEnvVar {
            var: "JEFFY_DEFAULT_CURRENCY".to_string(),
            reason: format!("expected a three-letter currency code, got '{s}'"),
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
