use std::{env, fmt::Display, ops::RangeInclusive, str::FromStr};

use chrono::Duration;

use crate::error::ConfigError;

/// Accepted values for `INVITE_TTL_DAYS`.
const INVITE_TTL_DAYS: RangeInclusive<i64> = 1..=365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub invite_ttl_days: i64,
    pub vendor_auto_approve: bool,
    pub geocoder_url: String,
    pub geocoder_key: Option<String>,
    pub auth_page_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 10,
            invite_ttl_days: 7,
            vendor_auto_approve: true,
            geocoder_url: "https://api.locationiq.com/v1".into(),
            geocoder_key: None,
            auth_page_path: "/auth".into(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_backend = parse_or(&lookup, "STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let defaults = Self::default();
        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            store_backend,
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            invite_ttl_days: parse_in(
                &lookup,
                "INVITE_TTL_DAYS",
                defaults.invite_ttl_days,
                INVITE_TTL_DAYS,
            )?,
            vendor_auto_approve: parse_or(&lookup, "VENDOR_AUTO_APPROVE", defaults.vendor_auto_approve)?,
            geocoder_url: lookup("GEOCODER_URL").unwrap_or(defaults.geocoder_url),
            geocoder_key: lookup("GEOCODER_KEY").filter(|s| !s.trim().is_empty()),
            auth_page_path: lookup("AUTH_PAGE_PATH").unwrap_or(defaults.auth_page_path),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn invite_ttl(&self) -> Duration {
        Duration::days(self.invite_ttl_days)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| {
            log::warn!("Invalid {key} value: {value}");
            ConfigError::Invalid { key, value }
        }),
        None => {
            log::info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn parse_in<F, T>(
    lookup: &F,
    key: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display + PartialOrd,
{
    let value = parse_or(lookup, key, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        log::warn!(
            "{key} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        );
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    }
}

impl Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Postgres => f.write_str("postgres"),
            StoreBackend::Memory => f.write_str("memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn memory_backend_uses_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("STORE_BACKEND", "memory")])).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.invite_ttl(), Duration::days(7));
        assert!(config.vendor_auto_approve);
        assert_eq!(config.geocoder_key, None);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("STORE_BACKEND", "memory"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn invite_ttl_outside_a_year_is_rejected() {
        for days in ["0", "-3", "366", "9223372036854775807"] {
            let err = AppConfig::from_lookup(lookup(&[
                ("STORE_BACKEND", "memory"),
                ("INVITE_TTL_DAYS", days),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "INVITE_TTL_DAYS", .. }));
        }

        let config = AppConfig::from_lookup(lookup(&[
            ("STORE_BACKEND", "memory"),
            ("INVITE_TTL_DAYS", "365"),
        ]))
        .unwrap();
        assert_eq!(config.invite_ttl(), Duration::days(365));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/market"),
            ("PORT", "9000"),
            ("INVITE_TTL_DAYS", "3"),
            ("VENDOR_AUTO_APPROVE", "false"),
        ]))
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.port, 9000);
        assert_eq!(config.invite_ttl_days, 3);
        assert!(!config.vendor_auto_approve);
    }
}
