use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/ticketing";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_MERCADOPAGO_API_URL: &str = "https://api.mercadopago.com";
const DEFAULT_UNPAID_HOLD_MINUTES: i64 = 30;
const MAX_UNPAID_HOLD_MINUTES: i64 = 7 * 24 * 60;
const DEFAULT_SCAN_DEDUP_SECONDS: u64 = 5;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    pub access_token: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub storage: StorageBackend,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub public_base_url: String,
    pub mercadopago: Option<MercadoPagoConfig>,
    pub unpaid_hold: chrono::Duration,
    pub scan_dedup_window: Duration,
    pub cors_allowed_origins: Vec<String>,
    /// `RUST_ENV=production`; enables HSTS.
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage = match get("STORAGE_BACKEND").as_deref().map(str::to_lowercase) {
            None => StorageBackend::Postgres,
            Some(v) if v == "postgres" => StorageBackend::Postgres,
            Some(v) if v == "memory" => StorageBackend::Memory,
            Some(value) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value,
                })
            }
        };

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let mercadopago = get("MERCADOPAGO_ACCESS_TOKEN").map(|access_token| MercadoPagoConfig {
            access_token,
            api_url: get("MERCADOPAGO_API_URL")
                .unwrap_or_else(|| DEFAULT_MERCADOPAGO_API_URL.to_string()),
        });

        let hold_minutes = parse_number(
            &get,
            "UNPAID_HOLD_MINUTES",
            DEFAULT_UNPAID_HOLD_MINUTES as u64,
        )?;
        let hold_minutes = i64::try_from(hold_minutes)
            .ok()
            .filter(|minutes| *minutes <= MAX_UNPAID_HOLD_MINUTES)
            .ok_or_else(|| ConfigError::Invalid {
                key: "UNPAID_HOLD_MINUTES",
                value: hold_minutes.to_string(),
            })?;
        let dedup_seconds = parse_number(&get, "SCAN_DEDUP_SECONDS", DEFAULT_SCAN_DEDUP_SECONDS)?;

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            storage,
            bind_addr,
            jwt_secret,
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            mercadopago,
            unpaid_hold: chrono::Duration::minutes(hold_minutes),
            scan_dedup_window: Duration::from_secs(dedup_seconds),
            cors_allowed_origins: split_origins(
                &get("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
            production: get("RUST_ENV").map_or(false, |v| v.eq_ignore_ascii_case("production")),
        })
    }

    /// Configuration for tests and local runs without a database.
    pub fn for_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            storage: StorageBackend::Memory,
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3001))),
            jwt_secret: jwt_secret.into(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            mercadopago: None,
            unpaid_hold: chrono::Duration::minutes(DEFAULT_UNPAID_HOLD_MINUTES),
            scan_dedup_window: Duration::from_secs(DEFAULT_SCAN_DEDUP_SECONDS),
            cors_allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            production: false,
        }
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<G>(get: &G, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.bind_addr.port(), 3001);
        assert!(config.mercadopago.is_none());
        assert_eq!(config.unpaid_hold, chrono::Duration::minutes(30));
        assert_eq!(config.scan_dedup_window, Duration::from_secs(5));
        assert_eq!(config.cors_allowed_origins.len(), 2);
        assert!(!config.production);
    }

    #[test]
    fn test_missing_jwt_secret() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("STORAGE_BACKEND", "Memory"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("MERCADOPAGO_ACCESS_TOKEN", "APP_USR-1"),
            ("PUBLIC_BASE_URL", "https://tickets.example.com/"),
            ("UNPAID_HOLD_MINUTES", "10"),
            ("CORS_ALLOWED_ORIGINS", "https://tickets.example.com, "),
            ("RUST_ENV", "Production"),
        ]))
        .unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.public_base_url, "https://tickets.example.com");
        let mp = config.mercadopago.unwrap();
        assert_eq!(mp.api_url, DEFAULT_MERCADOPAGO_API_URL);
        assert_eq!(config.unpaid_hold, chrono::Duration::minutes(10));
        assert_eq!(config.cors_allowed_origins, vec!["https://tickets.example.com"]);
        assert!(config.production);
    }

    #[test]
    fn test_invalid_number() {
        let err = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("SCAN_DEDUP_SECONDS", "five"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "SCAN_DEDUP_SECONDS",
                ..
            }
        ));
    }

    #[test]
    fn test_unpaid_hold_is_bounded() {
        for value in ["10081", "18446744073709551615"] {
            let err = Config::from_lookup(lookup(&[
                ("JWT_SECRET", "s3cret"),
                ("UNPAID_HOLD_MINUTES", value),
            ]))
            .unwrap_err();
            assert!(matches!(
                err,
                ConfigError::Invalid {
                    key: "UNPAID_HOLD_MINUTES",
                    ..
                }
            ));
        }

        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("UNPAID_HOLD_MINUTES", "10080"),
        ]))
        .unwrap();
        assert_eq!(config.unpaid_hold, chrono::Duration::days(7));
    }
}
