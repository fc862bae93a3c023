use rust_decimal::Decimal;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEV_JWT_SECRET: &str = "dev-only-jwt-secret-change-me";
const DEV_QR_SECRET: &str = "dev-only-qr-secret-change-me";
const DEV_PAYSTACK_SECRET: &str = "sk_test_dev_only";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub is_production: bool,
    pub cors_allowed_origins: String,
    pub jwt_secret: String,
    pub jwt_access_ttl_minutes: i64,
    pub jwt_refresh_ttl_days: i64,
    pub qr_code_secret: String,
    pub qr_code_expiry_hours: i64,
    pub paystack_secret_key: String,
    pub paystack_base_url: String,
    pub usd_to_ngn_rate: Decimal,
    pub frontend_url: String,
    pub default_from_email: String,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let is_production = env::var("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", 587)?,
                username: env::var("SMTP_USERNAME").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            }),
            _ => None,
        };

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/eventdesk".to_string()),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            bind_addr: parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3001)))?,
            is_production,
            jwt_secret: secret("JWT_SECRET", DEV_JWT_SECRET, is_production)?,
            jwt_access_ttl_minutes: parse_or("JWT_ACCESS_TTL_MINUTES", 60)?,
            jwt_refresh_ttl_days: parse_or("JWT_REFRESH_TTL_DAYS", 7)?,
            qr_code_secret: secret("QR_CODE_SECRET_KEY", DEV_QR_SECRET, is_production)?,
            qr_code_expiry_hours: parse_or("QR_CODE_EXPIRY_HOURS", 168)?,
            paystack_secret_key: secret("PAYSTACK_SECRET_KEY", DEV_PAYSTACK_SECRET, is_production)?,
            paystack_base_url: env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            usd_to_ngn_rate: parse_or("USD_TO_NGN_RATE", Decimal::new(1600, 0))?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| format!("{},{}", cors::DEFAULT_ALLOWED_ORIGINS, frontend_url)),
            frontend_url,
            default_from_email: env::var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|_| "EventDesk <no-reply@eventdesk.local>".to_string()),
            smtp,
        })
    }

    /// Settings for tests and local tooling; never reads the environment.
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/eventdesk_test".to_string(),
            database_max_connections: 1,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            is_production: false,
            cors_allowed_origins: cors::DEFAULT_ALLOWED_ORIGINS.to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_access_ttl_minutes: 60,
            jwt_refresh_ttl_days: 7,
            qr_code_secret: DEV_QR_SECRET.to_string(),
            qr_code_expiry_hours: 168,
            paystack_secret_key: DEV_PAYSTACK_SECRET.to_string(),
            paystack_base_url: "http://127.0.0.1:9".to_string(),
            usd_to_ngn_rate: Decimal::new(1600, 0),
            frontend_url: "http://localhost:5173".to_string(),
            default_from_email: "EventDesk <no-reply@eventdesk.local>".to_string(),
            smtp: None,
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(default),
    }
}

fn secret(key: &'static str, dev_default: &str, is_production: bool) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ if is_production => Err(ConfigError::Missing(key)),
        _ => {
            tracing::warn!("{} not set, using development default", key);
            Ok(dev_default.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_falls_back_when_unset() {
        std::env::remove_var("EVENTDESK_TEST_UNSET_VALUE");
        let value: u32 = parse_or("EVENTDESK_TEST_UNSET_VALUE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        std::env::set_var("EVENTDESK_TEST_BAD_NUMBER", "many");
        let err = parse_or::<u32>("EVENTDESK_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_secret_is_required_in_production() {
        std::env::remove_var("EVENTDESK_TEST_SECRET");
        assert!(matches!(
            secret("EVENTDESK_TEST_SECRET", "dev", true),
            Err(ConfigError::Missing("EVENTDESK_TEST_SECRET"))
        ));
        assert_eq!(secret("EVENTDESK_TEST_SECRET", "dev", false).unwrap(), "dev");
    }
}
