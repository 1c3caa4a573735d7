//! Configuration for the AssetFlow server.
//!
//! All configuration is loaded from environment variables.
//! No secrets are logged.

use std::str::FromStr;
use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 5000;

/// Default request body limit (1 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Frontend origins allowed by the default CORS policy
pub const DEFAULT_CORS_ORIGINS: [&str; 5] = [
    "http://localhost:5173",
    "https://assetflow-14.web.app",
    "https://assetflow-14.netlify.app",
    "https://assetflow-14.vercel.app",
    "https://assetflow-server-side.vercel.app",
];

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Server port
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    // === Store Configuration ===
    /// PostgreSQL connection URL. `None` selects the in-memory store.
    pub database_url: Option<String>,

    /// Maximum pooled database connections (default: 5)
    pub database_max_connections: u32,

    /// How long to wait for a pooled connection (default: 10 seconds)
    pub database_acquire_timeout: Duration,

    // === Payment Processor ===
    /// Stripe secret key. Payments are disabled without it.
    pub stripe_secret_key: Option<String>,

    /// Stripe API base URL
    pub stripe_api_base: String,

    /// Currency for created payment intents
    pub payment_currency: String,

    /// Timeout for a single processor request (default: 30 seconds)
    pub payment_timeout: Duration,

    // === CORS ===
    /// Origins allowed to make credentialed cross-origin requests
    pub cors_allowed_origins: Vec<String>,

    /// Allow any origin, without credentials
    pub cors_permissive: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(&lookup, "PORT").unwrap_or(DEFAULT_PORT),
            max_body_size: parse_var(&lookup, "MAX_BODY_SIZE").unwrap_or(DEFAULT_MAX_BODY_SIZE),

            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS").unwrap_or(5),
            database_acquire_timeout: Duration::from_secs(
                parse_var(&lookup, "DATABASE_ACQUIRE_TIMEOUT_SECS").unwrap_or(10),
            ),

            stripe_secret_key: lookup("STRIPE_SECRET_KEY").filter(|v| !v.trim().is_empty()),
            stripe_api_base: lookup("STRIPE_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.stripe.com".to_string()),
            payment_currency: lookup("PAYMENT_CURRENCY")
                .map(|v| v.trim().to_lowercase())
                .unwrap_or_else(|| "usd".to_string()),
            payment_timeout: Duration::from_secs(parse_var(&lookup, "PAYMENT_TIMEOUT_SECS").unwrap_or(30)),

            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .map(|v| parse_origin_list(&v))
                .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect()),
            cors_permissive: lookup("CORS_PERMISSIVE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Check if the payment processor is configured
    pub fn payments_configured(&self) -> bool {
        self.stripe_secret_key.is_some()
    }

    /// Name of the store backend this configuration selects
    pub fn store_backend(&self) -> &'static str {
        if self.database_url.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);

        assert_eq!(config.port, 5000);
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.store_backend(), "memory");
        assert!(!config.payments_configured());
        assert_eq!(config.payment_currency, "usd");
        assert_eq!(config.cors_allowed_origins.len(), 5);
        assert!(!config.cors_permissive);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PORT", "8081"),
            ("DATABASE_URL", "postgres://localhost/assetflow"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_API_BASE", "http://127.0.0.1:9999/"),
            ("PAYMENT_CURRENCY", "EUR"),
            ("CORS_PERMISSIVE", "1"),
        ]);

        assert_eq!(config.port, 8081);
        assert_eq!(config.store_backend(), "postgres");
        assert!(config.payments_configured());
        assert_eq!(config.stripe_api_base, "http://127.0.0.1:9999");
        assert_eq!(config.payment_currency, "eur");
        assert!(config.cors_permissive);
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let config = config_from(&[("PORT", "not-a-port")]);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn blank_secrets_are_treated_as_unset() {
        let config = config_from(&[("STRIPE_SECRET_KEY", "  "), ("DATABASE_URL", "")]);
        assert!(!config.payments_configured());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn origin_list_is_trimmed() {
        let config = config_from(&[(
            "CORS_ALLOWED_ORIGINS",
            " https://a.example/ , ,https://b.example",
        )]);
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
