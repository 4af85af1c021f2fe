//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Authentication
//!
//! - `AUTH_ENABLED`: Require `Authorization: Bearer <token>` on every `/api` route
//! - `AUTH_JWKS_URL`: Key-distribution endpoint (required when auth is enabled)
//! - `AUTH_ISSUER`: Expected `iss` claim; unset skips the issuer check
//!
//! # Rate Limiting
//!
//! - `RATE_LIMIT_RPS`: Sustained requests per second per client (default: 10)
//! - `RATE_LIMIT_BURST`: Bucket capacity (default: 20)
//! - `RATE_LIMIT_MAX_CLIENTS`: Hard cap on tracked clients (default: 10000)
//!
//! # Cross-Origin Requests
//!
//! - `CORS_ALLOWED_ORIGINS`: Comma-separated list; `*` and `*.example.com` entries
//!   are accepted (default: `*`)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use axum::http::Method;

use crate::error::{AppError, AppResult};

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable console output
    #[default]
    Console,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "pretty" | "text" => Ok(LogFormat::Console),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected console or json)")),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    /// Per-request timeout, answered with 408 on expiry (default: 10 seconds)
    pub request_timeout: Duration,

    /// Maximum request body size in bytes (default: 1MB)
    pub max_request_body_size: usize,

    /// Grace period for background tasks during shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Require a valid bearer token on API routes (default: false)
    pub auth_enabled: bool,

    /// Expected token issuer, exact match. `None` disables the check.
    pub auth_issuer: Option<String>,

    /// OAuth client id advertised in the API document
    pub auth_client_id: Option<String>,

    /// Key-distribution endpoint serving `{"keys": [...]}`
    pub auth_jwks_url: Option<String>,

    /// Client-side timeout for key-set fetches (default: 5 seconds)
    pub jwks_fetch_timeout: Duration,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Enable per-client rate limiting (default: true)
    pub rate_limit_enabled: bool,

    /// Sustained requests per second per client (default: 10)
    pub rate_limit_rps: u32,

    /// Burst capacity per client (default: 20)
    pub rate_limit_burst: u32,

    /// Maximum number of client buckets kept in memory (default: 10000)
    pub rate_limit_max_clients: usize,

    /// Buckets not seen for this long are swept (default: 10 minutes)
    pub rate_limit_idle_ttl: Duration,

    /// How often idle buckets are swept (default: 60 seconds)
    pub rate_limit_sweep_interval: Duration,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed origins. `*` allows any, `*.example.com` allows subdomains.
    pub cors_allowed_origins: Vec<String>,

    /// Allowed methods (default: GET, POST, PUT, DELETE, OPTIONS)
    pub cors_allowed_methods: Vec<String>,

    /// Allowed request headers (default: Authorization, Content-Type)
    pub cors_allowed_headers: Vec<String>,

    /// Response headers exposed to scripts (default: none)
    pub cors_exposed_headers: Vec<String>,

    /// Emit `Access-Control-Allow-Credentials: true` (default: false)
    pub cors_allow_credentials: bool,

    /// Preflight cache duration; zero omits the header (default: 0)
    pub cors_max_age: Duration,

    // =========================================================================
    // Documentation
    // =========================================================================
    /// Serve `/docs` and `/docs/openapi.json` (default: false)
    pub docs_enabled: bool,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level directive used when `RUST_LOG` is not set (default: "info")
    pub log_level: String,

    /// Console or JSON log output (default: console)
    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any value fails to parse or the
    /// combination is inconsistent (see [`Config::validate`]).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8080)?,
            request_timeout: Duration::from_secs(Self::parse_env("REQUEST_TIMEOUT_SECS", 10)?),
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 1024 * 1024)?,
            shutdown_timeout: Duration::from_secs(Self::parse_env("SHUTDOWN_TIMEOUT_SECS", 30)?),

            // Authentication
            auth_enabled: Self::parse_bool_env("AUTH_ENABLED", false)?,
            auth_issuer: Self::optional_env("AUTH_ISSUER"),
            auth_client_id: Self::optional_env("AUTH_CLIENT_ID"),
            auth_jwks_url: Self::optional_env("AUTH_JWKS_URL"),
            jwks_fetch_timeout: Duration::from_secs(Self::parse_env("JWKS_FETCH_TIMEOUT_SECS", 5)?),

            // Rate limiting
            rate_limit_enabled: Self::parse_bool_env("RATE_LIMIT_ENABLED", true)?,
            rate_limit_rps: Self::parse_env("RATE_LIMIT_RPS", 10)?,
            rate_limit_burst: Self::parse_env("RATE_LIMIT_BURST", 20)?,
            rate_limit_max_clients: Self::parse_env("RATE_LIMIT_MAX_CLIENTS", 10_000)?,
            rate_limit_idle_ttl: Duration::from_secs(Self::parse_env(
                "RATE_LIMIT_IDLE_TTL_SECS",
                600,
            )?),
            rate_limit_sweep_interval: Duration::from_secs(Self::parse_env(
                "RATE_LIMIT_SWEEP_INTERVAL_SECS",
                60,
            )?),

            // CORS
            cors_allowed_origins: Self::parse_list_env("CORS_ALLOWED_ORIGINS", "*"),
            cors_allowed_methods: Self::parse_list_env(
                "CORS_ALLOWED_METHODS",
                "GET,POST,PUT,DELETE,OPTIONS",
            ),
            cors_allowed_headers: Self::parse_list_env(
                "CORS_ALLOWED_HEADERS",
                "Authorization,Content-Type",
            ),
            cors_exposed_headers: Self::parse_list_env("CORS_EXPOSED_HEADERS", ""),
            cors_allow_credentials: Self::parse_bool_env("CORS_ALLOW_CREDENTIALS", false)?,
            cors_max_age: Duration::from_secs(Self::parse_env("CORS_MAX_AGE_SECS", 0)?),

            // Documentation
            docs_enabled: Self::parse_bool_env("DOCS_ENABLED", false)?,

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: Self::parse_env("LOG_FORMAT", LogFormat::Console)?,
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.auth_enabled && self.auth_jwks_url.is_none() {
            return Err(AppError::ConfigError(
                "AUTH_JWKS_URL must be set when AUTH_ENABLED=true".to_string(),
            ));
        }

        if self.rate_limit_enabled {
            if self.rate_limit_rps == 0 {
                return Err(AppError::ConfigError(
                    "RATE_LIMIT_RPS must be greater than 0 when rate limiting is enabled"
                        .to_string(),
                ));
            }
            if self.rate_limit_max_clients == 0 {
                return Err(AppError::ConfigError(
                    "RATE_LIMIT_MAX_CLIENTS must be greater than 0".to_string(),
                ));
            }
            if self.rate_limit_sweep_interval.is_zero() {
                return Err(AppError::ConfigError(
                    "RATE_LIMIT_SWEEP_INTERVAL_SECS must be greater than 0".to_string(),
                ));
            }
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "REQUEST_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        for method in &self.cors_allowed_methods {
            if method != "*" && Method::from_bytes(method.as_bytes()).is_err() {
                return Err(AppError::ConfigError(format!(
                    "CORS_ALLOWED_METHODS contains an invalid method: {method}"
                )));
            }
        }

        // Browsers reject a wildcard combined with credentials
        if self.cors_allow_credentials {
            let wildcard = |list: &[String]| list.iter().any(|v| v == "*");
            if wildcard(&self.cors_allowed_methods)
                || wildcard(&self.cors_allowed_headers)
                || wildcard(&self.cors_exposed_headers)
            {
                return Err(AppError::ConfigError(
                    "CORS_ALLOW_CREDENTIALS cannot be combined with '*' methods or headers"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if rate limiting is enabled.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit_enabled && self.rate_limit_rps > 0
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a boolean flag. Accepts true/false, 1/0, yes/no, on/off.
    fn parse_bool_env(name: &str, default: bool) -> AppResult<bool> {
        match env::var(name) {
            Ok(val) => parse_bool(&val)
                .ok_or_else(|| AppError::ConfigError(format!("Invalid {name}: '{val}'"))),
            Err(_) => Ok(default),
        }
    }

    /// Read a variable, treating empty values as unset.
    fn optional_env(name: &str) -> Option<String> {
        env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Parse a comma-separated list, dropping empty entries.
    fn parse_list_env(name: &str, default: &str) -> Vec<String> {
        split_list(&env::var(name).unwrap_or_else(|_| default.to_string()))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(10),
            max_request_body_size: 1024 * 1024,
            shutdown_timeout: Duration::from_secs(30),
            // Authentication
            auth_enabled: false,
            auth_issuer: None,
            auth_client_id: None,
            auth_jwks_url: None,
            jwks_fetch_timeout: Duration::from_secs(5),
            // Rate limiting
            rate_limit_enabled: true,
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            rate_limit_max_clients: 10_000,
            rate_limit_idle_ttl: Duration::from_secs(600),
            rate_limit_sweep_interval: Duration::from_secs(60),
            // CORS
            cors_allowed_origins: vec!["*".to_string()],
            cors_allowed_methods: split_list("GET,POST,PUT,DELETE,OPTIONS"),
            cors_allowed_headers: split_list("Authorization,Content-Type"),
            cors_exposed_headers: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age: Duration::ZERO,
            // Documentation
            docs_enabled: false,
            // Observability
            log_level: "info".to_string(),
            log_format: LogFormat::Console,
            metrics_port: 9090,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.rate_limit_enabled);
        assert_eq!(config.rate_limit_rps, 10);
        assert_eq!(config.rate_limit_burst, 20);
        assert!(!config.auth_enabled);
        assert_eq!(config.cors_allowed_origins, vec!["*"]);
        assert_eq!(
            config.cors_allowed_methods,
            vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"]
        );
        assert!(config.cors_exposed_headers.is_empty());
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 9000,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_rate_limiting_enabled() {
        assert!(Config::default().rate_limiting_enabled());

        let config = Config {
            rate_limit_enabled: false,
            ..Config::default()
        };
        assert!(!config.rate_limiting_enabled());
    }

    #[test]
    fn test_metrics_addr_disabled_on_port_zero() {
        let config = Config {
            metrics_port: 0,
            ..Config::default()
        };
        assert!(config.metrics_addr().is_none());
        assert!(Config::default().metrics_addr().is_some());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_auth_requires_jwks_url() {
        let config = Config {
            auth_enabled: true,
            ..Config::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("AUTH_JWKS_URL"));

        let config = Config {
            auth_enabled: true,
            auth_jwks_url: Some("http://localhost:8081/certs".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_rps_only_when_enabled() {
        let config = Config {
            rate_limit_rps: 0,
            ..Config::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("RATE_LIMIT_RPS"));

        let config = Config {
            rate_limit_enabled: false,
            rate_limit_rps: 0,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_clients_zero() {
        let config = Config {
            rate_limit_max_clients: 0,
            ..Config::default()
        };
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("RATE_LIMIT_MAX_CLIENTS")
        );
    }

    #[test]
    fn test_validate_body_size_zero() {
        let config = Config {
            max_request_body_size: 0,
            ..Config::default()
        };
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("MAX_REQUEST_BODY_SIZE")
        );
    }

    #[test]
    fn test_validate_credentials_with_wildcard_headers() {
        let config = Config {
            cors_allow_credentials: true,
            cors_allowed_headers: vec!["*".to_string()],
            ..Config::default()
        };
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("CORS_ALLOW_CREDENTIALS")
        );
    }

    #[test]
    fn test_validate_invalid_method() {
        let config = Config {
            cors_allowed_methods: vec!["GET".to_string(), "NOT A METHOD".to_string()],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Console ".parse::<LogFormat>().unwrap(), LogFormat::Console);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_split_list_trims_and_drops_empty() {
        assert_eq!(
            split_list(" https://a.com , ,*.b.com,"),
            vec!["https://a.com", "*.b.com"]
        );
        assert!(split_list("").is_empty());
    }
}
