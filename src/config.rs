use clap::{Args, Parser, ValueEnum};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub messaging: MessagingConfig,

    #[command(flatten)]
    pub cache: CacheConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(id = "database_url", long = "database-url", env = "YYM_DATABASE_URL")]
    pub url: String,

    /// Maximum number of pooled connections
    #[arg(long = "db-max-connections", env = "YYM_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    #[arg(long = "db-min-connections", env = "YYM_DB_MIN_CONNECTIONS", default_value_t = 2)]
    pub min_connections: u32,

    /// Seconds to wait for a free connection
    #[arg(long = "db-acquire-timeout-secs", env = "YYM_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Seconds before an idle connection is closed
    #[arg(long = "db-idle-timeout-secs", env = "YYM_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Maximum lifetime of a connection in seconds
    #[arg(long = "db-max-lifetime-secs", env = "YYM_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "YYM_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "YYM_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Port for the management (health) server
    #[arg(long, env = "YYM_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for in-flight work during shutdown
    #[arg(long, env = "YYM_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

/// An API client allowed to sign requests, given as `id:secret`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiAccount {
    pub id: String,
    pub secret: String,
}

impl fmt::Debug for ApiAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiAccount").field("id", &self.id).field("secret", &"<redacted>").finish()
    }
}

impl FromStr for ApiAccount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((id, secret)) if !id.is_empty() && !secret.is_empty() => {
                Ok(Self { id: id.to_string(), secret: secret.to_string() })
            }
            _ => Err(format!("expected <id>:<secret>, got {s:?}")),
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Comma-separated list of `id:secret` pairs allowed to sign API requests
    #[arg(long = "api-accounts", env = "YYM_API_ACCOUNTS", value_delimiter = ',', required = true)]
    pub accounts: Vec<ApiAccount>,

    /// Allowed difference in seconds between a request timestamp and server time
    #[arg(long, env = "YYM_MAX_CLOCK_SKEW_SECS", default_value_t = 300)]
    pub max_clock_skew_secs: i64,

    /// Largest request body accepted for signature verification
    #[arg(long, env = "YYM_MAX_BODY_BYTES", default_value_t = 65_536)]
    pub max_body_bytes: usize,
}

#[derive(Clone, Debug, Args)]
pub struct MessagingConfig {
    /// Page size used when a request does not supply `limit`
    #[arg(long, env = "YYM_DEFAULT_PAGE_LIMIT", default_value_t = 20)]
    pub default_page_limit: i64,

    /// Upper bound for `limit`
    #[arg(long, env = "YYM_MAX_PAGE_LIMIT", default_value_t = 100)]
    pub max_page_limit: i64,

    /// Maximum message body length in characters
    #[arg(long, env = "YYM_MAX_CONTENT_CHARS", default_value_t = 4096)]
    pub max_content_chars: usize,
}

#[derive(Clone, Debug, Args)]
pub struct CacheConfig {
    /// Redis URL for response memoization. Memoization is off when unset.
    #[arg(id = "cache_url", long = "cache-url", env = "YYM_CACHE_URL")]
    pub url: Option<String>,

    /// Lifetime of memoized thread listings in seconds
    #[arg(long = "cache-ttl-secs", env = "YYM_CACHE_TTL_SECS", default_value_t = 5)]
    pub ttl_secs: u64,

    /// Prefix for every key written by this service
    #[arg(long = "cache-prefix", env = "YYM_CACHE_PREFIX", default_value = "yym:")]
    pub prefix: String,

    /// Minimum backoff when connecting to the cache
    #[arg(long = "cache-min-backoff-ms", env = "YYM_CACHE_MIN_BACKOFF_MS", default_value_t = 100)]
    pub min_backoff_ms: u64,

    /// Connection attempts before giving up at boot
    #[arg(long = "cache-connect-retries", env = "YYM_CACHE_CONNECT_RETRIES", default_value_t = 5)]
    pub connect_retries: usize,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the database readiness check
    #[arg(long, env = "YYM_HEALTH_DB_TIMEOUT_MS", default_value_t = 2000)]
    pub db_timeout_ms: u64,

    /// Timeout for the cache readiness check
    #[arg(long, env = "YYM_HEALTH_CACHE_TIMEOUT_MS", default_value_t = 2000)]
    pub cache_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint. Export is off when unset.
    #[arg(long, env = "YYM_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "YYM_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Interval between metric exports in seconds
    #[arg(long, env = "YYM_METRICS_EXPORT_INTERVAL_SECS", default_value_t = 60)]
    pub metrics_export_interval_secs: u64,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Config::command().debug_assert();
    }

    #[test]
    fn database_and_cache_urls_are_separate_arguments() {
        let config = Config::try_parse_from([
            "yym-server",
            "--database-url",
            "postgres://localhost/yym",
            "--cache-url",
            "redis://localhost:6379",
            "--api-accounts",
            "ios:s3cret",
        ])
        .unwrap();

        assert_eq!(config.database.url, "postgres://localhost/yym");
        assert_eq!(config.cache.url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn parses_accounts_and_defaults() {
        let config = Config::try_parse_from([
            "yym-server",
            "--database-url",
            "postgres://localhost/yym",
            "--api-accounts",
            "ios:s3cret,android:other",
        ])
        .unwrap();

        assert_eq!(config.auth.accounts.len(), 2);
        assert_eq!(config.auth.accounts[0], ApiAccount { id: "ios".into(), secret: "s3cret".into() });
        assert_eq!(config.messaging.default_page_limit, 20);
        assert_eq!(config.cache.ttl_secs, 5);
        assert!(config.cache.url.is_none());
        assert_eq!(config.telemetry.log_format, LogFormat::Text);
    }

    #[test]
    fn rejects_malformed_account() {
        let result = Config::try_parse_from([
            "yym-server",
            "--database-url",
            "postgres://localhost/yym",
            "--api-accounts",
            "no-secret",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn account_debug_hides_secret() {
        let account: ApiAccount = "ios:s3cret".parse().unwrap();
        let rendered = format!("{account:?}");
        assert!(!rendered.contains("s3cret"));
    }
}
