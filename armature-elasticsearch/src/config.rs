//! Elasticsearch client configuration.

use crate::error::{ElasticsearchError, Result};
use crate::logging::LogFormat;
use crate::operations::RefreshPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Elasticsearch client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ElasticsearchConfig {
    /// Engine URL(s). Only the first one is used for the connection.
    pub urls: Vec<String>,
    /// Basic auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic auth password.
    #[serde(default)]
    pub password: Option<String>,
    /// Request timeout.
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,
    /// TLS configuration.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Refresh policy sent with every write.
    ///
    /// `None` means the engine is not asked to refresh; repositories then
    /// issue an explicit refresh after each write.
    #[serde(default)]
    pub refresh_policy: Option<RefreshPolicy>,
    /// Prefix prepended to every entity index name.
    #[serde(default)]
    pub index_prefix: Option<String>,
    /// Log filter used by [`crate::logging::init`] when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ElasticsearchConfig {
    /// Create a new configuration with a single URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            password: None,
            request_timeout: default_request_timeout(),
            tls: None,
            refresh_policy: None,
            index_prefix: None,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }

    /// Create configuration with multiple URLs for a cluster.
    pub fn cluster(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Self::new("")
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Uses the following environment variables:
    /// - `ELASTICSEARCH_URL`: Required engine URL
    /// - `ELASTICSEARCH_USERNAME` / `ELASTICSEARCH_PASSWORD`: Basic auth
    /// - `ELASTICSEARCH_REQUEST_TIMEOUT`: Request timeout in seconds
    /// - `ELASTICSEARCH_REFRESH_POLICY`: `immediate`, `wait_until` or `none`
    /// - `ELASTICSEARCH_INDEX_PREFIX`: Prefix for entity index names
    /// - `ELASTICSEARCH_LOG_LEVEL`: Log filter (default: info)
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("ELASTICSEARCH_URL").map_err(|_| {
            ElasticsearchError::Configuration("ELASTICSEARCH_URL not set".into())
        })?;

        let mut config = Self::new(url);

        if let (Ok(user), Ok(pass)) = (
            std::env::var("ELASTICSEARCH_USERNAME"),
            std::env::var("ELASTICSEARCH_PASSWORD"),
        ) {
            config = config.with_basic_auth(user, pass);
        }

        if let Ok(timeout) = std::env::var("ELASTICSEARCH_REQUEST_TIMEOUT") {
            config.request_timeout = Duration::from_secs(timeout.parse().map_err(|_| {
                ElasticsearchError::Configuration("Invalid ELASTICSEARCH_REQUEST_TIMEOUT".into())
            })?);
        }

        if let Ok(policy) = std::env::var("ELASTICSEARCH_REFRESH_POLICY") {
            config.refresh_policy = Some(policy.parse()?);
        }

        if let Ok(prefix) = std::env::var("ELASTICSEARCH_INDEX_PREFIX") {
            config.index_prefix = Some(prefix);
        }

        if let Ok(level) = std::env::var("ELASTICSEARCH_LOG_LEVEL") {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| ElasticsearchError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can be used to build a client.
    pub fn validate(&self) -> Result<()> {
        let url = self
            .urls
            .first()
            .ok_or_else(|| ElasticsearchError::Configuration("No URLs provided".to_string()))?;

        opensearch::http::Url::parse(url)
            .map_err(|e| ElasticsearchError::Configuration(format!("Invalid URL {url}: {e}")))?;

        Ok(())
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set TLS configuration.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Set the refresh policy sent with writes.
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = Some(policy);
        self
    }

    /// Set the index name prefix.
    pub fn with_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_prefix = Some(prefix.into());
        self
    }

    /// Set the log filter and format.
    pub fn with_logging(mut self, level: impl Into<String>, format: LogFormat) -> Self {
        self.log_level = level.into();
        self.log_format = format;
        self
    }
}

/// TLS configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    /// Path to CA certificate.
    #[serde(default)]
    pub ca_cert: Option<String>,
    /// Skip certificate verification (not recommended for production).
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

impl TlsConfig {
    /// Create TLS config with CA certificate.
    pub fn with_ca_cert(ca_cert: impl Into<String>) -> Self {
        Self {
            ca_cert: Some(ca_cert.into()),
            ..Default::default()
        }
    }

    /// Skip certificate verification (DANGER: only for development).
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.danger_accept_invalid_certs = true;
        self
    }
}

/// Durations are written as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
