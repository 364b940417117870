//! Tracing subscriber setup.
//!
//! Every operation in this crate emits `tracing` events: `debug` for each
//! engine round-trip, `info` for index lifecycle changes and `warn` for
//! scroll contexts that were dropped without being closed. Applications that
//! already install a subscriber can ignore this module.

use crate::config::ElasticsearchConfig;
use crate::error::{ElasticsearchError, Result};
use serde::Deserialize;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Output format for log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output.
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON format for structured logging.
    #[default]
    Json,
}

impl LogFormat {
    /// Get format from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Build the filter for a configuration.
///
/// `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &ElasticsearchConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Install a global subscriber for the given configuration.
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &ElasticsearchConfig) -> Result<()> {
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter(config))
        .try_init()
        .map_err(|e| ElasticsearchError::Configuration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("COMPACT"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_default_format_is_json() {
        assert_eq!(LogFormat::default(), LogFormat::Json);
    }

    #[test]
    fn test_init_twice_fails() {
        let config = ElasticsearchConfig::new("http://localhost:9200")
            .with_logging("debug", LogFormat::Compact);
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
