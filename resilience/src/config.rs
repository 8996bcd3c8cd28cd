//! Resilience configuration.
//!
//! Values come from (lowest to highest precedence) built-in defaults, an
//! optional TOML file, and `AUTOPACK_*` environment variables.
//!
//! ```toml
//! [circuit_breaker]
//! failure_threshold = 5
//! reset_timeout_seconds = 300
//! half_open_max_calls = 1
//! health_threshold = 0.5
//!
//! [retry]
//! max_attempts = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable overriding [`CircuitBreakerConfig::failure_threshold`].
pub const ENV_FAILURE_THRESHOLD: &str = "AUTOPACK_CB_FAILURE_THRESHOLD";
/// Environment variable overriding [`CircuitBreakerConfig::reset_timeout_seconds`].
pub const ENV_RESET_TIMEOUT_SECS: &str = "AUTOPACK_CB_RESET_TIMEOUT_SECS";
/// Environment variable overriding [`CircuitBreakerConfig::half_open_max_calls`].
pub const ENV_HALF_OPEN_MAX_CALLS: &str = "AUTOPACK_CB_HALF_OPEN_MAX_CALLS";
/// Environment variable overriding [`CircuitBreakerConfig::health_threshold`].
pub const ENV_HEALTH_THRESHOLD: &str = "AUTOPACK_CB_HEALTH_THRESHOLD";
/// Environment variable overriding [`RetryConfig::max_attempts`].
pub const ENV_MAX_ATTEMPTS: &str = "AUTOPACK_MAX_ATTEMPTS";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value outside its allowed range
    #[error("Invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Result type alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Circuit breaker tuning for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the circuit (must be > 0)
    pub failure_threshold: u32,
    /// Cool-down before an open circuit may probe recovery
    pub reset_timeout_seconds: u64,
    /// Successful trial attempts needed to close from half-open (must be >= 1)
    pub half_open_max_calls: u32,
    /// Minimum overall health score allowing recovery (0.0–1.0)
    pub health_threshold: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_seconds: 300,
            half_open_max_calls: 1,
            health_threshold: 0.5,
        }
    }
}

impl CircuitBreakerConfig {
    /// Cool-down as a [`Duration`].
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_seconds)
    }

    /// Check value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "circuit_breaker.failure_threshold",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.half_open_max_calls == 0 {
            return Err(ConfigError::Invalid {
                field: "circuit_breaker.half_open_max_calls",
                message: "must be at least 1".to_string(),
            });
        }
        if !self.health_threshold.is_finite() || !(0.0..=1.0).contains(&self.health_threshold) {
            return Err(ConfigError::Invalid {
                field: "circuit_breaker.health_threshold",
                message: format!("{} is outside [0.0, 1.0]", self.health_threshold),
            });
        }
        Ok(())
    }

    /// This config if it validates, otherwise the defaults.
    pub fn validated_or_default(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(e) => {
                warn!(error = %e, "Invalid circuit breaker config; falling back to defaults");
                Self::default()
            }
        }
    }
}

/// Retry budget for phase attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts allowed per phase. Values <= 0 halt on the first decision.
    pub max_attempts: i32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Top-level resilience configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
}

impl ResilienceConfig {
    /// Parse a TOML document. Missing fields keep their defaults.
    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded resilience config file");
        Self::from_toml_str(&raw)
    }

    /// Defaults, then the optional file, then process environment overrides.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let base = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides_from(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `AUTOPACK_*` overrides using the given variable lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn with_env_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let cb = &mut self.circuit_breaker;
        if let Some(v) = parse_var(&lookup, ENV_FAILURE_THRESHOLD) {
            cb.failure_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_RESET_TIMEOUT_SECS) {
            cb.reset_timeout_seconds = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_HALF_OPEN_MAX_CALLS) {
            cb.half_open_max_calls = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_HEALTH_THRESHOLD) {
            cb.health_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MAX_ATTEMPTS) {
            self.retry.max_attempts = v;
        }
        self
    }

    /// Check every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.circuit_breaker.validate()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
