use std::env;
use std::fs;
use std::time::Duration;

use serde::Deserialize;

use crate::breaker::CircuitBreakerConfig;
use crate::error::{EngineError, Result};
use crate::retry::RetryConfig;
use crate::streaming::EmitterConfig;

/// Tunables for one engine instance.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    pub breaker: CircuitBreakerConfig,
    pub emitter: EmitterConfig,
}

/// TOML file shape; durations are integer milliseconds.
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    retry: Option<RawRetry>,
    breaker: Option<RawBreaker>,
    emitter: Option<RawEmitter>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    max_retries: Option<u32>,
    initial_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawBreaker {
    failure_threshold: Option<u32>,
    open_duration_ms: Option<u64>,
    success_threshold: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawEmitter {
    flush_interval_ms: Option<u64>,
    max_buffer: Option<usize>,
}

impl EngineConfig {
    /// Load configuration from a TOML file, then apply env overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read config file: {e}")))?;
        let raw: RawConfig = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("failed to parse config file: {e}")))?;

        let mut config = EngineConfig::default();
        if let Some(retry) = raw.retry {
            if let Some(v) = retry.max_retries {
                config.retry.max_retries = v;
            }
            if let Some(v) = retry.initial_delay_ms {
                config.retry.initial_delay = Duration::from_millis(v);
            }
            if let Some(v) = retry.max_delay_ms {
                config.retry.max_delay = Duration::from_millis(v);
            }
        }
        if let Some(breaker) = raw.breaker {
            if let Some(v) = breaker.failure_threshold {
                config.breaker.failure_threshold = v;
            }
            if let Some(v) = breaker.open_duration_ms {
                config.breaker.open_duration = Duration::from_millis(v);
            }
            if let Some(v) = breaker.success_threshold {
                config.breaker.success_threshold = v;
            }
        }
        if let Some(emitter) = raw.emitter {
            if let Some(v) = emitter.flush_interval_ms {
                config.emitter.flush_interval = Duration::from_millis(v);
            }
            if let Some(v) = emitter.max_buffer {
                config.emitter.max_buffer = v;
            }
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Defaults with environment-variable overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = EngineConfig::default();
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_u64("ENGINE_MAX_RETRIES")? {
            self.retry.max_retries = v as u32;
        }
        if let Some(v) = env_u64("ENGINE_INITIAL_DELAY_MS")? {
            self.retry.initial_delay = Duration::from_millis(v);
        }
        if let Some(v) = env_u64("ENGINE_MAX_DELAY_MS")? {
            self.retry.max_delay = Duration::from_millis(v);
        }
        if let Some(v) = env_u64("ENGINE_FAILURE_THRESHOLD")? {
            self.breaker.failure_threshold = v as u32;
        }
        if let Some(v) = env_u64("ENGINE_OPEN_DURATION_MS")? {
            self.breaker.open_duration = Duration::from_millis(v);
        }
        if let Some(v) = env_u64("ENGINE_SUCCESS_THRESHOLD")? {
            self.breaker.success_threshold = v as u32;
        }
        if let Some(v) = env_u64("ENGINE_FLUSH_INTERVAL_MS")? {
            self.emitter.flush_interval = Duration::from_millis(v);
        }
        if let Some(v) = env_u64("ENGINE_MAX_BUFFER")? {
            self.emitter.max_buffer = v as usize;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.breaker.failure_threshold == 0 {
            return Err(EngineError::Config(
                "failure_threshold must be greater than 0".to_string(),
            ));
        }
        if self.breaker.success_threshold == 0 {
            return Err(EngineError::Config(
                "success_threshold must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_delay < self.retry.initial_delay {
            return Err(EngineError::Config(
                "max_delay must not be below initial_delay".to_string(),
            ));
        }
        if self.emitter.max_buffer == 0 {
            return Err(EngineError::Config(
                "emitter max_buffer must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|e| EngineError::Config(format!("invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut config = EngineConfig::default();
        config.breaker.failure_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.retry.initial_delay = Duration::from_secs(10);
        config.retry.max_delay = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let raw: RawConfig = toml::from_str(
            r#"
            [retry]
            max_retries = 5
            initial_delay_ms = 100

            [breaker]
            failure_threshold = 2
            open_duration_ms = 10000

            [emitter]
            max_buffer = 64
            "#,
        )
        .unwrap();

        let retry = raw.retry.unwrap();
        assert_eq!(retry.max_retries, Some(5));
        assert_eq!(retry.initial_delay_ms, Some(100));
        assert_eq!(retry.max_delay_ms, None);
        assert_eq!(raw.breaker.unwrap().failure_threshold, Some(2));
        assert_eq!(raw.emitter.unwrap().max_buffer, Some(64));
    }
}
