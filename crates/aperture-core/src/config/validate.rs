//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::types::ProviderId;

use super::Config;

/// Largest accepted `server.max_body_mb`.
pub const MAX_BODY_MB: usize = 1024;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be > 0".into(),
            ));
        }
        if self.server.max_body_mb == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_body_mb must be > 0".into(),
            ));
        }
        if self.server.max_body_mb > MAX_BODY_MB {
            return Err(ConfigError::ValidationError(format!(
                "server.max_body_mb must be <= {MAX_BODY_MB}"
            )));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "server.request_timeout_ms must be > 0".into(),
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_retries must be > 0".into(),
            ));
        }
        if self.retry.initial_backoff_ms == 0 {
            return Err(ConfigError::ValidationError(
                "retry.initial_backoff_ms must be > 0".into(),
            ));
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::ValidationError(
                "retry.max_backoff_ms must be >= retry.initial_backoff_ms".into(),
            ));
        }
        if self.retry.max_retry_time_ms == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_retry_time_ms must be > 0".into(),
            ));
        }
        if !(self.pricing.batch_discount > 0.0 && self.pricing.batch_discount <= 1.0) {
            return Err(ConfigError::ValidationError(
                "pricing.batch_discount must be in (0.0, 1.0]".into(),
            ));
        }
        if self.monitor.batch_job_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "monitor.batch_job_capacity must be > 0".into(),
            ));
        }
        for id in ProviderId::ALL {
            let settings = self.providers.settings(id);
            if settings.input_cost_per_mtok < 0.0 || settings.output_cost_per_mtok < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{id} costs must be >= 0"
                )));
            }
            if settings.max_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{id}.max_tokens must be > 0"
                )));
            }
            if settings.endpoint.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{id}.endpoint must not be empty"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut config = Config::default();
        config.retry.max_retries = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 10_000;
        config.retry.max_backoff_ms = 5_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_backoff_ms"));
    }

    #[test]
    fn test_validate_rejects_bad_batch_discount() {
        let mut config = Config::default();
        config.pricing.batch_discount = 0.0;
        assert!(config.validate().is_err());
        config.pricing.batch_discount = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_cost() {
        let mut config = Config::default();
        config.providers.openai.input_cost_per_mtok = Some(-1.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("providers.openai"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.server.request_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("request_timeout_ms"));
    }

    #[test]
    fn test_validate_bounds_body_limit() {
        let mut config = Config::default();
        config.server.max_body_mb = MAX_BODY_MB;
        assert!(config.validate().is_ok());

        config.server.max_body_mb = usize::MAX / 1024;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_body_mb must be <= 1024"));
    }

    #[test]
    fn test_validate_rejects_zero_batch_job_capacity() {
        let mut config = Config::default();
        config.monitor.batch_job_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_job_capacity"));
    }
}
