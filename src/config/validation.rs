//! Configuration validation.
//!
//! Serde handles the syntactic side; this pass checks semantics: value
//! ranges, required fields, and internal consistency. All violations are
//! collected and reported together, not just the first.

use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: &'static str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field,
        message: message.into(),
    }
}

/// Validate a configuration, returning all violations.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.base_url.is_empty() {
        errors.push(err("base_url", "must not be empty"));
    } else if Url::parse(&config.base_url).is_err() {
        errors.push(err("base_url", format!("not a valid URL: {}", config.base_url)));
    }

    if config.timeouts.request_ms == 0 {
        errors.push(err("timeouts.request_ms", "must be greater than zero"));
    }
    if config.timeouts.refresh_ms == 0 {
        errors.push(err("timeouts.refresh_ms", "must be greater than zero"));
    }

    if config.retries.base_delay_ms == 0 {
        errors.push(err("retries.base_delay_ms", "must be greater than zero"));
    }
    if config.retries.max_delay_ms < config.retries.base_delay_ms {
        errors.push(err(
            "retries.max_delay_ms",
            "must be at least retries.base_delay_ms",
        ));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.max_requests == 0 {
            errors.push(err("rate_limit.max_requests", "must be greater than zero"));
        }
        if config.rate_limit.window_ms == 0 {
            errors.push(err("rate_limit.window_ms", "must be greater than zero"));
        }
    }

    if config.cache.default_ttl_ms == 0 {
        errors.push(err("cache.default_ttl_ms", "must be greater than zero"));
    }

    if config.auth.refresh_path.is_empty() {
        errors.push(err("auth.refresh_path", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ClientConfig {
        ClientConfig {
            base_url: "https://api.example.test".to_string(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let config = ClientConfig::default();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "base_url"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid_config();
        config.timeouts.request_ms = 0;
        config.retries.base_delay_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 2);
    }

    #[test]
    fn test_backoff_cap_below_base_rejected() {
        let mut config = valid_config();
        config.retries.base_delay_ms = 5_000;
        config.retries.max_delay_ms = 1_000;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "retries.max_delay_ms"));
    }
}
