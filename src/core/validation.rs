//! Configuration validation support.

use super::Settings;
use crate::error::ValidationError;

/// Longest accepted cadence, spacing or backoff: one week.
pub const MAX_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;

/// Trait for configuration validation.
///
/// A snapshot that fails validation is never made live: the initial load
/// fails, and a reload is abandoned with the previous snapshot kept.
///
/// # Examples
///
/// ```rust
/// use starwatch::core::Validate;
/// use starwatch::error::ValidationError;
///
/// struct Window {
///     minutes: u64,
/// }
///
/// impl Validate for Window {
///     fn validate(&self) -> Result<(), ValidationError> {
///         if self.minutes == 0 {
///             return Err(ValidationError::invalid_field("minutes", "must be at least 1"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validate {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Should return a `ValidationError` describing what validation failed.
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for Settings {
    /// Reports every violated rule at once.
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if self.repositories.is_empty() {
            errors.push(ValidationError::invalid_field(
                "repositories",
                "at least one repository must be configured",
            ));
        }
        for (i, entity) in self.repositories.iter().enumerate() {
            if entity.namespace.trim().is_empty() {
                errors.push(ValidationError::invalid_field(
                    format!("repositories[{i}].owner"),
                    "must not be empty",
                ));
            }
            if entity.name.trim().is_empty() {
                errors.push(ValidationError::invalid_field(
                    format!("repositories[{i}].repo"),
                    "must not be empty",
                ));
            }
        }

        if self.check.interval_minutes < 1 {
            errors.push(ValidationError::invalid_field(
                "check.interval_minutes",
                "must be at least 1 minute",
            ));
        }
        if self.check.interval_minutes > MAX_PERIOD_SECS / 60 {
            errors.push(ValidationError::invalid_field(
                "check.interval_minutes",
                format!("must be at most {} (one week)", MAX_PERIOD_SECS / 60),
            ));
        }
        if self.github.retry_backoff_ms > MAX_PERIOD_SECS * 1000 {
            errors.push(ValidationError::invalid_field(
                "github.retry_backoff_ms",
                "must be at most one week",
            ));
        }
        if self.delivery.retry_backoff_ms > MAX_PERIOD_SECS * 1000 {
            errors.push(ValidationError::invalid_field(
                "delivery.retry_backoff_ms",
                "must be at most one week",
            ));
        }
        if self.delivery.rate_limit_seconds > MAX_PERIOD_SECS {
            errors.push(ValidationError::invalid_field(
                "delivery.rate_limit_seconds",
                "must be at most one week",
            ));
        }
        if self.github.timeout_seconds == 0 {
            errors.push(ValidationError::invalid_field(
                "github.timeout_seconds",
                "must be greater than 0",
            ));
        }
        if self.github.base_url.trim().is_empty() {
            errors.push(ValidationError::invalid_field(
                "github.base_url",
                "must not be empty",
            ));
        }

        for (i, provider) in self.notifications.iter().enumerate() {
            if provider.enabled && provider.webhook_url.trim().is_empty() {
                errors.push(ValidationError::invalid_field(
                    format!("notifications[{i}].webhook_url"),
                    format!("required when {} is enabled", provider.display_name()),
                ));
            }
        }
        if self.delivery.timeout_seconds == 0 {
            errors.push(ValidationError::invalid_field(
                "delivery.timeout_seconds",
                "must be greater than 0",
            ));
        }

        match ValidationError::from_list(errors) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProviderKind, ProviderSettings};
    use crate::model::EntityKey;

    fn valid() -> Settings {
        serde_json::from_str(r#"{"repositories": [{"owner": "rust-lang", "repo": "rust"}]}"#)
            .unwrap()
    }

    #[test]
    fn test_minimal_settings_are_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_requires_a_repository() {
        let mut settings = valid();
        settings.repositories.clear();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("repositories"));
    }

    #[test]
    fn test_rejects_blank_entity_parts() {
        let mut settings = valid();
        settings.repositories.push(EntityKey::new("", " "));
        let err = settings.validate().unwrap_err();
        match err {
            ValidationError::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected two errors, got {other}"),
        }
    }

    #[test]
    fn test_rejects_sub_minute_cadence() {
        let mut settings = valid();
        settings.check.interval_minutes = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("check.interval_minutes"));
    }

    #[test]
    fn test_rejects_periods_beyond_a_week() {
        let mut settings = valid();
        settings.check.interval_minutes = u64::MAX;
        settings.delivery.rate_limit_seconds = u64::MAX;
        settings.delivery.retry_backoff_ms = u64::MAX;
        settings.github.retry_backoff_ms = u64::MAX;

        match settings.validate().unwrap_err() {
            ValidationError::Multiple(errors) => assert_eq!(errors.len(), 4),
            other => panic!("expected four errors, got {other}"),
        }
    }

    #[test]
    fn test_one_week_is_accepted() {
        let mut settings = valid();
        settings.check.interval_minutes = MAX_PERIOD_SECS / 60;
        settings.delivery.rate_limit_seconds = MAX_PERIOD_SECS;
        settings.delivery.retry_backoff_ms = MAX_PERIOD_SECS * 1000;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_enabled_provider_needs_endpoint() {
        let mut settings = valid();
        settings.notifications.push(ProviderSettings {
            kind: ProviderKind::Discord,
            name: None,
            enabled: true,
            webhook_url: String::new(),
            channel: None,
        });
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("notifications[0].webhook_url"));

        settings.notifications[0].enabled = false;
        assert!(settings.validate().is_ok());
    }
}
