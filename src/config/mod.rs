use crate::error::{FaultlineError, Result};
use dashmap::DashMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{Display, EnumString};

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Load every environment variable
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Parse `key` if present
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| FaultlineError::config(key, format!("'{raw}': {e}")))
            })
            .transpose()
    }
}

/// Whether the fault message is exposed by error routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum IncludeAttribute {
    #[default]
    Always,
    Never,
}

/// Settings of the error routes and the resolver chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorProperties {
    /// Default error route
    pub path: String,
    pub include_message: IncludeAttribute,
    pub include_fault_type: bool,
    /// Text that replaces every 5xx message
    pub generic_message: String,
    pub strategy_timeout: Duration,
    /// Serve a minimal built-in page when no error view exists
    pub whitelabel_enabled: bool,
}

impl Default for ErrorProperties {
    fn default() -> Self {
        Self {
            path: "/error".to_string(),
            include_message: IncludeAttribute::Always,
            include_fault_type: false,
            generic_message: "Internal error".to_string(),
            strategy_timeout: Duration::from_secs(2),
            whitelabel_enabled: true,
        }
    }
}

impl ErrorProperties {
    pub const PATH: &'static str = "FAULTLINE_ERROR_PATH";
    pub const INCLUDE_MESSAGE: &'static str = "FAULTLINE_INCLUDE_MESSAGE";
    pub const INCLUDE_FAULT_TYPE: &'static str = "FAULTLINE_INCLUDE_FAULT_TYPE";
    pub const GENERIC_MESSAGE: &'static str = "FAULTLINE_GENERIC_MESSAGE";
    pub const STRATEGY_TIMEOUT_MS: &'static str = "FAULTLINE_STRATEGY_TIMEOUT_MS";
    pub const WHITELABEL_ENABLED: &'static str = "FAULTLINE_WHITELABEL_ENABLED";

    /// Read overrides from `config`; unset keys keep their defaults
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let defaults = Self::default();

        let path = config.get(Self::PATH).unwrap_or(defaults.path);
        if !path.starts_with('/') {
            return Err(FaultlineError::config(
                Self::PATH,
                format!("'{path}' is not an absolute path"),
            ));
        }

        let strategy_timeout = match config.get_parsed::<u64>(Self::STRATEGY_TIMEOUT_MS)? {
            Some(0) => {
                return Err(FaultlineError::config(
                    Self::STRATEGY_TIMEOUT_MS,
                    "timeout must be positive",
                ));
            }
            Some(ms) => Duration::from_millis(ms),
            None => defaults.strategy_timeout,
        };

        let properties = Self {
            path,
            include_message: config
                .get_parsed(Self::INCLUDE_MESSAGE)?
                .unwrap_or(defaults.include_message),
            include_fault_type: config
                .get_parsed(Self::INCLUDE_FAULT_TYPE)?
                .unwrap_or(defaults.include_fault_type),
            generic_message: config
                .get(Self::GENERIC_MESSAGE)
                .unwrap_or(defaults.generic_message),
            strategy_timeout,
            whitelabel_enabled: config
                .get_parsed(Self::WHITELABEL_ENABLED)?
                .unwrap_or(defaults.whitelabel_enabled),
        };

        tracing::debug!(?properties, "error properties loaded");
        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let properties = ErrorProperties::from_config(&ConfigService::default()).unwrap();
        assert_eq!(properties, ErrorProperties::default());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = ConfigService::default();
        config.set(ErrorProperties::PATH, "/oops");
        config.set(ErrorProperties::INCLUDE_MESSAGE, "NEVER");
        config.set(ErrorProperties::INCLUDE_FAULT_TYPE, "true");
        config.set(ErrorProperties::STRATEGY_TIMEOUT_MS, "250");
        config.set(ErrorProperties::GENERIC_MESSAGE, "내부 오류");

        let properties = ErrorProperties::from_config(&config).unwrap();
        assert_eq!(properties.path, "/oops");
        assert_eq!(properties.include_message, IncludeAttribute::Never);
        assert!(properties.include_fault_type);
        assert_eq!(properties.strategy_timeout, Duration::from_millis(250));
        assert_eq!(properties.generic_message, "내부 오류");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = ConfigService::default();
        config.set(ErrorProperties::STRATEGY_TIMEOUT_MS, "soon");
        let err = ErrorProperties::from_config(&config).unwrap_err();
        assert!(matches!(err, FaultlineError::Config { .. }));

        let config = ConfigService::default();
        config.set(ErrorProperties::PATH, "error");
        assert!(ErrorProperties::from_config(&config).is_err());
    }
}
