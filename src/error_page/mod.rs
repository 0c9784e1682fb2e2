//! Error pages
//!
//! When a fault ends in a page render, the pipeline replays the request
//! against an internal error route. The route is picked from the
//! [`ErrorPageRegistry`] by specificity:
//!
//! ```text
//! exact status (404)  >  fault type (nearest ancestor)  >  status class (4xx)  >  default (/error)
//! ```
//!
//! The [`ErrorController`] then renders that route, choosing between dynamic
//! templates and static pages in the [`ViewCatalog`].

use crate::config::{ErrorProperties, IncludeAttribute};
use crate::error::{FaultlineError, Result};
use crate::fault::{FaultType, TypeHierarchy};
use crate::resolver::ViewModel;
use axum::http::StatusCode;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub mod controller;
pub mod view;

pub use controller::ErrorController;
pub use view::{PlaceholderRenderer, RenderError, ResolvedView, ViewCatalog, ViewKind, ViewRenderer};

/// Match key of an error route
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorPageKey {
    Status(StatusCode),
    FaultType(FaultType),
    /// Status class by leading digit, e.g. `5` for `5xx`
    StatusClass(u16),
    Default,
}

impl FromStr for ErrorPageKey {
    type Err = FaultlineError;

    /// `"404"`, `"5xx"`, `"error"`/`"default"`, anything else is a fault type
    fn from_str(key: &str) -> Result<Self> {
        let invalid = || FaultlineError::InvalidRouteKey {
            key: key.to_string(),
        };
        let key_trimmed = key.trim();

        if key_trimmed.is_empty() {
            return Err(invalid());
        }
        if key_trimmed.eq_ignore_ascii_case("error") || key_trimmed.eq_ignore_ascii_case("default") {
            return Ok(ErrorPageKey::Default);
        }

        let bytes = key_trimmed.as_bytes();
        if bytes.len() == 3 && bytes[0].is_ascii_digit() {
            if key_trimmed[1..].eq_ignore_ascii_case("xx") {
                let class = u16::from(bytes[0] - b'0');
                return if (1..=5).contains(&class) {
                    Ok(ErrorPageKey::StatusClass(class))
                } else {
                    Err(invalid())
                };
            }
            if let Ok(code) = key_trimmed.parse::<u16>() {
                return match StatusCode::from_u16(code) {
                    Ok(status) if (100..600).contains(&code) => Ok(ErrorPageKey::Status(status)),
                    _ => Err(invalid()),
                };
            }
        }

        if key_trimmed.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        Ok(ErrorPageKey::FaultType(FaultType::from(key_trimmed.to_string())))
    }
}

impl fmt::Display for ErrorPageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPageKey::Status(status) => write!(f, "{}", status.as_u16()),
            ErrorPageKey::FaultType(ty) => write!(f, "{ty}"),
            ErrorPageKey::StatusClass(class) => write!(f, "{class}xx"),
            ErrorPageKey::Default => f.write_str("default"),
        }
    }
}

/// Route chosen for a fault, with the key that selected it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub key: ErrorPageKey,
    pub route: &'a str,
}

/// Error route table; read-only once the pipeline is built
#[derive(Debug, Clone)]
pub struct ErrorPageRegistry {
    exact: HashMap<StatusCode, String>,
    by_type: HashMap<FaultType, String>,
    classes: HashMap<u16, String>,
    default_route: String,
}

impl ErrorPageRegistry {
    pub fn new(default_route: impl Into<String>) -> Result<Self> {
        let default_route = validate_route(default_route.into())?;
        Ok(Self {
            exact: HashMap::new(),
            by_type: HashMap::new(),
            classes: HashMap::new(),
            default_route,
        })
    }

    pub fn register_error_route(
        &mut self,
        key: ErrorPageKey,
        route: impl Into<String>,
    ) -> Result<&mut Self> {
        let route = validate_route(route.into())?;
        let previous = match &key {
            ErrorPageKey::Status(status) => self.exact.insert(*status, route.clone()),
            ErrorPageKey::FaultType(ty) => self.by_type.insert(ty.clone(), route.clone()),
            ErrorPageKey::StatusClass(class) => self.classes.insert(*class, route.clone()),
            ErrorPageKey::Default => Some(std::mem::replace(&mut self.default_route, route.clone())),
        };

        match previous {
            Some(old) if old != route && key != ErrorPageKey::Default => {
                tracing::warn!(key = %key, old = %old, new = %route, "error route replaced");
            }
            _ => tracing::debug!(key = %key, route = %route, "error route registered"),
        }
        Ok(self)
    }

    pub fn default_route(&self) -> &str {
        &self.default_route
    }

    /// Most specific route for `status` and `fault_type`; always succeeds
    pub fn lookup(
        &self,
        status: StatusCode,
        fault_type: &FaultType,
        hierarchy: &TypeHierarchy,
    ) -> RouteMatch<'_> {
        if let Some(route) = self.exact.get(&status) {
            return RouteMatch {
                key: ErrorPageKey::Status(status),
                route,
            };
        }

        if let Some((ty, route)) = hierarchy
            .ancestry(fault_type)
            .find_map(|ty| self.by_type.get_key_value(ty))
        {
            return RouteMatch {
                key: ErrorPageKey::FaultType(ty.clone()),
                route,
            };
        }

        let class = status.as_u16() / 100;
        if let Some(route) = self.classes.get(&class) {
            return RouteMatch {
                key: ErrorPageKey::StatusClass(class),
                route,
            };
        }

        RouteMatch {
            key: ErrorPageKey::Default,
            route: &self.default_route,
        }
    }
}

fn validate_route(route: String) -> Result<String> {
    if !route.starts_with('/') {
        return Err(FaultlineError::InvalidRoutePath {
            path: route,
            message: "error routes must be absolute paths".to_string(),
        });
    }
    Ok(route)
}

/// Facts about the fault, carried by the error replay
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorAttributes {
    pub timestamp: DateTime<Utc>,
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    /// Path of the original client request
    pub path: String,
    pub fault_type: FaultType,
    pub model: ViewModel,
}

/// JSON error body returned to API clients from an error route
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_type: Option<String>,
}

impl ErrorAttributes {
    /// Reason phrase of the status
    pub fn error(&self) -> &str {
        self.status.canonical_reason().unwrap_or("Unknown Error")
    }

    pub fn to_body(&self, properties: &ErrorProperties) -> ErrorBody {
        ErrorBody {
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            status: self.status.as_u16(),
            error: self.error().to_string(),
            code: self.code.clone(),
            message: (properties.include_message == IncludeAttribute::Always)
                .then(|| self.message.clone()),
            path: self.path.clone(),
            fault_type: properties
                .include_fault_type
                .then(|| self.fault_type.to_string()),
        }
    }

    /// Model handed to error views; extra entries never shadow the standard ones
    pub fn to_model(&self, properties: &ErrorProperties) -> ViewModel {
        let body = self.to_body(properties);
        let mut model = ViewModel::new();
        model.insert("timestamp".to_string(), body.timestamp);
        model.insert("status".to_string(), body.status.to_string());
        model.insert("error".to_string(), body.error);
        model.insert("code".to_string(), body.code);
        model.insert("path".to_string(), body.path);
        model.insert("message".to_string(), body.message.unwrap_or_default());
        if let Some(fault_type) = body.fault_type {
            model.insert("faultType".to_string(), fault_type);
        }
        for (key, value) in &self.model {
            model.entry(key.clone()).or_insert_with(|| value.clone());
        }
        model
    }
}
