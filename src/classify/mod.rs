//! Fault classification
//!
//! Maps a [`Fault`] to the `(status, code, message)` triple every other
//! stage works with. Classification is pure: it only reads the status
//! annotations, the type hierarchy and the message source.

use crate::fault::{Fault, FaultType, TypeHierarchy};
use axum::http::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;

pub mod message;

pub use message::{MessageSource, NoMessages, StaticMessageSource};

/// Status declared on a fault type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusAnnotation {
    pub status: StatusCode,
    pub code: Option<String>,
    /// Literal reason or message key
    pub reason: Option<String>,
}

impl StatusAnnotation {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            code: None,
            reason: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Client faults expose their message, server faults are sanitized
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum FaultCategory {
    ClientFault,
    ServerFault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl Classification {
    pub fn category(&self) -> FaultCategory {
        if self.status.is_server_error() {
            FaultCategory::ServerFault
        } else {
            FaultCategory::ClientFault
        }
    }
}

pub struct FaultClassifier {
    hierarchy: Arc<TypeHierarchy>,
    annotations: HashMap<FaultType, StatusAnnotation>,
    messages: Arc<dyn MessageSource>,
    generic_message: String,
}

impl FaultClassifier {
    pub const DEFAULT_GENERIC_MESSAGE: &'static str = "Internal error";

    /// Classifier with the built-in annotations for the standard kinds
    pub fn new(hierarchy: Arc<TypeHierarchy>) -> Self {
        let mut classifier = Self::without_defaults(hierarchy);
        classifier
            .annotate(
                FaultType::INVALID_INPUT,
                StatusAnnotation::new(StatusCode::BAD_REQUEST),
            )
            .annotate(
                FaultType::NOT_FOUND,
                StatusAnnotation::new(StatusCode::NOT_FOUND),
            )
            .annotate(
                FaultType::UNAUTHORIZED,
                StatusAnnotation::new(StatusCode::UNAUTHORIZED),
            )
            .annotate(
                FaultType::INTERNAL,
                StatusAnnotation::new(StatusCode::INTERNAL_SERVER_ERROR),
            );
        classifier
    }

    pub fn without_defaults(hierarchy: Arc<TypeHierarchy>) -> Self {
        Self {
            hierarchy,
            annotations: HashMap::new(),
            messages: Arc::new(NoMessages),
            generic_message: Self::DEFAULT_GENERIC_MESSAGE.to_string(),
        }
    }

    pub fn with_messages(mut self, messages: Arc<dyn MessageSource>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_generic_message(mut self, message: impl Into<String>) -> Self {
        self.generic_message = message.into();
        self
    }

    pub fn annotate(
        &mut self,
        fault_type: impl Into<FaultType>,
        annotation: StatusAnnotation,
    ) -> &mut Self {
        self.annotations.insert(fault_type.into(), annotation);
        self
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    pub fn generic_message(&self) -> &str {
        &self.generic_message
    }

    /// Annotation declared on `fault_type` or its nearest annotated ancestor
    pub fn annotation_for(&self, fault_type: &FaultType) -> Option<(&FaultType, &StatusAnnotation)> {
        self.hierarchy
            .ancestry(fault_type)
            .find_map(|ty| self.annotations.get_key_value(ty))
    }

    pub fn classify(&self, fault: &Fault) -> Classification {
        let fault_type = fault.fault_type();
        let annotation = self.annotation_for(&fault_type).map(|(_, a)| a);

        let status = annotation
            .map(|a| a.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = annotation
            .and_then(|a| a.code.clone())
            .unwrap_or_else(|| fault.code().to_string());

        let message = if status.is_server_error() {
            self.generic_message.clone()
        } else if let Some(reason) = annotation.and_then(|a| a.reason.as_deref()) {
            self.messages
                .message(reason)
                .unwrap_or_else(|| reason.to_string())
        } else if let Some(message) = fault.message() {
            message.to_string()
        } else {
            status.canonical_reason().unwrap_or("Error").to_string()
        };

        Classification {
            status,
            code,
            message,
        }
    }
}
