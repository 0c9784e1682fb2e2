//! Fault values
//!
//! A [`Fault`] is raised at the point of failure and consumed exactly once by
//! the [`ErrorPipeline`](crate::pipeline::ErrorPipeline). Its kind decides the
//! [`FaultType`] it occupies in the declared hierarchy.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

pub mod hierarchy;

pub use hierarchy::{FaultType, TypeHierarchy};

/// Closed set of fault kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FaultKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    Internal,
    /// Application-defined fault identified by its code, e.g. `USER-EX`.
    ///
    /// The code is the fault type name. A code equal to a built-in type
    /// name (`"NotFound"`, `"Internal"`, ...) is that type, and shares its
    /// annotations, handlers and error routes.
    DomainSpecific(String),
}

impl FaultKind {
    pub fn fault_type(&self) -> FaultType {
        match self {
            FaultKind::InvalidInput => FaultType::INVALID_INPUT,
            FaultKind::NotFound => FaultType::NOT_FOUND,
            FaultKind::Unauthorized => FaultType::UNAUTHORIZED,
            FaultKind::Internal => FaultType::INTERNAL,
            FaultKind::DomainSpecific(code) => FaultType::from(code.clone()),
        }
    }

    /// Machine-readable code used when no annotation overrides it
    pub fn code(&self) -> &str {
        match self {
            FaultKind::InvalidInput => "INVALID_INPUT",
            FaultKind::NotFound => "NOT_FOUND",
            FaultKind::Unauthorized => "UNAUTHORIZED",
            FaultKind::Internal => "INTERNAL",
            FaultKind::DomainSpecific(code) => code,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::DomainSpecific(code) => write!(f, "DomainSpecific({code})"),
            other => f.write_str(other.fault_type().as_str()),
        }
    }
}

/// A raised error condition.
///
/// Faults are built once (kind, message, optional cause) and never mutated
/// afterwards; every consumer only borrows them.
#[derive(Debug, Clone)]
pub struct Fault {
    kind: FaultKind,
    message: Option<String>,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Fault {
    pub fn new(kind: FaultKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidInput).with_message(message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FaultKind::NotFound).with_message(message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Unauthorized).with_message(message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Internal).with_message(message)
    }

    pub fn domain(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::DomainSpecific(code.into())).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the error that caused this fault
    pub fn caused_by<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(cause));
        self
    }

    pub fn kind(&self) -> &FaultKind {
        &self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn fault_type(&self) -> FaultType {
        self.kind.fault_type()
    }

    pub fn code(&self) -> &str {
        self.kind.code()
    }

    /// Walk the cause chain, starting with the direct cause
    pub fn causes(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        std::iter::successors(StdError::source(self), |cause| (*cause).source())
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.kind, message),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}
