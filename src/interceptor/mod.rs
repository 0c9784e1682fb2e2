//! Interceptors
//!
//! Interceptors run around the handler, inside the filters. They ignore the
//! request origin and are kept off error routes with exclude patterns. A
//! fault raised by `pre_handle` is resolved by the resolver chain like a
//! handler fault.

use crate::common::{PathPatterns, RequestRecord, TransportResponse};
use crate::fault::Fault;
use async_trait::async_trait;
use std::sync::Arc;

pub mod logging;

pub use logging::LogInterceptor;

/// `Ok(())` continues to the handler
pub type InterceptorResult = Result<(), Fault>;

/// The Interceptor trait
///
/// # Example
/// ```
/// use faultline::prelude::*;
///
/// struct RequireHandler;
///
/// #[async_trait]
/// impl Interceptor for RequireHandler {
///     async fn pre_handle(&self, request: &RequestRecord) -> InterceptorResult {
///         match request.handler() {
///             Some(_) => Ok(()),
///             None => Err(Fault::not_found(request.path())),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn pre_handle(&self, _request: &RequestRecord) -> InterceptorResult {
        Ok(())
    }

    /// Only after the handler succeeded
    async fn post_handle(&self, _request: &RequestRecord, _response: &TransportResponse) {}

    /// After the response is known, for every interceptor whose `pre_handle` passed
    async fn after_completion(
        &self,
        _request: &RequestRecord,
        _response: &TransportResponse,
        _fault: Option<&Fault>,
    ) {
    }
}

#[derive(Clone)]
pub struct InterceptorRegistration {
    name: String,
    interceptor: Arc<dyn Interceptor>,
    order: i32,
    patterns: PathPatterns,
}

impl InterceptorRegistration {
    pub fn new(name: impl Into<String>, interceptor: impl Interceptor) -> Self {
        Self {
            name: name.into(),
            interceptor: Arc::new(interceptor),
            order: 0,
            patterns: PathPatterns::new(),
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn add_path_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = self.patterns.include(patterns);
        self
    }

    pub fn exclude_path_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = self.patterns.exclude(patterns);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Default)]
pub struct InterceptorRegistry {
    registrations: Vec<InterceptorRegistration>,
}

impl InterceptorRegistry {
    pub fn new(mut registrations: Vec<InterceptorRegistration>) -> Self {
        registrations.sort_by_key(|registration| registration.order);
        Self { registrations }
    }

    pub fn applicable(&self, path: &str) -> Vec<&InterceptorRegistration> {
        self.registrations
            .iter()
            .filter(|registration| registration.patterns.matches(path))
            .collect()
    }

    /// Run `pre_handle` in order until one fails
    pub async fn enter(&self, request: &RequestRecord) -> EnteredInterceptors<'_> {
        let mut passed = Vec::new();
        for registration in self.applicable(request.path()) {
            if let Err(fault) = registration.interceptor.pre_handle(request).await {
                tracing::debug!(
                    interceptor = registration.name(),
                    request_id = %request.id(),
                    fault = %fault,
                    "pre_handle raised a fault"
                );
                return EnteredInterceptors {
                    passed,
                    fault: Some(fault),
                };
            }
            passed.push(registration);
        }
        EnteredInterceptors {
            passed,
            fault: None,
        }
    }
}

/// Interceptors whose `pre_handle` passed for one request
pub struct EnteredInterceptors<'a> {
    passed: Vec<&'a InterceptorRegistration>,
    fault: Option<Fault>,
}

impl EnteredInterceptors<'_> {
    pub fn names(&self) -> Vec<&str> {
        self.passed.iter().map(|registration| registration.name()).collect()
    }

    pub fn take_fault(&mut self) -> Option<Fault> {
        self.fault.take()
    }

    /// `post_handle` in reverse order
    pub async fn post_handle(&self, request: &RequestRecord, response: &TransportResponse) {
        for registration in self.passed.iter().rev() {
            registration.interceptor.post_handle(request, response).await;
        }
    }

    /// `after_completion` in reverse order
    pub async fn complete(
        self,
        request: &RequestRecord,
        response: &TransportResponse,
        fault: Option<&Fault>,
    ) {
        for registration in self.passed.iter().rev() {
            registration
                .interceptor
                .after_completion(request, response, fault)
                .await;
        }
    }
}
