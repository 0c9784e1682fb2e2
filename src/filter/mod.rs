//! Filters
//!
//! Filters wrap the whole dispatch, handler and interceptors included. By
//! default they follow the [`DispatchGate`] and stay out of error replays;
//! a registration can opt into explicit origins instead. A filter that
//! rejects a request raises a [`Fault`] that skips the resolver chain and
//! goes straight to the error-page replay.

use crate::common::{PathPatterns, RequestRecord, TransportResponse};
use crate::dispatch::{DispatchGate, DispatchTypes};
use crate::fault::Fault;
use async_trait::async_trait;
use std::sync::Arc;

pub mod auth;
pub mod logging;

pub use auth::LoginCheckFilter;
pub use logging::LogFilter;

/// `Ok(())` lets the request through, `Err` rejects it
pub type FilterResult = Result<(), Fault>;

#[async_trait]
pub trait Filter: Send + Sync + 'static {
    async fn before(&self, request: &RequestRecord) -> FilterResult;

    /// Runs once the final response for `request` is known, also when
    /// `before` rejected it
    async fn after(&self, _request: &RequestRecord, _response: &TransportResponse) {}
}

/// A filter plus where and when it runs
#[derive(Clone)]
pub struct FilterRegistration {
    name: String,
    filter: Arc<dyn Filter>,
    order: i32,
    url_patterns: PathPatterns,
    dispatch_types: DispatchTypes,
}

impl FilterRegistration {
    pub fn new(name: impl Into<String>, filter: impl Filter) -> Self {
        Self {
            name: name.into(),
            filter: Arc::new(filter),
            order: 0,
            url_patterns: PathPatterns::new(),
            dispatch_types: DispatchTypes::default(),
        }
    }

    /// Lower runs first
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn url_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_patterns = self.url_patterns.include(patterns);
        self
    }

    pub fn dispatch_types(mut self, dispatch_types: DispatchTypes) -> Self {
        self.dispatch_types = dispatch_types;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn applies(&self, gate: &DispatchGate, request: &RequestRecord) -> bool {
        self.dispatch_types.applies(gate, request.origin()) && self.url_patterns.matches(request.path())
    }
}

/// Registered filters in execution order
#[derive(Clone, Default)]
pub struct FilterChain {
    registrations: Vec<FilterRegistration>,
    gate: DispatchGate,
}

impl FilterChain {
    pub fn new(mut registrations: Vec<FilterRegistration>, gate: DispatchGate) -> Self {
        registrations.sort_by_key(|registration| registration.order);
        Self {
            registrations,
            gate,
        }
    }

    pub fn applicable(&self, request: &RequestRecord) -> Vec<&FilterRegistration> {
        self.registrations
            .iter()
            .filter(|registration| registration.applies(&self.gate, request))
            .collect()
    }

    /// Run `before` of every applicable filter until one rejects
    pub async fn enter(&self, request: &RequestRecord) -> EnteredFilters<'_> {
        let mut entered = Vec::new();
        for registration in self.applicable(request) {
            entered.push(registration);
            if let Err(fault) = registration.filter.before(request).await {
                tracing::warn!(
                    filter = registration.name(),
                    request_id = %request.id(),
                    path = request.path(),
                    fault = %fault,
                    "filter rejected request"
                );
                return EnteredFilters {
                    entered,
                    rejection: Some(fault),
                };
            }
        }
        EnteredFilters {
            entered,
            rejection: None,
        }
    }
}

/// Filters whose `before` ran for one request
pub struct EnteredFilters<'a> {
    entered: Vec<&'a FilterRegistration>,
    rejection: Option<Fault>,
}

impl EnteredFilters<'_> {
    pub fn names(&self) -> Vec<&str> {
        self.entered.iter().map(|registration| registration.name()).collect()
    }

    pub fn take_rejection(&mut self) -> Option<Fault> {
        self.rejection.take()
    }

    /// Run `after` in reverse order
    pub async fn complete(self, request: &RequestRecord, response: &TransportResponse) {
        for registration in self.entered.iter().rev() {
            registration.filter.after(request, response).await;
        }
    }
}
