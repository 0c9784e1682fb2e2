//! # Faultline
//!
//! A layered error resolution pipeline for Rust web services.
//!
//! Faultline decides, for a fault raised while handling a request, which
//! status and which body or error page the client gets, and re-enters the
//! pipeline through an internal error replay when a page has to be rendered.
//!
//! ## Features
//!
//! - **Fault classification**: status annotations on a declared fault type hierarchy
//! - **Resolver chain**: prioritized strategies, first concrete outcome wins
//! - **Declared handlers**: handler-local and advice handlers, most specific type wins
//! - **Error pages**: exact status > fault type > status class > default route
//! - **Replay-aware filters**: cross-cutting logic stays out of error replays
//! - **Interceptors**: include/exclude path patterns
//! - **Axum middleware**: [`pipeline::resolve_errors`] resolves faults returned by handlers
//!
//! ## Quick Start
//!
//! ```rust
//! use faultline::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = ErrorPipeline::builder()
//!         .handlers(DeclaredHandlers::new().advice([FaultType::INVALID_INPUT], |fault| {
//!             ResolutionOutcome::error_result(ErrorResult::new(
//!                 StatusCode::BAD_REQUEST,
//!                 "BAD",
//!                 fault.message().unwrap_or_default(),
//!             ))
//!         }))
//!         .register_error_route("404", "/error-page/404")
//!         .template("error-page/404", "<h1>{{status}} {{message}}</h1>")
//!         .build()
//!         .unwrap();
//!
//!     let request = RequestRecord::get("/api/members/bad").accepting("application/json");
//!     let outcome = pipeline
//!         .dispatch(request, |_| async { Err(Fault::invalid_input("bad member id")) })
//!         .await;
//!
//!     assert_eq!(outcome.response.status, StatusCode::BAD_REQUEST);
//!     assert_eq!(outcome.response.json_body().unwrap()["code"], "BAD");
//! }
//! ```

pub mod classify;
pub mod common;
pub mod composer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod error_page;
pub mod fault;
pub mod filter;
pub mod interceptor;
pub mod pipeline;
pub mod resolver;

// Re-export core types
pub use classify::{Classification, FaultClassifier, StatusAnnotation};
pub use common::{ErrorResult, RequestRecord, TransportResponse};
pub use error::{FaultlineError, Result};
pub use fault::{Fault, FaultKind, FaultType};
pub use pipeline::{DispatchOutcome, ErrorPipeline, ErrorPipelineBuilder};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use faultline::prelude::*;
/// ```
pub mod prelude {
    pub use crate::classify::{
        Classification, FaultCategory, FaultClassifier, MessageSource, StaticMessageSource,
        StatusAnnotation,
    };
    pub use crate::common::{AcceptKind, ErrorResult, PathPatterns, RequestRecord, TransportResponse};
    pub use crate::composer::{Composition, ResponseComposer};
    pub use crate::config::{ConfigService, ErrorProperties, IncludeAttribute};
    pub use crate::dispatch::{DispatchGate, DispatchTypes, RequestOrigin};
    pub use crate::error::{FaultlineError, Result};
    pub use crate::error_page::{
        ErrorAttributes, ErrorPageKey, ErrorPageRegistry, ViewCatalog, ViewRenderer,
    };
    pub use crate::fault::{Fault, FaultKind, FaultType, TypeHierarchy};
    pub use crate::filter::{Filter, FilterRegistration, FilterResult, LogFilter, LoginCheckFilter};
    pub use crate::interceptor::{
        Interceptor, InterceptorRegistration, InterceptorResult, LogInterceptor,
    };
    pub use crate::pipeline::{
        DispatchOutcome, ErrorPipeline, ErrorPipelineBuilder, PipelineState, RaisedFault,
        TerminalState, resolve_errors,
    };
    pub use crate::resolver::{
        DeclaredHandlers, ResolutionOutcome, ResolveContext, ResolveStrategy, ResolverChain,
        SendErrorStrategy, StrategyResult, priority,
    };
    pub use async_trait::async_trait;
    pub use axum::http::StatusCode;
    pub use std::sync::Arc;
}
