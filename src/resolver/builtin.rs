use super::{ResolutionOutcome, ResolveContext, ResolveStrategy, StrategyResult, ViewModel};
use crate::classify::FaultClassifier;
use crate::common::RequestRecord;
use crate::fault::{Fault, FaultType, TypeHierarchy};
use async_trait::async_trait;
use axum::http::StatusCode;
use std::sync::Arc;

/// Priorities of the built-in strategies
pub mod priority {
    pub const DECLARED_HANDLERS: i32 = 0;
    pub const RESPONSE_STATUS: i32 = 100;
    /// Suggested slot for application strategies
    pub const CUSTOM: i32 = 500;
    pub const CATCH_ALL: i32 = i32::MAX;
}

/// Adapts a plain function into a [`ResolveStrategy`]
pub struct FnStrategy<F> {
    name: String,
    f: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(&Fault, &ResolveContext<'_>) -> StrategyResult + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> ResolveStrategy for FnStrategy<F>
where
    F: Fn(&Fault, &ResolveContext<'_>) -> StrategyResult + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, fault: &Fault, ctx: &ResolveContext<'_>) -> StrategyResult {
        (self.f)(fault, ctx)
    }
}

/// Which requests a declared handler applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerScope {
    /// Only requests served by the named handler
    Handler(String),
    /// Every request, or only those under `base_path`
    Advice { base_path: Option<String> },
}

impl HandlerScope {
    fn is_local(&self) -> bool {
        matches!(self, HandlerScope::Handler(_))
    }

    fn applies_to(&self, request: &RequestRecord) -> bool {
        match self {
            HandlerScope::Handler(name) => request.handler() == Some(name.as_str()),
            HandlerScope::Advice { base_path: None } => true,
            HandlerScope::Advice {
                base_path: Some(base),
            } => {
                let base = base.trim_end_matches('/');
                request
                    .path()
                    .strip_prefix(base)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            }
        }
    }
}

type HandlerFn = Arc<dyn Fn(&Fault) -> ResolutionOutcome + Send + Sync>;

struct HandlerDeclaration {
    scope: HandlerScope,
    fault_types: Vec<FaultType>,
    handler: HandlerFn,
}

/// Fault handlers declared per handler or as global advice.
///
/// Handler-local declarations are consulted before advice. Within a tier the
/// declaration whose fault type is the nearest ancestor of the raised fault
/// wins; equally specific declarations are ordered by declaration order.
///
/// # Example
/// ```
/// use faultline::prelude::*;
///
/// let handlers = DeclaredHandlers::new()
///     .advice([FaultType::INVALID_INPUT], |fault| {
///         ResolutionOutcome::error_result(ErrorResult::new(
///             StatusCode::BAD_REQUEST,
///             "BAD",
///             fault.message().unwrap_or_default(),
///         ))
///     });
/// assert_eq!(handlers.len(), 1);
/// ```
#[derive(Default)]
pub struct DeclaredHandlers {
    declarations: Vec<HandlerDeclaration>,
}

impl DeclaredHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a handler local to the handler named `handler_name`
    pub fn local<T, F>(self, handler_name: impl Into<String>, fault_types: T, f: F) -> Self
    where
        T: IntoIterator,
        T::Item: Into<FaultType>,
        F: Fn(&Fault) -> ResolutionOutcome + Send + Sync + 'static,
    {
        self.declare(HandlerScope::Handler(handler_name.into()), fault_types, f)
    }

    /// Declare a global advice handler
    pub fn advice<T, F>(self, fault_types: T, f: F) -> Self
    where
        T: IntoIterator,
        T::Item: Into<FaultType>,
        F: Fn(&Fault) -> ResolutionOutcome + Send + Sync + 'static,
    {
        self.declare(HandlerScope::Advice { base_path: None }, fault_types, f)
    }

    /// Declare an advice handler limited to requests under `base_path`
    pub fn advice_for_path<T, F>(self, base_path: impl Into<String>, fault_types: T, f: F) -> Self
    where
        T: IntoIterator,
        T::Item: Into<FaultType>,
        F: Fn(&Fault) -> ResolutionOutcome + Send + Sync + 'static,
    {
        let scope = HandlerScope::Advice {
            base_path: Some(base_path.into()),
        };
        self.declare(scope, fault_types, f)
    }

    pub fn declare<T, F>(mut self, scope: HandlerScope, fault_types: T, f: F) -> Self
    where
        T: IntoIterator,
        T::Item: Into<FaultType>,
        F: Fn(&Fault) -> ResolutionOutcome + Send + Sync + 'static,
    {
        self.declarations.push(HandlerDeclaration {
            scope,
            fault_types: fault_types.into_iter().map(Into::into).collect(),
            handler: Arc::new(f),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    fn select(
        &self,
        fault_type: &FaultType,
        request: &RequestRecord,
        hierarchy: &TypeHierarchy,
    ) -> Option<&HandlerDeclaration> {
        let best_in_tier = move |local: bool| {
            self.declarations
                .iter()
                .enumerate()
                .filter(|(_, decl)| decl.scope.is_local() == local)
                .filter(|(_, decl)| decl.scope.applies_to(request))
                .filter_map(|(order, decl)| {
                    decl.fault_types
                        .iter()
                        .filter_map(|declared| hierarchy.distance(fault_type, declared))
                        .min()
                        .map(|distance| ((distance, order), decl))
                })
                .min_by_key(|(rank, _)| *rank)
                .map(|(_, decl)| decl)
        };

        best_in_tier(true).or_else(|| best_in_tier(false))
    }
}

#[async_trait]
impl ResolveStrategy for DeclaredHandlers {
    fn name(&self) -> &str {
        "declared-handlers"
    }

    async fn resolve(&self, fault: &Fault, ctx: &ResolveContext<'_>) -> StrategyResult {
        let fault_type = fault.fault_type();
        match self.select(&fault_type, ctx.request, ctx.hierarchy) {
            Some(declaration) => {
                tracing::error!(
                    fault = %fault,
                    scope = ?declaration.scope,
                    "[exceptionHandler] handling fault"
                );
                Ok((declaration.handler)(fault))
            }
            None => Ok(ResolutionOutcome::Unresolved),
        }
    }
}

/// Renders the annotated status for faults whose type (or an ancestor)
/// carries a status annotation
pub struct ResponseStatusStrategy {
    classifier: Arc<FaultClassifier>,
}

impl ResponseStatusStrategy {
    pub fn new(classifier: Arc<FaultClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl ResolveStrategy for ResponseStatusStrategy {
    fn name(&self) -> &str {
        "response-status"
    }

    async fn resolve(&self, fault: &Fault, ctx: &ResolveContext<'_>) -> StrategyResult {
        let fault_type = fault.fault_type();
        Ok(match self.classifier.annotation_for(&fault_type) {
            Some((annotated, _)) => {
                tracing::debug!(
                    fault = %fault,
                    annotated = %annotated,
                    status = %ctx.classification.status,
                    "status annotation matched"
                );
                ResolutionOutcome::render(ctx.classification.status)
            }
            None => ResolutionOutcome::Unresolved,
        })
    }
}

/// Converts faults of one type into an error page with a fixed status,
/// carrying the fault message into the view model
pub struct SendErrorStrategy {
    fault_type: FaultType,
    status: StatusCode,
}

impl SendErrorStrategy {
    pub fn new(fault_type: impl Into<FaultType>, status: StatusCode) -> Self {
        Self {
            fault_type: fault_type.into(),
            status,
        }
    }
}

#[async_trait]
impl ResolveStrategy for SendErrorStrategy {
    fn name(&self) -> &str {
        "send-error"
    }

    async fn resolve(&self, fault: &Fault, ctx: &ResolveContext<'_>) -> StrategyResult {
        if !ctx.hierarchy.is_subtype(&fault.fault_type(), &self.fault_type) {
            return Ok(ResolutionOutcome::Unresolved);
        }

        tracing::info!(fault = %fault, status = %self.status, "send-error resolver matched");
        let mut model = ViewModel::new();
        if let Some(message) = fault.message() {
            model.insert("message".to_string(), message.to_string());
        }
        Ok(ResolutionOutcome::Render {
            status: self.status,
            view: None,
            model,
        })
    }
}

/// Last resort: every fault becomes a 500 error page
#[derive(Debug, Clone, Copy, Default)]
pub struct CatchAllStrategy;

#[async_trait]
impl ResolveStrategy for CatchAllStrategy {
    fn name(&self) -> &str {
        "catch-all"
    }

    async fn resolve(&self, fault: &Fault, _ctx: &ResolveContext<'_>) -> StrategyResult {
        tracing::warn!(fault = %fault, "no specific strategy matched, rendering 500");
        Ok(ResolutionOutcome::render(StatusCode::INTERNAL_SERVER_ERROR))
    }
}
