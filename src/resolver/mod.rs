//! The resolver chain
//!
//! An ordered list of strategies tried one after another until one of them
//! produces a concrete [`ResolutionOutcome`]. A strategy that returns
//! [`ResolutionOutcome::Unresolved`] defers to the next one; if every
//! strategy defers, the fault propagates to the boundary.
//!
//! ```text
//! priority 0      declared handlers   (handler-local, then advice)
//! priority 100    status annotations  (send-error → error page)
//! priority 500    custom strategies
//! priority MAX    catch-all           (500)
//! ```

use crate::classify::Classification;
use crate::common::{ErrorResult, RequestRecord};
use crate::fault::{Fault, TypeHierarchy};
use async_trait::async_trait;
use axum::http::StatusCode;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

pub mod builtin;

pub use builtin::{
    CatchAllStrategy, DeclaredHandlers, FnStrategy, HandlerScope, ResponseStatusStrategy,
    SendErrorStrategy, priority,
};

/// Extra values exposed to error views
pub type ViewModel = BTreeMap<String, String>;

/// What a strategy decided for a fault
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// Handled; nothing further is produced
    Empty,
    /// Render an error page through an internal replay
    Render {
        status: StatusCode,
        view: Option<String>,
        model: ViewModel,
    },
    /// Respond with a serialized body
    Respond {
        status: StatusCode,
        body: serde_json::Value,
    },
    /// Defer to the next strategy
    Unresolved,
}

impl ResolutionOutcome {
    pub fn render(status: StatusCode) -> Self {
        Self::Render {
            status,
            view: None,
            model: ViewModel::new(),
        }
    }

    pub fn render_view(status: StatusCode, view: impl Into<String>) -> Self {
        Self::Render {
            status,
            view: Some(view.into()),
            model: ViewModel::new(),
        }
    }

    pub fn respond(status: StatusCode, body: serde_json::Value) -> Self {
        Self::Respond { status, body }
    }

    /// `Respond` carrying an [`ErrorResult`] body with its own status
    pub fn error_result(result: ErrorResult) -> Self {
        let status = result.status_code();
        let body = serde_json::json!({
            "status": result.status,
            "code": result.code,
            "message": result.message,
        });
        Self::Respond { status, body }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, ResolutionOutcome::Unresolved)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionOutcome::Empty => "empty",
            ResolutionOutcome::Render { .. } => "render",
            ResolutionOutcome::Respond { .. } => "respond",
            ResolutionOutcome::Unresolved => "unresolved",
        }
    }
}

/// Errors bubble out of strategies as `anyhow` values and are demoted to
/// `Unresolved` by the chain.
pub type StrategyResult = anyhow::Result<ResolutionOutcome>;

/// Everything a strategy may read besides the fault itself
pub struct ResolveContext<'a> {
    pub request: &'a RequestRecord,
    pub classification: &'a Classification,
    pub hierarchy: &'a TypeHierarchy,
}

#[async_trait]
pub trait ResolveStrategy: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn resolve(&self, fault: &Fault, ctx: &ResolveContext<'_>) -> StrategyResult;
}

type Predicate = Arc<dyn Fn(&Fault) -> bool + Send + Sync>;

/// One registered strategy
#[derive(Clone)]
pub struct ResolverEntry {
    priority: i32,
    sequence: usize,
    predicate: Predicate,
    strategy: Arc<dyn ResolveStrategy>,
}

impl ResolverEntry {
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }
}

/// Outcome plus the strategy that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    pub resolved_by: Option<String>,
}

pub struct ResolverChain {
    entries: Vec<ResolverEntry>,
    strategy_timeout: Duration,
}

impl ResolverChain {
    pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn builder() -> ResolverChainBuilder {
        ResolverChainBuilder::new()
    }

    pub fn entries(&self) -> &[ResolverEntry] {
        &self.entries
    }

    pub async fn resolve(&self, fault: &Fault, ctx: &ResolveContext<'_>) -> ResolutionOutcome {
        self.resolve_detailed(fault, ctx).await.outcome
    }

    /// Run the chain and report which strategy won.
    ///
    /// A strategy that errors, panics or outlives the strategy timeout counts
    /// as `Unresolved`; so does an entry whose predicate panics.
    pub async fn resolve_detailed(&self, fault: &Fault, ctx: &ResolveContext<'_>) -> Resolution {
        for entry in &self.entries {
            let name = entry.strategy.name();

            let matched = std::panic::catch_unwind(AssertUnwindSafe(|| (entry.predicate)(fault)))
                .unwrap_or_else(|_| {
                    tracing::warn!(strategy = name, fault = %fault, "predicate panicked, skipping strategy");
                    false
                });
            if !matched {
                tracing::trace!(strategy = name, fault = %fault, "predicate did not match");
                continue;
            }

            let attempt = AssertUnwindSafe(entry.strategy.resolve(fault, ctx)).catch_unwind();
            let outcome = match tokio::time::timeout(self.strategy_timeout, attempt).await {
                Ok(Ok(Ok(outcome))) => outcome,
                Ok(Ok(Err(e))) => {
                    tracing::warn!(
                        strategy = name,
                        fault = %fault,
                        error = %e,
                        "strategy failed, treating as unresolved"
                    );
                    ResolutionOutcome::Unresolved
                }
                Ok(Err(_)) => {
                    tracing::warn!(
                        strategy = name,
                        fault = %fault,
                        "strategy panicked, treating as unresolved"
                    );
                    ResolutionOutcome::Unresolved
                }
                Err(_) => {
                    tracing::warn!(
                        strategy = name,
                        fault = %fault,
                        timeout = ?self.strategy_timeout,
                        "strategy timed out, treating as unresolved"
                    );
                    ResolutionOutcome::Unresolved
                }
            };

            tracing::debug!(
                strategy = name,
                priority = entry.priority,
                fault = %fault,
                decision = outcome.label(),
                "strategy executed"
            );

            if outcome.is_resolved() {
                return Resolution {
                    outcome,
                    resolved_by: Some(name.to_string()),
                };
            }
        }

        tracing::debug!(fault = %fault, "no strategy resolved the fault");
        Resolution {
            outcome: ResolutionOutcome::Unresolved,
            resolved_by: None,
        }
    }
}

/// Startup-time registration of strategies
pub struct ResolverChainBuilder {
    entries: Vec<ResolverEntry>,
    strategy_timeout: Duration,
}

impl Default for ResolverChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverChainBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            strategy_timeout: ResolverChain::DEFAULT_STRATEGY_TIMEOUT,
        }
    }

    /// Register a strategy object guarded by `predicate`
    pub fn register<S, P>(mut self, priority: i32, predicate: P, strategy: S) -> Self
    where
        S: ResolveStrategy,
        P: Fn(&Fault) -> bool + Send + Sync + 'static,
    {
        self.push(priority, Arc::new(predicate), Arc::new(strategy));
        self
    }

    /// Register a plain function as a strategy
    pub fn register_strategy<P, F>(
        mut self,
        priority: i32,
        name: impl Into<String>,
        predicate: P,
        f: F,
    ) -> Self
    where
        P: Fn(&Fault) -> bool + Send + Sync + 'static,
        F: Fn(&Fault, &ResolveContext<'_>) -> StrategyResult + Send + Sync + 'static,
    {
        self.push(
            priority,
            Arc::new(predicate),
            Arc::new(FnStrategy::new(name, f)),
        );
        self
    }

    pub fn strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }

    pub(crate) fn push(
        &mut self,
        priority: i32,
        predicate: Predicate,
        strategy: Arc<dyn ResolveStrategy>,
    ) {
        let sequence = self.entries.len();
        self.entries.push(ResolverEntry {
            priority,
            sequence,
            predicate,
            strategy,
        });
    }

    pub fn build(mut self) -> ResolverChain {
        self.entries.sort_by_key(|entry| (entry.priority, entry.sequence));
        tracing::info!(
            strategies = self.entries.len(),
            order = ?self.entries.iter().map(|e| e.name()).collect::<Vec<_>>(),
            "resolver chain built"
        );
        ResolverChain {
            entries: self.entries,
            strategy_timeout: self.strategy_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FaultClassifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn run(chain: &ResolverChain, fault: &Fault) -> Resolution {
        let hierarchy = TypeHierarchy::new();
        let classification = FaultClassifier::new(Arc::new(TypeHierarchy::new())).classify(fault);
        let request = RequestRecord::get("/api/members/1");
        let ctx = ResolveContext {
            request: &request,
            classification: &classification,
            hierarchy: &hierarchy,
        };
        chain.resolve_detailed(fault, &ctx).await
    }

    fn always(_: &Fault) -> bool {
        true
    }

    fn teapot(_: &Fault, _: &ResolveContext<'_>) -> StrategyResult {
        Ok(ResolutionOutcome::render(StatusCode::IM_A_TEAPOT))
    }

    fn gone(_: &Fault, _: &ResolveContext<'_>) -> StrategyResult {
        Ok(ResolutionOutcome::render(StatusCode::GONE))
    }

    #[tokio::test]
    async fn test_lower_priority_number_runs_first() {
        let chain = ResolverChain::builder()
            .register_strategy(10, "late", always, gone)
            .register_strategy(1, "early", always, teapot)
            .build();
        let resolution = run(&chain, &Fault::internal("boom")).await;
        assert_eq!(resolution.resolved_by.as_deref(), Some("early"));
    }

    #[tokio::test]
    async fn test_equal_priority_keeps_registration_order() {
        let chain = ResolverChain::builder()
            .register_strategy(5, "first", always, gone)
            .register_strategy(5, "second", always, teapot)
            .build();
        let names: Vec<_> = chain.entries().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(
            run(&chain, &Fault::internal("boom")).await.outcome,
            ResolutionOutcome::render(StatusCode::GONE)
        );
    }

    #[tokio::test]
    async fn test_failing_strategy_is_skipped() {
        let chain = ResolverChain::builder()
            .register_strategy(0, "broken", always, |_, _| anyhow::bail!("lookup exploded"))
            .register_strategy(1, "fallback", always, teapot)
            .build();
        let resolution = run(&chain, &Fault::internal("boom")).await;
        assert_eq!(resolution.resolved_by.as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn test_panicking_strategy_is_skipped() {
        let chain = ResolverChain::builder()
            .register_strategy(0, "panics", always, |_, _| panic!("handler bug"))
            .register_strategy(1, "fallback", always, teapot)
            .build();
        let resolution = run(&chain, &Fault::internal("boom")).await;
        assert_eq!(resolution.resolved_by.as_deref(), Some("fallback"));
        assert_eq!(resolution.outcome, ResolutionOutcome::render(StatusCode::IM_A_TEAPOT));
    }

    #[tokio::test]
    async fn test_panicking_predicate_skips_its_strategy() {
        let chain = ResolverChain::builder()
            .register_strategy(0, "bad-predicate", |_: &Fault| panic!("predicate bug"), gone)
            .register_strategy(1, "fallback", always, teapot)
            .build();
        let resolution = run(&chain, &Fault::internal("boom")).await;
        assert_eq!(resolution.resolved_by.as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn test_predicate_filters_strategies() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let chain = ResolverChain::builder()
            .register_strategy(
                0,
                "not-found-only",
                |fault: &Fault| fault.fault_type() == crate::fault::FaultType::NOT_FOUND,
                move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(ResolutionOutcome::Empty)
                },
            )
            .build();

        let resolution = run(&chain, &Fault::invalid_input("bad")).await;
        assert_eq!(resolution.outcome, ResolutionOutcome::Unresolved);
        assert_eq!(resolution.resolved_by, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolution_is_deterministic() {
        let chain = ResolverChain::builder()
            .register_strategy(3, "a", always, gone)
            .register_strategy(3, "b", always, teapot)
            .build();
        let fault = Fault::domain("USER-EX", "user error");
        let first = run(&chain, &fault).await;
        for _ in 0..10 {
            assert_eq!(run(&chain, &fault).await, first);
        }
    }

    struct Slow;

    #[async_trait]
    impl ResolveStrategy for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn resolve(&self, _fault: &Fault, _ctx: &ResolveContext<'_>) -> StrategyResult {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ResolutionOutcome::Empty)
        }
    }

    #[tokio::test]
    async fn test_timed_out_strategy_is_unresolved() {
        let chain = ResolverChain::builder()
            .strategy_timeout(Duration::from_millis(20))
            .register(0, always, Slow)
            .register_strategy(1, "fast", always, teapot)
            .build();
        let resolution = run(&chain, &Fault::internal("boom")).await;
        assert_eq!(resolution.resolved_by.as_deref(), Some("fast"));
    }
}
