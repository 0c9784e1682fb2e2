use super::ErrorPipeline;
use crate::classify::{FaultClassifier, MessageSource, StatusAnnotation};
use crate::composer::ResponseComposer;
use crate::config::{ConfigService, ErrorProperties};
use crate::dispatch::DispatchGate;
use crate::error::Result;
use crate::error_page::{
    ErrorController, ErrorPageKey, ErrorPageRegistry, PlaceholderRenderer, ViewCatalog, ViewRenderer,
};
use crate::fault::{Fault, FaultType, TypeHierarchy};
use crate::filter::{FilterChain, FilterRegistration};
use crate::interceptor::{InterceptorRegistration, InterceptorRegistry};
use crate::resolver::{
    CatchAllStrategy, DeclaredHandlers, ResolveContext, ResolveStrategy, ResolverChainBuilder,
    ResponseStatusStrategy, StrategyResult, priority,
};
use std::sync::Arc;

/// Builder for [`ErrorPipeline`]
///
/// Everything registered here is validated and frozen by [`build`](Self::build).
///
/// # Example
///
/// ```rust
/// use faultline::prelude::*;
///
/// let pipeline = ErrorPipeline::builder()
///     .declare_type("USER-EX", FaultType::ROOT)
///     .handlers(DeclaredHandlers::new().advice(["USER-EX"], |fault| {
///         ResolutionOutcome::error_result(ErrorResult::new(
///             StatusCode::BAD_REQUEST,
///             "USER-EX",
///             fault.message().unwrap_or_default(),
///         ))
///     }))
///     .register_error_route("404", "/error-page/404")
///     .register_error_route("5xx", "/error-page/5xx")
///     .build()
///     .expect("valid pipeline");
///
/// assert_eq!(pipeline.chain().entries().len(), 3);
/// ```
pub struct ErrorPipelineBuilder {
    properties: ErrorProperties,
    types: Vec<(FaultType, FaultType)>,
    annotations: Vec<(FaultType, StatusAnnotation)>,
    messages: Option<Arc<dyn MessageSource>>,
    handlers: DeclaredHandlers,
    chain: ResolverChainBuilder,
    default_strategies: bool,
    routes: Vec<(String, String)>,
    catalog: ViewCatalog,
    renderer: Arc<dyn ViewRenderer>,
    filters: Vec<FilterRegistration>,
    interceptors: Vec<InterceptorRegistration>,
}

impl Default for ErrorPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorPipelineBuilder {
    pub fn new() -> Self {
        Self {
            properties: ErrorProperties::default(),
            types: Vec::new(),
            annotations: Vec::new(),
            messages: None,
            handlers: DeclaredHandlers::new(),
            chain: ResolverChainBuilder::new(),
            default_strategies: true,
            routes: Vec::new(),
            catalog: ViewCatalog::new(),
            renderer: Arc::new(PlaceholderRenderer),
            filters: Vec::new(),
            interceptors: Vec::new(),
        }
    }

    /// Builder with [`ErrorProperties`] read from `config`
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        Ok(Self::new().properties(ErrorProperties::from_config(config)?))
    }

    pub fn properties(mut self, properties: ErrorProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Place `child` under `parent` in the fault type hierarchy
    pub fn declare_type(mut self, child: impl Into<FaultType>, parent: impl Into<FaultType>) -> Self {
        self.types.push((child.into(), parent.into()));
        self
    }

    pub fn annotate(mut self, fault_type: impl Into<FaultType>, annotation: StatusAnnotation) -> Self {
        self.annotations.push((fault_type.into(), annotation));
        self
    }

    pub fn messages(mut self, messages: impl MessageSource) -> Self {
        self.messages = Some(Arc::new(messages));
        self
    }

    /// Declared fault handlers, consulted first
    pub fn handlers(mut self, handlers: DeclaredHandlers) -> Self {
        self.handlers = handlers;
        self
    }

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
        self.chain = self.chain.register_strategy(priority, name, predicate, f);
        self
    }

    pub fn register_resolver<S, P>(mut self, priority: i32, predicate: P, strategy: S) -> Self
    where
        S: ResolveStrategy,
        P: Fn(&Fault) -> bool + Send + Sync + 'static,
    {
        self.chain = self.chain.register(priority, predicate, strategy);
        self
    }

    /// Leave out the status-annotation and catch-all strategies
    pub fn without_default_strategies(mut self) -> Self {
        self.default_strategies = false;
        self
    }

    /// `key` is `"404"`, `"4xx"`, `"error"` or a fault type name
    pub fn register_error_route(mut self, key: impl Into<String>, route: impl Into<String>) -> Self {
        self.routes.push((key.into(), route.into()));
        self
    }

    pub fn template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.catalog.add_template(name, source);
        self
    }

    pub fn static_page(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.catalog.add_static(name, source);
        self
    }

    pub fn renderer(mut self, renderer: impl ViewRenderer) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn filter(mut self, registration: FilterRegistration) -> Self {
        self.filters.push(registration);
        self
    }

    pub fn interceptor(mut self, registration: InterceptorRegistration) -> Self {
        self.interceptors.push(registration);
        self
    }

    pub fn build(self) -> Result<ErrorPipeline> {
        let properties = Arc::new(self.properties);

        let mut hierarchy = TypeHierarchy::new();
        for (child, parent) in self.types {
            hierarchy.declare(child, parent)?;
        }
        let hierarchy = Arc::new(hierarchy);

        let mut classifier = FaultClassifier::new(Arc::clone(&hierarchy))
            .with_generic_message(properties.generic_message.clone());
        if let Some(messages) = self.messages {
            classifier = classifier.with_messages(messages);
        }
        for (fault_type, annotation) in self.annotations {
            classifier.annotate(fault_type, annotation);
        }
        let classifier = Arc::new(classifier);

        let mut chain = self.chain.strategy_timeout(properties.strategy_timeout);
        if !self.handlers.is_empty() {
            chain = chain.register(priority::DECLARED_HANDLERS, always, self.handlers);
        }
        if self.default_strategies {
            chain = chain
                .register(
                    priority::RESPONSE_STATUS,
                    always,
                    ResponseStatusStrategy::new(Arc::clone(&classifier)),
                )
                .register(priority::CATCH_ALL, always, CatchAllStrategy);
        }
        let chain = chain.build();

        let mut registry = ErrorPageRegistry::new(properties.path.clone())?;
        for (key, route) in self.routes {
            registry.register_error_route(key.parse::<ErrorPageKey>()?, route)?;
        }
        let registry = Arc::new(registry);

        let gate = DispatchGate::new();
        let composer = ResponseComposer::new(
            Arc::clone(&registry),
            Arc::clone(&hierarchy),
            Arc::clone(&properties),
        );
        let controller = ErrorController::new(
            Arc::new(self.catalog),
            self.renderer,
            Arc::clone(&registry),
            Arc::clone(&properties),
        );

        tracing::info!(
            strategies = chain.entries().len(),
            filters = self.filters.len(),
            interceptors = self.interceptors.len(),
            error_path = %registry.default_route(),
            "error pipeline built"
        );

        Ok(ErrorPipeline {
            properties,
            classifier,
            chain,
            registry,
            composer,
            controller,
            filters: FilterChain::new(self.filters, gate),
            interceptors: InterceptorRegistry::new(self.interceptors),
            gate,
        })
    }
}

fn always(_: &Fault) -> bool {
    true
}
