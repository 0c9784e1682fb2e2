//! Error Pipeline
//!
//! Runs one request through filters, interceptors and the handler, and
//! turns any fault into a response:
//!
//! ```text
//! Raised → Classified → Handled ──────────────┬→ Responded
//!                     └→ Unresolved → Propagated ┴→ InternalReplay → Rendered
//! ```
//!
//! The replay is dispatched at most once. A fault raised while the error
//! route renders ends in [`TerminalState::UnhandledPropagation`] with the
//! minimal fallback response; it never re-enters the resolver chain.

use crate::classify::FaultClassifier;
use crate::common::{RequestRecord, TransportResponse};
use crate::composer::{Composition, ResponseComposer};
use crate::config::ErrorProperties;
use crate::dispatch::{DispatchGate, RequestOrigin};
use crate::error_page::{ErrorController, ErrorPageRegistry};
use crate::fault::Fault;
use crate::filter::FilterChain;
use crate::interceptor::InterceptorRegistry;
use crate::resolver::{ResolutionOutcome, ResolveContext, ResolverChain};
use std::future::Future;
use std::sync::Arc;
use strum_macros::Display;
use uuid::Uuid;

mod builder;
mod middleware;

pub use builder::ErrorPipelineBuilder;
pub use middleware::{RaisedFault, resolve_errors};

/// Steps a faulting request goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PipelineState {
    Raised,
    Classified,
    Handled,
    Unresolved,
    Propagated,
    InternalReplay,
    Rendered,
    Responded,
    UnhandledPropagation,
}

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TerminalState {
    /// No fault, or a fault resolved to `Empty`
    Completed,
    /// A strategy responded directly
    Responded,
    /// The error route rendered the response
    Rendered,
    /// Minimal fallback
    UnhandledPropagation,
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub response: TransportResponse,
    pub terminal: TerminalState,
    pub transitions: Vec<PipelineState>,
    /// Error route the request was replayed to
    pub replay_path: Option<String>,
    /// Strategy that resolved the fault
    pub resolved_by: Option<String>,
}

struct Transitions {
    request_id: Uuid,
    states: Vec<PipelineState>,
}

impl Transitions {
    fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            states: Vec::new(),
        }
    }

    fn push(&mut self, state: PipelineState) {
        tracing::debug!(request_id = %self.request_id, %state, "pipeline transition");
        self.states.push(state);
    }
}

struct FaultResponse {
    response: TransportResponse,
    terminal: TerminalState,
    replay_path: Option<String>,
    resolved_by: Option<String>,
}

impl FaultResponse {
    fn fallback() -> Self {
        Self {
            response: TransportResponse::minimal_fallback(),
            terminal: TerminalState::UnhandledPropagation,
            replay_path: None,
            resolved_by: None,
        }
    }
}

/// The assembled pipeline; immutable and shareable across tasks
pub struct ErrorPipeline {
    properties: Arc<ErrorProperties>,
    classifier: Arc<FaultClassifier>,
    chain: ResolverChain,
    registry: Arc<ErrorPageRegistry>,
    composer: ResponseComposer,
    controller: ErrorController,
    filters: FilterChain,
    interceptors: InterceptorRegistry,
    gate: DispatchGate,
}

impl ErrorPipeline {
    pub fn builder() -> ErrorPipelineBuilder {
        ErrorPipelineBuilder::new()
    }

    pub fn properties(&self) -> &ErrorProperties {
        &self.properties
    }

    pub fn classifier(&self) -> &FaultClassifier {
        &self.classifier
    }

    pub fn chain(&self) -> &ResolverChain {
        &self.chain
    }

    pub fn registry(&self) -> &ErrorPageRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &DispatchGate {
        &self.gate
    }

    /// Dispatch `request` to `handler` and resolve whatever it raises
    pub async fn dispatch<H, Fut>(&self, request: RequestRecord, handler: H) -> DispatchOutcome
    where
        H: FnOnce(RequestRecord) -> Fut + Send,
        Fut: Future<Output = Result<TransportResponse, Fault>> + Send,
    {
        let mut transitions = Transitions::new(request.id());
        let mut filters = self.filters.enter(&request).await;

        let result = match filters.take_rejection() {
            Some(fault) => self.reject(&request, &fault, &mut transitions).await,
            None => {
                let mut interceptors = self.interceptors.enter(&request).await;
                let handled = match interceptors.take_fault() {
                    Some(fault) => Err(fault),
                    None => handler(request.clone()).await,
                };

                match handled {
                    Ok(response) => {
                        interceptors.post_handle(&request, &response).await;
                        interceptors.complete(&request, &response, None).await;
                        FaultResponse {
                            response,
                            terminal: TerminalState::Completed,
                            replay_path: None,
                            resolved_by: None,
                        }
                    }
                    Err(fault) => {
                        let result = self.resolve(&request, &fault, &mut transitions).await;
                        interceptors
                            .complete(&request, &result.response, Some(&fault))
                            .await;
                        result
                    }
                }
            }
        };

        filters.complete(&request, &result.response).await;

        DispatchOutcome {
            response: result.response,
            terminal: result.terminal,
            transitions: transitions.states,
            replay_path: result.replay_path,
            resolved_by: result.resolved_by,
        }
    }

    async fn resolve(
        &self,
        request: &RequestRecord,
        fault: &Fault,
        transitions: &mut Transitions,
    ) -> FaultResponse {
        transitions.push(PipelineState::Raised);

        if request.origin() == RequestOrigin::InternalErrorReplay {
            tracing::error!(
                request_id = %request.id(),
                path = request.path(),
                fault = %fault,
                "fault during error replay, answering with minimal fallback"
            );
            transitions.push(PipelineState::UnhandledPropagation);
            return FaultResponse::fallback();
        }

        let classification = self.classifier.classify(fault);
        transitions.push(PipelineState::Classified);

        let ctx = ResolveContext {
            request,
            classification: &classification,
            hierarchy: self.classifier.hierarchy(),
        };
        let resolution = self.chain.resolve_detailed(fault, &ctx).await;
        let resolved_by = resolution.resolved_by;

        if resolution.outcome.is_resolved() {
            transitions.push(PipelineState::Handled);
        } else {
            transitions.push(PipelineState::Unresolved);
            transitions.push(PipelineState::Propagated);
        }

        let empty = resolution.outcome == ResolutionOutcome::Empty;
        match self
            .composer
            .compose(resolution.outcome, request, fault, &classification)
        {
            Composition::Respond(response) => {
                let terminal = if empty {
                    TerminalState::Completed
                } else {
                    transitions.push(PipelineState::Responded);
                    TerminalState::Responded
                };
                FaultResponse {
                    response,
                    terminal,
                    replay_path: None,
                    resolved_by,
                }
            }
            Composition::Replay(replay) => FaultResponse {
                resolved_by,
                ..self.replay(replay, transitions).await
            },
        }
    }

    /// A filter rejection goes straight to the error route
    async fn reject(
        &self,
        request: &RequestRecord,
        fault: &Fault,
        transitions: &mut Transitions,
    ) -> FaultResponse {
        transitions.push(PipelineState::Raised);
        if request.origin() == RequestOrigin::InternalErrorReplay {
            transitions.push(PipelineState::UnhandledPropagation);
            return FaultResponse::fallback();
        }

        let classification = self.classifier.classify(fault);
        transitions.push(PipelineState::Classified);
        transitions.push(PipelineState::Propagated);
        let replay = self.composer.propagate(request, fault, &classification);
        self.replay(replay, transitions).await
    }

    async fn replay(&self, replay: RequestRecord, transitions: &mut Transitions) -> FaultResponse {
        transitions.push(PipelineState::InternalReplay);
        let route = replay.path().to_string();

        let mut filters = self.filters.enter(&replay).await;
        let mut interceptors = match filters.take_rejection() {
            Some(fault) => {
                tracing::error!(route = %route, fault = %fault, "filter rejected error replay");
                None
            }
            None => Some(self.interceptors.enter(&replay).await),
        };

        let rendered = match interceptors.as_mut() {
            None => Err(Fault::internal("error replay rejected by filter")),
            Some(entered) => match entered.take_fault() {
                Some(fault) => Err(fault),
                None => self.controller.handle(&replay),
            },
        };

        let (response, terminal, fault) = match rendered {
            Ok(response) => {
                transitions.push(PipelineState::Rendered);
                (response, TerminalState::Rendered, None)
            }
            Err(fault) => {
                tracing::error!(
                    request_id = %replay.id(),
                    route = %route,
                    fault = %fault,
                    "error route failed, answering with minimal fallback"
                );
                transitions.push(PipelineState::UnhandledPropagation);
                (
                    TransportResponse::minimal_fallback(),
                    TerminalState::UnhandledPropagation,
                    Some(fault),
                )
            }
        };

        if let Some(entered) = interceptors {
            entered.complete(&replay, &response, fault.as_ref()).await;
        }
        filters.complete(&replay, &response).await;

        FaultResponse {
            response,
            terminal,
            replay_path: Some(route),
            resolved_by: None,
        }
    }
}
