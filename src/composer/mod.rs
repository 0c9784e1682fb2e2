use crate::classify::{Classification, FaultCategory};
use crate::common::{RequestRecord, TransportResponse};
use crate::config::ErrorProperties;
use crate::error_page::{ErrorAttributes, ErrorPageRegistry};
use crate::fault::{Fault, TypeHierarchy};
use crate::resolver::{ResolutionOutcome, ViewModel};
use axum::http::StatusCode;
use std::sync::Arc;

/// What the boundary does with a resolved fault
#[derive(Debug, Clone)]
pub enum Composition {
    /// Write this response and stop
    Respond(TransportResponse),
    /// Dispatch this synthetic request to an error route
    Replay(RequestRecord),
}

/// Turns a resolution outcome into a response or an error-route replay
pub struct ResponseComposer {
    registry: Arc<ErrorPageRegistry>,
    hierarchy: Arc<TypeHierarchy>,
    properties: Arc<ErrorProperties>,
}

impl ResponseComposer {
    pub fn new(
        registry: Arc<ErrorPageRegistry>,
        hierarchy: Arc<TypeHierarchy>,
        properties: Arc<ErrorProperties>,
    ) -> Self {
        Self {
            registry,
            hierarchy,
            properties,
        }
    }

    /// `Respond` outcomes are written as JSON whatever the request accepts.
    /// Content negotiation happens on the replay: `Render` and `Unresolved`
    /// go through the error route, where [`ErrorController`] picks a JSON
    /// body or a view from the request's accept kind.
    ///
    /// [`ErrorController`]: crate::error_page::ErrorController
    pub fn compose(
        &self,
        outcome: ResolutionOutcome,
        request: &RequestRecord,
        fault: &Fault,
        classification: &Classification,
    ) -> Composition {
        match outcome {
            ResolutionOutcome::Empty => Composition::Respond(TransportResponse::new(StatusCode::OK)),
            ResolutionOutcome::Respond { status, body } => {
                Composition::Respond(TransportResponse::json(status, &body))
            }
            ResolutionOutcome::Render {
                status,
                view,
                model,
            } => Composition::Replay(self.replay(request, fault, classification, status, view, model)),
            ResolutionOutcome::Unresolved => {
                Composition::Replay(self.propagate(request, fault, classification))
            }
        }
    }

    /// Replay for a fault nobody resolved, at the classified status
    pub fn propagate(
        &self,
        request: &RequestRecord,
        fault: &Fault,
        classification: &Classification,
    ) -> RequestRecord {
        tracing::debug!(fault = %fault, status = %classification.status, "fault propagated to boundary");
        self.replay(
            request,
            fault,
            classification,
            classification.status,
            None,
            ViewModel::new(),
        )
    }

    fn replay(
        &self,
        request: &RequestRecord,
        fault: &Fault,
        classification: &Classification,
        status: StatusCode,
        view: Option<String>,
        model: ViewModel,
    ) -> RequestRecord {
        let fault_type = fault.fault_type();
        let route = match view {
            Some(view) => view,
            None => self
                .registry
                .lookup(status, &fault_type, &self.hierarchy)
                .route
                .to_string(),
        };

        let attributes = ErrorAttributes {
            timestamp: chrono::Utc::now(),
            status,
            code: classification.code.clone(),
            message: self.replay_message(status, &model, fault, classification),
            path: request.path().to_string(),
            fault_type,
            model,
        };

        tracing::info!(
            request_id = %request.id(),
            path = request.path(),
            route = %route,
            %status,
            "replaying request to error route"
        );
        request.replay(route, attributes)
    }

    fn replay_message(
        &self,
        status: StatusCode,
        model: &ViewModel,
        fault: &Fault,
        classification: &Classification,
    ) -> String {
        if status.is_server_error() {
            return self.properties.generic_message.clone();
        }
        if let Some(message) = model.get("message") {
            return message.clone();
        }
        if classification.category() == FaultCategory::ClientFault {
            return classification.message.clone();
        }
        fault
            .message()
            .or(status.canonical_reason())
            .unwrap_or_default()
            .to_string()
    }
}
