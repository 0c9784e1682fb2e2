//! Axum adapter
//!
//! Mount an [`ErrorPipeline`] in front of a router with
//! [`axum::middleware::from_fn_with_state`]. Handlers return
//! `Result<_, Fault>`; a returned fault is resolved by the pipeline and
//! everything else passes through untouched.
//!
//! ```rust,no_run
//! use axum::{Router, middleware, routing::get};
//! use faultline::pipeline::resolve_errors;
//! use faultline::prelude::*;
//!
//! async fn member() -> std::result::Result<&'static str, Fault> {
//!     Err(Fault::not_found("member 7"))
//! }
//!
//! let pipeline = Arc::new(ErrorPipeline::builder().build().unwrap());
//! let app: Router = Router::new()
//!     .route("/members/{id}", get(member))
//!     .layer(middleware::from_fn_with_state(pipeline, resolve_errors));
//! ```

use super::{ErrorPipeline, TerminalState};
use crate::common::{RequestRecord, TransportResponse};
use crate::fault::Fault;
use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Response extension marking a response produced from a returned [`Fault`]
#[derive(Debug, Clone)]
pub struct RaisedFault(pub Fault);

/// A fault outside the pipeline is a bare 500; inside it, the middleware
/// takes the fault back out and resolves it.
impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(RaisedFault(self));
        response
    }
}

/// Middleware resolving faults returned by downstream handlers
pub async fn resolve_errors(
    State(pipeline): State<Arc<ErrorPipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let mut record = RequestRecord::from_http(&request);
    if let Some(matched) = request.extensions().get::<MatchedPath>() {
        record = record.with_handler(matched.as_str());
    }

    let (passthrough_tx, mut passthrough_rx) = oneshot::channel::<Response>();
    let outcome = pipeline
        .dispatch(record, move |_| async move {
            let mut response = next.run(request).await;
            if let Some(RaisedFault(fault)) = response.extensions_mut().remove::<RaisedFault>() {
                return Err(fault);
            }
            let status = response.status();
            // The receiver lives until dispatch returns
            let _ = passthrough_tx.send(response);
            Ok(TransportResponse::new(status))
        })
        .await;

    match passthrough_rx.try_recv() {
        Ok(response) if outcome.terminal == TerminalState::Completed => response,
        _ => outcome.response.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorResult;
    use crate::fault::FaultType;
    use crate::resolver::{DeclaredHandlers, ResolutionOutcome};
    use axum::body::{Body, to_bytes};
    use axum::http::header;
    use axum::{Router, middleware, routing::get};
    use tower::ServiceExt;

    async fn member(axum::extract::Path(id): axum::extract::Path<u32>) -> Result<String, Fault> {
        match id {
            0 => Err(Fault::invalid_input("member id must be positive")),
            9 => Err(Fault::not_found(format!("member {id}"))),
            _ => Ok(format!("member {id}")),
        }
    }

    fn app() -> Router {
        let pipeline = ErrorPipeline::builder()
            .handlers(DeclaredHandlers::new().advice([FaultType::INVALID_INPUT], |fault| {
                ResolutionOutcome::error_result(ErrorResult::new(
                    StatusCode::BAD_REQUEST,
                    "BAD",
                    fault.message().unwrap_or_default(),
                ))
            }))
            .register_error_route("404", "/error-page/404")
            .template("error-page/404", "<h1>{{status}} {{path}}</h1>")
            .build()
            .unwrap();
        Router::new()
            .route("/members/{id}", get(member))
            .layer(middleware::from_fn_with_state(Arc::new(pipeline), resolve_errors))
    }

    fn get_request(path: &str, accept: &'static str) -> Request {
        Request::builder()
            .uri(path)
            .header(header::ACCEPT, accept)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_fault_response_carries_the_fault() {
        let response = Fault::not_found("member 7").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let RaisedFault(fault) = response.extensions().get::<RaisedFault>().unwrap();
        assert_eq!(fault.fault_type(), FaultType::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_successful_response_passes_through() {
        let response = app()
            .oneshot(get_request("/members/3", "application/json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "member 3");
    }

    #[tokio::test]
    async fn test_returned_fault_uses_declared_handler() {
        let response = app()
            .oneshot(get_request("/members/0", "application/json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["code"], "BAD");
        assert_eq!(body["message"], "member id must be positive");
    }

    #[tokio::test]
    async fn test_returned_fault_renders_error_page() {
        let response = app()
            .oneshot(get_request("/members/9", "text/html"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<RaisedFault>().is_none());
        assert_eq!(body_text(response).await, "<h1>404 /members/9</h1>");
    }
}
