use crate::common::{RequestRecord, TransportResponse};
use crate::fault::Fault;
use crate::interceptor::{Interceptor, InterceptorResult};
use async_trait::async_trait;

/// An interceptor that logs the handler, status and any fault of each request
#[derive(Clone, Default)]
pub struct LogInterceptor;

#[async_trait]
impl Interceptor for LogInterceptor {
    async fn pre_handle(&self, request: &RequestRecord) -> InterceptorResult {
        tracing::info!(
            request_id = %request.id(),
            origin = %request.origin(),
            path = request.path(),
            handler = request.handler().unwrap_or("-"),
            "--> preHandle"
        );
        Ok(())
    }

    async fn post_handle(&self, request: &RequestRecord, response: &TransportResponse) {
        tracing::debug!(request_id = %request.id(), status = %response.status, "postHandle");
    }

    async fn after_completion(
        &self,
        request: &RequestRecord,
        response: &TransportResponse,
        fault: Option<&Fault>,
    ) {
        match fault {
            Some(fault) => tracing::error!(
                request_id = %request.id(),
                path = request.path(),
                status = %response.status,
                fault = %fault,
                "<-- afterCompletion"
            ),
            None => tracing::info!(
                request_id = %request.id(),
                path = request.path(),
                status = %response.status,
                "<-- afterCompletion"
            ),
        }
    }
}
