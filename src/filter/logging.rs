use super::{Filter, FilterResult};
use crate::common::{RequestRecord, TransportResponse};
use async_trait::async_trait;

/// Logs every request entering and leaving the filter chain
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFilter;

#[async_trait]
impl Filter for LogFilter {
    async fn before(&self, request: &RequestRecord) -> FilterResult {
        tracing::info!(
            request_id = %request.id(),
            origin = %request.origin(),
            method = %request.method(),
            path = request.path(),
            "REQUEST"
        );
        Ok(())
    }

    async fn after(&self, request: &RequestRecord, response: &TransportResponse) {
        tracing::info!(
            request_id = %request.id(),
            origin = %request.origin(),
            path = request.path(),
            status = %response.status,
            "RESPONSE"
        );
    }
}
