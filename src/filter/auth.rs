use super::{Filter, FilterResult};
use crate::common::{PathPatterns, RequestRecord};
use crate::fault::Fault;
use async_trait::async_trait;
use axum::http::{HeaderName, header};

/// Rejects requests without a credential header, except on whitelisted paths
pub struct LoginCheckFilter {
    whitelist: PathPatterns,
    credential: HeaderName,
}

impl LoginCheckFilter {
    /// Checks the `Authorization` header
    pub fn new<I, S>(whitelist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            whitelist: PathPatterns::new().include(whitelist),
            credential: header::AUTHORIZATION,
        }
    }

    pub fn with_credential_header(mut self, credential: HeaderName) -> Self {
        self.credential = credential;
        self
    }

    fn is_whitelisted(&self, path: &str) -> bool {
        // an empty include list would match everything
        !self.whitelist.is_empty() && self.whitelist.matches(path)
    }
}

#[async_trait]
impl Filter for LoginCheckFilter {
    async fn before(&self, request: &RequestRecord) -> FilterResult {
        if self.is_whitelisted(request.path()) {
            return Ok(());
        }

        let authenticated = request
            .headers()
            .get(&self.credential)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| !value.trim().is_empty());

        if authenticated {
            Ok(())
        } else {
            tracing::info!(path = request.path(), "unauthenticated request");
            Err(Fault::unauthorized(format!(
                "login required for {}",
                request.path()
            )))
        }
    }
}
