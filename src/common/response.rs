use axum::{
    Json,
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Response handed back to the transport layer
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::new(status).with_body("application/json", body),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize error body");
                Self::minimal_fallback()
            }
        }
    }

    pub fn html(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status).with_body("text/html;charset=UTF-8", body)
    }

    /// Bare 500 with no custom body, used when error rendering itself fails
    pub fn minimal_fallback() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn with_body(mut self, content_type: &'static str, body: impl Into<String>) -> Self {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = body.into();
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Parsed JSON body, if this is a JSON response
    pub fn json_body(&self) -> Option<serde_json::Value> {
        if self.content_type()? != "application/json" {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }
}

impl IntoResponse for TransportResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Structured error body produced by fault handlers
///
/// # Example
/// ```
/// use faultline::common::ErrorResult;
/// use axum::http::StatusCode;
///
/// let body = ErrorResult::new(StatusCode::BAD_REQUEST, "BAD", "invalid input value");
/// assert_eq!(body.status, 400);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl ErrorResult {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorResult {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}
