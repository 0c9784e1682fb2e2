use crate::dispatch::RequestOrigin;
use crate::error_page::ErrorAttributes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, header};
use uuid::Uuid;

/// How the client wants errors presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum AcceptKind {
    /// Structured JSON
    Api,
    /// Rendered HTML page
    Page,
}

impl AcceptKind {
    /// `Page` when any `Accept` entry names `text/html`, otherwise `Api`
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let accepts_html = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(|range| range.split(';').next())
            .any(|mime| mime.trim().eq_ignore_ascii_case("text/html"));

        if accepts_html {
            AcceptKind::Page
        } else {
            AcceptKind::Api
        }
    }
}

/// Transport-neutral request record handed to the pipeline
#[derive(Debug, Clone)]
pub struct RequestRecord {
    id: Uuid,
    path: String,
    method: Method,
    headers: HeaderMap,
    origin: RequestOrigin,
    handler: Option<String>,
    error: Option<ErrorAttributes>,
}

impl RequestRecord {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            method,
            headers: HeaderMap::new(),
            origin: RequestOrigin::ClientRequest,
            handler: None,
            error: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Record for an incoming HTTP request; the body is not captured
    pub fn from_http<B>(request: &Request<B>) -> Self {
        Self {
            headers: request.headers().clone(),
            ..Self::new(request.method().clone(), request.uri().path())
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn accepting(self, mime: &'static str) -> Self {
        self.with_header(header::ACCEPT, HeaderValue::from_static(mime))
    }

    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Name the handler that serves this request; handler-local fault
    /// handlers are matched against it.
    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn origin(&self) -> RequestOrigin {
        self.origin
    }

    pub fn handler(&self) -> Option<&str> {
        self.handler.as_deref()
    }

    pub fn error_attributes(&self) -> Option<&ErrorAttributes> {
        self.error.as_ref()
    }

    pub fn accept(&self) -> AcceptKind {
        AcceptKind::from_headers(&self.headers)
    }

    /// Synthetic error request for `route`.
    ///
    /// Keeps method and headers so content negotiation still sees what the
    /// client asked for; handler binding is dropped.
    pub fn replay(&self, route: impl Into<String>, attributes: ErrorAttributes) -> RequestRecord {
        RequestRecord {
            id: Uuid::new_v4(),
            path: route.into(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            origin: RequestOrigin::InternalErrorReplay,
            handler: None,
            error: Some(attributes),
        }
    }
}
