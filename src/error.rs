use thiserror::Error;

pub type Result<T> = std::result::Result<T, FaultlineError>;

/// Errors raised while assembling a pipeline.
///
/// Runtime faults flowing through a request never use this type; they are
/// [`Fault`](crate::fault::Fault) values.
#[derive(Debug, Error)]
pub enum FaultlineError {
    #[error("Invalid error page key: {key}")]
    InvalidRouteKey { key: String },

    #[error("Invalid error route '{path}': {message}")]
    InvalidRoutePath { path: String, message: String },

    #[error("Invalid fault type declaration {child} -> {parent}: {message}")]
    InvalidHierarchy {
        child: String,
        parent: String,
        message: String,
    },

    #[error("Invalid configuration for {key}: {message}")]
    Config { key: String, message: String },
}

impl FaultlineError {
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl axum::response::IntoResponse for FaultlineError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = %self, "pipeline assembly error reached a response");
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
        )
            .into_response()
    }
}
