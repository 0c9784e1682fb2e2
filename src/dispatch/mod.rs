//! Request origins and the dispatch gate
//!
//! When a fault escapes to the boundary the pipeline re-enters itself with a
//! synthetic request tagged [`RequestOrigin::InternalErrorReplay`]. Filters
//! that already ran for the client request (authentication, access logging)
//! consult the [`DispatchGate`] so they do not run a second time.

use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumIter};

/// Where a request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestOrigin {
    ClientRequest,
    InternalErrorReplay,
    InternalForward,
    InternalInclude,
    AsyncContinuation,
}

impl RequestOrigin {
    pub fn is_internal(&self) -> bool {
        !matches!(self, RequestOrigin::ClientRequest)
    }
}

/// Decides whether cross-cutting logic runs for a request origin
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchGate;

impl DispatchGate {
    pub fn new() -> Self {
        Self
    }

    /// `false` only for error replays.
    pub fn should_run_cross_cutting(&self, origin: RequestOrigin) -> bool {
        origin != RequestOrigin::InternalErrorReplay
    }
}

/// Origins a filter registration applies to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DispatchTypes {
    /// Follow the [`DispatchGate`]
    #[default]
    Gated,
    /// Run for exactly these origins, replays included if listed
    Only(Vec<RequestOrigin>),
}

impl DispatchTypes {
    pub fn only(origins: impl IntoIterator<Item = RequestOrigin>) -> Self {
        Self::Only(origins.into_iter().collect())
    }

    pub fn applies(&self, gate: &DispatchGate, origin: RequestOrigin) -> bool {
        match self {
            DispatchTypes::Gated => gate.should_run_cross_cutting(origin),
            DispatchTypes::Only(origins) => origins.contains(&origin),
        }
    }
}
