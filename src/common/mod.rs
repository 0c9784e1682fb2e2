pub mod pattern;
pub mod request;
pub mod response;

pub use pattern::PathPatterns;
pub use request::{AcceptKind, RequestRecord};
pub use response::{ErrorResult, TransportResponse};
