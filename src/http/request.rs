//! Request identification.
//!
//! # Responsibilities
//! - Stamp every inbound request with a UUID request id
//! - Propagate the id onto the response for correlation
//!
//! # Design Decisions
//! - The id is added as early as possible so every log line and the SSR
//!   forward carry it

use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer,
};

/// Header carrying the request id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer that stamps `x-request-id` with a fresh UUID when absent.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer that copies `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}
