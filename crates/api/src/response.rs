//! Response envelope for API handlers.
//!
//! Successful API responses use a `{ "data": ... }` envelope; errors use
//! `{ "error", "code" }` (see [`AppError`](crate::error::AppError)).

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
