//! HTTP API for the push-up counter.

mod error;
mod routes;

pub use error::ApiError;
pub use routes::{AppState, USER_HEADER, router};
