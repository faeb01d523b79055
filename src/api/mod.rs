//! HTTP surface of the development host.
//!
//! Exposes a mounted backend at `/v1/{mount}/...` the way a secrets host
//! would: reads map to `GET`, writes to `POST`/`PUT`.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::{build_router, ApiState};
pub use server::start_api_server;
