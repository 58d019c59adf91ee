//! HTTP surface for the report pipeline.
//!
//! Routes are nested under `/api/`. The router is composable:
//! `report_api_router()` returns a `Router` that can be mounted on any
//! axum server instance.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::report_api_router;
pub use server::{start_api_server, ApiServer, ApiSession};
pub use types::ApiContext;
