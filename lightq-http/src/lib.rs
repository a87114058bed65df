//! HTTP adapter for the LightQ message queue. Translates the
//! `/queue/*` route table onto [`lightq_engine::Engine`] calls; carries no
//! queueing logic of its own. Authentication, role checks, and rate
//! limiting are external collaborators expected to run ahead of this
//! router in the real deployment.

pub mod context;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod routes;

pub use error::ApiError;
pub use handlers::AppState;
pub use registry::GroupRegistry;
pub use routes::router;
