//! Durable-store trait (component C1 of the LightQ engine): per-group
//! document collections with atomic find-and-modify, index management, and
//! a DLQ sub-collection. Concrete backends (MongoDB, in-memory) live in
//! sibling crates and implement [`DurableStore`].

pub mod backend;
pub mod error;
pub mod index;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod query;

pub use backend::{DurableStore, StoreResult};
pub use error::StoreError;
pub use index::IndexMemo;
pub use query::{Filter, Sort, Update};
