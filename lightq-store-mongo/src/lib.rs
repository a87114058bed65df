//! MongoDB-backed [`lightq_store::DurableStore`] implementation (component
//! C1). One physical collection per consumer group, named exactly the group
//! name, plus a DLQ sub-collection per group.

mod backend;
mod error;

pub use backend::MongoStore;
pub use error::classify;
