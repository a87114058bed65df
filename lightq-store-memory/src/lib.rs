//! In-process [`DurableStore`](lightq_store::DurableStore) backend.
//!
//! Not persistent across restarts — intended for unit/integration tests
//! and for running LightQ as a single-node development server without a
//! MongoDB deployment. Mirrors the atomic CAS semantics the durable store requires
//! by guarding each group's collection with a single async mutex, which is
//! sufficient since there is no network round trip to race against.

mod backend;

pub use backend::MemoryStore;
