//! Tracks which consumer groups have been pushed into during this
//! process's lifetime. [`lightq_store::DurableStore`] has no "list
//! collections" primitive, so the scheduled-promoter loop in `main` can't
//! discover groups from the store the way it discovers due messages
//! within one; it instead sweeps whatever this registry has observed.

use std::sync::Arc;

use dashmap::DashSet;
use lightq_core::ConsumerGroup;

#[derive(Clone, Default)]
pub struct GroupRegistry {
    seen: Arc<DashSet<ConsumerGroup>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, group: &ConsumerGroup) {
        if !self.seen.contains(group) {
            self.seen.insert(group.clone());
        }
    }

    pub fn snapshot(&self) -> Vec<ConsumerGroup> {
        self.seen.iter().map(|g| g.clone()).collect()
    }
}
