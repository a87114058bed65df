use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Bounded, access-time-expiring memoization of "have we already ensured
/// indexes for this group in this process". Global mutable
/// state here must be a bounded LRU with access-time expiry, never a
/// monotonically growing map.
///
/// Safe to share across request handlers: reads and writes go through
/// [`DashMap`]'s internal sharded locking.
pub struct IndexMemo {
    seen: DashMap<String, Instant>,
    max_groups: usize,
    ttl: Duration,
}

impl IndexMemo {
    /// Creates a memo bounded to `max_groups` entries, each expiring
    /// `ttl` after last being marked seen.
    pub fn new(max_groups: usize, ttl: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            max_groups: max_groups.max(1),
            ttl,
        }
    }

    /// Returns `true` if the caller must (re-)run `ensure_indexes` for
    /// `group` — i.e. it was never marked seen, or its entry expired.
    /// On a miss, marks the group as seen before returning, so concurrent
    /// callers racing this check will still all observe "needs ensure"
    /// until the first one's `ensure_indexes` call completes and calls
    /// [`IndexMemo::mark_seen`] is implicit here as a courtesy: a duplicate
    /// `ensure_indexes` round trip is harmless (the operation is
    /// idempotent), so we err on the side of a few extra calls rather than
    /// under-memoizing.
    pub fn needs_ensure(&self, group: &str) -> bool {
        let now = Instant::now();
        match self.seen.get(group) {
            Some(seen_at) if now.duration_since(*seen_at) < self.ttl => false,
            _ => {
                self.mark_seen(group);
                true
            }
        }
    }

    /// Records that `group` was just ensured, evicting the stalest entry
    /// first if this would push the memo over `max_groups`.
    pub fn mark_seen(&self, group: &str) {
        if !self.seen.contains_key(group) && self.seen.len() >= self.max_groups {
            self.evict_oldest();
        }
        self.seen.insert(group.to_string(), Instant::now());
    }

    fn evict_oldest(&self) {
        let oldest = self
            .seen
            .iter()
            .min_by_key(|entry| *entry.value())
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.seen.remove(&key);
        }
    }

    /// Number of groups currently memoized.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the memo is empty.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn first_call_needs_ensure_second_does_not() {
        let memo = IndexMemo::new(10, Duration::from_secs(60));
        assert!(memo.needs_ensure("g1"));
        assert!(!memo.needs_ensure("g1"));
    }

    #[test]
    fn expiry_requires_re_ensure() {
        let memo = IndexMemo::new(10, Duration::from_millis(20));
        assert!(memo.needs_ensure("g1"));
        sleep(Duration::from_millis(40));
        assert!(memo.needs_ensure("g1"));
    }

    #[test]
    fn bounded_size_evicts_oldest() {
        let memo = IndexMemo::new(2, Duration::from_secs(60));
        memo.mark_seen("a");
        sleep(Duration::from_millis(5));
        memo.mark_seen("b");
        sleep(Duration::from_millis(5));
        memo.mark_seen("c");
        assert_eq!(memo.len(), 2);
        assert!(memo.needs_ensure("a"));
    }
}
