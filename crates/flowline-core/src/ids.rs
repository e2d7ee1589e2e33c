use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::types::InstanceId;

/// Source of fresh node instance ids. Injected into the graph at construction.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> InstanceId;
}

/// Monotonic `node_{n}` ids. Never resets for the lifetime of the generator.
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("node")
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> InstanceId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        InstanceId(format!("{}_{}", self.prefix, n))
    }
}

/// Random v4 UUID ids.
#[derive(Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> InstanceId {
        InstanceId(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids_are_monotonic() {
        let ids = SequentialIds::default();
        assert_eq!(ids.next_id().0, "node_0");
        assert_eq!(ids.next_id().0, "node_1");
        assert_eq!(ids.next_id().0, "node_2");
    }

    #[test]
    fn test_uuid_ids_unique() {
        let ids = UuidIds;
        let seen: HashSet<_> = (0..100).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 100);
    }
}
