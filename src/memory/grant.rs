//! # Grant table
//!
//! A pre-sized arena of grant slots. Slot search is first-empty; a
//! [`GrantId`] carries the slot index plus a generation so a stale id never
//! releases a grant that later reused the same slot.

use tokio::time::Instant;

use super::priority::{Operation, Priority};

/// One outstanding permission to run a memory-heavy operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// What the holder is doing.
    pub operation: Operation,
    /// Priority the grant was admitted at.
    pub priority: Priority,
    /// Caller's byte estimate.
    pub estimated_bytes: usize,
    /// Owner identifier (thread or module name).
    pub owner: String,
    /// When the grant was admitted.
    pub started: Instant,
}

/// Handle to a granted slot, returned by a successful request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantId {
    slot: usize,
    generation: u64,
}

impl GrantId {
    /// Slot index in the table.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

struct Slot {
    generation: u64,
    grant: Grant,
}

pub(crate) struct GrantTable {
    slots: Vec<Option<Slot>>,
    next_generation: u64,
}

impl GrantTable {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            next_generation: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub(crate) fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Stores `grant` in the first empty slot.
    pub(crate) fn insert(&mut self, grant: Grant) -> Option<GrantId> {
        let slot = self.slots.iter().position(Option::is_none)?;
        let generation = self.next_generation;
        self.next_generation += 1;
        self.slots[slot] = Some(Slot { generation, grant });
        Some(GrantId { slot, generation })
    }

    pub(crate) fn remove(&mut self, id: GrantId) -> Option<Grant> {
        let entry = self.slots.get_mut(id.slot)?;
        if entry.as_ref().is_some_and(|s| s.generation == id.generation) {
            entry.take().map(|s| s.grant)
        } else {
            None
        }
    }

    /// Removes the first grant matching `(operation, owner)`.
    pub(crate) fn remove_matching(&mut self, operation: Operation, owner: &str) -> Option<Grant> {
        let slot = self.slots.iter().position(|s| {
            s.as_ref()
                .is_some_and(|s| s.grant.operation == operation && s.grant.owner == owner)
        })?;
        self.slots[slot].take().map(|s| s.grant)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Grant> {
        self.slots.iter().flatten().map(|s| &s.grant)
    }

    pub(crate) fn outstanding_bytes(&self) -> usize {
        self.iter().map(|g| g.estimated_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(owner: &str, op: Operation) -> Grant {
        Grant {
            operation: op,
            priority: Priority::Normal,
            estimated_bytes: 100,
            owner: owner.to_string(),
            started: Instant::now(),
        }
    }

    #[tokio::test]
    async fn first_empty_slot_is_reused() {
        let mut table = GrantTable::with_capacity(3);
        let a = table.insert(grant("a", Operation::HttpRequest)).unwrap();
        let b = table.insert(grant("b", Operation::HttpRequest)).unwrap();
        assert_eq!((a.slot(), b.slot()), (0, 1));

        assert!(table.remove(a).is_some());
        let c = table.insert(grant("c", Operation::JsonParsing)).unwrap();
        assert_eq!(c.slot(), 0);
        assert_eq!(table.len(), 2);
        assert_eq!(table.outstanding_bytes(), 200);
    }

    #[tokio::test]
    async fn stale_id_does_not_release_new_grant() {
        let mut table = GrantTable::with_capacity(1);
        let old = table.insert(grant("a", Operation::HttpRequest)).unwrap();
        table.remove(old).unwrap();
        let _new = table.insert(grant("b", Operation::HttpRequest)).unwrap();

        assert!(table.remove(old).is_none());
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn full_table_rejects_insert() {
        let mut table = GrantTable::with_capacity(2);
        table.insert(grant("a", Operation::HttpRequest)).unwrap();
        table.insert(grant("b", Operation::HttpRequest)).unwrap();
        assert!(!table.has_free_slot());
        assert!(table.insert(grant("c", Operation::HttpRequest)).is_none());
    }

    #[tokio::test]
    async fn remove_matching_needs_operation_and_owner() {
        let mut table = GrantTable::with_capacity(4);
        table.insert(grant("weather", Operation::HttpRequest)).unwrap();
        table.insert(grant("weather", Operation::JsonParsing)).unwrap();

        assert!(table.remove_matching(Operation::DisplayUpdate, "weather").is_none());
        assert!(table.remove_matching(Operation::JsonParsing, "clock").is_none());
        let g = table.remove_matching(Operation::JsonParsing, "weather").unwrap();
        assert_eq!(g.operation, Operation::JsonParsing);
        assert_eq!(table.len(), 1);
    }
}
