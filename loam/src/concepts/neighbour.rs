use cfg_if::cfg_if;

use crate::framework::NodeId;

cfg_if! {
    if #[cfg(feature = "serde")] {
        use serde::{Deserialize, Serialize};
    }
}

/// Set of live neighbour ids, stored in the wire encoding the beacons carry:
/// a length-N array where slot `i` holds `i + 1` when that node is a
/// neighbour and 0 when the slot is empty.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighbourSet {
    slots: Vec<NodeId>,
}

impl NeighbourSet {
    pub fn new(n: usize) -> Self {
        Self { slots: vec![0; n] }
    }

    /// Ids outside `1..=N` are ignored.
    pub fn insert(&mut self, id: NodeId) {
        let idx = id as usize;
        if idx >= 1 && idx <= self.slots.len() {
            self.slots[idx - 1] = id;
        }
    }

    pub fn remove(&mut self, id: NodeId) {
        let idx = id as usize;
        if idx >= 1 && idx <= self.slots.len() {
            self.slots[idx - 1] = 0;
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        let idx = id as usize;
        idx >= 1 && idx <= self.slots.len() && self.slots[idx - 1] == id
    }

    pub fn clear(&mut self) {
        self.slots.fill(0);
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().copied().filter(|&id| id != 0)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|&id| id == 0)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The sentinel-valued wire form.
    pub fn as_slots(&self) -> &[NodeId] {
        &self.slots
    }

    /// Rebuild from a received wire array, dropping slots that do not hold
    /// their own id.
    pub fn from_slots(slots: &[u8]) -> Self {
        let mut set = Self::new(slots.len());
        for &id in slots {
            set.insert(id);
        }
        set
    }
}
