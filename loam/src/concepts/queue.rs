use std::collections::VecDeque;

use cfg_if::cfg_if;

use crate::clock::Tick;
use crate::concepts::packet::Lsa;
use crate::framework::NodeId;

cfg_if! {
    if #[cfg(feature = "serde")] {
        use serde::{Deserialize, Serialize};
    }
}

/// A pending advertisement with its pre-backoff deadline and routing intent.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueEntry {
    pub packet: Lsa,
    /// Earliest tick at which this entry may hit the radio.
    pub deadline: Tick,
    /// false: originated here, flood to eligible neighbours.
    /// true: received, controlled flood excluding endpoints and sender.
    pub forward: bool,
    /// Unicast to `dst` only instead of flooding.
    pub is_sync_reply: bool,
    pub dst: NodeId,
    /// Link-layer peer the advertisement arrived from, excluded from the
    /// controlled flood. Not the advertised `packet.src`.
    pub sender: Option<NodeId>,
}

/// Fixed-capacity FIFO of outbound advertisements. Overflow hands the entry
/// back so the caller can log and drop it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct SendQueue {
    entries: VecDeque<QueueEntry>,
    capacity: usize,
}

impl SendQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn enqueue(&mut self, entry: QueueEntry) -> Result<(), QueueEntry> {
        if self.entries.len() >= self.capacity {
            return Err(entry);
        }
        self.entries.push_back(entry);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }
}
