use cfg_if::cfg_if;

use crate::concepts::neighbour::NeighbourSet;
use crate::framework::NodeId;
use crate::seqno;

cfg_if! {
    if #[cfg(feature = "serde")] {
        use serde::{Deserialize, Serialize};
    }
}

/// Outcome of feeding an advertisement to the database.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The link was absent and is now live.
    NewLink,
    /// A live link took a newer advertisement from the circular seqno region.
    Refreshed,
    /// A live link took an advertisement from the linear prefix: the source
    /// rebooted or wrapped and its counter starts over.
    Rejuvenated,
    /// Sequence number not newer than the stored record; nothing changed.
    Stale,
}

/// The node's full view of the mesh: an N×N weighted directed-link matrix
/// plus the per-source sequence numbers and the liveness bookkeeping of the
/// current down-window. Pure state, no I/O. `age` counts mutations and is
/// what joining nodes compare when picking a sync peer.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct LinkStateDb {
    n: usize,
    reset_sqn: u8,
    /// Row-major cost matrix; 0 means absent, otherwise the battery value
    /// the source advertised when the link was last refreshed.
    cost: Vec<u16>,
    last_seq: Vec<u8>,
    /// Beacons (and other traffic) heard from each peer in the current
    /// down-window.
    ka_received: Vec<u8>,
    pub neighbours: NeighbourSet,
    age: u16,
}

impl LinkStateDb {
    pub fn new(n: usize, reset_sqn: u8) -> Self {
        Self {
            n,
            reset_sqn,
            cost: vec![0; n * n],
            last_seq: vec![reset_sqn; n],
            ka_received: vec![0; n],
            neighbours: NeighbourSet::new(n),
            age: 0,
        }
    }

    fn idx(&self, src: NodeId, dst: NodeId) -> usize {
        (src as usize - 1) * self.n + (dst as usize - 1)
    }

    pub fn in_roster(&self, id: NodeId) -> bool {
        id >= 1 && id as usize <= self.n
    }

    pub fn cost(&self, src: NodeId, dst: NodeId) -> u16 {
        self.cost[self.idx(src, dst)]
    }

    pub fn is_live(&self, src: NodeId, dst: NodeId) -> bool {
        self.cost(src, dst) > 0
    }

    pub fn lsdb_age(&self) -> u16 {
        self.age
    }

    /// Bootstrap: the advertised history starts over.
    pub fn reset_age(&mut self) {
        self.age = 0;
    }

    pub fn last_seq(&self, src: NodeId) -> u8 {
        self.last_seq[src as usize - 1]
    }

    pub fn newer(&self, seq: u8, src: NodeId) -> bool {
        seqno::newer_than(seq, self.last_seq(src), self.reset_sqn)
    }

    pub fn older(&self, seq: u8, src: NodeId) -> bool {
        seqno::older_than(seq, self.last_seq(src), self.reset_sqn)
    }

    pub fn ka(&self, id: NodeId) -> u8 {
        self.ka_received[id as usize - 1]
    }

    /// Any traffic from a peer counts as liveness, not just beacons.
    pub fn ka_bump(&mut self, id: NodeId) {
        let slot = &mut self.ka_received[id as usize - 1];
        *slot = slot.saturating_add(1);
    }

    /// End of a down-window: liveness evidence starts over.
    pub fn reset_liveness_window(&mut self) {
        self.ka_received.fill(0);
        self.neighbours.clear();
    }

    /// Feed a link-up advertisement. On a live link the lollipop comparator
    /// gates the update; on an absent link the cost is inserted outright
    /// (role vetting for self-originated links happens before this call).
    pub fn admit(&mut self, src: NodeId, dst: NodeId, cost: u16, seq_nr: u8) -> Admission {
        if self.is_live(src, dst) {
            if !self.newer(seq_nr, src) {
                return Admission::Stale;
            }
            let admission = if seq_nr <= self.reset_sqn {
                Admission::Rejuvenated
            } else {
                Admission::Refreshed
            };
            let slot = self.idx(src, dst);
            self.cost[slot] = cost;
            self.last_seq[src as usize - 1] = seq_nr;
            self.age += 1;
            admission
        } else {
            let slot = self.idx(src, dst);
            self.cost[slot] = cost;
            self.last_seq[src as usize - 1] = seq_nr;
            self.age += 1;
            Admission::NewLink
        }
    }

    /// Feed a link-down advertisement. Removal is bidirectional: both
    /// directions of the pair go down together. The reporter's record moves
    /// to `seq_nr` and the dead end's counter is put back to the reset
    /// value, so its first advertisements after a reboot are admitted.
    pub fn drop_link(&mut self, src: NodeId, dst: NodeId, seq_nr: u8) -> Admission {
        if !self.newer(seq_nr, src) {
            return Admission::Stale;
        }
        let admission = if seq_nr <= self.reset_sqn {
            Admission::Rejuvenated
        } else {
            Admission::Refreshed
        };
        for (a, b) in [(src, dst), (dst, src)] {
            let slot = self.idx(a, b);
            if self.cost[slot] > 0 {
                self.cost[slot] = 0;
                self.age += 1;
            }
        }
        self.last_seq[src as usize - 1] = seq_nr;
        self.last_seq[dst as usize - 1] = self.reset_sqn;
        admission
    }

    /// Refresh a live link's cost without touching sequence numbers, as
    /// beacons do. Returns whether anything changed.
    pub fn refresh_cost(&mut self, src: NodeId, dst: NodeId, cost: u16) -> bool {
        let slot = self.idx(src, dst);
        if self.cost[slot] == 0 || self.cost[slot] == cost || cost == 0 {
            return false;
        }
        self.cost[slot] = cost;
        self.age += 1;
        true
    }

    /// Apply one link of a peer's database dump. No seqno gate and no
    /// flooding; returns whether the link went from absent to live.
    pub fn insert_synced(&mut self, src: NodeId, dst: NodeId, cost: u16) -> bool {
        if cost == 0 {
            return false;
        }
        let slot = self.idx(src, dst);
        let was_absent = self.cost[slot] == 0;
        if self.cost[slot] != cost {
            self.cost[slot] = cost;
            self.age += 1;
        }
        was_absent
    }

    /// Greedy next hop for a sink-bound data packet:
    /// 1. the sink itself when directly linked,
    /// 2. else the best-cost neighbour that has a live link to the sink,
    /// 3. else the best-cost neighbour overall.
    /// `avoid` (the hop the packet came from) is never picked; ties go to
    /// the lowest id. Returns None when no candidate remains.
    pub fn next_hop_toward_sink(
        &self,
        self_id: NodeId,
        sink: NodeId,
        avoid: Option<NodeId>,
    ) -> Option<NodeId> {
        if self.is_live(self_id, sink) {
            return Some(sink);
        }
        let candidate = |want_sink_link: bool| -> Option<NodeId> {
            let mut best = 0u16;
            let mut pick = None;
            for i in 1..=self.n as NodeId {
                if i == self_id || Some(i) == avoid {
                    continue;
                }
                let c = self.cost(self_id, i);
                if c == 0 || (want_sink_link && !self.is_live(i, sink)) {
                    continue;
                }
                if c > best {
                    best = c;
                    pick = Some(i);
                }
            }
            pick
        };
        candidate(true).or_else(|| candidate(false))
    }

    /// Every live directed link, for console dumps.
    pub fn live_links(&self) -> impl Iterator<Item = (NodeId, NodeId, u16)> + '_ {
        (1..=self.n as NodeId).flat_map(move |src| {
            (1..=self.n as NodeId).filter_map(move |dst| {
                let c = self.cost(src, dst);
                (c > 0).then_some((src, dst, c))
            })
        })
    }

    /// The links shipped in a database dump: only those sourced by bridges
    /// or the sink. Leaf-sourced links are rebuilt from beacons, not synced.
    pub fn sync_dump(&self) -> impl Iterator<Item = (NodeId, NodeId, u16)> + '_ {
        self.live_links().filter(|(src, _, _)| src % 2 != 0)
    }
}
