use std::collections::{HashMap, HashSet};

use loam::clock::Tick;
use loam::concepts::packet::RadioCommand;
use loam::feedback::MeshEvent;
use loam::framework::{FixedInstruments, MeshSystem, NodeId, ProtocolParams};
use loam::node::{Event, Node};

/// Test instantiation of the mesh: fixed instruments and timer periods
/// shrunk so scenarios converge in a few hundred simulated seconds. The
/// reference ratios are kept: beacons fit the down-window, the pre-backoff
/// window stays below the age-query deadline.
pub struct VirtualSystem;

impl MeshSystem for VirtualSystem {
    type Instruments = FixedInstruments;

    fn params() -> ProtocolParams {
        ProtocolParams {
            keep_alive_period: 20,
            down_period: 40,
            sensor_read_interval: 45,
            get_lsdb_period: 40,
            ..Default::default()
        }
    }
}

pub const DEFAULT_RSSI: i16 = -50;

/// A whole roster on a simulated radio with a simulated clock. Time advances
/// one second per step; every transmission is delivered within the second it
/// was committed, with reliable-unicast `sent` callbacks synthesized by the
/// radio.
pub struct VirtualMesh {
    pub nodes: Vec<Node<VirtualSystem>>,
    pub now: Tick,
    edges: HashSet<(NodeId, NodeId)>,
    rssi: HashMap<(NodeId, NodeId), i16>,
    link_seqnos: HashMap<NodeId, u8>,
    /// Every event any node emitted, tagged with the emitting node.
    pub events: Vec<(NodeId, MeshEvent)>,
    /// Every unicast frame the radio carried: (from, to, bytes).
    pub unicast_log: Vec<(NodeId, NodeId, Vec<u8>)>,
    /// Every reliable-unicast frame the radio carried: (from, to, bytes).
    pub runicast_log: Vec<(NodeId, NodeId, Vec<u8>)>,
}

fn edge_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    (a.min(b), a.max(b))
}

impl VirtualMesh {
    pub fn create(ids: &[NodeId], edges: &[(NodeId, NodeId)]) -> Self {
        let nodes = ids.iter().map(|&id| Node::new(id)).collect();
        Self {
            nodes,
            now: 0,
            edges: edges.iter().map(|&(a, b)| edge_key(a, b)).collect(),
            rssi: HashMap::new(),
            link_seqnos: HashMap::new(),
            events: Vec::new(),
            unicast_log: Vec::new(),
            runicast_log: Vec::new(),
        }
    }

    /// Power up another mote mid-run.
    pub fn add_node(&mut self, id: NodeId, edges: &[(NodeId, NodeId)]) {
        self.nodes.push(Node::boot_at(id, self.now));
        for &(a, b) in edges {
            self.edges.insert(edge_key(a, b));
        }
    }

    pub fn node(&self, id: NodeId) -> &Node<VirtualSystem> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .unwrap_or_else(|| panic!("no node {id}"))
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<VirtualSystem> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .unwrap_or_else(|| panic!("no node {id}"))
    }

    /// Radio silence both ways.
    pub fn disconnect(&mut self, a: NodeId, b: NodeId) {
        self.edges.remove(&edge_key(a, b));
    }

    pub fn set_rssi(&mut self, a: NodeId, b: NodeId, rssi: i16) {
        self.rssi.insert(edge_key(a, b), rssi);
    }

    fn adjacent(&self, a: NodeId, b: NodeId) -> bool {
        self.edges.contains(&edge_key(a, b))
    }

    fn rssi_between(&self, a: NodeId, b: NodeId) -> i16 {
        self.rssi
            .get(&edge_key(a, b))
            .copied()
            .unwrap_or(DEFAULT_RSSI)
    }

    pub fn advance(&mut self, secs: u64) {
        for _ in 0..secs {
            self.now += 1;
            for idx in 0..self.nodes.len() {
                self.nodes[idx].step(self.now, Event::Tick);
            }
            self.flush();
        }
    }

    /// Carry every committed transmission to its listeners, cascading until
    /// the radio goes quiet. Pre-backoff keeps flood cascades bounded: a
    /// re-flood enqueued now cannot transmit before a later tick.
    pub fn flush(&mut self) {
        loop {
            let mut idle = true;
            for idx in 0..self.nodes.len() {
                let from = self.nodes[idx].id;
                let commands = self.nodes[idx].drain_outbound();
                for command in commands {
                    idle = false;
                    self.carry(from, command);
                }
            }
            if idle {
                break;
            }
        }
        for node in &mut self.nodes {
            let id = node.id;
            for event in node.drain_events() {
                self.events.push((id, event));
            }
        }
    }

    fn carry(&mut self, from: NodeId, command: RadioCommand) {
        match command {
            RadioCommand::Broadcast { bytes } => {
                let listeners: Vec<NodeId> = self
                    .nodes
                    .iter()
                    .map(|n| n.id)
                    .filter(|&id| id != from && self.adjacent(from, id))
                    .collect();
                for to in listeners {
                    let rssi = self.rssi_between(from, to);
                    let now = self.now;
                    self.node_mut(to).step(
                        now,
                        Event::Broadcast {
                            from,
                            rssi,
                            bytes: &bytes,
                        },
                    );
                }
            }
            RadioCommand::Unicast { to, bytes } => {
                if self.adjacent(from, to) {
                    self.unicast_log.push((from, to, bytes.clone()));
                    let now = self.now;
                    self.node_mut(to)
                        .step(now, Event::Unicast { from, bytes: &bytes });
                }
            }
            RadioCommand::Runicast { to, bytes, .. } => {
                let now = self.now;
                if self.adjacent(from, to) {
                    let seqno = {
                        let counter = self.link_seqnos.entry(from).or_insert(0);
                        *counter = counter.wrapping_add(1);
                        *counter
                    };
                    self.runicast_log.push((from, to, bytes.clone()));
                    self.node_mut(to).step(
                        now,
                        Event::Runicast {
                            from,
                            seqno,
                            bytes: &bytes,
                        },
                    );
                    self.node_mut(from).step(
                        now,
                        Event::RunicastSent {
                            to,
                            retransmissions: 0,
                        },
                    );
                } else {
                    self.node_mut(from).step(now, Event::RunicastTimedout { to });
                }
            }
        }
    }

    pub fn has_event(&self, id: NodeId, event: &MeshEvent) -> bool {
        self.events.iter().any(|(at, ev)| *at == id && ev == event)
    }

    pub fn cost_at(&self, at: NodeId, src: NodeId, dst: NodeId) -> u16 {
        self.node(at).lsdb.cost(src, dst)
    }
}

/// Tick a stand-alone node until its initial pre-backoff elapses. Returns
/// the tick it booted at; commands emitted during boot are discarded.
pub fn boot_node(node: &mut Node<VirtualSystem>) -> Tick {
    let mut now = 0;
    while !node.booted() {
        now += 1;
        node.step(now, Event::Tick);
        assert!(now < 100, "node never booted");
    }
    node.drain_outbound();
    node.drain_events();
    now
}
