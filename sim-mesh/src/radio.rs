use std::collections::{HashMap, HashSet};

use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use loam::clock::Tick;
use loam::concepts::packet::RadioCommand;
use loam::framework::NodeId;
use loam::node::{Event, Node};

use crate::routing::FieldSystem;

/// The shared medium: who hears whom, per-sender reliable-unicast seqnos,
/// and a bit of RSSI noise. Frames between non-adjacent motes are lost; a
/// reliable unicast into the void times out back at the sender.
pub struct Ether {
    edges: HashSet<(NodeId, NodeId)>,
    seqnos: HashMap<NodeId, u8>,
    rng: SmallRng,
}

fn edge_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    (a.min(b), a.max(b))
}

fn node_mut(nodes: &mut [Node<FieldSystem>], id: NodeId) -> Option<&mut Node<FieldSystem>> {
    nodes.iter_mut().find(|n| n.id == id)
}

impl Ether {
    pub fn new(edges: &[(NodeId, NodeId)]) -> Self {
        Self {
            edges: edges.iter().map(|&(a, b)| edge_key(a, b)).collect(),
            seqnos: HashMap::new(),
            rng: SmallRng::seed_from_u64(0xE7),
        }
    }

    fn adjacent(&self, a: NodeId, b: NodeId) -> bool {
        self.edges.contains(&edge_key(a, b))
    }

    /// Carry every committed transmission, cascading until the air is quiet.
    pub fn deliver(&mut self, nodes: &mut [Node<FieldSystem>], now: Tick) {
        loop {
            let mut idle = true;
            for idx in 0..nodes.len() {
                let from = nodes[idx].id;
                let commands = nodes[idx].drain_outbound();
                for command in commands {
                    idle = false;
                    self.carry(nodes, from, command, now);
                }
            }
            if idle {
                break;
            }
        }
    }

    fn carry(&mut self, nodes: &mut [Node<FieldSystem>], from: NodeId, command: RadioCommand, now: Tick) {
        match command {
            RadioCommand::Broadcast { bytes } => {
                let listeners: Vec<NodeId> = nodes
                    .iter()
                    .map(|n| n.id)
                    .filter(|&id| id != from && self.adjacent(from, id))
                    .collect();
                trace!("broadcast from {from} reaches {listeners:?}");
                for to in listeners {
                    let rssi = -40 - self.rng.gen_range(0..20);
                    if let Some(node) = node_mut(nodes, to) {
                        node.step(
                            now,
                            Event::Broadcast {
                                from,
                                rssi,
                                bytes: &bytes,
                            },
                        );
                    }
                }
            }
            RadioCommand::Unicast { to, bytes } => {
                if !self.adjacent(from, to) {
                    debug!("unicast {from} -> {to} lost, not in range");
                    return;
                }
                if let Some(node) = node_mut(nodes, to) {
                    node.step(now, Event::Unicast { from, bytes: &bytes });
                }
            }
            RadioCommand::Runicast { to, bytes, .. } => {
                if !self.adjacent(from, to) {
                    debug!("runicast {from} -> {to} timed out");
                    if let Some(node) = node_mut(nodes, from) {
                        node.step(now, Event::RunicastTimedout { to });
                    }
                    return;
                }
                let seqno = {
                    let counter = self.seqnos.entry(from).or_insert(0);
                    *counter = counter.wrapping_add(1);
                    *counter
                };
                if let Some(node) = node_mut(nodes, to) {
                    node.step(
                        now,
                        Event::Runicast {
                            from,
                            seqno,
                            bytes: &bytes,
                        },
                    );
                }
                if let Some(node) = node_mut(nodes, from) {
                    node.step(
                        now,
                        Event::RunicastSent {
                            to,
                            retransmissions: 0,
                        },
                    );
                }
            }
        }
    }
}
