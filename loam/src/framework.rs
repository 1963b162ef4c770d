use cfg_if::cfg_if;

use crate::clock::Tick;

cfg_if! {
    if #[cfg(feature = "serde")] {
        use serde::{Deserialize, Serialize};
    }
}

/// Mote identifier on the mesh, in `1..=ProtocolParams::total_nodes`.
/// The value 0 is reserved as the empty slot in wire-level arrays.
pub type NodeId = u8;

/// 802.15.4 channel the radio adapter is expected to tune to.
pub const RADIO_CHANNEL: u8 = 14;
/// Transmission power handed to the radio adapter.
pub const TX_POWER: u8 = 1;

pub trait MeshSystem {
    /// Battery gauge and sensor sampling collaborators of the node.
    type Instruments: Instruments;
    fn params() -> ProtocolParams {
        Default::default()
    }
}

/// The node's view of the hardware it does not own: the battery gauge that
/// doubles as the advertised link cost, and the ADC behind the leaf sensors.
pub trait Instruments: Default {
    /// Current battery reading, advertised in beacons and used as link cost.
    /// Higher is better.
    fn battery_value(&mut self) -> u16;
    /// Sample the sensor wired to the given leaf. The mapping from id to
    /// physical quantity is the platform's business; the core ships the raw
    /// value with `data_type = node id`.
    fn sensor_sample(&mut self, node: NodeId) -> u16;
}

/// Fixed-value instruments for tests and simulations.
pub struct FixedInstruments {
    pub battery: u16,
    pub sample: u16,
}

impl Default for FixedInstruments {
    fn default() -> Self {
        Self {
            battery: 3300,
            sample: 0,
        }
    }
}

impl Instruments for FixedInstruments {
    fn battery_value(&mut self) -> u16 {
        self.battery
    }

    fn sensor_sample(&mut self, _node: NodeId) -> u16 {
        self.sample
    }
}

/// Role is a pure function of the node id: the sink terminates data, odd ids
/// relay, even ids originate sensor readings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Sink,
    Bridge,
    Leaf,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolParams {
    /// Roster size N. Wire-level neighbour and path arrays are this long.
    pub total_nodes: u8,
    pub sink_id: NodeId,
    /// Beacon interval, seconds.
    pub keep_alive_period: Tick,
    /// Liveness window: a peer must beacon at least once per window.
    pub down_period: Tick,
    pub sensor_read_interval: Tick,
    /// One-shot delay before the bootstrap database pull.
    pub get_lsdb_period: Tick,
    /// Floor of the initial pre-backoff; jitter of `rand % 2N` is added.
    pub init_backoff_floor: Tick,
    pub ttl: u8,
    /// Beacons weaker than this are dropped before any state update.
    pub ignore_rssi_below: i16,
    pub runicast_max_retransmissions: u8,
    /// Lollipop wrap anchor: seqnos at or below this are always admitted.
    pub reset_sqn_no: u8,
    /// Send queue depth.
    pub buffer_size: usize,
    /// Peers remembered for reliable-unicast duplicate suppression.
    pub history_entries: usize,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            total_nodes: 13,
            sink_id: 1,
            keep_alive_period: 100,
            down_period: 200,
            sensor_read_interval: 105,
            get_lsdb_period: 2 * 13 + 5,
            init_backoff_floor: 10,
            ttl: 5,
            ignore_rssi_below: -70,
            runicast_max_retransmissions: 2,
            reset_sqn_no: 10,
            buffer_size: 15,
            history_entries: 2,
        }
    }
}

impl ProtocolParams {
    pub fn role_of(&self, id: NodeId) -> Role {
        if id == self.sink_id {
            Role::Sink
        } else if id % 2 == 0 {
            Role::Leaf
        } else {
            Role::Bridge
        }
    }

    /// Jitter window for pre-backoff deadlines, seconds.
    pub fn backoff_window(&self) -> u64 {
        self.total_nodes as u64 * 2
    }
}
