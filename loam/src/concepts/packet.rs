use cfg_if::cfg_if;
use thiserror::Error;

use crate::concepts::neighbour::NeighbourSet;
use crate::framework::NodeId;

cfg_if! {
    if #[cfg(feature = "serde")] {
        use serde::{Deserialize, Serialize};
    }
}

/// Decoding failure at the radio boundary. The link is lossy by design, so
/// these are dropped, never propagated.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum WireError {
    #[error("packet truncated: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
}

/// The three Rime channels the stack opens. Packets carry no type tag on the
/// wire; the channel a frame arrives on decides how it is decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Broadcast,
    Unicast,
    Runicast,
}

impl Channel {
    pub fn rime_channel(self) -> u16 {
        match self {
            Channel::Broadcast => 129,
            Channel::Unicast => 146,
            Channel::Runicast => 144,
        }
    }
}

/// Link State Advertisement: one directed link, its cost, and the
/// originator's sequence number. Cost 0 advertises the link as down.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lsa {
    /// Set on LSDB-dump replies: the receiver applies the link directly and
    /// does not re-flood.
    pub reply_to_sync_req: bool,
    pub link_cost: u16,
    pub src: NodeId,
    pub dst: NodeId,
    pub seq_nr: u8,
}

impl Lsa {
    pub const WIRE_LEN: usize = 6;

    pub fn encode(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(Self::WIRE_LEN);
        b.push(self.reply_to_sync_req as u8);
        b.extend_from_slice(&self.link_cost.to_le_bytes());
        b.push(self.src);
        b.push(self.dst);
        b.push(self.seq_nr);
        b
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < Self::WIRE_LEN {
            return Err(WireError::Truncated {
                needed: Self::WIRE_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self {
            reply_to_sync_req: bytes[0] != 0,
            link_cost: u16::from_le_bytes([bytes[1], bytes[2]]),
            src: bytes[3],
            dst: bytes[4],
            seq_nr: bytes[5],
        })
    }
}

/// Keep-alive beacon: the sender's neighbour list and battery value. With
/// `get_lsdb_req` set it doubles as the bootstrap age query.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Beacon {
    pub get_lsdb_req: bool,
    pub neighbours: NeighbourSet,
    pub battery_value: u16,
}

impl Beacon {
    pub fn wire_len(n: usize) -> usize {
        1 + n + 2
    }

    pub fn encode(&self) -> Vec<u8> {
        let slots = self.neighbours.as_slots();
        let mut b = Vec::with_capacity(Self::wire_len(slots.len()));
        b.push(self.get_lsdb_req as u8);
        b.extend_from_slice(slots);
        b.extend_from_slice(&self.battery_value.to_le_bytes());
        b
    }

    pub fn decode(bytes: &[u8], n: usize) -> Result<Self, WireError> {
        let needed = Self::wire_len(n);
        if bytes.len() < needed {
            return Err(WireError::Truncated {
                needed,
                got: bytes.len(),
            });
        }
        Ok(Self {
            get_lsdb_req: bytes[0] != 0,
            neighbours: NeighbourSet::from_slots(&bytes[1..1 + n]),
            battery_value: u16::from_le_bytes([bytes[1 + n], bytes[2 + n]]),
        })
    }
}

/// Everything the unicast channel carries: sensor data in flight, LSDB age
/// replies, and LSDB dump requests, discriminated by `is_data` and
/// `request_lsdb`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataPacket {
    pub is_data: bool,
    pub data_type: u8,
    pub data: u16,
    pub ttl: u8,
    pub lsdb_age: u16,
    pub request_lsdb: bool,
    /// Hop trace, sentinel-0 slots like the neighbour array.
    pub path: Vec<NodeId>,
}

impl DataPacket {
    pub fn wire_len(n: usize) -> usize {
        8 + n
    }

    /// A fresh sensor reading at its originating leaf. The path is empty;
    /// the forwarding rule records the originator as the first hop.
    pub fn sensor(data_type: u8, data: u16, ttl: u8, n: usize) -> Self {
        Self {
            is_data: true,
            data_type,
            data,
            ttl,
            lsdb_age: 0,
            request_lsdb: false,
            path: vec![0; n],
        }
    }

    pub fn age_reply(age: u16, n: usize) -> Self {
        Self {
            is_data: false,
            data_type: 0,
            data: 0,
            ttl: 0,
            lsdb_age: age,
            request_lsdb: false,
            path: vec![0; n],
        }
    }

    pub fn lsdb_request(n: usize) -> Self {
        Self {
            is_data: false,
            data_type: 0,
            data: 0,
            ttl: 0,
            lsdb_age: 0,
            request_lsdb: true,
            path: vec![0; n],
        }
    }

    /// Record a hop in the first empty path slot. A full path is left as-is;
    /// TTL bounds the route length before the trace matters.
    pub fn record_hop(&mut self, id: NodeId) {
        if let Some(slot) = self.path.iter_mut().find(|s| **s == 0) {
            *slot = id;
        }
    }

    /// The recorded route so far, up to the first empty slot.
    pub fn hops(&self) -> &[NodeId] {
        let end = self.path.iter().position(|&s| s == 0).unwrap_or(self.path.len());
        &self.path[..end]
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(Self::wire_len(self.path.len()));
        b.push(self.is_data as u8);
        b.push(self.data_type);
        b.extend_from_slice(&self.data.to_le_bytes());
        b.push(self.ttl);
        b.extend_from_slice(&self.lsdb_age.to_le_bytes());
        b.push(self.request_lsdb as u8);
        b.extend_from_slice(&self.path);
        b
    }

    pub fn decode(bytes: &[u8], n: usize) -> Result<Self, WireError> {
        let needed = Self::wire_len(n);
        if bytes.len() < needed {
            return Err(WireError::Truncated {
                needed,
                got: bytes.len(),
            });
        }
        Ok(Self {
            is_data: bytes[0] != 0,
            data_type: bytes[1],
            data: u16::from_le_bytes([bytes[2], bytes[3]]),
            ttl: bytes[4],
            lsdb_age: u16::from_le_bytes([bytes[5], bytes[6]]),
            request_lsdb: bytes[7] != 0,
            path: bytes[8..8 + n].to_vec(),
        })
    }
}

/// A frame decoded at the radio boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Beacon(Beacon),
    Lsa(Lsa),
    Data(DataPacket),
}

impl Packet {
    pub fn decode(channel: Channel, bytes: &[u8], n: usize) -> Result<Self, WireError> {
        match channel {
            Channel::Broadcast => Beacon::decode(bytes, n).map(Packet::Beacon),
            Channel::Runicast => Lsa::decode(bytes).map(Packet::Lsa),
            Channel::Unicast => DataPacket::decode(bytes, n).map(Packet::Data),
        }
    }
}

/// A transmission the node asks its radio adapter to perform. Reliable
/// unicast must report completion back as a `RunicastSent` or
/// `RunicastTimedout` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RadioCommand {
    Broadcast {
        bytes: Vec<u8>,
    },
    Unicast {
        to: NodeId,
        bytes: Vec<u8>,
    },
    Runicast {
        to: NodeId,
        bytes: Vec<u8>,
        max_retx: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsa_wire_form_is_byte_packed_little_endian() {
        let lsa = Lsa {
            reply_to_sync_req: false,
            link_cost: 0x0201,
            src: 3,
            dst: 5,
            seq_nr: 42,
        };
        let bytes = lsa.encode();
        assert_eq!(bytes, vec![0, 0x01, 0x02, 3, 5, 42]);
        assert_eq!(Lsa::decode(&bytes).unwrap(), lsa);
    }

    #[test]
    fn truncated_frames_are_rejected() {
        assert!(matches!(
            Lsa::decode(&[1, 2, 3]),
            Err(WireError::Truncated { needed: 6, got: 3 })
        ));
        assert!(Beacon::decode(&[0; 10], 13).is_err());
        assert!(DataPacket::decode(&[0; 12], 13).is_err());
    }

    #[test]
    fn beacon_and_data_round_trip() {
        let mut neighbours = NeighbourSet::new(13);
        neighbours.insert(1);
        neighbours.insert(8);
        let beacon = Beacon {
            get_lsdb_req: true,
            neighbours,
            battery_value: 3300,
        };
        let decoded = Beacon::decode(&beacon.encode(), 13).unwrap();
        assert_eq!(decoded, beacon);

        let mut data = DataPacket::sensor(8, 777, 5, 13);
        data.record_hop(8);
        data.record_hop(3);
        let decoded = DataPacket::decode(&data.encode(), 13).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(decoded.hops(), &[8, 3]);
    }

    #[test]
    fn nonzero_flag_bytes_read_as_true() {
        let mut bytes = Lsa {
            reply_to_sync_req: false,
            link_cost: 10,
            src: 3,
            dst: 1,
            seq_nr: 11,
        }
        .encode();
        bytes[0] = 0xFF;
        assert!(Lsa::decode(&bytes).unwrap().reply_to_sync_req);
    }

    #[test]
    fn channel_discriminates_decoding() {
        let lsa = Lsa {
            reply_to_sync_req: false,
            link_cost: 7,
            src: 3,
            dst: 5,
            seq_nr: 12,
        };
        match Packet::decode(Channel::Runicast, &lsa.encode(), 13).unwrap() {
            Packet::Lsa(p) => assert_eq!(p, lsa),
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
