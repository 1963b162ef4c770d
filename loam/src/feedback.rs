use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::framework::NodeId;

/// Recoverable conditions surfaced to the platform. None of these stop the
/// node; drain `Node::warnings` regularly.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum RoutingWarning {
    /// The outbound queue was full and an advertisement was dropped. The
    /// periodic beacon/down machinery will regenerate the lost state.
    #[error("send queue full, dropped advertisement {src} -> {dst}")]
    QueueFull { src: NodeId, dst: NodeId },
    /// A packet failed to decode and was dropped.
    #[error("malformed packet from {from} ({len} bytes)")]
    MalformedPacket { from: NodeId, len: usize },
}

/// Things the node tells the outside world. The `Display` form of each
/// variant is the exact serial-line record the visualization front-end
/// consumes, one event per line (data deliveries span two).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshEvent {
    NewLink { src: NodeId, dst: NodeId },
    LostLink { src: NodeId, dst: NodeId },
    /// A data packet terminated at the sink. `path` is the recorded route
    /// including the sink itself.
    DataDelivered {
        data_type: u8,
        data: u16,
        path: Vec<NodeId>,
    },
    /// Reply to a serial console command.
    ConsoleReply(String),
}

impl Display for MeshEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshEvent::NewLink { src, dst } => write!(f, "NewLink: {src} -> {dst}"),
            MeshEvent::LostLink { src, dst } => write!(f, "LostLink: {src} -> {dst}"),
            MeshEvent::DataDelivered {
                data_type,
                data,
                path,
            } => {
                writeln!(f, "DataType: {data_type} Data: {data}")?;
                write!(f, "PacketPath:")?;
                for (i, hop) in path.iter().enumerate() {
                    if i == 0 {
                        write!(f, " {hop}")?;
                    } else {
                        write!(f, " -> {hop}")?;
                    }
                }
                Ok(())
            }
            MeshEvent::ConsoleReply(text) => write!(f, "{text}"),
        }
    }
}
