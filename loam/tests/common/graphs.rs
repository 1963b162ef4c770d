use loam::framework::NodeId;

use crate::common::virtual_mesh::VirtualMesh;

/// sink 1 — bridge 3 — bridge 5: only 3 is sink-adjacent, so the bridges
/// are allowed to link up with each other.
pub fn chain_sink_two_bridges() -> VirtualMesh {
    VirtualMesh::create(&[1, 3, 5], &[(1, 3), (3, 5)])
}

/// sink 1, bridges 3 and 5, all in range of each other: both bridges reach
/// the sink in one hop, so the direct bridge link is redundant.
pub fn triangle_around_sink() -> VirtualMesh {
    VirtualMesh::create(&[1, 3, 5], &[(1, 3), (1, 5), (3, 5)])
}

/// sink 1 — bridge 3 — leaf 8: the canonical one-relay data path.
pub fn leaf_behind_bridge() -> VirtualMesh {
    VirtualMesh::create(&[1, 3, 8], &[(1, 3), (3, 8)])
}

/// Six bridges in a ring, no sink anywhere in reach.
pub const RING: [NodeId; 6] = [3, 5, 7, 9, 11, 13];

pub fn bridge_ring() -> VirtualMesh {
    let edges: Vec<(NodeId, NodeId)> = RING
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, RING[(i + 1) % RING.len()]))
        .collect();
    VirtualMesh::create(&RING, &edges)
}
