//! In-memory record for a road-network node.

use crate::attributes::NodeType;
use crate::geo::PointLL;
use crate::graph_id::GraphId;

/// A node referenced by at least one routable way. Mutated during edge
/// construction and tiling, read-only afterwards.
#[derive(Debug, Clone)]
pub struct OsmNode {
    pub latlng: PointLL,
    pub exit_to: bool,
    pub has_ref: bool,
    pub gate: bool,
    pub bollard: bool,
    pub modes_mask: u8,
    pub traffic_signal: bool,
    /// Indices into the global edge arena, sorted by the edge sorter.
    pub edges: Vec<u32>,
    graph_id: GraphId,
}

impl OsmNode {
    pub fn new(latlng: PointLL) -> OsmNode {
        OsmNode {
            latlng,
            exit_to: false,
            has_ref: false,
            gate: false,
            bollard: false,
            modes_mask: 0,
            traffic_signal: false,
            edges: Vec::new(),
            graph_id: GraphId::invalid(),
        }
    }

    pub fn add_edge(&mut self, edge_index: u32) {
        self.edges.push(edge_index);
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Assigned exactly once during tiling.
    pub fn set_graph_id(&mut self, id: GraphId) {
        debug_assert!(!self.graph_id.is_valid(), "graph id assigned twice");
        self.graph_id = id;
    }

    pub fn graph_id(&self) -> GraphId {
        self.graph_id
    }

    pub fn node_type(&self) -> NodeType {
        if self.gate {
            NodeType::Gate
        } else if self.bollard {
            NodeType::Bollard
        } else {
            NodeType::StreetIntersection
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_id_starts_invalid() {
        let node = OsmNode::new(PointLL::new(1.0, 2.0));
        assert!(!node.graph_id().is_valid());
    }

    #[test]
    fn test_node_type_from_barriers() {
        let mut node = OsmNode::new(PointLL::default());
        assert_eq!(node.node_type(), NodeType::StreetIntersection);
        node.bollard = true;
        assert_eq!(node.node_type(), NodeType::Bollard);
        node.gate = true;
        assert_eq!(node.node_type(), NodeType::Gate);
    }
}
