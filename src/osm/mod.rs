//! In-memory OSM element stores populated by the PBF ingest pass.

pub mod id_table;
pub mod node;
pub mod way;

pub use id_table::{OsmIdTable, MAX_OSM_NODE_ID};
pub use node::OsmNode;
pub use way::OsmWay;

use std::collections::HashMap;

/// Everything the graph builder needs from the PBF extract. Written
/// single-threaded by the ingest pass, read-only afterwards.
pub struct OsmData {
    /// Routable ways in parse order; edge records refer to ways by index.
    pub ways: Vec<OsmWay>,
    /// Road-network nodes keyed by OSM id. Only nodes referenced by a
    /// routable way are kept.
    pub nodes: HashMap<u64, OsmNode>,
    /// Every node id referenced by any routable way.
    pub shape: OsmIdTable,
    /// Node ids referenced by two or more ways, or way endpoints.
    pub intersection: OsmIdTable,
    /// Exit sign text keyed by node id (motorway junction exit_to).
    pub node_exit_to: HashMap<u64, String>,
    /// Exit number text keyed by node id (motorway junction ref).
    pub node_ref: HashMap<u64, String>,
    /// Expected number of graph edges, counted during the way pass.
    pub edge_count_estimate: usize,
    /// Number of ways that fell back to a classified default speed.
    pub speed_assignment_count: usize,
}

impl OsmData {
    pub fn new(max_osm_id: u64) -> OsmData {
        OsmData {
            ways: Vec::new(),
            nodes: HashMap::new(),
            shape: OsmIdTable::new(max_osm_id),
            intersection: OsmIdTable::new(max_osm_id),
            node_exit_to: HashMap::new(),
            node_ref: HashMap::new(),
            edge_count_estimate: 0,
            speed_assignment_count: 0,
        }
    }
}
