//! Pre-tile graph construction: splitting ways into edges at intersections
//! and ordering each node's incident edges.

pub mod tiling;

use anyhow::{bail, Result};

use crate::attributes::RoadClass;
use crate::geo::PointLL;
use crate::osm::{OsmData, OsmWay};

/// Attributes copied from the way onto each of its edges.
#[derive(Debug, Clone, Copy)]
pub struct EdgeAttributes {
    pub driveable_forward: bool,
    pub driveable_reverse: bool,
    pub importance: RoadClass,
}

impl EdgeAttributes {
    fn from_way(way: &OsmWay) -> EdgeAttributes {
        EdgeAttributes {
            driveable_forward: way.auto_forward,
            driveable_reverse: way.auto_backward,
            importance: way.road_class,
        }
    }
}

/// An undirected road segment between two graph nodes, carrying its shape.
/// Two directed edges are derived from each during tile build.
#[derive(Debug, Clone)]
pub struct Edge {
    pub source: u64,
    pub target: u64,
    pub way_index: u32,
    pub shape: Vec<PointLL>,
    pub attrs: EdgeAttributes,
}

impl Edge {
    fn start(source: u64, way_index: u32, first: PointLL, way: &OsmWay) -> Edge {
        Edge {
            source,
            target: 0,
            way_index,
            shape: vec![first],
            attrs: EdgeAttributes::from_way(way),
        }
    }

    /// The node at the other end from `node`.
    pub fn opposite_end(&self, node: u64) -> u64 {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }
}

/// Walk every way in index order and split it into edges at intersection
/// nodes. Records each edge's index on both of its end nodes.
pub fn construct_edges(data: &mut OsmData) -> Result<Vec<Edge>> {
    let mut edges: Vec<Edge> = Vec::with_capacity(data.edge_count_estimate);

    for (way_index, way) in data.ways.iter().enumerate() {
        let way_index = way_index as u32;

        let first = way.refs[0];
        let node = match data.nodes.get_mut(&first) {
            Some(n) => n,
            None => bail!(
                "invariant violated: node {} referenced by way {} is missing",
                first,
                way.osm_id
            ),
        };
        let mut edge = Edge::start(first, way_index, node.latlng, way);
        node.add_edge(edges.len() as u32);

        for (i, &ref_id) in way.refs.iter().enumerate().skip(1) {
            let nd = match data.nodes.get_mut(&ref_id) {
                Some(n) => n,
                None => bail!(
                    "invariant violated: node {} referenced by way {} is missing",
                    ref_id,
                    way.osm_id
                ),
            };
            edge.shape.push(nd.latlng);

            // Intersections and the way's last node terminate the edge.
            if data.intersection.is_set(ref_id) {
                edge.target = ref_id;
                nd.add_edge(edges.len() as u32);
                let latlng = nd.latlng;
                edges.push(edge);

                if i < way.refs.len() - 1 {
                    edge = Edge::start(ref_id, way_index, latlng, way);
                    data.nodes
                        .get_mut(&ref_id)
                        .expect("node present above")
                        .add_edge(edges.len() as u32);
                } else {
                    edge = Edge::start(0, 0, PointLL::default(), way);
                }
            }
        }
    }

    eprintln!("  constructed {} edges", edges.len());
    Ok(edges)
}

/// Whether the edge is driveable when leaving `node` along it.
pub fn driveable_from(edge: &Edge, node: u64) -> bool {
    if edge.source == node {
        edge.attrs.driveable_forward
    } else {
        edge.attrs.driveable_reverse
    }
}

/// Sort each node's incident edges: driveable first, then by importance
/// (most important road class first). The sort is stable, so insertion
/// order breaks ties deterministically.
pub fn sort_edges_from_nodes(data: &mut OsmData, edges: &[Edge]) {
    for (&osm_id, node) in data.nodes.iter_mut() {
        node.edges.sort_by(|&a, &b| {
            let ea = &edges[a as usize];
            let eb = &edges[b as usize];
            let a_drive = driveable_from(ea, osm_id);
            let b_drive = driveable_from(eb, osm_id);
            b_drive
                .cmp(&a_drive)
                .then(ea.attrs.importance.cmp(&eb.attrs.importance))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::RoadClass;
    use crate::osm::OsmWay;
    use crate::test_util::synthetic_data;

    fn road(osm_id: u64, refs: Vec<u64>) -> OsmWay {
        crate::test_util::road(osm_id, refs, RoadClass::Residential)
    }

    #[test]
    fn test_single_way_one_edge() {
        let mut data = synthetic_data(vec![road(1, vec![10, 11, 12])]);
        let edges = construct_edges(&mut data).unwrap();
        // Node 11 is interior and not an intersection: a single edge.
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, 10);
        assert_eq!(edges[0].target, 12);
        assert_eq!(edges[0].shape.len(), 3);
        assert_eq!(data.nodes[&10].edges, vec![0]);
        assert_eq!(data.nodes[&12].edges, vec![0]);
        assert!(data.nodes[&11].edges.is_empty());
    }

    #[test]
    fn test_split_at_intersection() {
        // Two ways crossing at node 11.
        let mut data = synthetic_data(vec![
            road(1, vec![10, 11, 12]),
            road(2, vec![20, 11, 21]),
        ]);
        let edges = construct_edges(&mut data).unwrap();
        assert_eq!(edges.len(), 4);
        // The crossing node carries all four edges.
        assert_eq!(data.nodes[&11].edges.len(), 4);
        // Every edge endpoint is an intersection node.
        for e in &edges {
            assert!(data.intersection.is_set(e.source));
            assert!(data.intersection.is_set(e.target));
        }
    }

    #[test]
    fn test_edge_conservation() {
        // Segments across all edges must equal sum of (refs - 1) per way.
        let ways = vec![
            road(1, vec![10, 11, 12, 13]),
            road(2, vec![20, 12, 21]),
            road(3, vec![13, 22]),
        ];
        let expected: usize = ways.iter().map(|w| w.refs.len() - 1).sum();
        let mut data = synthetic_data(ways);
        let edges = construct_edges(&mut data).unwrap();
        let segments: usize = edges.iter().map(|e| e.shape.len() - 1).sum();
        assert_eq!(segments, expected);
    }

    #[test]
    fn test_interior_nodes_are_not_intersections() {
        let mut data = synthetic_data(vec![road(1, vec![10, 11, 12, 13, 14])]);
        let edges = construct_edges(&mut data).unwrap();
        for e in &edges {
            // Shape interior nodes must not be intersections.
            assert_eq!(e.shape.len(), 5);
        }
    }

    #[test]
    fn test_missing_node_aborts() {
        let mut data = synthetic_data(vec![road(1, vec![10, 11])]);
        data.nodes.remove(&11);
        assert!(construct_edges(&mut data).is_err());
    }

    #[test]
    fn test_sort_driveable_then_importance() {
        let mut motorway = road(1, vec![10, 11]);
        motorway.road_class = RoadClass::Motorway;
        let mut footpath = road(2, vec![10, 12]);
        footpath.road_class = RoadClass::Other;
        footpath.auto_forward = false;
        footpath.auto_backward = false;
        let residential = road(3, vec![10, 13]);

        let mut data = synthetic_data(vec![footpath, residential, motorway]);
        let edges = construct_edges(&mut data).unwrap();
        sort_edges_from_nodes(&mut data, &edges);

        let order = &data.nodes[&10].edges;
        // Motorway (driveable, importance 0) first, residential next,
        // footpath (not driveable) last.
        assert_eq!(edges[order[0] as usize].way_index, 2);
        assert_eq!(edges[order[1] as usize].way_index, 1);
        assert_eq!(edges[order[2] as usize].way_index, 0);
    }
}
