//! Worldwide fixed-grid tiling and graph id assignment.

use std::collections::HashMap;

use crate::geo::{meters_per_lng_degree, PointLL, METERS_PER_DEGREE_LAT};
use crate::graph_id::GraphId;
use crate::osm::OsmData;

/// A fixed grid over ±90 latitude by ±180 longitude, indexed row-major from
/// the south-west corner (-180, -90).
#[derive(Debug, Clone, Copy)]
pub struct TileGrid {
    tile_size_deg: f32,
    n_cols: u32,
    n_rows: u32,
}

impl TileGrid {
    pub fn new(tile_size_deg: f32) -> TileGrid {
        let n_cols = (360.0 / tile_size_deg as f64).round() as u32;
        let n_rows = (180.0 / tile_size_deg as f64).round() as u32;
        TileGrid {
            tile_size_deg,
            n_cols,
            n_rows,
        }
    }

    pub fn tile_size_deg(&self) -> f32 {
        self.tile_size_deg
    }

    pub fn tile_count(&self) -> u32 {
        self.n_cols * self.n_rows
    }

    pub fn tile_id(&self, p: PointLL) -> u32 {
        let size = self.tile_size_deg as f64;
        let row = (((p.lat as f64 + 90.0) / size) as u32).min(self.n_rows - 1);
        let col = (((p.lon as f64 + 180.0) / size) as u32).min(self.n_cols - 1);
        row * self.n_cols + col
    }

    /// South-west corner of a tile in degrees.
    pub fn tile_base(&self, tile_id: u32) -> PointLL {
        let row = tile_id / self.n_cols;
        let col = tile_id % self.n_cols;
        PointLL::new(
            (row as f64 * self.tile_size_deg as f64 - 90.0) as f32,
            (col as f64 * self.tile_size_deg as f64 - 180.0) as f32,
        )
    }

    /// (min, max) corners of a tile in degrees.
    pub fn tile_bounds(&self, tile_id: u32) -> (PointLL, PointLL) {
        let base = self.tile_base(tile_id);
        (
            base,
            PointLL::new(
                base.lat + self.tile_size_deg,
                base.lon + self.tile_size_deg,
            ),
        )
    }

    /// Approximate tile area in square kilometers.
    pub fn tile_area_km2(&self, tile_id: u32) -> f64 {
        let (min, max) = self.tile_bounds(tile_id);
        let mid_lat = ((min.lat + max.lat) / 2.0) as f64;
        let dlat_km = (max.lat - min.lat) as f64 * METERS_PER_DEGREE_LAT / 1000.0;
        let dlng_km = (max.lon - min.lon) as f64 * meters_per_lng_degree(mid_lat) / 1000.0;
        dlat_km * dlng_km
    }
}

/// Assign every node with at least one edge to a tile at the given level and
/// give it its graph id. Returns the per-tile node lists, in assignment
/// order (which fixes each node's index within the tile).
pub fn tile_nodes(
    data: &mut OsmData,
    grid: &TileGrid,
    level: u8,
) -> HashMap<u32, Vec<u64>> {
    let mut tiled: HashMap<u32, Vec<u64>> = HashMap::new();

    // Iterate nodes in id order so tile contents are deterministic.
    let mut ids: Vec<u64> = data.nodes.keys().copied().collect();
    ids.sort_unstable();

    for osm_id in ids {
        let node = data.nodes.get_mut(&osm_id).expect("node present");
        if node.edge_count() == 0 {
            continue;
        }
        let tile_id = grid.tile_id(node.latlng);
        let tile = tiled.entry(tile_id).or_default();
        tile.push(osm_id);
        node.set_graph_id(GraphId::new(tile_id, level, (tile.len() - 1) as u32));
    }

    tiled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::construct_edges;
    use crate::osm::OsmWay;
    use crate::test_util::synthetic_data;

    #[test]
    fn test_row_major_from_southwest() {
        let grid = TileGrid::new(1.0);
        assert_eq!(grid.tile_id(PointLL::new(-89.5, -179.5)), 0);
        assert_eq!(grid.tile_id(PointLL::new(-89.5, -178.5)), 1);
        assert_eq!(grid.tile_id(PointLL::new(-88.5, -179.5)), 360);
        assert_eq!(grid.tile_count(), 360 * 180);
    }

    #[test]
    fn test_bounds_roundtrip() {
        let grid = TileGrid::new(0.25);
        let p = PointLL::new(52.123, 5.456);
        let id = grid.tile_id(p);
        let (min, max) = grid.tile_bounds(id);
        assert!(min.lat <= p.lat && p.lat < max.lat);
        assert!(min.lon <= p.lon && p.lon < max.lon);
    }

    #[test]
    fn test_edge_of_world_clamps() {
        let grid = TileGrid::new(1.0);
        let id = grid.tile_id(PointLL::new(90.0, 180.0));
        assert!(id < grid.tile_count());
    }

    #[test]
    fn test_area_positive() {
        let grid = TileGrid::new(0.25);
        let id = grid.tile_id(PointLL::new(52.0, 5.0));
        assert!(grid.tile_area_km2(id) > 0.0);
    }

    #[test]
    fn test_tile_nodes_assigns_graph_ids_once() {
        let way = crate::test_util::road(1, vec![10, 11], crate::attributes::RoadClass::Residential);
        let mut data = synthetic_data(vec![way]);
        construct_edges(&mut data).unwrap();

        let grid = TileGrid::new(0.25);
        let tiled = tile_nodes(&mut data, &grid, 2);

        let total: usize = tiled.values().map(|v| v.len()).sum();
        assert_eq!(total, 2);
        for (tile_id, nodes) in &tiled {
            for (i, osm_id) in nodes.iter().enumerate() {
                let gid = data.nodes[osm_id].graph_id();
                assert!(gid.is_valid());
                assert_eq!(gid.tile_id(), *tile_id);
                assert_eq!(gid.level(), 2);
                assert_eq!(gid.index(), i as u32);
            }
        }
    }

    #[test]
    fn test_edgeless_nodes_skipped() {
        let mut way = OsmWay::new(1, vec![10, 11, 12]);
        way.auto_forward = true;
        let mut data = synthetic_data(vec![way]);
        construct_edges(&mut data).unwrap();

        let grid = TileGrid::new(0.25);
        tile_nodes(&mut data, &grid, 2);
        // Interior node 11 has no edges, so no graph id.
        assert!(!data.nodes[&11].graph_id().is_valid());
    }
}
