//! Assembles one tile in memory and serializes it.
//!
//! Two entry points: a fresh builder for the initial tile build, and
//! `from_tile` for the validator, which rebuilds a tile around updated node
//! and directed-edge arrays while passing the blobs through untouched.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crc::{Crc, CRC_64_ECMA_182};

use super::directed_edge::{DirectedEdge, DIRECTED_EDGE_SIZE};
use super::edge_info::{EdgeInfo, EdgeInfoStore};
use super::header::{Admin, TileHeader, ADMIN_SIZE, TILE_HEADER_SIZE};
use super::names::UniqueNamePool;
use super::node_info::{NodeInfo, NODE_INFO_SIZE};
use super::reader::GraphTile;
use super::sign::{Sign, SIGN_SIZE};
use super::tile_path;
use crate::attributes::SignType;
use crate::geo::PointLL;
use crate::graph_id::GraphId;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

pub struct GraphTileBuilder {
    tile_base: GraphId,
    base_ll: PointLL,
    tile_size_deg: f32,
    nodes: Vec<NodeInfo>,
    directed_edges: Vec<DirectedEdge>,
    signs: Vec<Sign>,
    admins: Vec<Admin>,
    edge_infos: EdgeInfoStore,
    names: UniqueNamePool,
}

impl GraphTileBuilder {
    pub fn new(tile_base: GraphId, base_ll: PointLL, tile_size_deg: f32) -> GraphTileBuilder {
        GraphTileBuilder {
            tile_base,
            base_ll,
            tile_size_deg,
            nodes: Vec::new(),
            directed_edges: Vec::new(),
            signs: Vec::new(),
            // Admin index 0 is the empty admin.
            admins: vec![Admin::empty()],
            edge_infos: EdgeInfoStore::new(),
            names: UniqueNamePool::new(),
        }
    }

    /// Rebuild path for the validator: start from an existing tile's
    /// contents. Sign, admin, edge info, and name sections are carried over
    /// verbatim; nodes and directed edges become mutable.
    pub fn from_tile(tile: &GraphTile) -> GraphTileBuilder {
        let header = tile.header();
        GraphTileBuilder {
            tile_base: header.tile_base(),
            base_ll: PointLL::from_fxp(header.base_lat_fxp, header.base_lon_fxp),
            tile_size_deg: (header.tile_size_fxp as f64 / crate::geo::COORD_SCALE) as f32,
            nodes: (0..header.node_count).map(|i| tile.node(i)).collect(),
            directed_edges: (0..header.edge_count)
                .map(|i| tile.directed_edge(i))
                .collect(),
            signs: (0..header.sign_count).map(|i| tile.sign(i)).collect(),
            admins: (0..header.admin_count).map(|i| tile.admin(i)).collect(),
            edge_infos: EdgeInfoStore::from_blob(tile.edgeinfo_blob().to_vec()),
            names: UniqueNamePool::from_blob(tile.name_blob().to_vec()),
        }
    }

    pub fn tile_base(&self) -> GraphId {
        self.tile_base
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    pub fn directed_edge_count(&self) -> u32 {
        self.directed_edges.len() as u32
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [NodeInfo] {
        &mut self.nodes
    }

    pub fn directed_edges(&self) -> &[DirectedEdge] {
        &self.directed_edges
    }

    pub fn directed_edges_mut(&mut self) -> &mut [DirectedEdge] {
        &mut self.directed_edges
    }

    /// Append a node and its directed edges. The node's edge_index and
    /// edge_count must already reflect its position in this tile.
    pub fn add_node_and_edges(&mut self, node: NodeInfo, edges: Vec<DirectedEdge>) {
        debug_assert_eq!(node.edge_index as usize, self.directed_edges.len());
        debug_assert_eq!(node.edge_count() as usize, edges.len());
        self.nodes.push(node);
        self.directed_edges.extend(edges);
    }

    /// Intern an admin record, returning its index.
    pub fn add_admin(&mut self, iso: &str) -> u32 {
        let admin = Admin::new(iso);
        if let Some(idx) = self.admins.iter().position(|a| *a == admin) {
            return idx as u32;
        }
        self.admins.push(admin);
        (self.admins.len() - 1) as u32
    }

    pub fn admin(&self, index: u32) -> Admin {
        self.admins
            .get(index as usize)
            .copied()
            .unwrap_or_else(Admin::empty)
    }

    /// Add shared edge info, deduplicated, returning its blob offset.
    pub fn add_edge_info(
        &mut self,
        node_a: u64,
        node_b: u64,
        way_id: u64,
        shape: &[PointLL],
        names: &[&str],
    ) -> u32 {
        let name_offsets = names.iter().map(|n| self.names.add(n)).collect();
        let info = EdgeInfo {
            way_id,
            name_offsets,
            shape: shape.to_vec(),
        };
        self.edge_infos.add(node_a, node_b, &info)
    }

    pub fn edge_info(&self, offset: u32) -> Option<EdgeInfo> {
        EdgeInfo::decode(self.edge_infos.blob(), offset)
    }

    pub fn name(&self, offset: u32) -> Option<&str> {
        UniqueNamePool::decode(self.names.blob(), offset)
    }

    /// Add an exit sign for the directed edge at `edge_index`.
    pub fn add_sign(&mut self, edge_index: u32, sign_type: SignType, text: &str) {
        let text_offset = self.names.add(text);
        self.signs.push(Sign::new(edge_index, sign_type, text_offset));
    }

    pub fn sign_count(&self) -> u32 {
        self.signs.len() as u32
    }

    /// Serialize and atomically write the tile file. Returns bytes written.
    pub fn store(&mut self, tile_dir: &Path) -> Result<usize> {
        let bytes = self.serialize();

        let path = tile_path(tile_dir, self.tile_base.level(), self.tile_base.tile_id());
        let parent = path.parent().expect("tile path has a parent");
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let tmp = path.with_extension("gph.tmp");
        fs::write(&tmp, &bytes)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move tile into place at {}", path.display()))?;

        Ok(bytes.len())
    }

    fn serialize(&mut self) -> Vec<u8> {
        // Signs must be sorted by edge index for reader binary search.
        self.signs.sort_by_key(|s| s.edge_index());

        let nodes_offset = TILE_HEADER_SIZE;
        let edges_offset = nodes_offset + self.nodes.len() * NODE_INFO_SIZE;
        let signs_offset = edges_offset + self.directed_edges.len() * DIRECTED_EDGE_SIZE;
        let admins_offset = signs_offset + self.signs.len() * SIGN_SIZE;
        let edgeinfo_offset = admins_offset + self.admins.len() * ADMIN_SIZE;
        let names_offset = edgeinfo_offset + self.edge_infos.len_bytes();
        let total = names_offset + self.names.len_bytes();

        let (bbox_min_lat, bbox_min_lon, bbox_max_lat, bbox_max_lon) = self.node_bbox();
        let header = TileHeader {
            graph_id: self.tile_base.value(),
            node_count: self.nodes.len() as u32,
            edge_count: self.directed_edges.len() as u32,
            sign_count: self.signs.len() as u32,
            admin_count: self.admins.len() as u32,
            nodes_offset: nodes_offset as u32,
            edges_offset: edges_offset as u32,
            signs_offset: signs_offset as u32,
            admins_offset: admins_offset as u32,
            edgeinfo_offset: edgeinfo_offset as u32,
            names_offset: names_offset as u32,
            edgeinfo_size: self.edge_infos.len_bytes() as u32,
            names_size: self.names.len_bytes() as u32,
            base_lat_fxp: self.base_ll.lat_fxp(),
            base_lon_fxp: self.base_ll.lon_fxp(),
            bbox_min_lat,
            bbox_min_lon,
            bbox_max_lat,
            bbox_max_lon,
            tile_size_fxp: (self.tile_size_deg as f64 * crate::geo::COORD_SCALE).round() as u32,
        };

        let mut out = Vec::with_capacity(total + 16);
        out.extend_from_slice(&header.to_bytes());
        for node in &self.nodes {
            out.extend_from_slice(&node.to_bytes());
        }
        for edge in &self.directed_edges {
            out.extend_from_slice(&edge.to_bytes());
        }
        for sign in &self.signs {
            out.extend_from_slice(&sign.to_bytes());
        }
        for admin in &self.admins {
            out.extend_from_slice(&admin.to_bytes());
        }
        out.extend_from_slice(self.edge_infos.blob());
        out.extend_from_slice(self.names.blob());

        let body_crc = CRC64.checksum(&out[TILE_HEADER_SIZE..]);
        let file_crc = CRC64.checksum(&out);
        out.extend_from_slice(&body_crc.to_le_bytes());
        out.extend_from_slice(&file_crc.to_le_bytes());
        out
    }

    fn node_bbox(&self) -> (i32, i32, i32, i32) {
        if self.nodes.is_empty() {
            return (0, 0, 0, 0);
        }
        let mut min_lat = i32::MAX;
        let mut min_lon = i32::MAX;
        let mut max_lat = i32::MIN;
        let mut max_lon = i32::MIN;
        for n in &self.nodes {
            min_lat = min_lat.min(n.lat_fxp);
            min_lon = min_lon.min(n.lon_fxp);
            max_lat = max_lat.max(n.lat_fxp);
            max_lon = max_lon.max(n.lon_fxp);
        }
        (min_lat, min_lon, max_lat, max_lon)
    }
}
