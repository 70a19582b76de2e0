//! Read side of the tile store: a parsed tile file and a bounded,
//! read-through cache shared by validator workers.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crc::{Crc, CRC_64_ECMA_182};

use super::directed_edge::{DirectedEdge, DIRECTED_EDGE_SIZE};
use super::edge_info::EdgeInfo;
use super::header::{Admin, TileHeader, ADMIN_SIZE, TILE_HEADER_SIZE};
use super::names::UniqueNamePool;
use super::node_info::{NodeInfo, NODE_INFO_SIZE};
use super::sign::{Sign, SIGN_SIZE};
use super::tile_path;
use crate::graph_id::GraphId;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);
const TILE_FOOTER_SIZE: usize = 16;

/// A tile file held in memory. Records are decoded on access; the two heavy
/// arrays are fixed width so access is O(1).
#[derive(Debug)]
pub struct GraphTile {
    header: TileHeader,
    bytes: Vec<u8>,
}

impl GraphTile {
    pub fn from_file(path: &Path) -> Result<GraphTile> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read tile {}", path.display()))?;
        GraphTile::from_bytes(bytes)
            .with_context(|| format!("failed to parse tile {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<GraphTile> {
        if bytes.len() < TILE_HEADER_SIZE + TILE_FOOTER_SIZE {
            bail!("tile file truncated: {} bytes", bytes.len());
        }
        let body_end = bytes.len() - TILE_FOOTER_SIZE;
        let stored_file_crc =
            u64::from_le_bytes(bytes[body_end + 8..body_end + 16].try_into().unwrap());
        let computed = CRC64.checksum(&bytes[..body_end]);
        if stored_file_crc != computed {
            bail!(
                "tile crc mismatch: stored {:016x}, computed {:016x}",
                stored_file_crc,
                computed
            );
        }
        let header = TileHeader::from_bytes(&bytes)?;
        Ok(GraphTile { header, bytes })
    }

    pub fn header(&self) -> &TileHeader {
        &self.header
    }

    pub fn tile_base(&self) -> GraphId {
        self.header.tile_base()
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn node(&self, index: u32) -> NodeInfo {
        debug_assert!(index < self.header.node_count);
        let at = self.header.nodes_offset as usize + index as usize * NODE_INFO_SIZE;
        NodeInfo::from_bytes(&self.bytes[at..at + NODE_INFO_SIZE])
    }

    pub fn directed_edge(&self, index: u32) -> DirectedEdge {
        debug_assert!(index < self.header.edge_count);
        let at = self.header.edges_offset as usize + index as usize * DIRECTED_EDGE_SIZE;
        DirectedEdge::from_bytes(&self.bytes[at..at + DIRECTED_EDGE_SIZE])
    }

    pub fn sign(&self, index: u32) -> Sign {
        debug_assert!(index < self.header.sign_count);
        let at = self.header.signs_offset as usize + index as usize * SIGN_SIZE;
        Sign::from_bytes(&self.bytes[at..at + SIGN_SIZE])
    }

    /// All signs attached to a directed edge, by binary search.
    pub fn signs_for_edge(&self, edge_index: u32) -> Vec<Sign> {
        let count = self.header.sign_count;
        let mut lo = 0u32;
        let mut hi = count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.sign(mid).edge_index() < edge_index {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let mut signs = Vec::new();
        while lo < count && self.sign(lo).edge_index() == edge_index {
            signs.push(self.sign(lo));
            lo += 1;
        }
        signs
    }

    pub fn admin(&self, index: u32) -> Admin {
        if index >= self.header.admin_count {
            return Admin::empty();
        }
        let at = self.header.admins_offset as usize + index as usize * ADMIN_SIZE;
        Admin::from_bytes(&self.bytes[at..at + ADMIN_SIZE])
    }

    pub fn edgeinfo_blob(&self) -> &[u8] {
        let start = self.header.edgeinfo_offset as usize;
        &self.bytes[start..start + self.header.edgeinfo_size as usize]
    }

    pub fn name_blob(&self) -> &[u8] {
        let start = self.header.names_offset as usize;
        &self.bytes[start..start + self.header.names_size as usize]
    }

    pub fn edge_info(&self, offset: u32) -> Option<EdgeInfo> {
        EdgeInfo::decode(self.edgeinfo_blob(), offset)
    }

    pub fn name(&self, offset: u32) -> Option<&str> {
        UniqueNamePool::decode(self.name_blob(), offset)
    }
}

/// Default cache bound: enough for a country extract's working set.
pub const DEFAULT_CACHE_BYTES: usize = 256 * 1024 * 1024;

/// Read-through tile cache with a byte bound. The validator shares one
/// instance across workers behind a mutex; `over_committed` plus `clear`
/// keeps the working set bounded.
pub struct TileCache {
    tile_dir: PathBuf,
    max_bytes: usize,
    total_bytes: usize,
    tiles: HashMap<u64, Arc<GraphTile>>,
}

impl TileCache {
    pub fn new(tile_dir: &Path, max_bytes: usize) -> TileCache {
        TileCache {
            tile_dir: tile_dir.to_path_buf(),
            max_bytes,
            total_bytes: 0,
            tiles: HashMap::new(),
        }
    }

    /// Fetch the tile containing `id`, loading it from disk on a miss.
    pub fn get(&mut self, id: GraphId) -> Result<Arc<GraphTile>> {
        let base = id.tile_base();
        if let Some(tile) = self.tiles.get(&base.value()) {
            return Ok(Arc::clone(tile));
        }
        let path = tile_path(&self.tile_dir, base.level(), base.tile_id());
        let tile = Arc::new(GraphTile::from_file(&path)?);
        self.total_bytes += tile.size_bytes();
        self.tiles.insert(base.value(), Arc::clone(&tile));
        Ok(tile)
    }

    pub fn tile_exists(&self, id: GraphId) -> bool {
        let base = id.tile_base();
        self.tiles.contains_key(&base.value())
            || tile_path(&self.tile_dir, base.level(), base.tile_id()).exists()
    }

    /// Drop a tile so the next `get` rereads it from disk.
    pub fn evict(&mut self, id: GraphId) {
        if let Some(tile) = self.tiles.remove(&id.tile_base().value()) {
            self.total_bytes -= tile.size_bytes();
        }
    }

    pub fn over_committed(&self) -> bool {
        self.total_bytes > self.max_bytes
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
        self.total_bytes = 0;
    }
}
