//! The tile store: in-tile record types, the tile builder, the binary
//! reader, and the shared read-through cache.

pub mod builder;
pub mod directed_edge;
pub mod edge_info;
pub mod header;
pub mod names;
pub mod node_info;
pub mod reader;
pub mod sign;

pub use builder::GraphTileBuilder;
pub use directed_edge::{DirectedEdge, DIRECTED_EDGE_SIZE, MAX_EDGE_LENGTH_M, NO_OPPOSING_EDGE};
pub use edge_info::{shape_hash, EdgeInfo, EdgeInfoStore};
pub use header::{Admin, TileHeader, ADMIN_SIZE, TILE_HEADER_SIZE, TILE_MAGIC, TILE_VERSION};
pub use names::UniqueNamePool;
pub use node_info::{NodeInfo, MAX_EDGES_PER_NODE, NODE_INFO_SIZE, NO_STOP_ID};
pub use reader::{GraphTile, TileCache};
pub use sign::{Sign, SIGN_SIZE};

use std::path::{Path, PathBuf};

/// Path of a tile file within the store: `{tile_dir}/{level}/{tile_id}.gph`.
pub fn tile_path(tile_dir: &Path, level: u8, tile_id: u32) -> PathBuf {
    tile_dir.join(level.to_string()).join(format!("{}.gph", tile_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_path_layout() {
        let p = tile_path(Path::new("/tiles"), 2, 756_425);
        assert_eq!(p, Path::new("/tiles/2/756425.gph"));
    }
}
