//! Tilesmith: offline OSM routing-graph tile builder.
//!
//! Pipeline:
//! - Ingest: two passes over the PBF extract; classify way tags, mark the
//!   node ids that matter, then keep only nodes referenced by routable ways
//! - Construct: split ways into edges at intersections
//! - Sort: order each node's incident edges by drivability and importance
//! - Tile: assign every graph node to a fixed-grid tile and a graph id
//! - Build: write one self-contained binary tile file per tile, in parallel
//! - Validate: re-open the store, resolve opposing edges across tile
//!   boundaries, mark country crossings, gather statistics, flag suspect
//!   one-ways, rewrite the tiles
//!
//! Tile files are the product: byte-identical across runs for the same
//! input, config, and classifier.

pub mod attributes;
pub mod builder;
pub mod classify;
pub mod config;
pub mod geo;
pub mod graph;
pub mod graph_id;
pub mod ingest;
pub mod osm;
pub mod pipeline;
pub mod tile;
pub mod validate;

#[cfg(test)]
pub mod test_util;

pub use attributes::{RoadClass, Use};
pub use config::Config;
pub use graph_id::GraphId;
pub use tile::{DirectedEdge, GraphTile, GraphTileBuilder, NodeInfo, TileCache};
