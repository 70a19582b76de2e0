//! Graph validation: a parallel post-pass over the written tile store.
//!
//! Workers pull disjoint ranges of a shuffled tile queue. For every
//! directed edge they resolve the opposing edge index across tile
//! boundaries, mark country crossings from the admin table, gather
//! statistics, flag suspicious one-ways, and rewrite the tile atomically.
//! The only shared mutable state is a mutex-guarded read-through tile
//! cache.

pub mod stats;
pub mod suspects;

pub use stats::{AreaStats, ValidatorStats};
pub use suspects::SuspectList;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Mutex;

use crate::attributes::access;
use crate::graph::tiling::TileGrid;
use crate::graph_id::GraphId;
use crate::tile::{
    tile_path, DirectedEdge, GraphTile, GraphTileBuilder, NodeInfo, TileCache,
    NO_OPPOSING_EDGE,
};

pub struct ValidationOutcome {
    pub stats: ValidatorStats,
    pub suspects: SuspectList,
}

/// Validate every tile at `level` in the store.
pub fn validate_tiles(
    tile_dir: &Path,
    level: u8,
    grid: &TileGrid,
    concurrency: usize,
    cache_bytes: usize,
) -> Result<ValidationOutcome> {
    let mut tile_ids = list_tiles(tile_dir, level)?;
    if tile_ids.is_empty() {
        eprintln!("no tiles found at level {} under {}", level, tile_dir.display());
        return Ok(ValidationOutcome {
            stats: ValidatorStats::default(),
            suspects: SuspectList::new(),
        });
    }
    tile_ids.shuffle(&mut rand::thread_rng());

    let workers = concurrency.max(1).min(tile_ids.len());
    let chunk = tile_ids.len().div_ceil(workers);
    let cache = Mutex::new(TileCache::new(tile_dir, cache_bytes));

    let pb = ProgressBar::new(tile_ids.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} tiles")
            .expect("progress template is valid")
            .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("failed to build validation thread pool")?;

    let outcome = pool.install(|| {
        tile_ids
            .par_chunks(chunk.max(1))
            .map(|range| {
                let mut stats = ValidatorStats::default();
                let mut suspects = SuspectList::new();
                for &tile_id in range {
                    validate_tile(
                        tile_dir,
                        level,
                        tile_id,
                        grid,
                        &cache,
                        &mut stats,
                        &mut suspects,
                    )
                    .with_context(|| format!("failed to validate tile {}", tile_id))?;
                    pb.inc(1);
                }
                Ok::<(ValidatorStats, SuspectList), anyhow::Error>((stats, suspects))
            })
            .try_reduce(
                || (ValidatorStats::default(), SuspectList::new()),
                |mut a, b| {
                    a.0.merge(b.0);
                    a.1.merge(b.1);
                    Ok(a)
                },
            )
    })?;

    pb.finish_and_clear();
    Ok(ValidationOutcome {
        stats: outcome.0,
        suspects: outcome.1,
    })
}

/// Tile ids present on disk for a level, from the file names.
fn list_tiles(tile_dir: &Path, level: u8) -> Result<Vec<u32>> {
    let dir = tile_dir.join(level.to_string());
    let mut ids = Vec::new();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(ids),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map(|e| e == "gph") != Some(true) {
            continue;
        }
        if let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u32>().ok())
        {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

fn validate_tile(
    tile_dir: &Path,
    level: u8,
    tile_id: u32,
    grid: &TileGrid,
    cache: &Mutex<TileCache>,
    stats: &mut ValidatorStats,
    suspects: &mut SuspectList,
) -> Result<()> {
    let path = tile_path(tile_dir, level, tile_id);
    let tile = GraphTile::from_file(&path)?;
    let mut builder = GraphTileBuilder::from_tile(&tile);
    let tile_base = builder.tile_base();

    let mut road_length_m = 0.0f64;
    for node_index in 0..builder.node_count() {
        let node = builder.nodes()[node_index as usize];
        let node_gid = tile_base.with_index(node_index);
        let begin_iso = builder.admin(node.admin_index()).iso().to_string();

        for j in 0..node.edge_count() {
            let edge_index = node.edge_index + j;
            let mut de = builder.directed_edges()[edge_index as usize];

            // Resolve the opposing edge through the shared cache and read
            // the end node's country at the same time.
            let end = de.end_node();
            let mut end_iso = String::new();
            match fetch_tile(cache, end) {
                Ok(end_tile) => {
                    let end_node = end_tile.node(end.index());
                    end_iso = end_tile.admin(end_node.admin_index()).iso().to_string();
                    let (opp, dups) = opposing_edge_index(&end_tile, &end_node, node_gid, &de);
                    stats.duplicate_opposing += dups;
                    match opp {
                        Some(k) => de.set_opp_local_idx(k),
                        None => {
                            de.set_opp_local_idx(NO_OPPOSING_EDGE);
                            if !de.use_().is_transit() {
                                stats.missing_opposing += 1;
                                eprintln!(
                                    "no opposing edge: start {} end {} length {}",
                                    node_gid,
                                    end,
                                    de.length_m()
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    de.set_opp_local_idx(NO_OPPOSING_EDGE);
                    stats.missing_opposing += 1;
                    eprintln!("failed to open end tile for {}: {:#}", end, e);
                }
            }

            if !begin_iso.is_empty() && !end_iso.is_empty() && begin_iso != end_iso {
                de.set_country_crossing(true);
            }

            collect_edge_stats(
                &builder,
                &node,
                node_gid,
                &de,
                j,
                tile_id,
                &begin_iso,
                cache,
                stats,
                suspects,
                &mut road_length_m,
            );

            builder.directed_edges_mut()[edge_index as usize] = de;
        }
    }

    // Density: half the road kilometers per square kilometer of tile.
    let area_km2 = grid.tile_area_km2(tile_id);
    if area_km2 > 0.0 {
        stats.add_density((road_length_m * 0.0005) / area_km2);
        stats.tile_areas_km2.insert(tile_id, area_km2);
    }

    builder.store(tile_dir)?;

    // Keep the shared cache bounded.
    {
        let mut cache = cache.lock().expect("tile cache mutex poisoned");
        if cache.over_committed() {
            cache.clear();
        }
    }

    Ok(())
}

fn fetch_tile(
    cache: &Mutex<TileCache>,
    id: GraphId,
) -> Result<std::sync::Arc<GraphTile>> {
    let mut cache = cache.lock().expect("tile cache mutex poisoned");
    cache.get(id)
}

/// Same matching rule as the tile build: end node, shortcut flag, and
/// quantized length all equal. Returns the lowest matching local index and
/// the number of extra matches.
fn opposing_edge_index(
    end_tile: &GraphTile,
    end_node: &NodeInfo,
    start: GraphId,
    de: &DirectedEdge,
) -> (Option<u32>, u64) {
    let mut found = None;
    let mut duplicates = 0;
    for k in 0..end_node.edge_count() {
        let cand = end_tile.directed_edge(end_node.edge_index + k);
        if cand.end_node() == start
            && cand.shortcut() == de.shortcut()
            && cand.length_m() == de.length_m()
        {
            if found.is_none() {
                found = Some(k);
            } else {
                duplicates += 1;
            }
        }
    }
    (found, duplicates)
}

fn has_auto(mask: u16) -> bool {
    mask & access::AUTO != 0
}

/// True one-way: auto access in exactly one direction.
fn is_one_way(de: &DirectedEdge) -> bool {
    has_auto(de.access_forward()) != has_auto(de.access_reverse())
}

#[allow(clippy::too_many_arguments)]
fn collect_edge_stats(
    builder: &GraphTileBuilder,
    node: &NodeInfo,
    node_gid: GraphId,
    de: &DirectedEdge,
    local_idx: u32,
    tile_id: u32,
    begin_iso: &str,
    cache: &Mutex<TileCache>,
    stats: &mut ValidatorStats,
    suspects: &mut SuspectList,
    road_length_m: &mut f64,
) {
    // Shortcuts and transition edges carry no new road length.
    if de.shortcut() || de.trans_up() || de.trans_down() {
        return;
    }
    *road_length_m += de.length_m() as f64;

    if de.link() {
        return;
    }

    let rclass = de.classification() as usize;
    // Each road is seen from both of its directed edges; in-tile edges are
    // halved, cross-tile edges quartered (each tile sees the pair twice).
    let divisor = if de.end_node().tile_base() == node_gid.tile_base() {
        2.0
    } else {
        4.0
    };
    let length_km = de.length_m() as f64 / 1000.0 / divisor;

    if is_one_way(de) {
        flag_suspect_one_way(builder, node, node_gid, de, local_idx, cache, suspects);
        stats.tile(tile_id).one_way_km[rclass] += length_km;
        if !begin_iso.is_empty() {
            stats.country(begin_iso).one_way_km[rclass] += length_km;
        }
    }
    if de.internal() {
        stats.tile(tile_id).internal_edges[rclass] += 1;
        if !begin_iso.is_empty() {
            stats.country(begin_iso).internal_edges[rclass] += 1;
        }
    }
    if de.speed_type() == crate::attributes::SpeedType::Tagged {
        stats.tile(tile_id).speed_tagged_km[rclass] += length_km;
        if !begin_iso.is_empty() {
            stats.country(begin_iso).speed_tagged_km[rclass] += length_km;
        }
    }
    if de.truck_route() {
        stats.tile(tile_id).truck_route_km[rclass] += length_km;
        if !begin_iso.is_empty() {
            stats.country(begin_iso).truck_route_km[rclass] += length_km;
        }
    }
    let named = builder
        .edge_info(de.edgeinfo_offset())
        .map(|info| !info.name_offsets.is_empty())
        .unwrap_or(false);
    if named {
        stats.tile(tile_id).named_km[rclass] += length_km;
        if !begin_iso.is_empty() {
            stats.country(begin_iso).named_km[rclass] += length_km;
        }
    }
    stats.tile(tile_id).road_length_km[rclass] += length_km;
    if !begin_iso.is_empty() {
        stats.country(begin_iso).road_length_km[rclass] += length_km;
    }
}

/// Classify a one-way edge with the three dead-end heuristics and record a
/// review task when one matches.
fn flag_suspect_one_way(
    builder: &GraphTileBuilder,
    node: &NodeInfo,
    node_gid: GraphId,
    de: &DirectedEdge,
    local_idx: u32,
    cache: &Mutex<TileCache>,
    suspects: &mut SuspectList,
) {
    let mut found = is_pedestrian_terminal(builder, node, local_idx);

    if !found && de.end_node() == node_gid {
        found = is_loop_terminal(builder, node);
    }

    if !found && de.end_node() != node_gid {
        found = is_reversed_one_way(builder, node, de, cache);
    }

    if found {
        if let Some(info) = builder.edge_info(de.edgeinfo_offset()) {
            suspects.add_task(info.way_id, node.latlng(), info.shape);
        }
    }
}

/// All edges at the node other than the flagged one are pedestrian-only.
fn is_pedestrian_terminal(
    builder: &GraphTileBuilder,
    node: &NodeInfo,
    skip_idx: u32,
) -> bool {
    if node.edge_count() <= 1 {
        return false;
    }
    for k in 0..node.edge_count() {
        if k == skip_idx {
            continue;
        }
        let other = builder.directed_edges()[(node.edge_index + k) as usize];
        let pedestrian = (other.access_forward() | other.access_reverse()) & access::PEDESTRIAN != 0;
        let auto = has_auto(other.access_forward()) || has_auto(other.access_reverse());
        if !(pedestrian && !auto) {
            return false;
        }
    }
    true
}

fn in_out_counts(builder: &GraphTileBuilder, node: &NodeInfo) -> (u32, u32) {
    let mut inbound = 0;
    let mut outbound = 0;
    for k in 0..node.edge_count() {
        let e = builder.directed_edges()[(node.edge_index + k) as usize];
        if has_auto(e.access_forward()) {
            outbound += 1;
        }
        if has_auto(e.access_reverse()) {
            inbound += 1;
        }
    }
    (inbound, outbound)
}

/// Self-loop whose node's edges all point the same way.
fn is_loop_terminal(builder: &GraphTileBuilder, node: &NodeInfo) -> bool {
    let (inbound, outbound) = in_out_counts(builder, node);
    (outbound >= 2 && inbound == 0) || (inbound >= 2 && outbound == 0)
}

/// Strict one-way counts: only edges driveable in exactly one direction
/// are counted, bidirectional edges go to neither total.
fn strict_one_way_counts<F: Fn(u32) -> DirectedEdge>(
    edge_at: F,
    node: &NodeInfo,
) -> (u32, u32) {
    let mut inbound = 0;
    let mut outbound = 0;
    for k in 0..node.edge_count() {
        let e = edge_at(node.edge_index + k);
        let fwd = has_auto(e.access_forward());
        let rev = has_auto(e.access_reverse());
        if fwd && !rev {
            outbound += 1;
        }
        if !fwd && rev {
            inbound += 1;
        }
    }
    (inbound, outbound)
}

/// The edge's source has only strict-inbound auto edges and so does its
/// end node: a one-way pointing the wrong way out of a dead end.
fn is_reversed_one_way(
    builder: &GraphTileBuilder,
    node: &NodeInfo,
    de: &DirectedEdge,
    cache: &Mutex<TileCache>,
) -> bool {
    let (inbound, outbound) =
        strict_one_way_counts(|i| builder.directed_edges()[i as usize], node);
    if outbound != 0 || inbound == 0 {
        return false;
    }
    let end = de.end_node();
    let end_tile = match fetch_tile(cache, end) {
        Ok(t) => t,
        Err(_) => return false,
    };
    let end_node = end_tile.node(end.index());
    let (end_inbound, end_outbound) =
        strict_one_way_counts(|i| end_tile.directed_edge(i), &end_node);
    end_outbound == 0 && end_inbound > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::PointLL;
    use crate::tile::NodeInfo;

    fn edge_with_access(fwd: bool, rev: bool, end: GraphId) -> DirectedEdge {
        let mut de = DirectedEdge::new();
        de.set_end_node(end);
        de.set_length(100.0);
        if fwd {
            de.set_access_forward(access::AUTO);
        }
        if rev {
            de.set_access_reverse(access::AUTO);
        }
        de
    }

    fn builder_with_edges(edges: Vec<DirectedEdge>) -> (GraphTileBuilder, NodeInfo) {
        let base = GraphId::new(5, 2, 0);
        let mut b = GraphTileBuilder::new(base, PointLL::new(50.0, 4.0), 0.25);
        let mut node = NodeInfo::new(PointLL::new(50.1, 4.1));
        node.edge_index = 0;
        node.set_edge_count(edges.len() as u32);
        b.add_node_and_edges(node, edges);
        (b, node)
    }

    #[test]
    fn test_is_one_way() {
        let base = GraphId::new(5, 2, 0);
        assert!(is_one_way(&edge_with_access(true, false, base)));
        assert!(is_one_way(&edge_with_access(false, true, base)));
        assert!(!is_one_way(&edge_with_access(true, true, base)));
        assert!(!is_one_way(&edge_with_access(false, false, base)));
    }

    #[test]
    fn test_loop_terminal_all_outbound() {
        let base = GraphId::new(5, 2, 0);
        let (b, node) = builder_with_edges(vec![
            edge_with_access(true, false, base),
            edge_with_access(true, false, base),
        ]);
        assert!(is_loop_terminal(&b, &node));
    }

    #[test]
    fn test_loop_terminal_mixed_directions() {
        let base = GraphId::new(5, 2, 0);
        let (b, node) = builder_with_edges(vec![
            edge_with_access(true, false, base),
            edge_with_access(false, true, base),
        ]);
        assert!(!is_loop_terminal(&b, &node));
    }

    #[test]
    fn test_pedestrian_terminal() {
        let base = GraphId::new(5, 2, 0);
        let one_way = edge_with_access(true, false, base);
        let mut ped = DirectedEdge::new();
        ped.set_end_node(base);
        ped.set_access_forward(access::PEDESTRIAN);
        ped.set_access_reverse(access::PEDESTRIAN);

        let (b, node) = builder_with_edges(vec![one_way, ped]);
        assert!(is_pedestrian_terminal(&b, &node, 0));

        // A driveable sibling edge breaks the pattern.
        let sibling = edge_with_access(true, true, base);
        let (b, node) = builder_with_edges(vec![one_way, sibling]);
        assert!(!is_pedestrian_terminal(&b, &node, 0));
    }

    #[test]
    fn test_pedestrian_terminal_needs_other_edges() {
        let base = GraphId::new(5, 2, 0);
        let (b, node) = builder_with_edges(vec![edge_with_access(true, false, base)]);
        assert!(!is_pedestrian_terminal(&b, &node, 0));
    }

    #[test]
    fn test_strict_counts_skip_bidirectional_edges() {
        let base = GraphId::new(5, 2, 0);
        let (b, node) = builder_with_edges(vec![
            edge_with_access(true, true, base),
            edge_with_access(false, true, base),
            edge_with_access(true, false, base),
        ]);
        let (inbound, outbound) =
            strict_one_way_counts(|i| b.directed_edges()[i as usize], &node);
        // The bidirectional edge counts toward neither total.
        assert_eq!(inbound, 1);
        assert_eq!(outbound, 1);
    }

    #[test]
    fn test_reversed_one_way_with_bidirectional_sibling() {
        // Node 0 has a bidirectional edge and a strict-inbound one-way;
        // node 1 has only a strict-inbound edge. The bidirectional edge
        // must not mask the reversed one-way.
        let dir = tempfile::TempDir::new().unwrap();
        let base = GraphId::new(5, 2, 0);
        let mut b = GraphTileBuilder::new(base, PointLL::new(50.0, 4.0), 0.25);

        let mut node0 = NodeInfo::new(PointLL::new(50.1, 4.1));
        node0.edge_index = 0;
        node0.set_edge_count(2);
        let bidir = edge_with_access(true, true, base.with_index(1));
        let inbound = edge_with_access(false, true, base.with_index(1));
        b.add_node_and_edges(node0, vec![bidir, inbound]);

        let mut node1 = NodeInfo::new(PointLL::new(50.2, 4.2));
        node1.edge_index = 2;
        node1.set_edge_count(1);
        b.add_node_and_edges(node1, vec![edge_with_access(false, true, base.with_index(0))]);

        b.store(dir.path()).unwrap();
        let cache = Mutex::new(TileCache::new(dir.path(), usize::MAX));

        assert!(is_reversed_one_way(&b, &node0, &inbound, &cache));
    }

    #[test]
    fn test_reversed_one_way_rejects_outbound_source() {
        // Any strict-outbound edge at the source disqualifies the node
        // before the end tile is consulted.
        let dir = tempfile::TempDir::new().unwrap();
        let base = GraphId::new(5, 2, 0);
        let (b, node) = builder_with_edges(vec![
            edge_with_access(true, false, base),
            edge_with_access(false, true, base),
        ]);
        let de = b.directed_edges()[1];
        let cache = Mutex::new(TileCache::new(dir.path(), usize::MAX));
        assert!(!is_reversed_one_way(&b, &node, &de, &cache));
    }
}
