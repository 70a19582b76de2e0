//! Local tile build: turn the constructed graph into tile files.
//!
//! Tiles are independent, so the shuffled tile id set is split into one
//! contiguous range per worker and built in parallel. All inputs are
//! read-only here; each worker owns its tile builders outright.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use crate::attributes::{access, RoadClass, SignType, SpeedType};
use crate::geo::polyline_length;
use crate::graph::tiling::TileGrid;
use crate::graph::Edge;
use crate::graph_id::GraphId;
use crate::osm::{OsmData, OsmNode, OsmWay};
use crate::tile::directed_edge::quantized_length;
use crate::tile::{
    DirectedEdge, GraphTileBuilder, NodeInfo, MAX_EDGES_PER_NODE, NO_OPPOSING_EDGE,
};

/// Bound on not-thru search expansions.
const MAX_NOT_THRU_EXPANSIONS: usize = 256;

#[derive(Debug, Default, Clone, Copy)]
pub struct TileBuildStats {
    pub tiles_written: usize,
    pub bytes_written: usize,
    pub duplicate_opposing: usize,
}

impl TileBuildStats {
    fn merge(&mut self, other: TileBuildStats) {
        self.tiles_written += other.tiles_written;
        self.bytes_written += other.bytes_written;
        self.duplicate_opposing += other.duplicate_opposing;
    }
}

/// Build every tile at the given level and write the tile store.
pub fn build_local_tiles(
    data: &OsmData,
    edges: &[Edge],
    tiled_nodes: &HashMap<u32, Vec<u64>>,
    grid: &TileGrid,
    level: u8,
    tile_dir: &Path,
    concurrency: usize,
) -> Result<TileBuildStats> {
    // Shuffle so workers do not all land on the same dense region, then
    // hand each worker one contiguous range.
    let mut tile_ids: Vec<u32> = tiled_nodes.keys().copied().collect();
    tile_ids.shuffle(&mut rand::thread_rng());

    let workers = concurrency.max(1).min(tile_ids.len().max(1));
    let chunk = tile_ids.len().div_ceil(workers);

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
        .context("failed to build tile build thread pool")?;

    let stats = pool.install(|| {
        tile_ids
            .par_chunks(chunk.max(1))
            .map(|range| {
                let mut stats = TileBuildStats::default();
                for &tile_id in range {
                    let written = build_tile(
                        data,
                        edges,
                        &tiled_nodes[&tile_id],
                        grid,
                        level,
                        tile_id,
                        tile_dir,
                        &mut stats,
                    )
                    .with_context(|| format!("failed to build tile {}", tile_id))?;
                    stats.tiles_written += 1;
                    stats.bytes_written += written;
                    pb.inc(1);
                }
                Ok::<TileBuildStats, anyhow::Error>(stats)
            })
            .try_reduce(TileBuildStats::default, |mut a, b| {
                a.merge(b);
                Ok(a)
            })
    })?;

    pb.finish_and_clear();
    Ok(stats)
}

#[allow(clippy::too_many_arguments)]
fn build_tile(
    data: &OsmData,
    edges: &[Edge],
    node_ids: &[u64],
    grid: &TileGrid,
    level: u8,
    tile_id: u32,
    tile_dir: &Path,
    stats: &mut TileBuildStats,
) -> Result<usize> {
    let tile_base = GraphId::new(tile_id, level, 0);
    let mut builder = GraphTileBuilder::new(
        tile_base,
        grid.tile_base(tile_id),
        grid.tile_size_deg(),
    );

    let mut edge_index_base: u32 = 0;
    for &osm_id in node_ids {
        let node = data
            .nodes
            .get(&osm_id)
            .with_context(|| format!("tiled node {} missing from node store", osm_id))?;
        if node.edge_count() as u32 > MAX_EDGES_PER_NODE {
            bail!(
                "node {} has {} edges, more than the tile format allows",
                osm_id,
                node.edge_count()
            );
        }

        let mut node_info = NodeInfo::new(node.latlng);
        node_info.edge_index = edge_index_base;
        node_info.set_edge_count(node.edge_count() as u32);
        node_info.set_node_type(node.node_type());
        node_info.set_traffic_signal(node.traffic_signal);
        node_info.set_access_mask(if node.modes_mask != 0 {
            node.modes_mask as u16
        } else {
            access::ALL
        });

        let mut best_rc = RoadClass::Other;
        let mut directed_edges = Vec::with_capacity(node.edge_count());
        for (local_idx, &edge_index) in node.edges.iter().enumerate() {
            let edge = &edges[edge_index as usize];
            let way = &data.ways[edge.way_index as usize];
            let tile_edge_index = edge_index_base + local_idx as u32;

            let mut de = build_directed_edge(
                data,
                edges,
                edge,
                edge_index,
                way,
                osm_id,
                tile_base,
                stats,
            )?;

            if way.road_class < best_rc {
                best_rc = way.road_class;
            }

            let offset = builder.add_edge_info(
                edge.source,
                edge.target,
                way.osm_id,
                &edge.shape,
                &way.route_names(),
            );
            de.set_edgeinfo_offset(offset);

            if de.forward() {
                let emitted = add_exit_signs(&mut builder, tile_edge_index, way, node, data, osm_id);
                if emitted {
                    de.set_exit_sign(true);
                }
            }

            directed_edges.push(de);
        }

        node_info.set_best_road_class(best_rc);
        edge_index_base += directed_edges.len() as u32;
        builder.add_node_and_edges(node_info, directed_edges);
    }

    builder.store(tile_dir)
}

/// Assemble one directed edge from the shared edge record, oriented so it
/// leaves `osm_id`.
#[allow(clippy::too_many_arguments)]
fn build_directed_edge(
    data: &OsmData,
    edges: &[Edge],
    edge: &Edge,
    edge_index: u32,
    way: &OsmWay,
    osm_id: u64,
    tile_base: GraphId,
    stats: &mut TileBuildStats,
) -> Result<DirectedEdge> {
    let mut de = DirectedEdge::new();

    let length = polyline_length(&edge.shape);
    de.set_length(length);
    de.set_speed_kph(way.speed_kph);
    de.set_truck_speed_kph(way.truck_speed_kph);
    de.set_classification(way.road_class);
    de.set_use(way.effective_use());
    de.set_link(way.link);
    de.set_ferry(way.ferry);
    de.set_rail_ferry(way.rail);
    de.set_toll(way.toll);
    de.set_roundabout(way.roundabout);
    de.set_tunnel(way.tunnel);
    de.set_bridge(way.bridge);
    de.set_surface(way.effective_surface());
    de.set_cycle_lane(way.cycle_lane);
    de.set_lanes(way.lanes);
    de.set_bike_network(way.bike_network);
    de.set_truck_route(way.truck_route);
    de.set_dest_only(way.destination_only || way.no_thru_traffic);
    de.set_traffic_signal(way.traffic_signal);
    de.set_speed_type(if way.tagged_speed {
        SpeedType::Tagged
    } else {
        SpeedType::Classified
    });

    let forward = edge.source == osm_id;
    de.set_forward(forward);
    let (fwd, rev) = access_masks(way, forward);
    de.set_access_forward(fwd);
    de.set_access_reverse(rev);

    let end_osm = edge.opposite_end(osm_id);
    let end_node = lookup_node(data, end_osm)?;
    let end_gid = end_node.graph_id();
    if !end_gid.is_valid() {
        bail!("node {} has no graph id during tile build", end_osm);
    }
    de.set_end_node(end_gid);

    // Within-tile opposing edge; cross-tile cases stay at the sentinel for
    // the validator to resolve.
    if end_gid.tile_base() == tile_base {
        let (opp, dups) =
            opposing_local_index(data, edges, end_osm, osm_id, quantized_length(length));
        de.set_opp_local_idx(opp);
        stats.duplicate_opposing += dups;
    } else {
        de.set_opp_local_idx(NO_OPPOSING_EDGE);
    }

    // Dead-end detection is only worth the search above tertiary class.
    if way.road_class <= RoadClass::TertiaryUnclassified {
        de.set_not_thru(false);
    } else {
        de.set_not_thru(is_not_thru(data, edges, osm_id, end_osm, edge_index));
    }

    Ok(de)
}

fn lookup_node<'a>(data: &'a OsmData, osm_id: u64) -> Result<&'a OsmNode> {
    data.nodes
        .get(&osm_id)
        .with_context(|| format!("node {} missing from node store", osm_id))
}

/// Access masks for a directed edge. Reverse orientation swaps the way's
/// forward and backward flags; pedestrian access is symmetric.
fn access_masks(way: &OsmWay, forward: bool) -> (u16, u16) {
    let mut fwd = 0u16;
    let mut rev = 0u16;
    let pairs: [(bool, bool, u16); 5] = [
        (way.auto_forward, way.auto_backward, access::AUTO),
        (way.truck_forward, way.truck_backward, access::TRUCK),
        (way.bus_forward, way.bus_backward, access::BUS),
        (way.bike_forward, way.bike_backward, access::BICYCLE),
        (
            way.emergency_forward,
            way.emergency_backward,
            access::EMERGENCY,
        ),
    ];
    for (way_fwd, way_bwd, bit) in pairs {
        if (way_fwd && forward) || (way_bwd && !forward) {
            fwd |= bit;
        }
        if (way_fwd && !forward) || (way_bwd && forward) {
            rev |= bit;
        }
    }
    if way.pedestrian {
        fwd |= access::PEDESTRIAN;
        rev |= access::PEDESTRIAN;
    }
    (fwd, rev)
}

/// Find the local index of the opposing edge at `end_osm`: the incident
/// edge leading back to `start_osm` with the same quantized length. Returns
/// the lowest matching index and how many extra matches were seen.
fn opposing_local_index(
    data: &OsmData,
    edges: &[Edge],
    end_osm: u64,
    start_osm: u64,
    length_m: u32,
) -> (u32, usize) {
    let end_node = match data.nodes.get(&end_osm) {
        Some(n) => n,
        None => return (NO_OPPOSING_EDGE, 0),
    };
    let mut found = NO_OPPOSING_EDGE;
    let mut duplicates = 0;
    for (local_idx, &edge_index) in end_node.edges.iter().enumerate() {
        let e = &edges[edge_index as usize];
        if e.opposite_end(end_osm) == start_osm
            && quantized_length(polyline_length(&e.shape)) == length_m
        {
            if found == NO_OPPOSING_EDGE {
                found = local_idx as u32;
            } else {
                duplicates += 1;
            }
        }
    }
    (found, duplicates)
}

/// Bounded breadth-first search for dead-end regions. Starting from the
/// edge's end node and never using the entering edge, the region is
/// "not thru" only when the frontier empties without reaching the start
/// node or any tertiary-or-better edge. Exhausting the expansion budget
/// with work remaining counts as "thru".
fn is_not_thru(
    data: &OsmData,
    edges: &[Edge],
    start_osm: u64,
    end_osm: u64,
    skip_edge: u32,
) -> bool {
    let mut visited: HashSet<u64> = HashSet::new();
    let mut frontier: VecDeque<u64> = VecDeque::new();
    visited.insert(end_osm);
    frontier.push_back(end_osm);

    let mut expansions = 0usize;
    while let Some(current) = frontier.pop_front() {
        if expansions >= MAX_NOT_THRU_EXPANSIONS {
            return false;
        }
        expansions += 1;

        let node = match data.nodes.get(&current) {
            Some(n) => n,
            None => continue,
        };
        for &edge_index in &node.edges {
            if edge_index == skip_edge {
                continue;
            }
            // Expansion is undirected: a one-way still provides an exit for
            // the purposes of dead-end detection.
            let e = &edges[edge_index as usize];
            if e.attrs.importance <= RoadClass::TertiaryUnclassified {
                return false;
            }
            let far = e.opposite_end(current);
            if far == start_osm {
                return false;
            }
            if visited.insert(far) {
                frontier.push_back(far);
            }
        }
    }
    true
}

/// Emit exit signs for a forward directed edge. Way-level signage applies
/// to ramps; node-level exit number and exit_to come from the junction node
/// the edge leaves.
fn add_exit_signs(
    builder: &mut GraphTileBuilder,
    tile_edge_index: u32,
    way: &OsmWay,
    node: &OsmNode,
    data: &OsmData,
    osm_id: u64,
) -> bool {
    let mut emitted = false;
    if node.has_ref {
        if let Some(text) = data.node_ref.get(&osm_id) {
            builder.add_sign(tile_edge_index, SignType::ExitNumber, text);
            emitted = true;
        }
    }
    if node.exit_to {
        if let Some(text) = data.node_exit_to.get(&osm_id) {
            builder.add_sign(tile_edge_index, SignType::ExitToward, text);
            emitted = true;
        }
    }
    if way.link {
        if !way.junction_ref.is_empty() {
            builder.add_sign(tile_edge_index, SignType::ExitNumber, &way.junction_ref);
            emitted = true;
        }
        if !way.destination_ref.is_empty() {
            builder.add_sign(tile_edge_index, SignType::ExitBranch, &way.destination_ref);
            emitted = true;
        }
        if !way.destination.is_empty() {
            builder.add_sign(tile_edge_index, SignType::ExitToward, &way.destination);
            emitted = true;
        }
        if !way.destination_ref_to.is_empty() {
            builder.add_sign(
                tile_edge_index,
                SignType::ExitToward,
                &way.destination_ref_to,
            );
            emitted = true;
        }
    }
    emitted
}
