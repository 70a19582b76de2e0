//! The build driver: runs the phases in order and reports timings.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;

use crate::builder::build_local_tiles;
use crate::classify::RuleClassifier;
use crate::config::Config;
use crate::graph::tiling::{tile_nodes, TileGrid};
use crate::graph::{construct_edges, sort_edges_from_nodes};
use crate::ingest::ingest;
use crate::osm::MAX_OSM_NODE_ID;
use crate::tile::reader::DEFAULT_CACHE_BYTES;
use crate::validate::validate_tiles;

/// Run the full build: ingest, construct, sort, tile, write, validate.
pub fn run_build(config: &Config, input: &Path) -> Result<()> {
    let classifier = RuleClassifier::from_rule_files(
        config.tagtransform.node_script.as_deref(),
        config.tagtransform.way_script.as_deref(),
    )
    .context("failed to load tag classifier rules")?;

    let level = config.deepest_level();
    let grid = TileGrid::new(level.tile_size_deg);
    let allowed = level.allowed_classes();

    let start = Instant::now();
    let mut data = ingest(input, &classifier, &allowed, MAX_OSM_NODE_ID)?;
    eprintln!("Parsing took {:.2}s", start.elapsed().as_secs_f64());

    let start = Instant::now();
    eprintln!("Constructing edges...");
    let edges = construct_edges(&mut data)?;
    eprintln!("ConstructEdges took {:.2}s", start.elapsed().as_secs_f64());

    let start = Instant::now();
    sort_edges_from_nodes(&mut data, &edges);
    eprintln!("SortEdges took {:.2}s", start.elapsed().as_secs_f64());

    let start = Instant::now();
    let tiled = tile_nodes(&mut data, &grid, level.level);
    eprintln!(
        "TileNodes took {:.2}s ({} tiles)",
        start.elapsed().as_secs_f64(),
        tiled.len()
    );

    let start = Instant::now();
    eprintln!("Building tiles...");
    let stats = build_local_tiles(
        &data,
        &edges,
        &tiled,
        &grid,
        level.level,
        &config.hierarchy.tile_dir,
        config.concurrency(),
    )?;
    eprintln!(
        "BuildLocalTiles took {:.2}s ({} tiles, {} bytes, {} duplicate opposing)",
        start.elapsed().as_secs_f64(),
        stats.tiles_written,
        stats.bytes_written,
        stats.duplicate_opposing
    );

    run_validate(config)
}

/// Run the validation phase alone against an existing tile store.
pub fn run_validate(config: &Config) -> Result<()> {
    let level = config.deepest_level();
    let grid = TileGrid::new(level.tile_size_deg);

    let start = Instant::now();
    eprintln!("Validating tiles...");
    let outcome = validate_tiles(
        &config.hierarchy.tile_dir,
        level.level,
        &grid,
        config.concurrency(),
        DEFAULT_CACHE_BYTES,
    )?;
    eprintln!(
        "Validation took {:.2}s",
        start.elapsed().as_secs_f64()
    );
    if outcome.stats.duplicate_opposing > 0 {
        eprintln!(
            "possible duplicate opposing edges: {}",
            outcome.stats.duplicate_opposing
        );
    }
    eprintln!(
        "average density {:.3}, max {:.3}",
        outcome.stats.average_density(),
        outcome.stats.max_density()
    );

    if let Some(dir) = &config.statistics.dir {
        let path = dir.join("statistics.json");
        outcome.stats.write_summary(&path)?;
        eprintln!("statistics written to {}", path.display());
    }

    let tasks = config.tasks_file();
    outcome.suspects.write_tasks(&tasks)?;
    eprintln!(
        "{} review tasks written to {}",
        outcome.suspects.len(),
        tasks.display()
    );

    Ok(())
}
