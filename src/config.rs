//! Build configuration, loaded from a JSON file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::attributes::RoadClass;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub tagtransform: TagTransformConfig,
    /// Worker count for the parallel phases. Defaults to the hardware.
    pub concurrency: Option<u32>,
    /// Accepted for transit-enabled deployments; unused by the core build.
    pub transit_dir: Option<PathBuf>,
    #[serde(default)]
    pub statistics: StatisticsConfig,
}

#[derive(Debug, Deserialize)]
pub struct HierarchyConfig {
    pub tile_dir: PathBuf,
    pub levels: Vec<LevelConfig>,
}

#[derive(Debug, Deserialize)]
pub struct LevelConfig {
    pub level: u8,
    pub tile_size_deg: f32,
    /// Road class names admitted at this level; empty means all.
    #[serde(default)]
    pub allowed_road_classes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagTransformConfig {
    pub node_script: Option<PathBuf>,
    pub node_function: Option<String>,
    pub way_script: Option<PathBuf>,
    pub way_function: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsConfig {
    pub dir: Option<PathBuf>,
    /// Spatial database name, accepted for compatibility; the core writes a
    /// JSON summary instead.
    pub db_name: Option<String>,
    pub tasks_file: Option<PathBuf>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.hierarchy.levels.is_empty() {
            bail!("config error: hierarchy.levels must not be empty");
        }
        for level in &self.hierarchy.levels {
            if level.tile_size_deg <= 0.0 || level.tile_size_deg > 90.0 {
                bail!(
                    "config error: tile_size_deg {} out of range at level {}",
                    level.tile_size_deg,
                    level.level
                );
            }
            for name in &level.allowed_road_classes {
                if RoadClass::from_name(name).is_none() {
                    bail!("config error: unknown road class '{}'", name);
                }
            }
        }
        Ok(())
    }

    /// The most detailed hierarchy level; the one this builder emits.
    pub fn deepest_level(&self) -> &LevelConfig {
        self.hierarchy
            .levels
            .iter()
            .max_by_key(|l| l.level)
            .expect("levels validated non-empty")
    }

    pub fn concurrency(&self) -> usize {
        let hardware = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        match self.concurrency {
            Some(n) => (n as usize).min(hardware).max(1),
            None => hardware,
        }
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.statistics
            .tasks_file
            .clone()
            .unwrap_or_else(|| self.hierarchy.tile_dir.join("tasks.json"))
    }
}

impl LevelConfig {
    /// Road classes admitted at this level; empty list admits all.
    pub fn allowed_classes(&self) -> HashSet<RoadClass> {
        if self.allowed_road_classes.is_empty() {
            return RoadClass::all().iter().copied().collect();
        }
        self.allowed_road_classes
            .iter()
            .filter_map(|n| RoadClass::from_name(n))
            .collect()
    }
}
