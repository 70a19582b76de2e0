//! Per-tile and per-country aggregates collected during validation.

use anyhow::{Context, Result};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;

use crate::attributes::RoadClass;

/// Length and count aggregates, indexed by road class.
#[derive(Debug, Default, Clone)]
pub struct AreaStats {
    pub road_length_km: [f64; 8],
    pub one_way_km: [f64; 8],
    pub speed_tagged_km: [f64; 8],
    pub named_km: [f64; 8],
    pub truck_route_km: [f64; 8],
    pub internal_edges: [u64; 8],
}

impl AreaStats {
    fn merge(&mut self, other: &AreaStats) {
        for i in 0..8 {
            self.road_length_km[i] += other.road_length_km[i];
            self.one_way_km[i] += other.one_way_km[i];
            self.speed_tagged_km[i] += other.speed_tagged_km[i];
            self.named_km[i] += other.named_km[i];
            self.truck_route_km[i] += other.truck_route_km[i];
            self.internal_edges[i] += other.internal_edges[i];
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let by_class = |values: &[f64; 8]| -> serde_json::Value {
            let mut m = serde_json::Map::new();
            for rc in RoadClass::all() {
                let v = values[*rc as usize];
                if v != 0.0 {
                    m.insert(rc.name().to_string(), json!(v));
                }
            }
            serde_json::Value::Object(m)
        };
        let mut internal = serde_json::Map::new();
        for rc in RoadClass::all() {
            let v = self.internal_edges[*rc as usize];
            if v != 0 {
                internal.insert(rc.name().to_string(), json!(v));
            }
        }
        json!({
            "road_length_km": by_class(&self.road_length_km),
            "one_way_km": by_class(&self.one_way_km),
            "speed_tagged_km": by_class(&self.speed_tagged_km),
            "named_km": by_class(&self.named_km),
            "truck_route_km": by_class(&self.truck_route_km),
            "internal_edges": serde_json::Value::Object(internal),
        })
    }
}

/// Everything a validation pass learns, mergeable across workers.
#[derive(Debug, Default)]
pub struct ValidatorStats {
    pub tiles: HashMap<u32, AreaStats>,
    pub countries: HashMap<String, AreaStats>,
    pub tile_areas_km2: HashMap<u32, f64>,
    pub densities: Vec<f64>,
    pub duplicate_opposing: u64,
    pub missing_opposing: u64,
}

impl ValidatorStats {
    pub fn tile(&mut self, tile_id: u32) -> &mut AreaStats {
        self.tiles.entry(tile_id).or_default()
    }

    pub fn country(&mut self, iso: &str) -> &mut AreaStats {
        self.countries.entry(iso.to_string()).or_default()
    }

    pub fn add_density(&mut self, density: f64) {
        self.densities.push(density);
    }

    /// Additive merge of a worker's results.
    pub fn merge(&mut self, other: ValidatorStats) {
        for (tile_id, stats) in other.tiles {
            self.tiles.entry(tile_id).or_default().merge(&stats);
        }
        for (iso, stats) in other.countries {
            self.countries.entry(iso).or_default().merge(&stats);
        }
        self.tile_areas_km2.extend(other.tile_areas_km2);
        self.densities.extend(other.densities);
        self.duplicate_opposing += other.duplicate_opposing;
        self.missing_opposing += other.missing_opposing;
    }

    pub fn average_density(&self) -> f64 {
        if self.densities.is_empty() {
            return 0.0;
        }
        self.densities.iter().sum::<f64>() / self.densities.len() as f64
    }

    pub fn max_density(&self) -> f64 {
        self.densities.iter().copied().fold(0.0, f64::max)
    }

    /// Write the aggregate summary as a JSON file.
    pub fn write_summary(&self, path: &Path) -> Result<()> {
        let mut tiles = serde_json::Map::new();
        let mut tile_ids: Vec<u32> = self.tiles.keys().copied().collect();
        tile_ids.sort_unstable();
        for tile_id in tile_ids {
            let mut entry = self.tiles[&tile_id].to_json();
            if let Some(area) = self.tile_areas_km2.get(&tile_id) {
                entry["area_km2"] = json!(area);
            }
            tiles.insert(tile_id.to_string(), entry);
        }

        let mut countries = serde_json::Map::new();
        let mut isos: Vec<&String> = self.countries.keys().collect();
        isos.sort();
        for iso in isos {
            countries.insert(iso.clone(), self.countries[iso].to_json());
        }

        let summary = json!({
            "tiles": tiles,
            "countries": countries,
            "duplicate_opposing": self.duplicate_opposing,
            "missing_opposing": self.missing_opposing,
            "average_density": self.average_density(),
            "max_density": self.max_density(),
        });

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("failed to write statistics to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_additive() {
        let mut a = ValidatorStats::default();
        a.tile(1).road_length_km[RoadClass::Primary as usize] = 2.0;
        a.country("NL").one_way_km[RoadClass::Primary as usize] = 1.0;
        a.duplicate_opposing = 1;

        let mut b = ValidatorStats::default();
        b.tile(1).road_length_km[RoadClass::Primary as usize] = 3.0;
        b.tile(2).road_length_km[RoadClass::Service as usize] = 4.0;
        b.duplicate_opposing = 2;

        a.merge(b);
        assert_eq!(a.tiles[&1].road_length_km[RoadClass::Primary as usize], 5.0);
        assert_eq!(a.tiles[&2].road_length_km[RoadClass::Service as usize], 4.0);
        assert_eq!(a.duplicate_opposing, 3);
        assert_eq!(a.countries["NL"].one_way_km[RoadClass::Primary as usize], 1.0);
    }

    #[test]
    fn test_densities() {
        let mut s = ValidatorStats::default();
        assert_eq!(s.average_density(), 0.0);
        s.add_density(1.0);
        s.add_density(3.0);
        assert_eq!(s.average_density(), 2.0);
        assert_eq!(s.max_density(), 3.0);
    }

    #[test]
    fn test_write_summary() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut s = ValidatorStats::default();
        s.tile(7).road_length_km[RoadClass::Motorway as usize] = 12.5;
        s.tile_areas_km2.insert(7, 400.0);
        let path = dir.path().join("statistics.json");
        s.write_summary(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            parsed["tiles"]["7"]["road_length_km"]["motorway"],
            json!(12.5)
        );
        assert_eq!(parsed["tiles"]["7"]["area_km2"], json!(400.0));
    }
}
