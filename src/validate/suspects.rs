//! Suspect one-way ways flagged by the validator, written out as a task
//! list for manual map review.

use anyhow::{Context, Result};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;

use crate::geo::PointLL;

/// One flagged way: the node where the problem was seen plus the way shape.
#[derive(Debug, Clone)]
pub struct SuspectWay {
    pub node: PointLL,
    pub shape: Vec<PointLL>,
}

/// Ways whose one-way tagging looks wrong. Keyed by way id so a way is
/// flagged at most once; ordered so output is deterministic.
#[derive(Debug, Default)]
pub struct SuspectList {
    ways: BTreeMap<u64, SuspectWay>,
}

impl SuspectList {
    pub fn new() -> SuspectList {
        SuspectList::default()
    }

    pub fn add_task(&mut self, way_id: u64, node: PointLL, shape: Vec<PointLL>) {
        self.ways.entry(way_id).or_insert(SuspectWay { node, shape });
    }

    pub fn len(&self) -> usize {
        self.ways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ways.is_empty()
    }

    pub fn merge(&mut self, other: SuspectList) {
        for (id, suspect) in other.ways {
            self.ways.entry(id).or_insert(suspect);
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let tasks: Vec<serde_json::Value> = self
            .ways
            .iter()
            .map(|(way_id, suspect)| {
                let coords: Vec<serde_json::Value> = suspect
                    .shape
                    .iter()
                    .map(|p| json!([p.lon, p.lat]))
                    .collect();
                json!({
                    "geometries": {
                        "features": [
                            {
                                "geometry": {
                                    "coordinates": [suspect.node.lon, suspect.node.lat],
                                    "type": "Point"
                                },
                                "id": null,
                                "properties": {},
                                "type": "Feature"
                            },
                            {
                                "geometry": {
                                    "coordinates": coords,
                                    "type": "Linestring"
                                },
                                "id": null,
                                "properties": {"osmid": way_id},
                                "type": "Feature"
                            }
                        ],
                        "type": "FeatureCollection"
                    },
                    "identifier": way_id.to_string(),
                    "instruction": "Check to see if the one way road is logical"
                })
            })
            .collect();
        serde_json::Value::Array(tasks)
    }

    /// Write the task list JSON file.
    pub fn write_tasks(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.to_json())?)
            .with_context(|| format!("failed to write tasks to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> Vec<PointLL> {
        vec![PointLL::new(50.0, 4.0), PointLL::new(50.01, 4.01)]
    }

    #[test]
    fn test_way_flagged_once() {
        let mut list = SuspectList::new();
        list.add_task(7, PointLL::new(50.0, 4.0), shape());
        list.add_task(7, PointLL::new(51.0, 5.0), shape());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_merge() {
        let mut a = SuspectList::new();
        a.add_task(7, PointLL::new(50.0, 4.0), shape());
        let mut b = SuspectList::new();
        b.add_task(8, PointLL::new(50.0, 4.0), shape());
        b.add_task(7, PointLL::new(50.0, 4.0), shape());
        a.merge(b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_task_json_shape() {
        let mut list = SuspectList::new();
        list.add_task(368_034, PointLL::new(39.82859, -75.3861), shape());
        let v = list.to_json();
        let task = &v[0];
        assert_eq!(task["identifier"], "368034");
        assert_eq!(
            task["instruction"],
            "Check to see if the one way road is logical"
        );
        assert_eq!(task["geometries"]["type"], "FeatureCollection");
        let features = task["geometries"]["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[1]["geometry"]["type"], "Linestring");
        assert_eq!(features[1]["properties"]["osmid"], 368_034);
    }

    #[test]
    fn test_write_tasks() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut list = SuspectList::new();
        list.add_task(7, PointLL::new(50.0, 4.0), shape());
        let path = dir.path().join("tasks.json");
        list.write_tasks(&path).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
    }
}
