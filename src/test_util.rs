//! Shared fixtures for unit tests.

use crate::attributes::RoadClass;
use crate::geo::PointLL;
use crate::osm::{OsmData, OsmNode, OsmWay};

/// Build an OsmData with the given ways over nodes placed on a small grid,
/// marking shape/intersection bits exactly like the way ingest pass does.
pub fn synthetic_data(ways: Vec<OsmWay>) -> OsmData {
    let mut data = OsmData::new(100_000);
    for w in &ways {
        for &r in &w.refs {
            if data.shape.is_set(r) {
                data.intersection.set(r).unwrap();
            }
            data.shape.set(r).unwrap();
        }
        data.intersection.set(w.refs[0]).unwrap();
        data.intersection.set(*w.refs.last().unwrap()).unwrap();
    }
    for w in &ways {
        for &r in &w.refs {
            data.nodes.entry(r).or_insert_with(|| {
                OsmNode::new(PointLL::new(
                    50.0 + (r / 100) as f32 * 0.001,
                    4.0 + (r % 100) as f32 * 0.001,
                ))
            });
        }
    }
    data.ways = ways;
    data
}

/// A bidirectional residential-style way with sensible defaults.
pub fn road(osm_id: u64, refs: Vec<u64>, rc: RoadClass) -> OsmWay {
    let mut w = OsmWay::new(osm_id, refs);
    w.road_class = rc;
    w.auto_forward = true;
    w.auto_backward = true;
    w.pedestrian = true;
    w.speed_kph = 50.0;
    w
}
