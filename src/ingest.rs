//! PBF ingestion: two passes over the extract.
//!
//! Pass 1 reads ways (relations are skipped), classifies their tags, and
//! marks which node ids matter in the `shape` and `intersection` bitsets.
//! Pass 2 reads nodes and keeps only those referenced by a routable way.
//! Nodes arrive after ways by construction, regardless of file order.

use anyhow::{bail, Context, Result};
use osmpbf::{Element, ElementReader};
use std::collections::HashSet;
use std::path::Path;

use crate::attributes::{CycleLane, RoadClass, Use};
use crate::classify::{ClassifiedTags, ElementKind, TagClassifier, Tags};
use crate::osm::{OsmData, OsmNode, OsmWay};
use crate::geo::PointLL;

/// Run both passes and return the populated element stores. Only ways whose
/// classified road class is in `allowed_classes` are kept.
pub fn ingest(
    input: &Path,
    classifier: &dyn TagClassifier,
    allowed_classes: &HashSet<RoadClass>,
    max_osm_id: u64,
) -> Result<OsmData> {
    let mut data = OsmData::new(max_osm_id);

    eprintln!("Parsing ways to mark needed nodes...");
    read_ways(input, classifier, allowed_classes, &mut data)?;
    eprintln!("  routable ways: {}", data.ways.len());
    if !data.ways.is_empty() {
        let pct =
            (data.speed_assignment_count as f64 / data.ways.len() as f64) * 100.0;
        eprintln!("  ways using classified default speed: {:.2}%", pct);
    }

    eprintln!("Parsing nodes referenced by ways...");
    read_nodes(input, classifier, &mut data)?;
    eprintln!("  routable nodes: {}", data.nodes.len());

    Ok(data)
}

fn to_osm_id(id: i64) -> Result<u64> {
    if id < 0 {
        bail!("malformed input: negative osm id {}", id);
    }
    Ok(id as u64)
}

fn collect_tags<'a, I: Iterator<Item = (&'a str, &'a str)>>(iter: I) -> Tags {
    iter.map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn read_ways(
    input: &Path,
    classifier: &dyn TagClassifier,
    allowed_classes: &HashSet<RoadClass>,
    data: &mut OsmData,
) -> Result<()> {
    let reader = ElementReader::from_path(input)
        .with_context(|| format!("failed to open {}", input.display()))?;

    let mut result: Result<()> = Ok(());
    reader
        .for_each(|element| {
            if result.is_err() {
                return;
            }
            if let Element::Way(way) = element {
                if let Err(e) = handle_way(&way, classifier, allowed_classes, data) {
                    result = Err(e);
                }
            }
        })
        .context("failed to read ways from pbf")?;
    result
}

fn handle_way(
    way: &osmpbf::Way,
    classifier: &dyn TagClassifier,
    allowed_classes: &HashSet<RoadClass>,
    data: &mut OsmData,
) -> Result<()> {
    // Ways with fewer than two nodes cannot form an edge.
    let refs: Vec<u64> = way
        .refs()
        .map(to_osm_id)
        .collect::<Result<_>>()?;
    if refs.len() < 2 {
        return Ok(());
    }

    let raw = collect_tags(way.tags());
    let classified = classifier.classify(ElementKind::Way, &raw);
    if classified.is_empty() {
        return Ok(());
    }

    let osm_id = to_osm_id(way.id())?;
    let w = match build_way(osm_id, refs, &classified)? {
        Some(w) => w,
        None => return Ok(()),
    };
    if !allowed_classes.contains(&w.road_class) {
        return Ok(());
    }

    // Mark shape and intersection nodes. A node already seen by any way
    // becomes an intersection, as do both endpoints.
    for &r in &w.refs {
        if data.shape.is_set(r) {
            data.intersection.set(r)?;
            data.edge_count_estimate += 1;
        }
        data.shape.set(r)?;
    }
    data.intersection.set(w.refs[0])?;
    data.intersection.set(*w.refs.last().unwrap())?;
    data.edge_count_estimate += 2;

    if !w.tagged_speed {
        data.speed_assignment_count += 1;
    }
    data.ways.push(w);
    Ok(())
}

/// Apply classifier output to a way record. Returns None when the way is
/// rejected (no access mode, or no usable speed).
fn build_way(osm_id: u64, refs: Vec<u64>, classified: &Tags) -> Result<Option<OsmWay>> {
    let t = ClassifiedTags(classified);
    let mut w = OsmWay::new(osm_id, refs);

    if let Some(rc) = t.get_u8("road_class") {
        w.road_class = RoadClass::from_u8(rc);
    }
    if let Some(u) = t.get_u8("use") {
        w.use_ = Use::from_u8(u);
    }

    w.auto_forward = t.get_bool("auto_forward").unwrap_or(false);
    w.auto_backward = t.get_bool("auto_backward").unwrap_or(false);
    w.truck_forward = t.get_bool("truck_forward").unwrap_or(w.auto_forward);
    w.truck_backward = t.get_bool("truck_backward").unwrap_or(w.auto_backward);
    w.bus_forward = t.get_bool("bus_forward").unwrap_or(w.auto_forward);
    w.bus_backward = t.get_bool("bus_backward").unwrap_or(w.auto_backward);
    w.bike_forward = t.get_bool("bike_forward").unwrap_or(false);
    w.bike_backward = t.get_bool("bike_backward").unwrap_or(false);
    w.emergency_forward = t.get_bool("emergency_forward").unwrap_or(w.auto_forward);
    w.emergency_backward = t.get_bool("emergency_backward").unwrap_or(w.auto_backward);
    w.pedestrian = t.get_bool("pedestrian").unwrap_or(false);

    if !w.has_any_access() {
        return Ok(None);
    }

    w.oneway = t.get_bool("oneway").unwrap_or(false);
    w.roundabout = t.get_bool("roundabout").unwrap_or(false);
    w.link = t.get_bool("link").unwrap_or(false);
    w.ferry = t.get_bool("ferry").unwrap_or(false);
    w.rail = t.get_bool("rail").unwrap_or(false);
    w.tunnel = t.get_bool("tunnel").unwrap_or(false);
    w.bridge = t.get_bool("bridge").unwrap_or(false);
    w.toll = t.get_bool("toll").unwrap_or(false);
    w.destination_only = t.get_bool("private").unwrap_or(false);
    w.no_thru_traffic = t.get_bool("no_thru_traffic").unwrap_or(false);
    w.unpaved = t.get_bool("surface").unwrap_or(false);
    w.lanes = t.get_u8("lanes").unwrap_or(0).min(15);
    w.bike_network = t.get_u8("bike_network_mask").unwrap_or(0) & 0x0f;
    w.cycle_lane = CycleLane::from_u8(t.get_u8("cycle_lane").unwrap_or(0));

    // A way must carry a usable speed: a tagged one, or the classifier's
    // default for the road class. Neither present means the classifier is
    // broken for this way; reject rather than store an arbitrary speed.
    if let Some(speed) = t.get_f32("speed") {
        if speed <= 0.0 {
            return Ok(None);
        }
        w.speed_kph = speed;
        w.tagged_speed = true;
    } else if let Some(speed) = t.get_f32("default_speed") {
        if speed <= 0.0 {
            return Ok(None);
        }
        w.speed_kph = speed;
    } else {
        return Ok(None);
    }
    w.truck_speed_kph = t.get_f32("truck_speed").unwrap_or(0.0);

    let get = |key: &str| t.get(key).unwrap_or("").to_string();
    w.name = get("name");
    w.name_en = get("name:en");
    w.alt_name = get("alt_name");
    w.official_name = get("official_name");
    w.ref_ = get("ref");
    w.int_ref = get("int_ref");
    w.destination = get("destination");
    w.destination_ref = get("destination:ref");
    w.destination_ref_to = get("destination:ref:to");
    w.junction_ref = get("junction_ref");
    w.bike_national_ref = get("bike_national_ref");
    w.bike_regional_ref = get("bike_regional_ref");
    w.bike_local_ref = get("bike_local_ref");

    Ok(Some(w))
}

fn read_nodes(
    input: &Path,
    classifier: &dyn TagClassifier,
    data: &mut OsmData,
) -> Result<()> {
    let reader = ElementReader::from_path(input)
        .with_context(|| format!("failed to open {}", input.display()))?;

    let mut result: Result<()> = Ok(());
    reader
        .for_each(|element| {
            if result.is_err() {
                return;
            }
            let r = match element {
                Element::Node(node) => handle_node(
                    node.id(),
                    node.lat(),
                    node.lon(),
                    collect_tags(node.tags()),
                    classifier,
                    data,
                ),
                Element::DenseNode(node) => handle_node(
                    node.id(),
                    node.lat(),
                    node.lon(),
                    collect_tags(node.tags()),
                    classifier,
                    data,
                ),
                _ => Ok(()),
            };
            if let Err(e) = r {
                result = Err(e);
            }
        })
        .context("failed to read nodes from pbf")?;
    result
}

fn handle_node(
    id: i64,
    lat: f64,
    lon: f64,
    raw: Tags,
    classifier: &dyn TagClassifier,
    data: &mut OsmData,
) -> Result<()> {
    let osm_id = to_osm_id(id)?;
    if !data.shape.is_set(osm_id) {
        return Ok(());
    }

    let mut node = OsmNode::new(PointLL::new(lat as f32, lon as f32));

    // An empty classifier result means no special attributes; the node is
    // still kept because a way references it.
    let classified = classifier.classify(ElementKind::Node, &raw);
    let t = ClassifiedTags(&classified);
    if let Some(exit_to) = t.get("exit_to") {
        if !exit_to.is_empty() {
            node.exit_to = true;
            data.node_exit_to.insert(osm_id, exit_to.to_string());
        }
    }
    if let Some(r) = t.get("ref") {
        if !r.is_empty() {
            node.has_ref = true;
            data.node_ref.insert(osm_id, r.to_string());
        }
    }
    node.gate = t.get_bool("gate").unwrap_or(false);
    node.bollard = t.get_bool("bollard").unwrap_or(false);
    node.traffic_signal = t.get_bool("traffic_signal").unwrap_or(false);
    node.modes_mask = t.get_u8("modes_mask").unwrap_or(0);

    data.nodes.insert(osm_id, node);
    Ok(())
}
