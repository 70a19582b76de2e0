//! Built-in rule-table classifier.
//!
//! Highway values map to a base rule (road class, use, default speed, mode
//! access); explicit access/oneway/feature tags refine it. The defaults can
//! be overridden per highway value by a JSON rule file named in the config.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::{ElementKind, TagClassifier, Tags};
use crate::attributes::{RoadClass, Use};

/// Per-highway-value base rule.
#[derive(Debug, Clone, Deserialize)]
pub struct HighwayRule {
    pub road_class: u8,
    #[serde(default)]
    pub use_: u8,
    pub default_speed: f32,
    pub auto: bool,
    pub bike: bool,
    pub pedestrian: bool,
    #[serde(default)]
    pub link: bool,
}

/// Override file format: a map from highway value to rule.
#[derive(Debug, Default, Deserialize)]
struct RuleFile {
    #[serde(default)]
    highways: HashMap<String, HighwayRule>,
}

pub struct RuleClassifier {
    highways: HashMap<String, HighwayRule>,
}

fn rule(
    road_class: RoadClass,
    use_: Use,
    default_speed: f32,
    auto: bool,
    bike: bool,
    pedestrian: bool,
    link: bool,
) -> HighwayRule {
    HighwayRule {
        road_class: road_class as u8,
        use_: use_ as u8,
        default_speed,
        auto,
        bike,
        pedestrian,
        link,
    }
}

fn default_highway_rules() -> HashMap<String, HighwayRule> {
    use RoadClass::*;
    let mut m = HashMap::new();
    m.insert("motorway".into(), rule(Motorway, Use::Road, 105.0, true, false, false, false));
    m.insert("motorway_link".into(), rule(Motorway, Use::Road, 65.0, true, false, false, true));
    m.insert("trunk".into(), rule(Trunk, Use::Road, 90.0, true, false, false, false));
    m.insert("trunk_link".into(), rule(Trunk, Use::Road, 55.0, true, false, false, true));
    m.insert("primary".into(), rule(Primary, Use::Road, 65.0, true, true, true, false));
    m.insert("primary_link".into(), rule(Primary, Use::Road, 45.0, true, true, true, true));
    m.insert("secondary".into(), rule(Secondary, Use::Road, 60.0, true, true, true, false));
    m.insert("secondary_link".into(), rule(Secondary, Use::Road, 40.0, true, true, true, true));
    m.insert("tertiary".into(), rule(TertiaryUnclassified, Use::Road, 50.0, true, true, true, false));
    m.insert("tertiary_link".into(), rule(TertiaryUnclassified, Use::Road, 30.0, true, true, true, true));
    m.insert("unclassified".into(), rule(TertiaryUnclassified, Use::Road, 50.0, true, true, true, false));
    m.insert("residential".into(), rule(Residential, Use::Road, 30.0, true, true, true, false));
    m.insert("living_street".into(), rule(Residential, Use::Road, 10.0, true, true, true, false));
    m.insert("service".into(), rule(Service, Use::Road, 20.0, true, true, true, false));
    m.insert("track".into(), rule(Other, Use::Road, 15.0, false, true, true, false));
    m.insert("cycleway".into(), rule(Other, Use::Cycleway, 20.0, false, true, true, false));
    m.insert("footway".into(), rule(Other, Use::Footway, 5.0, false, false, true, false));
    m.insert("path".into(), rule(Other, Use::Footway, 5.0, false, true, true, false));
    m.insert("pedestrian".into(), rule(Other, Use::Footway, 5.0, false, false, true, false));
    m.insert("steps".into(), rule(Other, Use::Steps, 3.0, false, false, true, false));
    m
}

impl RuleClassifier {
    pub fn new() -> RuleClassifier {
        RuleClassifier {
            highways: default_highway_rules(),
        }
    }

    /// Load the built-in tables, overlaying rules from the optional node and
    /// way rule files from the config.
    pub fn from_rule_files(
        node_rules: Option<&Path>,
        way_rules: Option<&Path>,
    ) -> Result<RuleClassifier> {
        let mut classifier = RuleClassifier::new();
        for path in [node_rules, way_rules].into_iter().flatten() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read rule file {}", path.display()))?;
            let file: RuleFile = serde_json::from_str(&text)
                .with_context(|| format!("failed to parse rule file {}", path.display()))?;
            classifier.highways.extend(file.highways);
        }
        Ok(classifier)
    }

    fn classify_way(&self, tags: &Tags) -> Tags {
        let mut out = Tags::new();

        // Ferry routes are routable without a highway tag.
        let is_ferry = tags.get("route").map(|v| v.as_str()) == Some("ferry");

        let rule = match tags.get("highway").and_then(|h| self.highways.get(h)) {
            Some(r) => r.clone(),
            None if is_ferry => rule(
                RoadClass::Other,
                Use::Ferry,
                20.0,
                true,
                true,
                true,
                false,
            ),
            None => return out,
        };

        let mut auto_forward = rule.auto;
        let mut auto_backward = rule.auto;
        let mut bike_forward = rule.bike;
        let mut bike_backward = rule.bike;
        let mut pedestrian = rule.pedestrian;
        let mut destination_only = false;

        // Explicit access tags override the class default.
        let access = tags.get("access").map(|v| v.as_str());
        match access {
            Some("no") => {
                auto_forward = false;
                auto_backward = false;
                bike_forward = false;
                bike_backward = false;
                pedestrian = false;
            }
            Some("private") | Some("destination") => destination_only = true,
            _ => {}
        }
        // Vehicular destination-only tagging bans through traffic without
        // restricting who may enter; it is distinct from access=private.
        let mut no_thru_traffic = false;
        match tags.get("motor_vehicle").map(|v| v.as_str()) {
            Some("no") | Some("private") => {
                auto_forward = false;
                auto_backward = false;
            }
            Some("destination") => no_thru_traffic = true,
            _ => {}
        }
        if tags.get("vehicle").map(|v| v.as_str()) == Some("destination") {
            no_thru_traffic = true;
        }
        if tags.get("bicycle").map(|v| v.as_str()) == Some("no") {
            bike_forward = false;
            bike_backward = false;
        }
        if tags.get("foot").map(|v| v.as_str()) == Some("no") {
            pedestrian = false;
        }

        // Oneway. Motorways and roundabouts are oneway unless tagged otherwise.
        let highway = tags.get("highway").map(|v| v.as_str()).unwrap_or("");
        let junction = tags.get("junction").map(|v| v.as_str());
        let roundabout = junction == Some("roundabout");
        let mut oneway = roundabout
            || highway == "motorway"
            || highway == "motorway_link";
        let mut reversed = false;
        match tags.get("oneway").map(|v| v.as_str()) {
            Some("yes") | Some("1") | Some("true") => oneway = true,
            Some("-1") | Some("reverse") => {
                oneway = true;
                reversed = true;
            }
            Some("no") => oneway = false,
            _ => {}
        }
        if oneway {
            if reversed {
                auto_forward = false;
                bike_forward = false;
            } else {
                auto_backward = false;
                bike_backward = false;
            }
        }

        if !(auto_forward || auto_backward || bike_forward || bike_backward || pedestrian) {
            // Nothing can use the way.
            return out;
        }

        out.insert("road_class".into(), rule.road_class.to_string());
        out.insert("use".into(), rule.use_.to_string());
        out.insert("auto_forward".into(), auto_forward.to_string());
        out.insert("auto_backward".into(), auto_backward.to_string());
        out.insert("truck_forward".into(), auto_forward.to_string());
        out.insert("truck_backward".into(), auto_backward.to_string());
        out.insert("bus_forward".into(), auto_forward.to_string());
        out.insert("bus_backward".into(), auto_backward.to_string());
        out.insert("emergency_forward".into(), auto_forward.to_string());
        out.insert("emergency_backward".into(), auto_backward.to_string());
        out.insert("bike_forward".into(), bike_forward.to_string());
        out.insert("bike_backward".into(), bike_backward.to_string());
        out.insert("pedestrian".into(), pedestrian.to_string());
        out.insert("oneway".into(), oneway.to_string());
        out.insert("roundabout".into(), roundabout.to_string());
        out.insert("link".into(), rule.link.to_string());
        if destination_only {
            out.insert("private".into(), "true".into());
        }
        if no_thru_traffic {
            out.insert("no_thru_traffic".into(), "true".into());
        }

        // Speed: a tagged maxspeed wins, otherwise the class default.
        if let Some(speed) = tags.get("maxspeed").and_then(|v| parse_maxspeed(v)) {
            out.insert("speed".into(), format!("{}", speed));
        } else {
            out.insert("default_speed".into(), format!("{}", rule.default_speed));
        }

        if is_ferry {
            out.insert("ferry".into(), "true".into());
        }
        if tags.get("route").map(|v| v.as_str()) == Some("shuttle_train") {
            out.insert("rail".into(), "true".into());
        }
        for (tag, key) in [
            ("tunnel", "tunnel"),
            ("bridge", "bridge"),
            ("toll", "toll"),
        ] {
            if matches!(tags.get(tag).map(|v| v.as_str()), Some("yes") | Some("true")) {
                out.insert(key.into(), "true".into());
            }
        }
        if let Some(surface) = tags.get("surface") {
            let unpaved = matches!(
                surface.as_str(),
                "unpaved" | "dirt" | "gravel" | "ground" | "grass" | "sand" | "mud" | "earth"
            );
            out.insert("surface".into(), unpaved.to_string());
        }
        if highway == "track" {
            out.insert("surface".into(), "true".into());
        }
        if let Some(lanes) = tags.get("lanes").and_then(|v| v.parse::<u8>().ok()) {
            out.insert("lanes".into(), lanes.to_string());
        }
        if let Some(cl) = tags.get("cycleway") {
            let v = match cl.as_str() {
                "shared_lane" | "shared" => 1u8,
                "lane" => 2,
                "track" => 3,
                _ => 0,
            };
            if v > 0 {
                out.insert("cycle_lane".into(), v.to_string());
            }
        }

        // Names and signage pass through verbatim.
        for (tag, key) in [
            ("name", "name"),
            ("name:en", "name:en"),
            ("alt_name", "alt_name"),
            ("official_name", "official_name"),
            ("ref", "ref"),
            ("int_ref", "int_ref"),
            ("destination", "destination"),
            ("destination:ref", "destination:ref"),
            ("destination:ref:to", "destination:ref:to"),
            ("junction:ref", "junction_ref"),
        ] {
            if let Some(v) = tags.get(tag) {
                if !v.is_empty() {
                    out.insert(key.into(), v.clone());
                }
            }
        }

        out
    }

    fn classify_node(&self, tags: &Tags) -> Tags {
        let mut out = Tags::new();
        if tags.get("highway").map(|v| v.as_str()) == Some("motorway_junction") {
            if let Some(exit_to) = tags.get("exit_to") {
                out.insert("exit_to".into(), exit_to.clone());
            }
            if let Some(r) = tags.get("ref") {
                out.insert("ref".into(), r.clone());
            }
        }
        if tags.get("highway").map(|v| v.as_str()) == Some("traffic_signals") {
            out.insert("traffic_signal".into(), "true".into());
        }
        match tags.get("barrier").map(|v| v.as_str()) {
            Some("gate") | Some("lift_gate") => {
                out.insert("gate".into(), "true".into());
            }
            Some("bollard") => {
                out.insert("bollard".into(), "true".into());
            }
            _ => {}
        }
        out
    }
}

impl Default for RuleClassifier {
    fn default() -> Self {
        RuleClassifier::new()
    }
}

impl TagClassifier for RuleClassifier {
    fn classify(&self, kind: ElementKind, tags: &Tags) -> Tags {
        match kind {
            ElementKind::Way => self.classify_way(tags),
            ElementKind::Node => self.classify_node(tags),
        }
    }
}

/// Parse a maxspeed value into kph. Handles bare numbers, `kph`, and `mph`.
fn parse_maxspeed(value: &str) -> Option<f32> {
    let v = value.trim();
    if let Some(mph) = v.strip_suffix("mph") {
        return mph.trim().parse::<f32>().ok().map(|s| s * 1.609_344);
    }
    let v = v.strip_suffix("km/h").or_else(|| v.strip_suffix("kph")).unwrap_or(v);
    v.trim().parse::<f32>().ok().filter(|s| *s > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_untagged_way_is_rejected() {
        let c = RuleClassifier::new();
        let out = c.classify(ElementKind::Way, &tags(&[("building", "yes")]));
        assert!(out.is_empty());
    }

    #[test]
    fn test_motorway_is_auto_oneway() {
        let c = RuleClassifier::new();
        let out = c.classify(ElementKind::Way, &tags(&[("highway", "motorway")]));
        assert_eq!(out.get("road_class").unwrap(), "0");
        assert_eq!(out.get("auto_forward").unwrap(), "true");
        assert_eq!(out.get("auto_backward").unwrap(), "false");
        assert_eq!(out.get("oneway").unwrap(), "true");
        assert_eq!(out.get("pedestrian").unwrap(), "false");
        assert!(out.contains_key("default_speed"));
    }

    #[test]
    fn test_reverse_oneway_swaps_directions() {
        let c = RuleClassifier::new();
        let out = c.classify(
            ElementKind::Way,
            &tags(&[("highway", "residential"), ("oneway", "-1")]),
        );
        assert_eq!(out.get("auto_forward").unwrap(), "false");
        assert_eq!(out.get("auto_backward").unwrap(), "true");
    }

    #[test]
    fn test_tagged_maxspeed_beats_default() {
        let c = RuleClassifier::new();
        let out = c.classify(
            ElementKind::Way,
            &tags(&[("highway", "primary"), ("maxspeed", "70")]),
        );
        assert_eq!(out.get("speed").unwrap(), "70");
        assert!(!out.contains_key("default_speed"));
    }

    #[test]
    fn test_mph_maxspeed_converts() {
        assert!((parse_maxspeed("30 mph").unwrap() - 48.28).abs() < 0.01);
        assert_eq!(parse_maxspeed("50"), Some(50.0));
        assert_eq!(parse_maxspeed("none"), None);
    }

    #[test]
    fn test_motor_vehicle_destination_is_no_thru() {
        let c = RuleClassifier::new();
        let out = c.classify(
            ElementKind::Way,
            &tags(&[("highway", "residential"), ("motor_vehicle", "destination")]),
        );
        assert_eq!(out.get("no_thru_traffic").unwrap(), "true");
        // Access itself is untouched, and this is not the private case.
        assert_eq!(out.get("auto_forward").unwrap(), "true");
        assert!(!out.contains_key("private"));

        let out = c.classify(
            ElementKind::Way,
            &tags(&[("highway", "residential"), ("vehicle", "destination")]),
        );
        assert_eq!(out.get("no_thru_traffic").unwrap(), "true");
    }

    #[test]
    fn test_access_destination_is_private_not_no_thru() {
        let c = RuleClassifier::new();
        let out = c.classify(
            ElementKind::Way,
            &tags(&[("highway", "residential"), ("access", "destination")]),
        );
        assert_eq!(out.get("private").unwrap(), "true");
        assert!(!out.contains_key("no_thru_traffic"));
    }

    #[test]
    fn test_access_no_rejects_way() {
        let c = RuleClassifier::new();
        let out = c.classify(
            ElementKind::Way,
            &tags(&[("highway", "residential"), ("access", "no")]),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_footway_is_pedestrian_only() {
        let c = RuleClassifier::new();
        let out = c.classify(ElementKind::Way, &tags(&[("highway", "footway")]));
        assert_eq!(out.get("auto_forward").unwrap(), "false");
        assert_eq!(out.get("pedestrian").unwrap(), "true");
        assert_eq!(out.get("use").unwrap(), &(Use::Footway as u8).to_string());
    }

    #[test]
    fn test_node_junction_signage() {
        let c = RuleClassifier::new();
        let out = c.classify(
            ElementKind::Node,
            &tags(&[
                ("highway", "motorway_junction"),
                ("ref", "12"),
                ("exit_to", "Centrum"),
            ]),
        );
        assert_eq!(out.get("ref").unwrap(), "12");
        assert_eq!(out.get("exit_to").unwrap(), "Centrum");
    }

    #[test]
    fn test_plain_node_rejected() {
        let c = RuleClassifier::new();
        let out = c.classify(ElementKind::Node, &tags(&[("name", "somewhere")]));
        assert!(out.is_empty());
    }

    #[test]
    fn test_ferry_route_without_highway() {
        let c = RuleClassifier::new();
        let out = c.classify(ElementKind::Way, &tags(&[("route", "ferry")]));
        assert_eq!(out.get("ferry").unwrap(), "true");
        assert_eq!(out.get("auto_forward").unwrap(), "true");
    }
}
