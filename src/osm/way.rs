//! In-memory record for a routable OSM way, as emitted by the tag classifier.

use crate::attributes::{CycleLane, RoadClass, Surface, Use};

/// A way that survived tag classification. One record per routable way,
/// appended in parse order; the index into the way table is the way's
/// identity for edge construction.
#[derive(Debug, Clone)]
pub struct OsmWay {
    pub osm_id: u64,
    pub refs: Vec<u64>,

    pub road_class: RoadClass,
    pub use_: Use,
    pub speed_kph: f32,
    pub truck_speed_kph: f32,
    pub tagged_speed: bool,
    pub lanes: u8,

    pub oneway: bool,
    pub roundabout: bool,
    pub link: bool,
    pub ferry: bool,
    pub rail: bool,
    pub unpaved: bool,
    pub tunnel: bool,
    pub bridge: bool,
    pub toll: bool,
    pub destination_only: bool,
    pub no_thru_traffic: bool,
    pub traffic_signal: bool,
    pub truck_route: bool,
    pub cycle_lane: CycleLane,

    pub auto_forward: bool,
    pub auto_backward: bool,
    pub truck_forward: bool,
    pub truck_backward: bool,
    pub bus_forward: bool,
    pub bus_backward: bool,
    pub bike_forward: bool,
    pub bike_backward: bool,
    pub emergency_forward: bool,
    pub emergency_backward: bool,
    pub pedestrian: bool,

    pub bike_network: u8,

    pub name: String,
    pub name_en: String,
    pub alt_name: String,
    pub official_name: String,
    pub ref_: String,
    pub int_ref: String,
    pub destination: String,
    pub destination_ref: String,
    pub destination_ref_to: String,
    pub junction_ref: String,
    pub bike_national_ref: String,
    pub bike_regional_ref: String,
    pub bike_local_ref: String,
}

impl Default for OsmWay {
    fn default() -> OsmWay {
        OsmWay {
            osm_id: 0,
            refs: Vec::new(),
            road_class: RoadClass::Other,
            use_: Use::Road,
            speed_kph: 0.0,
            truck_speed_kph: 0.0,
            tagged_speed: false,
            lanes: 0,
            oneway: false,
            roundabout: false,
            link: false,
            ferry: false,
            rail: false,
            unpaved: false,
            tunnel: false,
            bridge: false,
            toll: false,
            destination_only: false,
            no_thru_traffic: false,
            traffic_signal: false,
            truck_route: false,
            cycle_lane: CycleLane::None,
            auto_forward: false,
            auto_backward: false,
            truck_forward: false,
            truck_backward: false,
            bus_forward: false,
            bus_backward: false,
            bike_forward: false,
            bike_backward: false,
            emergency_forward: false,
            emergency_backward: false,
            pedestrian: false,
            bike_network: 0,
            name: String::new(),
            name_en: String::new(),
            alt_name: String::new(),
            official_name: String::new(),
            ref_: String::new(),
            int_ref: String::new(),
            destination: String::new(),
            destination_ref: String::new(),
            destination_ref_to: String::new(),
            junction_ref: String::new(),
            bike_national_ref: String::new(),
            bike_regional_ref: String::new(),
            bike_local_ref: String::new(),
        }
    }
}

impl OsmWay {
    pub fn new(osm_id: u64, refs: Vec<u64>) -> OsmWay {
        OsmWay {
            osm_id,
            refs,
            ..Default::default()
        }
    }

    /// True when any travel mode can use the way in some direction.
    pub fn has_any_access(&self) -> bool {
        self.auto_forward
            || self.auto_backward
            || self.truck_forward
            || self.truck_backward
            || self.bus_forward
            || self.bus_backward
            || self.bike_forward
            || self.bike_backward
            || self.emergency_forward
            || self.emergency_backward
            || self.pedestrian
    }

    /// Names attached to edge info records, in a fixed order.
    pub fn route_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for n in [
            self.ref_.as_str(),
            self.int_ref.as_str(),
            self.name.as_str(),
            self.name_en.as_str(),
            self.alt_name.as_str(),
            self.official_name.as_str(),
        ] {
            if !n.is_empty() {
                names.push(n);
            }
        }
        names
    }

    /// The effective use after ferry/rail overrides.
    pub fn effective_use(&self) -> Use {
        if self.rail {
            Use::RailFerry
        } else if self.ferry {
            Use::Ferry
        } else {
            self.use_
        }
    }

    pub fn effective_surface(&self) -> Surface {
        if self.unpaved {
            Surface::Gravel
        } else {
            Surface::Paved
        }
    }
}
