//! Bit-packed in-tile directed edge record.
//!
//! 32 bytes: four little-endian u64 words. The bit budget is frozen; every
//! reader of the tile store depends on it.
//!
//! word0: end_node graph id (64 bits)
//! word1, low bits first:
//!   length_m:24 | speed_kph:8 | classification:3 | use:6 | forward:1 |
//!   opp_local_idx:7 | restrictions:8 | surface:3 | cycle_lane:2 |
//!   speed_type:1
//! word2, low bits first:
//!   edgeinfo_offset:25 | access_forward:12 | access_reverse:12 |
//!   bike_network:4 | lanes:4
//! word3, low bits first: one bit per flag in declaration order
//!   link, ferry, rail_ferry, toll, tunnel, bridge, roundabout, dest_only,
//!   traffic_signal, not_thru, shortcut, trans_up, trans_down, internal,
//!   country_crossing, exit_sign, truck_route
//!   then truck_speed_kph:8

use crate::attributes::{CycleLane, RoadClass, SpeedType, Surface, Use};
use crate::graph_id::GraphId;

pub const DIRECTED_EDGE_SIZE: usize = 32;

/// Sentinel for "no opposing edge found" (7-bit field, max value).
pub const NO_OPPOSING_EDGE: u32 = 127;

/// Maximum storable edge length in meters (24 bits).
pub const MAX_EDGE_LENGTH_M: u32 = (1 << 24) - 1;

// word1 shifts
const LENGTH_SHIFT: u32 = 0;
const SPEED_SHIFT: u32 = 24;
const CLASS_SHIFT: u32 = 32;
const USE_SHIFT: u32 = 35;
const FORWARD_SHIFT: u32 = 41;
const OPP_SHIFT: u32 = 42;
const RESTRICTIONS_SHIFT: u32 = 49;
const SURFACE_SHIFT: u32 = 57;
const CYCLE_LANE_SHIFT: u32 = 60;
const SPEED_TYPE_SHIFT: u32 = 62;

// word2 shifts
const EDGEINFO_SHIFT: u32 = 0;
const ACCESS_FWD_SHIFT: u32 = 25;
const ACCESS_REV_SHIFT: u32 = 37;
const BIKE_NET_SHIFT: u32 = 49;
const LANES_SHIFT: u32 = 53;

// word3 flag bits
const FLAG_LINK: u32 = 0;
const FLAG_FERRY: u32 = 1;
const FLAG_RAIL_FERRY: u32 = 2;
const FLAG_TOLL: u32 = 3;
const FLAG_TUNNEL: u32 = 4;
const FLAG_BRIDGE: u32 = 5;
const FLAG_ROUNDABOUT: u32 = 6;
const FLAG_DEST_ONLY: u32 = 7;
const FLAG_SIGNAL: u32 = 8;
const FLAG_NOT_THRU: u32 = 9;
const FLAG_SHORTCUT: u32 = 10;
const FLAG_TRANS_UP: u32 = 11;
const FLAG_TRANS_DOWN: u32 = 12;
const FLAG_INTERNAL: u32 = 13;
const FLAG_COUNTRY_CROSSING: u32 = 14;
const FLAG_EXIT_SIGN: u32 = 15;
const FLAG_TRUCK_ROUTE: u32 = 16;
const TRUCK_SPEED_SHIFT: u32 = 17;

/// Quantize a float length to the stored u24 meter count. Opposing-edge
/// matching compares these integers, so every caller must quantize the same
/// way.
pub fn quantized_length(meters: f64) -> u32 {
    (meters.round() as u64)
        .min(MAX_EDGE_LENGTH_M as u64)
        .max(1) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirectedEdge {
    w0: u64,
    w1: u64,
    w2: u64,
    w3: u64,
}

#[inline]
fn field(word: u64, shift: u32, bits: u32) -> u64 {
    (word >> shift) & ((1u64 << bits) - 1)
}

#[inline]
fn set_field(word: &mut u64, shift: u32, bits: u32, value: u64) {
    let mask = ((1u64 << bits) - 1) << shift;
    *word = (*word & !mask) | ((value << shift) & mask);
}

impl DirectedEdge {
    pub fn new() -> DirectedEdge {
        let mut e = DirectedEdge::default();
        e.set_opp_local_idx(NO_OPPOSING_EDGE);
        e
    }

    pub fn end_node(&self) -> GraphId {
        GraphId::from_value(self.w0)
    }

    pub fn set_end_node(&mut self, id: GraphId) {
        self.w0 = id.value();
    }

    /// Length in meters, quantized to a u24 at set time. Opposing-edge
    /// matching compares this integer, never the float it came from.
    pub fn length_m(&self) -> u32 {
        field(self.w1, LENGTH_SHIFT, 24) as u32
    }

    pub fn set_length(&mut self, meters: f64) {
        set_field(&mut self.w1, LENGTH_SHIFT, 24, quantized_length(meters) as u64);
    }

    pub fn speed_kph(&self) -> u8 {
        field(self.w1, SPEED_SHIFT, 8) as u8
    }

    pub fn set_speed_kph(&mut self, kph: f32) {
        set_field(&mut self.w1, SPEED_SHIFT, 8, kph.round().clamp(0.0, 255.0) as u64);
    }

    pub fn classification(&self) -> RoadClass {
        RoadClass::from_u8(field(self.w1, CLASS_SHIFT, 3) as u8)
    }

    pub fn set_classification(&mut self, rc: RoadClass) {
        set_field(&mut self.w1, CLASS_SHIFT, 3, rc as u64);
    }

    pub fn use_(&self) -> Use {
        Use::from_u8(field(self.w1, USE_SHIFT, 6) as u8)
    }

    pub fn set_use(&mut self, u: Use) {
        set_field(&mut self.w1, USE_SHIFT, 6, u as u64);
    }

    pub fn forward(&self) -> bool {
        field(self.w1, FORWARD_SHIFT, 1) != 0
    }

    pub fn set_forward(&mut self, f: bool) {
        set_field(&mut self.w1, FORWARD_SHIFT, 1, f as u64);
    }

    pub fn opp_local_idx(&self) -> u32 {
        field(self.w1, OPP_SHIFT, 7) as u32
    }

    pub fn set_opp_local_idx(&mut self, idx: u32) {
        set_field(&mut self.w1, OPP_SHIFT, 7, idx.min(NO_OPPOSING_EDGE) as u64);
    }

    pub fn restrictions(&self) -> u8 {
        field(self.w1, RESTRICTIONS_SHIFT, 8) as u8
    }

    pub fn set_restrictions(&mut self, r: u8) {
        set_field(&mut self.w1, RESTRICTIONS_SHIFT, 8, r as u64);
    }

    pub fn surface(&self) -> Surface {
        Surface::from_u8(field(self.w1, SURFACE_SHIFT, 3) as u8)
    }

    pub fn set_surface(&mut self, s: Surface) {
        set_field(&mut self.w1, SURFACE_SHIFT, 3, s as u64);
    }

    pub fn cycle_lane(&self) -> CycleLane {
        CycleLane::from_u8(field(self.w1, CYCLE_LANE_SHIFT, 2) as u8)
    }

    pub fn set_cycle_lane(&mut self, c: CycleLane) {
        set_field(&mut self.w1, CYCLE_LANE_SHIFT, 2, c as u64);
    }

    pub fn speed_type(&self) -> SpeedType {
        if field(self.w1, SPEED_TYPE_SHIFT, 1) != 0 {
            SpeedType::Tagged
        } else {
            SpeedType::Classified
        }
    }

    pub fn set_speed_type(&mut self, t: SpeedType) {
        set_field(&mut self.w1, SPEED_TYPE_SHIFT, 1, t as u64);
    }

    pub fn edgeinfo_offset(&self) -> u32 {
        field(self.w2, EDGEINFO_SHIFT, 25) as u32
    }

    pub fn set_edgeinfo_offset(&mut self, offset: u32) {
        debug_assert!(offset < (1 << 25));
        set_field(&mut self.w2, EDGEINFO_SHIFT, 25, offset as u64);
    }

    pub fn access_forward(&self) -> u16 {
        field(self.w2, ACCESS_FWD_SHIFT, 12) as u16
    }

    pub fn set_access_forward(&mut self, mask: u16) {
        set_field(&mut self.w2, ACCESS_FWD_SHIFT, 12, mask as u64);
    }

    pub fn access_reverse(&self) -> u16 {
        field(self.w2, ACCESS_REV_SHIFT, 12) as u16
    }

    pub fn set_access_reverse(&mut self, mask: u16) {
        set_field(&mut self.w2, ACCESS_REV_SHIFT, 12, mask as u64);
    }

    pub fn bike_network(&self) -> u8 {
        field(self.w2, BIKE_NET_SHIFT, 4) as u8
    }

    pub fn set_bike_network(&mut self, mask: u8) {
        set_field(&mut self.w2, BIKE_NET_SHIFT, 4, mask as u64);
    }

    pub fn lanes(&self) -> u8 {
        field(self.w2, LANES_SHIFT, 4) as u8
    }

    pub fn set_lanes(&mut self, lanes: u8) {
        set_field(&mut self.w2, LANES_SHIFT, 4, lanes.min(15) as u64);
    }

    fn flag(&self, bit: u32) -> bool {
        field(self.w3, bit, 1) != 0
    }

    fn set_flag(&mut self, bit: u32, on: bool) {
        set_field(&mut self.w3, bit, 1, on as u64);
    }

    pub fn link(&self) -> bool {
        self.flag(FLAG_LINK)
    }
    pub fn set_link(&mut self, v: bool) {
        self.set_flag(FLAG_LINK, v)
    }
    pub fn ferry(&self) -> bool {
        self.flag(FLAG_FERRY)
    }
    pub fn set_ferry(&mut self, v: bool) {
        self.set_flag(FLAG_FERRY, v)
    }
    pub fn rail_ferry(&self) -> bool {
        self.flag(FLAG_RAIL_FERRY)
    }
    pub fn set_rail_ferry(&mut self, v: bool) {
        self.set_flag(FLAG_RAIL_FERRY, v)
    }
    pub fn toll(&self) -> bool {
        self.flag(FLAG_TOLL)
    }
    pub fn set_toll(&mut self, v: bool) {
        self.set_flag(FLAG_TOLL, v)
    }
    pub fn tunnel(&self) -> bool {
        self.flag(FLAG_TUNNEL)
    }
    pub fn set_tunnel(&mut self, v: bool) {
        self.set_flag(FLAG_TUNNEL, v)
    }
    pub fn bridge(&self) -> bool {
        self.flag(FLAG_BRIDGE)
    }
    pub fn set_bridge(&mut self, v: bool) {
        self.set_flag(FLAG_BRIDGE, v)
    }
    pub fn roundabout(&self) -> bool {
        self.flag(FLAG_ROUNDABOUT)
    }
    pub fn set_roundabout(&mut self, v: bool) {
        self.set_flag(FLAG_ROUNDABOUT, v)
    }
    pub fn dest_only(&self) -> bool {
        self.flag(FLAG_DEST_ONLY)
    }
    pub fn set_dest_only(&mut self, v: bool) {
        self.set_flag(FLAG_DEST_ONLY, v)
    }
    pub fn traffic_signal(&self) -> bool {
        self.flag(FLAG_SIGNAL)
    }
    pub fn set_traffic_signal(&mut self, v: bool) {
        self.set_flag(FLAG_SIGNAL, v)
    }
    pub fn not_thru(&self) -> bool {
        self.flag(FLAG_NOT_THRU)
    }
    pub fn set_not_thru(&mut self, v: bool) {
        self.set_flag(FLAG_NOT_THRU, v)
    }
    pub fn shortcut(&self) -> bool {
        self.flag(FLAG_SHORTCUT)
    }
    pub fn set_shortcut(&mut self, v: bool) {
        self.set_flag(FLAG_SHORTCUT, v)
    }
    pub fn trans_up(&self) -> bool {
        self.flag(FLAG_TRANS_UP)
    }
    pub fn set_trans_up(&mut self, v: bool) {
        self.set_flag(FLAG_TRANS_UP, v)
    }
    pub fn trans_down(&self) -> bool {
        self.flag(FLAG_TRANS_DOWN)
    }
    pub fn set_trans_down(&mut self, v: bool) {
        self.set_flag(FLAG_TRANS_DOWN, v)
    }
    pub fn internal(&self) -> bool {
        self.flag(FLAG_INTERNAL)
    }
    pub fn set_internal(&mut self, v: bool) {
        self.set_flag(FLAG_INTERNAL, v)
    }
    pub fn country_crossing(&self) -> bool {
        self.flag(FLAG_COUNTRY_CROSSING)
    }
    pub fn set_country_crossing(&mut self, v: bool) {
        self.set_flag(FLAG_COUNTRY_CROSSING, v)
    }
    pub fn exit_sign(&self) -> bool {
        self.flag(FLAG_EXIT_SIGN)
    }
    pub fn set_exit_sign(&mut self, v: bool) {
        self.set_flag(FLAG_EXIT_SIGN, v)
    }
    pub fn truck_route(&self) -> bool {
        self.flag(FLAG_TRUCK_ROUTE)
    }
    pub fn set_truck_route(&mut self, v: bool) {
        self.set_flag(FLAG_TRUCK_ROUTE, v)
    }

    pub fn truck_speed_kph(&self) -> u8 {
        field(self.w3, TRUCK_SPEED_SHIFT, 8) as u8
    }

    pub fn set_truck_speed_kph(&mut self, kph: f32) {
        set_field(
            &mut self.w3,
            TRUCK_SPEED_SHIFT,
            8,
            kph.round().clamp(0.0, 255.0) as u64,
        );
    }

    pub fn to_bytes(&self) -> [u8; DIRECTED_EDGE_SIZE] {
        let mut buf = [0u8; DIRECTED_EDGE_SIZE];
        buf[0..8].copy_from_slice(&self.w0.to_le_bytes());
        buf[8..16].copy_from_slice(&self.w1.to_le_bytes());
        buf[16..24].copy_from_slice(&self.w2.to_le_bytes());
        buf[24..32].copy_from_slice(&self.w3.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> DirectedEdge {
        DirectedEdge {
            w0: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            w1: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            w2: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            w3: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::access;

    #[test]
    fn test_word1_fields_roundtrip() {
        let mut e = DirectedEdge::new();
        e.set_length(123_456.7);
        e.set_speed_kph(88.0);
        e.set_classification(RoadClass::Secondary);
        e.set_use(Use::Ferry);
        e.set_forward(true);
        e.set_opp_local_idx(5);
        e.set_restrictions(0xa5);
        e.set_surface(Surface::Gravel);
        e.set_cycle_lane(CycleLane::Dedicated);
        e.set_speed_type(SpeedType::Tagged);

        let d = DirectedEdge::from_bytes(&e.to_bytes());
        assert_eq!(d.length_m(), 123_457);
        assert_eq!(d.speed_kph(), 88);
        assert_eq!(d.classification(), RoadClass::Secondary);
        assert_eq!(d.use_(), Use::Ferry);
        assert!(d.forward());
        assert_eq!(d.opp_local_idx(), 5);
        assert_eq!(d.restrictions(), 0xa5);
        assert_eq!(d.surface(), Surface::Gravel);
        assert_eq!(d.cycle_lane(), CycleLane::Dedicated);
        assert_eq!(d.speed_type(), SpeedType::Tagged);
    }

    #[test]
    fn test_word2_fields_roundtrip() {
        let mut e = DirectedEdge::new();
        e.set_edgeinfo_offset((1 << 25) - 1);
        e.set_access_forward(access::AUTO | access::PEDESTRIAN);
        e.set_access_reverse(access::BICYCLE);
        e.set_bike_network(0xf);
        e.set_lanes(9);

        assert_eq!(e.edgeinfo_offset(), (1 << 25) - 1);
        assert_eq!(e.access_forward(), access::AUTO | access::PEDESTRIAN);
        assert_eq!(e.access_reverse(), access::BICYCLE);
        assert_eq!(e.bike_network(), 0xf);
        assert_eq!(e.lanes(), 9);
    }

    #[test]
    fn test_flags_do_not_bleed() {
        let mut e = DirectedEdge::new();
        e.set_not_thru(true);
        e.set_country_crossing(true);
        e.set_truck_speed_kph(90.0);
        assert!(e.not_thru());
        assert!(e.country_crossing());
        assert!(!e.shortcut());
        assert!(!e.ferry());
        assert_eq!(e.truck_speed_kph(), 90);
        e.set_not_thru(false);
        assert!(!e.not_thru());
        assert!(e.country_crossing());
        assert_eq!(e.truck_speed_kph(), 90);
    }

    #[test]
    fn test_new_edge_has_no_opposing() {
        let e = DirectedEdge::new();
        assert_eq!(e.opp_local_idx(), NO_OPPOSING_EDGE);
    }

    #[test]
    fn test_length_quantization_bounds() {
        let mut e = DirectedEdge::new();
        e.set_length(0.2);
        assert_eq!(e.length_m(), 1);
        e.set_length(1e9);
        assert_eq!(e.length_m(), MAX_EDGE_LENGTH_M);
    }

    #[test]
    fn test_end_node_roundtrip() {
        let mut e = DirectedEdge::new();
        let id = GraphId::new(1234, 2, 99);
        e.set_end_node(id);
        assert_eq!(DirectedEdge::from_bytes(&e.to_bytes()).end_node(), id);
    }
}
