//! Fixed-width in-tile node record.
//!
//! 24 bytes, little-endian:
//!   lat_fxp:    i32   (1e-7 degrees)
//!   lon_fxp:    i32
//!   edge_index: u32   first directed edge of this node within the tile
//!   packed0:    u32   edge_count:7 | best_road_class:3 | admin_index:12 |
//!                     timezone_index:9 | mode_change:1
//!   packed1:    u32   access_mask:12 | node_type:4 | traffic_signal:1
//!   stop_id:    u32   0xFFFF_FFFF when not a transit stop

use crate::attributes::{NodeType, RoadClass};
use crate::geo::PointLL;

pub const NODE_INFO_SIZE: usize = 24;

/// Largest representable per-node edge count (7 bits).
pub const MAX_EDGES_PER_NODE: u32 = 127;

pub const NO_STOP_ID: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeInfo {
    pub lat_fxp: i32,
    pub lon_fxp: i32,
    pub edge_index: u32,
    packed0: u32,
    packed1: u32,
    pub stop_id: u32,
}

impl NodeInfo {
    pub fn new(latlng: PointLL) -> NodeInfo {
        NodeInfo {
            lat_fxp: latlng.lat_fxp(),
            lon_fxp: latlng.lon_fxp(),
            edge_index: 0,
            packed0: (RoadClass::Other as u32) << 7,
            packed1: 0,
            stop_id: NO_STOP_ID,
        }
    }

    pub fn latlng(&self) -> PointLL {
        PointLL::from_fxp(self.lat_fxp, self.lon_fxp)
    }

    pub fn edge_count(&self) -> u32 {
        self.packed0 & 0x7f
    }

    pub fn set_edge_count(&mut self, count: u32) {
        debug_assert!(count <= MAX_EDGES_PER_NODE);
        self.packed0 = (self.packed0 & !0x7f) | (count & 0x7f);
    }

    pub fn best_road_class(&self) -> RoadClass {
        RoadClass::from_u8(((self.packed0 >> 7) & 0x7) as u8)
    }

    pub fn set_best_road_class(&mut self, rc: RoadClass) {
        self.packed0 = (self.packed0 & !(0x7 << 7)) | (((rc as u32) & 0x7) << 7);
    }

    pub fn admin_index(&self) -> u32 {
        (self.packed0 >> 10) & 0xfff
    }

    pub fn set_admin_index(&mut self, idx: u32) {
        debug_assert!(idx < (1 << 12));
        self.packed0 = (self.packed0 & !(0xfff << 10)) | ((idx & 0xfff) << 10);
    }

    pub fn timezone_index(&self) -> u32 {
        (self.packed0 >> 22) & 0x1ff
    }

    pub fn set_timezone_index(&mut self, idx: u32) {
        debug_assert!(idx < (1 << 9));
        self.packed0 = (self.packed0 & !(0x1ff << 22)) | ((idx & 0x1ff) << 22);
    }

    pub fn mode_change(&self) -> bool {
        self.packed0 >> 31 != 0
    }

    pub fn set_mode_change(&mut self, on: bool) {
        self.packed0 = (self.packed0 & !(1 << 31)) | ((on as u32) << 31);
    }

    pub fn access_mask(&self) -> u16 {
        (self.packed1 & 0xfff) as u16
    }

    pub fn set_access_mask(&mut self, mask: u16) {
        self.packed1 = (self.packed1 & !0xfff) | (mask as u32 & 0xfff);
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::from_u8(((self.packed1 >> 12) & 0xf) as u8)
    }

    pub fn set_node_type(&mut self, t: NodeType) {
        self.packed1 = (self.packed1 & !(0xf << 12)) | (((t as u32) & 0xf) << 12);
    }

    pub fn traffic_signal(&self) -> bool {
        (self.packed1 >> 16) & 1 != 0
    }

    pub fn set_traffic_signal(&mut self, on: bool) {
        self.packed1 = (self.packed1 & !(1 << 16)) | ((on as u32) << 16);
    }

    pub fn to_bytes(&self) -> [u8; NODE_INFO_SIZE] {
        let mut buf = [0u8; NODE_INFO_SIZE];
        buf[0..4].copy_from_slice(&self.lat_fxp.to_le_bytes());
        buf[4..8].copy_from_slice(&self.lon_fxp.to_le_bytes());
        buf[8..12].copy_from_slice(&self.edge_index.to_le_bytes());
        buf[12..16].copy_from_slice(&self.packed0.to_le_bytes());
        buf[16..20].copy_from_slice(&self.packed1.to_le_bytes());
        buf[20..24].copy_from_slice(&self.stop_id.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> NodeInfo {
        NodeInfo {
            lat_fxp: i32::from_le_bytes(buf[0..4].try_into().unwrap()),
            lon_fxp: i32::from_le_bytes(buf[4..8].try_into().unwrap()),
            edge_index: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            packed0: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            packed1: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            stop_id: u32::from_le_bytes(buf[20..24].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_roundtrip() {
        let mut n = NodeInfo::new(PointLL::new(51.5, -0.12));
        n.edge_index = 42;
        n.set_edge_count(5);
        n.set_best_road_class(RoadClass::Primary);
        n.set_admin_index(17);
        n.set_timezone_index(300);
        n.set_mode_change(true);
        n.set_access_mask(0xabc);
        n.set_node_type(NodeType::Gate);
        n.set_traffic_signal(true);

        let decoded = NodeInfo::from_bytes(&n.to_bytes());
        assert_eq!(decoded.edge_index, 42);
        assert_eq!(decoded.edge_count(), 5);
        assert_eq!(decoded.best_road_class(), RoadClass::Primary);
        assert_eq!(decoded.admin_index(), 17);
        assert_eq!(decoded.timezone_index(), 300);
        assert!(decoded.mode_change());
        assert_eq!(decoded.access_mask(), 0xabc);
        assert_eq!(decoded.node_type(), NodeType::Gate);
        assert!(decoded.traffic_signal());
        assert_eq!(decoded.stop_id, NO_STOP_ID);
    }

    #[test]
    fn test_fields_do_not_bleed() {
        let mut n = NodeInfo::new(PointLL::new(0.0, 0.0));
        n.set_edge_count(MAX_EDGES_PER_NODE);
        n.set_admin_index(0);
        assert_eq!(n.edge_count(), MAX_EDGES_PER_NODE);
        assert_eq!(n.admin_index(), 0);
        n.set_admin_index(0xfff);
        assert_eq!(n.edge_count(), MAX_EDGES_PER_NODE);
        assert_eq!(n.admin_index(), 0xfff);
        assert_eq!(n.timezone_index(), 0);
    }

    #[test]
    fn test_latlng_roundtrip() {
        let p = PointLL::new(48.8566, 2.3522);
        let n = NodeInfo::new(p);
        let q = n.latlng();
        assert!((p.lat - q.lat).abs() < 1e-5);
        assert!((p.lon - q.lon).abs() < 1e-5);
    }
}
