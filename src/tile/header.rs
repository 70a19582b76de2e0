//! Fixed-width tile file header and the admin table record.
//!
//! Header, 128 bytes little-endian:
//!   magic:            u32  "TILE"
//!   version:          u16
//!   reserved:         u16
//!   graph_id:         u64  tile base id
//!   node_count:       u32
//!   edge_count:       u32
//!   sign_count:       u32
//!   admin_count:      u32
//!   nodes_offset:     u32  absolute byte offsets from file start
//!   edges_offset:     u32
//!   signs_offset:     u32
//!   admins_offset:    u32
//!   edgeinfo_offset:  u32
//!   names_offset:     u32
//!   edgeinfo_size:    u32
//!   names_size:       u32
//!   base_lat_fxp:     i32  tile south-west corner, 1e-7 degrees
//!   base_lon_fxp:     i32
//!   bbox_min_lat:     i32  bounds of the tile's node coordinates
//!   bbox_min_lon:     i32
//!   bbox_max_lat:     i32
//!   bbox_max_lon:     i32
//!   tile_size_fxp:    u32  grid tile side, 1e-7 degrees
//!   reserved2:        [36]u8
//!
//! The file ends with a 16-byte footer: body crc64, file crc64. Headers
//! carry no timestamps: tile bytes must be identical across runs.

use anyhow::{bail, Result};

use crate::graph_id::GraphId;

pub const TILE_MAGIC: u32 = 0x454C_4954; // "TILE"
pub const TILE_VERSION: u16 = 1;
pub const TILE_HEADER_SIZE: usize = 128;
pub const TILE_FOOTER_SIZE: usize = 16;

pub const ADMIN_SIZE: usize = 4;

/// An administrative region entry. Index 0 is always the empty admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admin {
    pub country_iso: [u8; 2],
}

impl Admin {
    pub fn empty() -> Admin {
        Admin {
            country_iso: [0, 0],
        }
    }

    pub fn new(iso: &str) -> Admin {
        let bytes = iso.as_bytes();
        let mut country_iso = [0u8; 2];
        for (i, b) in bytes.iter().take(2).enumerate() {
            country_iso[i] = *b;
        }
        Admin { country_iso }
    }

    pub fn iso(&self) -> &str {
        if self.country_iso[0] == 0 {
            return "";
        }
        std::str::from_utf8(&self.country_iso).unwrap_or("")
    }

    pub fn to_bytes(&self) -> [u8; ADMIN_SIZE] {
        [self.country_iso[0], self.country_iso[1], 0, 0]
    }

    pub fn from_bytes(buf: &[u8]) -> Admin {
        Admin {
            country_iso: [buf[0], buf[1]],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TileHeader {
    pub graph_id: u64,
    pub node_count: u32,
    pub edge_count: u32,
    pub sign_count: u32,
    pub admin_count: u32,
    pub nodes_offset: u32,
    pub edges_offset: u32,
    pub signs_offset: u32,
    pub admins_offset: u32,
    pub edgeinfo_offset: u32,
    pub names_offset: u32,
    pub edgeinfo_size: u32,
    pub names_size: u32,
    pub base_lat_fxp: i32,
    pub base_lon_fxp: i32,
    pub bbox_min_lat: i32,
    pub bbox_min_lon: i32,
    pub bbox_max_lat: i32,
    pub bbox_max_lon: i32,
    pub tile_size_fxp: u32,
}

impl TileHeader {
    pub fn tile_base(&self) -> GraphId {
        GraphId::from_value(self.graph_id)
    }

    pub fn to_bytes(&self) -> [u8; TILE_HEADER_SIZE] {
        let mut buf = [0u8; TILE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&TILE_MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&TILE_VERSION.to_le_bytes());
        buf[8..16].copy_from_slice(&self.graph_id.to_le_bytes());
        buf[16..20].copy_from_slice(&self.node_count.to_le_bytes());
        buf[20..24].copy_from_slice(&self.edge_count.to_le_bytes());
        buf[24..28].copy_from_slice(&self.sign_count.to_le_bytes());
        buf[28..32].copy_from_slice(&self.admin_count.to_le_bytes());
        buf[32..36].copy_from_slice(&self.nodes_offset.to_le_bytes());
        buf[36..40].copy_from_slice(&self.edges_offset.to_le_bytes());
        buf[40..44].copy_from_slice(&self.signs_offset.to_le_bytes());
        buf[44..48].copy_from_slice(&self.admins_offset.to_le_bytes());
        buf[48..52].copy_from_slice(&self.edgeinfo_offset.to_le_bytes());
        buf[52..56].copy_from_slice(&self.names_offset.to_le_bytes());
        buf[56..60].copy_from_slice(&self.edgeinfo_size.to_le_bytes());
        buf[60..64].copy_from_slice(&self.names_size.to_le_bytes());
        buf[64..68].copy_from_slice(&self.base_lat_fxp.to_le_bytes());
        buf[68..72].copy_from_slice(&self.base_lon_fxp.to_le_bytes());
        buf[72..76].copy_from_slice(&self.bbox_min_lat.to_le_bytes());
        buf[76..80].copy_from_slice(&self.bbox_min_lon.to_le_bytes());
        buf[80..84].copy_from_slice(&self.bbox_max_lat.to_le_bytes());
        buf[84..88].copy_from_slice(&self.bbox_max_lon.to_le_bytes());
        buf[88..92].copy_from_slice(&self.tile_size_fxp.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<TileHeader> {
        if buf.len() < TILE_HEADER_SIZE {
            bail!("tile header truncated: {} bytes", buf.len());
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != TILE_MAGIC {
            bail!("not a tile file: bad magic {:#010x}", magic);
        }
        let version = u16::from_le_bytes(buf[4..6].try_into().unwrap());
        if version != TILE_VERSION {
            bail!(
                "tile version mismatch: file has {}, reader supports {}",
                version,
                TILE_VERSION
            );
        }
        Ok(TileHeader {
            graph_id: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            node_count: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            edge_count: u32::from_le_bytes(buf[20..24].try_into().unwrap()),
            sign_count: u32::from_le_bytes(buf[24..28].try_into().unwrap()),
            admin_count: u32::from_le_bytes(buf[28..32].try_into().unwrap()),
            nodes_offset: u32::from_le_bytes(buf[32..36].try_into().unwrap()),
            edges_offset: u32::from_le_bytes(buf[36..40].try_into().unwrap()),
            signs_offset: u32::from_le_bytes(buf[40..44].try_into().unwrap()),
            admins_offset: u32::from_le_bytes(buf[44..48].try_into().unwrap()),
            edgeinfo_offset: u32::from_le_bytes(buf[48..52].try_into().unwrap()),
            names_offset: u32::from_le_bytes(buf[52..56].try_into().unwrap()),
            edgeinfo_size: u32::from_le_bytes(buf[56..60].try_into().unwrap()),
            names_size: u32::from_le_bytes(buf[60..64].try_into().unwrap()),
            base_lat_fxp: i32::from_le_bytes(buf[64..68].try_into().unwrap()),
            base_lon_fxp: i32::from_le_bytes(buf[68..72].try_into().unwrap()),
            bbox_min_lat: i32::from_le_bytes(buf[72..76].try_into().unwrap()),
            bbox_min_lon: i32::from_le_bytes(buf[76..80].try_into().unwrap()),
            bbox_max_lat: i32::from_le_bytes(buf[80..84].try_into().unwrap()),
            bbox_max_lon: i32::from_le_bytes(buf[84..88].try_into().unwrap()),
            tile_size_fxp: u32::from_le_bytes(buf[88..92].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = TileHeader {
            graph_id: GraphId::new(756_425, 2, 0).value(),
            node_count: 10,
            edge_count: 24,
            sign_count: 3,
            admin_count: 1,
            nodes_offset: 128,
            edges_offset: 368,
            signs_offset: 1_136,
            admins_offset: 1_160,
            edgeinfo_offset: 1_164,
            names_offset: 2_000,
            edgeinfo_size: 836,
            names_size: 99,
            base_lat_fxp: 520_000_000,
            base_lon_fxp: 42_500_000,
            bbox_min_lat: 520_100_000,
            bbox_min_lon: 42_600_000,
            bbox_max_lat: 521_000_000,
            bbox_max_lon: 43_000_000,
            tile_size_fxp: 2_500_000,
        };
        let decoded = TileHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.tile_base(), GraphId::new(756_425, 2, 0));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = TileHeader::default().to_bytes();
        buf[0] = 0xff;
        assert!(TileHeader::from_bytes(&buf).is_err());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut buf = TileHeader::default().to_bytes();
        buf[4] = 0x7f;
        let err = TileHeader::from_bytes(&buf).unwrap_err();
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_admin_iso() {
        assert_eq!(Admin::empty().iso(), "");
        assert_eq!(Admin::new("NL").iso(), "NL");
        let decoded = Admin::from_bytes(&Admin::new("BE").to_bytes());
        assert_eq!(decoded.iso(), "BE");
    }
}
