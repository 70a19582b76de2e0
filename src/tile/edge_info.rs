//! Variable-width shared edge info records: way id, shape, name offsets.
//!
//! Record layout, little-endian:
//!   way_id:       u64
//!   name_count:   u16
//!   shape_count:  u16
//!   reserved:     u32
//!   name_offsets: [u32; name_count]   offsets into the tile name blob
//!   shape:        [(lat_fxp: i32, lon_fxp: i32); shape_count]
//!
//! Two directed edges between the same node pair along the same shape share
//! one record; the canonical dedup key is (min osm id, max osm id, crc64 of
//! the fixed-point shape bytes).

use std::collections::HashMap;

use crc::{Crc, CRC_64_ECMA_182};

use crate::geo::PointLL;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

pub const EDGE_INFO_FIXED_SIZE: usize = 16;

#[derive(Debug, Clone)]
pub struct EdgeInfo {
    pub way_id: u64,
    pub name_offsets: Vec<u32>,
    pub shape: Vec<PointLL>,
}

impl EdgeInfo {
    pub fn encoded_size(&self) -> usize {
        EDGE_INFO_FIXED_SIZE + self.name_offsets.len() * 4 + self.shape.len() * 8
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.way_id.to_le_bytes());
        out.extend_from_slice(&(self.name_offsets.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.shape.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        for offset in &self.name_offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        for p in &self.shape {
            out.extend_from_slice(&p.lat_fxp().to_le_bytes());
            out.extend_from_slice(&p.lon_fxp().to_le_bytes());
        }
    }

    /// Decode a record starting at `offset` within an edge info blob.
    pub fn decode(blob: &[u8], offset: u32) -> Option<EdgeInfo> {
        let start = offset as usize;
        let fixed = blob.get(start..start + EDGE_INFO_FIXED_SIZE)?;
        let way_id = u64::from_le_bytes(fixed[0..8].try_into().ok()?);
        let name_count = u16::from_le_bytes(fixed[8..10].try_into().ok()?) as usize;
        let shape_count = u16::from_le_bytes(fixed[10..12].try_into().ok()?) as usize;

        let mut at = start + EDGE_INFO_FIXED_SIZE;
        let mut name_offsets = Vec::with_capacity(name_count);
        for _ in 0..name_count {
            let b = blob.get(at..at + 4)?;
            name_offsets.push(u32::from_le_bytes(b.try_into().ok()?));
            at += 4;
        }
        let mut shape = Vec::with_capacity(shape_count);
        for _ in 0..shape_count {
            let b = blob.get(at..at + 8)?;
            let lat = i32::from_le_bytes(b[0..4].try_into().ok()?);
            let lon = i32::from_le_bytes(b[4..8].try_into().ok()?);
            shape.push(PointLL::from_fxp(lat, lon));
            at += 8;
        }

        Some(EdgeInfo {
            way_id,
            name_offsets,
            shape,
        })
    }
}

/// Deterministic hash of a shape's fixed-point coordinates.
pub fn shape_hash(shape: &[PointLL]) -> u64 {
    let mut digest = CRC64.digest();
    for p in shape {
        digest.update(&p.lat_fxp().to_le_bytes());
        digest.update(&p.lon_fxp().to_le_bytes());
    }
    digest.finalize()
}

/// Per-tile edge info blob under construction, deduplicating by canonical
/// key. Offsets into the blob are stable once handed out.
pub struct EdgeInfoStore {
    blob: Vec<u8>,
    offsets: HashMap<(u64, u64, u64), u32>,
}

impl EdgeInfoStore {
    pub fn new() -> EdgeInfoStore {
        EdgeInfoStore {
            blob: Vec::new(),
            offsets: HashMap::new(),
        }
    }

    /// Rebuild a store around an existing blob (tile rewrite path).
    pub fn from_blob(blob: Vec<u8>) -> EdgeInfoStore {
        EdgeInfoStore {
            blob,
            offsets: HashMap::new(),
        }
    }

    /// Look up or append the record for the edge between `node_a` and
    /// `node_b` (OSM ids, unordered) with the given shape.
    pub fn add(&mut self, node_a: u64, node_b: u64, info: &EdgeInfo) -> u32 {
        let key = (
            node_a.min(node_b),
            node_a.max(node_b),
            shape_hash(&info.shape),
        );
        if let Some(&offset) = self.offsets.get(&key) {
            return offset;
        }
        let offset = self.blob.len() as u32;
        info.encode_into(&mut self.blob);
        self.offsets.insert(key, offset);
        offset
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn len_bytes(&self) -> usize {
        self.blob.len()
    }
}

impl Default for EdgeInfoStore {
    fn default() -> Self {
        EdgeInfoStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> Vec<PointLL> {
        vec![PointLL::new(50.0, 4.0), PointLL::new(50.001, 4.001)]
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let info = EdgeInfo {
            way_id: 368_034,
            name_offsets: vec![0, 14],
            shape: shape(),
        };
        let mut blob = Vec::new();
        info.encode_into(&mut blob);
        assert_eq!(blob.len(), info.encoded_size());

        let decoded = EdgeInfo::decode(&blob, 0).unwrap();
        assert_eq!(decoded.way_id, 368_034);
        assert_eq!(decoded.name_offsets, vec![0, 14]);
        assert_eq!(decoded.shape.len(), 2);
        assert!((decoded.shape[0].lat - 50.0).abs() < 1e-5);
    }

    #[test]
    fn test_store_dedup_same_pair_same_shape() {
        let mut store = EdgeInfoStore::new();
        let info = EdgeInfo {
            way_id: 7,
            name_offsets: vec![],
            shape: shape(),
        };
        let a = store.add(10, 20, &info);
        // Opposite orientation hits the same record.
        let b = store.add(20, 10, &info);
        assert_eq!(a, b);
        assert_eq!(store.len_bytes(), info.encoded_size());
    }

    #[test]
    fn test_store_different_shape_new_record() {
        let mut store = EdgeInfoStore::new();
        let info = EdgeInfo {
            way_id: 7,
            name_offsets: vec![],
            shape: shape(),
        };
        let mut other = info.clone();
        other.shape.push(PointLL::new(50.002, 4.002));
        let a = store.add(10, 20, &info);
        let b = store.add(10, 20, &other);
        assert_ne!(a, b);
    }

    #[test]
    fn test_shape_hash_is_stable() {
        assert_eq!(shape_hash(&shape()), shape_hash(&shape()));
        let reversed: Vec<PointLL> = shape().into_iter().rev().collect();
        assert_ne!(shape_hash(&shape()), shape_hash(&reversed));
    }

    #[test]
    fn test_decode_bad_offset() {
        assert!(EdgeInfo::decode(&[0u8; 4], 0).is_none());
    }
}
