//! Bit-per-id membership table over OSM node ids.
//!
//! One bit per possible id up to a hard maximum, so a planet-scale id space
//! (4e9 ids) costs 500 MB per table. No resize: exceeding the maximum is an
//! error surfaced to the caller.

use anyhow::{bail, Result};

/// Default hard upper bound on OSM node ids.
pub const MAX_OSM_NODE_ID: u64 = 4_000_000_000;

pub struct OsmIdTable {
    max_id: u64,
    words: Vec<u64>,
}

impl OsmIdTable {
    pub fn new(max_id: u64) -> OsmIdTable {
        OsmIdTable {
            max_id,
            words: vec![0u64; (max_id / 64 + 1) as usize],
        }
    }

    /// Mark an id as present. Fails when the id exceeds the declared maximum.
    pub fn set(&mut self, id: u64) -> Result<()> {
        if id > self.max_id {
            bail!(
                "osm id {} exceeds the id table maximum {}",
                id,
                self.max_id
            );
        }
        self.words[(id / 64) as usize] |= 1u64 << (id % 64);
        Ok(())
    }

    pub fn is_set(&self, id: u64) -> bool {
        if id > self.max_id {
            return false;
        }
        self.words[(id / 64) as usize] & (1u64 << (id % 64)) != 0
    }
}
