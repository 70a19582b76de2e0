//! Shared routing attribute enums and access masks.
//!
//! These values are frozen into the tile byte layout (see `tile::directed_edge`),
//! so variants must never be reordered or renumbered.

/// Road classification, most important first. Stored in 3 bits.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoadClass {
    Motorway = 0,
    Trunk = 1,
    Primary = 2,
    Secondary = 3,
    TertiaryUnclassified = 4,
    Residential = 5,
    Service = 6,
    Other = 7,
}

impl RoadClass {
    pub fn from_u8(v: u8) -> RoadClass {
        match v {
            0 => RoadClass::Motorway,
            1 => RoadClass::Trunk,
            2 => RoadClass::Primary,
            3 => RoadClass::Secondary,
            4 => RoadClass::TertiaryUnclassified,
            5 => RoadClass::Residential,
            6 => RoadClass::Service,
            _ => RoadClass::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RoadClass::Motorway => "motorway",
            RoadClass::Trunk => "trunk",
            RoadClass::Primary => "primary",
            RoadClass::Secondary => "secondary",
            RoadClass::TertiaryUnclassified => "tertiary_unclassified",
            RoadClass::Residential => "residential",
            RoadClass::Service => "service",
            RoadClass::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Option<RoadClass> {
        Some(match name {
            "motorway" => RoadClass::Motorway,
            "trunk" => RoadClass::Trunk,
            "primary" => RoadClass::Primary,
            "secondary" => RoadClass::Secondary,
            "tertiary_unclassified" | "tertiary" | "unclassified" => {
                RoadClass::TertiaryUnclassified
            }
            "residential" => RoadClass::Residential,
            "service" => RoadClass::Service,
            "other" => RoadClass::Other,
            _ => return None,
        })
    }

    pub fn all() -> &'static [RoadClass] {
        &[
            RoadClass::Motorway,
            RoadClass::Trunk,
            RoadClass::Primary,
            RoadClass::Secondary,
            RoadClass::TertiaryUnclassified,
            RoadClass::Residential,
            RoadClass::Service,
            RoadClass::Other,
        ]
    }
}

/// Functional use of an edge. Stored in 6 bits. Values at or above
/// `Use::Rail` are transit-like and are not required to have opposing edges.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Use {
    Road = 0,
    Cycleway = 1,
    Footway = 2,
    Steps = 3,
    ParkingAisle = 4,
    Driveway = 5,
    Alley = 6,
    EmergencyAccess = 7,
    DriveThru = 8,
    Ferry = 9,
    RailFerry = 10,
    Other = 11,
    Rail = 48,
    Transit = 49,
    TransitConnection = 50,
}

impl Use {
    pub fn from_u8(v: u8) -> Use {
        match v {
            0 => Use::Road,
            1 => Use::Cycleway,
            2 => Use::Footway,
            3 => Use::Steps,
            4 => Use::ParkingAisle,
            5 => Use::Driveway,
            6 => Use::Alley,
            7 => Use::EmergencyAccess,
            8 => Use::DriveThru,
            9 => Use::Ferry,
            10 => Use::RailFerry,
            48 => Use::Rail,
            49 => Use::Transit,
            50 => Use::TransitConnection,
            _ => Use::Other,
        }
    }

    /// Transit-like edges may legitimately lack an opposing directed edge.
    pub fn is_transit(&self) -> bool {
        *self >= Use::Rail
    }
}

/// Surface type. Stored in 3 bits.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Surface {
    PavedSmooth = 0,
    Paved = 1,
    PavedRough = 2,
    Compacted = 3,
    Dirt = 4,
    Gravel = 5,
    Path = 6,
    Impassable = 7,
}

impl Surface {
    pub fn from_u8(v: u8) -> Surface {
        match v {
            0 => Surface::PavedSmooth,
            1 => Surface::Paved,
            2 => Surface::PavedRough,
            3 => Surface::Compacted,
            4 => Surface::Dirt,
            5 => Surface::Gravel,
            6 => Surface::Path,
            _ => Surface::Impassable,
        }
    }
}

/// Cycle lane presence. Stored in 2 bits.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleLane {
    None = 0,
    Shared = 1,
    Dedicated = 2,
    Separated = 3,
}

impl CycleLane {
    pub fn from_u8(v: u8) -> CycleLane {
        match v {
            1 => CycleLane::Shared,
            2 => CycleLane::Dedicated,
            3 => CycleLane::Separated,
            _ => CycleLane::None,
        }
    }
}

/// Whether the stored speed came from a tagged maxspeed or a class default.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedType {
    Classified = 0,
    Tagged = 1,
}

/// Node type. Stored in 4 bits.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    StreetIntersection = 0,
    Gate = 1,
    Bollard = 2,
    TransitStop = 3,
}

impl NodeType {
    pub fn from_u8(v: u8) -> NodeType {
        match v {
            1 => NodeType::Gate,
            2 => NodeType::Bollard,
            3 => NodeType::TransitStop,
            _ => NodeType::StreetIntersection,
        }
    }
}

/// Exit sign categories, matching the way/node tags they come from.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignType {
    ExitNumber = 0,
    ExitBranch = 1,
    ExitToward = 2,
    ExitName = 3,
}

impl SignType {
    pub fn from_u8(v: u8) -> SignType {
        match v {
            1 => SignType::ExitBranch,
            2 => SignType::ExitToward,
            3 => SignType::ExitName,
            _ => SignType::ExitNumber,
        }
    }
}

/// Travel mode access bits. The packed access fields are 12 bits wide.
pub mod access {
    pub const AUTO: u16 = 1 << 0;
    pub const PEDESTRIAN: u16 = 1 << 1;
    pub const BICYCLE: u16 = 1 << 2;
    pub const TRUCK: u16 = 1 << 3;
    pub const EMERGENCY: u16 = 1 << 4;
    pub const BUS: u16 = 1 << 5;

    pub const ALL: u16 = AUTO | PEDESTRIAN | BICYCLE | TRUCK | EMERGENCY | BUS;
}
