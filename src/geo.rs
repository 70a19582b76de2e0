//! Geographic helpers: great-circle distances and degree/meter scaling.

pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Meters per degree of latitude, near enough everywhere on the ellipsoid.
pub const METERS_PER_DEGREE_LAT: f64 = 110_567.0;

/// Fixed-point coordinate scale: 1e-7 degrees per unit.
pub const COORD_SCALE: f64 = 10_000_000.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointLL {
    pub lat: f32,
    pub lon: f32,
}

impl PointLL {
    pub fn new(lat: f32, lon: f32) -> PointLL {
        PointLL { lat, lon }
    }

    pub fn lat_fxp(&self) -> i32 {
        (self.lat as f64 * COORD_SCALE).round() as i32
    }

    pub fn lon_fxp(&self) -> i32 {
        (self.lon as f64 * COORD_SCALE).round() as i32
    }

    pub fn from_fxp(lat_fxp: i32, lon_fxp: i32) -> PointLL {
        PointLL {
            lat: (lat_fxp as f64 / COORD_SCALE) as f32,
            lon: (lon_fxp as f64 / COORD_SCALE) as f32,
        }
    }
}

/// Compute haversine distance between two points in meters.
pub fn haversine_distance(a: PointLL, b: PointLL) -> f64 {
    let lat1 = (a.lat as f64).to_radians();
    let lat2 = (b.lat as f64).to_radians();
    let delta_lat = ((b.lat - a.lat) as f64).to_radians();
    let delta_lon = ((b.lon - a.lon) as f64).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Length of a polyline in meters over great-circle segments.
pub fn polyline_length(shape: &[PointLL]) -> f64 {
    shape
        .windows(2)
        .map(|w| haversine_distance(w[0], w[1]))
        .sum()
}

/// Meters per degree of longitude at the given latitude.
pub fn meters_per_lng_degree(lat: f64) -> f64 {
    METERS_PER_DEGREE_LAT * lat.to_radians().cos()
}
