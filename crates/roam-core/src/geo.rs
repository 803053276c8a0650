//! # Geo Primitives
//!
//! Coordinates, distance units, result ordering and great-circle distance.
//!
//! The distance function uses the same haversine formula and earth radius
//! as Redis' geo commands, so the in-memory index orders results exactly
//! like the Redis-backed one.

use serde::{Deserialize, Serialize};

/// Earth radius in meters, as used by Redis `GEODIST`/`GEOSEARCH`.
pub const EARTH_RADIUS_METERS: f64 = 6_372_797.560_856;

/// Latitude limit of Redis' geo encoding. `GEOADD` rejects points beyond it.
pub const MAX_INDEXABLE_LATITUDE: f64 = 85.051_128_78;

// =============================================================================
// Coordinate
// =============================================================================

/// WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Coordinate { lon, lat }
    }

    /// Returns true if the coordinate is finite and can be stored in the
    /// geo index: any longitude, latitude within the Web Mercator band.
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-MAX_INDEXABLE_LATITUDE..=MAX_INDEXABLE_LATITUDE).contains(&self.lat)
    }

    /// Great-circle distance to `other`, in meters.
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let u = ((lat2 - lat1) / 2.0).sin();
        let v = ((other.lon - self.lon).to_radians() / 2.0).sin();
        let a = u * u + lat1.cos() * lat2.cos() * v * v;
        2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
    }
}

// =============================================================================
// Distance Unit
// =============================================================================

/// Unit of a search radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Meters,
    Kilometers,
    Miles,
    Feet,
}

impl DistanceUnit {
    /// Converts `value` in this unit to meters.
    pub fn to_meters(&self, value: f64) -> f64 {
        match self {
            DistanceUnit::Meters => value,
            DistanceUnit::Kilometers => value * 1000.0,
            DistanceUnit::Miles => value * 1609.34,
            DistanceUnit::Feet => value * 0.3048,
        }
    }

    /// Unit token understood by Redis geo commands.
    pub fn symbol(&self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
            DistanceUnit::Feet => "ft",
        }
    }
}

// =============================================================================
// Sort Order
// =============================================================================

/// Ordering of radius results by distance from the center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Order token understood by Redis geo commands.
    pub fn symbol(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_oslo_bergen() {
        let oslo = Coordinate::new(10.7522, 59.9139);
        let bergen = Coordinate::new(5.3221, 60.3913);
        let d = oslo.distance_meters(&bergen);
        // ~305 km as the crow flies
        assert!((300_000.0..310_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_distance_is_zero_for_same_point() {
        let p = Coordinate::new(10.0, 60.0);
        assert!(p.distance_meters(&p) < 1e-6);
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(DistanceUnit::Kilometers.to_meters(1.5), 1500.0);
        assert_eq!(DistanceUnit::Meters.to_meters(42.0), 42.0);
        assert_eq!(DistanceUnit::Feet.symbol(), "ft");
    }

    #[test]
    fn test_coordinate_validity() {
        assert!(Coordinate::new(10.0, 59.0).is_valid());
        assert!(!Coordinate::new(200.0, 59.0).is_valid());
        assert!(!Coordinate::new(10.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_polar_latitudes_are_not_indexable() {
        assert!(Coordinate::new(0.0, 85.05).is_valid());
        assert!(Coordinate::new(0.0, -85.05).is_valid());
        assert!(!Coordinate::new(0.0, 85.06).is_valid());
        assert!(!Coordinate::new(10.0, 89.0).is_valid());
        assert!(!Coordinate::new(10.0, -90.0).is_valid());
    }
}
