//! Value types for addresses, address ranges and lat/lon rectangles.

use serde::{Deserialize, Serialize};

/// Geographic point in degrees (WGS84, not range-checked)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Linear interpolation towards `other` by `ratio` (0.0 = self, 1.0 = other),
    /// applied to latitude and longitude independently.
    pub fn lerp(&self, other: &Coord, ratio: f64) -> Coord {
        Coord {
            lat: self.lat + (other.lat - self.lat) * ratio,
            lon: self.lon + (other.lon - self.lon) * ratio,
        }
    }
}

/// Axis-aligned rectangle in lat/lon space. All edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// The whole coordinate domain
    pub fn world() -> Self {
        Self::new(-90.0, 90.0, -180.0, 180.0)
    }

    /// Square window of `delta` degrees on each side of `center`
    pub fn around(center: Coord, delta: f64) -> Self {
        Self::new(
            center.lat - delta,
            center.lat + delta,
            center.lon - delta,
            center.lon + delta,
        )
    }

    pub fn contains(&self, coord: &Coord) -> bool {
        coord.lat >= self.min_lat
            && coord.lat <= self.max_lat
            && coord.lon >= self.min_lon
            && coord.lon <= self.max_lon
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.min_lat > self.max_lat
            || other.max_lat < self.min_lat
            || other.min_lon > self.max_lon
            || other.max_lon < self.min_lon)
    }

    pub fn center(&self) -> Coord {
        Coord {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lon: (self.min_lon + self.max_lon) / 2.0,
        }
    }
}

/// A postal address pinned to a coordinate.
///
/// The house number stays a string since real data carries values like "10B".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub housenumber: String,
    pub street: String,
    pub city: String,
    pub postcode: String,
    pub country: String,
    pub coord: Coord,
}

impl Address {
    /// Composite lookup key, see [`address_key`]
    pub fn key(&self) -> String {
        address_key(&self.street, &self.housenumber, &self.postcode)
    }
}

/// A run of house numbers along a street, linearly interpolated between two
/// known endpoints.
///
/// `start <= end` is assumed, not enforced. With `step > 1`, numbers not
/// congruent to `start` modulo `step` are outside the range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: i64,
    pub end: i64,
    pub step: i64,
    pub street: String,
    pub city: String,
    pub postcode: String,
    pub country: String,
    pub start_coord: Coord,
    pub end_coord: Coord,
}

impl AddressRange {
    /// Whether `number` is one of the house numbers this range describes
    pub fn matches(&self, number: i64) -> bool {
        if number < self.start || number > self.end {
            return false;
        }
        self.step <= 1 || (number - self.start) % self.step == 0
    }

    /// Coordinate of `number` by its position between the endpoints.
    ///
    /// A range whose endpoints carry the same number places everything at
    /// the start coordinate.
    pub fn coord_at(&self, number: i64) -> Coord {
        let span = self.end - self.start;
        let ratio = if span == 0 {
            0.0
        } else {
            (number - self.start) as f64 / span as f64
        };
        self.start_coord.lerp(&self.end_coord, ratio)
    }

    /// Address for `housenumber` if it parses and falls inside the range
    pub fn interpolate(&self, housenumber: &str) -> Option<Address> {
        let number: i64 = housenumber.parse().ok()?;
        if !self.matches(number) {
            return None;
        }
        Some(self.address_at(number, housenumber.to_string()))
    }

    pub(crate) fn address_at(&self, number: i64, housenumber: String) -> Address {
        Address {
            housenumber,
            street: self.street.clone(),
            city: self.city.clone(),
            postcode: self.postcode.clone(),
            country: self.country.clone(),
            coord: self.coord_at(number),
        }
    }

    /// Composite lookup key, see [`street_key`]
    pub fn key(&self) -> String {
        street_key(&self.street, &self.postcode)
    }
}

/// Lower-cased `street:housenumber:postcode`
pub fn address_key(street: &str, housenumber: &str, postcode: &str) -> String {
    format!("{}:{}:{}", street, housenumber, postcode).to_lowercase()
}

/// Lower-cased `street:postcode`
pub fn street_key(street: &str, postcode: &str) -> String {
    format!("{}:{}", street, postcode).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn odd_range() -> AddressRange {
        AddressRange {
            start: 1,
            end: 5,
            step: 2,
            street: "Test Street".to_string(),
            city: "Test City".to_string(),
            postcode: "12345".to_string(),
            country: "Test Country".to_string(),
            start_coord: Coord::new(0.0, 0.0),
            end_coord: Coord::new(1.0, 1.0),
        }
    }

    #[test]
    fn test_interpolate_step_two() {
        let range = odd_range();
        for hn in ["1", "3", "5"] {
            assert!(range.interpolate(hn).is_some(), "{} should match", hn);
        }
        for hn in ["2", "4", "6", "invalid"] {
            assert!(range.interpolate(hn).is_none(), "{} should not match", hn);
        }
    }

    #[test]
    fn test_interpolate_position() {
        let addr = odd_range().interpolate("3").unwrap();
        assert_eq!(addr.housenumber, "3");
        assert_eq!(addr.street, "Test Street");
        assert!((addr.coord.lat - 0.5).abs() < 1e-12);
        assert!((addr.coord.lon - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_step_one_accepts_every_number() {
        let mut range = odd_range();
        range.step = 1;
        assert!(range.matches(2));
        assert!(range.matches(4));
        assert!(!range.matches(0));
    }

    #[test]
    fn test_degenerate_range_uses_start() {
        let mut range = odd_range();
        range.end = 1;
        let addr = range.interpolate("1").unwrap();
        assert_eq!(addr.coord, Coord::new(0.0, 0.0));
    }

    #[test]
    fn test_keys_are_lowercase() {
        assert_eq!(address_key("Main Street", "10B", "AB1"), "main street:10b:ab1");
        assert_eq!(street_key("Main Street", "AB1"), "main street:ab1");
    }

    #[test]
    fn test_bounds_inclusive_edges() {
        let b = Bounds::new(0.0, 1.0, 0.0, 1.0);
        assert!(b.contains(&Coord::new(0.0, 0.0)));
        assert!(b.contains(&Coord::new(1.0, 1.0)));
        assert!(!b.contains(&Coord::new(1.0000001, 0.5)));
        assert!(b.intersects(&Bounds::new(1.0, 2.0, 1.0, 2.0)));
        assert!(!b.intersects(&Bounds::new(1.5, 2.0, 0.0, 1.0)));
    }
}
