use super::Coord;

/// Mean Earth radius in km
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers (haversine)
pub fn haversine_distance(c1: &Coord, c2: &Coord) -> f64 {
    let d_lat = (c2.lat - c1.lat).to_radians();
    let d_lon = (c2.lon - c1.lon).to_radians();
    let lat1 = c1.lat.to_radians();
    let lat2 = c2.lat.to_radians();

    let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + (d_lon / 2.0).sin() * (d_lon / 2.0).sin() * lat1.cos() * lat2.cos();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance() {
        let d = haversine_distance(&Coord::new(40.0, 1.0), &Coord::new(39.0, 2.0));
        assert!((d - 140.447268).abs() < 1e-5, "got {}", d);
    }

    #[test]
    fn test_same_point_is_zero() {
        let c = Coord::new(42.0, -71.0);
        assert_eq!(haversine_distance(&c, &c), 0.0);
    }
}
