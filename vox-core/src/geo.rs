//! Great-circle distance helpers.

use crate::location::Coordinates;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters.
pub fn distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

pub fn within_radius(point: Coordinates, center: Coordinates, radius_meters: f32) -> bool {
    distance_meters(point, center) <= radius_meters as f64
}
