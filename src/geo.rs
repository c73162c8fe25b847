//! Geographic primitives shared by clustering, distance, scoring, and lookahead.

use serde::{Deserialize, Serialize};

/// Earth radius in miles, used throughout for haversine distance.
const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Road-distance fudge factor applied to straight-line haversine miles
/// when no routed distance is available.
pub const ROAD_FACTOR: f64 = 1.3;

/// Assumed average driving speed (mph) for the haversine fallback.
pub const FALLBACK_SPEED_MPH: f64 = 50.0;

/// A geographic coordinate with an optional human-readable label.
///
/// Equality and hashing round to 6 decimal places (roughly 0.11m), so two
/// coordinates describing "the same" hub or venue compare equal even if
/// they were parsed from slightly different upstream rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
    pub label: Option<String>,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            label: None,
        }
    }

    pub fn labeled(lat: f64, lng: f64, label: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            label: Some(label.into()),
        }
    }

    fn rounded(&self) -> (i64, i64) {
        (
            (self.lat * 1_000_000.0).round() as i64,
            (self.lng * 1_000_000.0).round() as i64,
        )
    }

    /// Haversine distance to another coordinate, in miles.
    pub fn haversine_miles(&self, other: &Coordinate) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlng = (other.lng - self.lng).to_radians();

        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.rounded() == other.rounded()
    }
}

impl Eq for Coordinate {}

impl std::hash::Hash for Coordinate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.rounded().hash(state);
    }
}

/// Straight-line haversine distance and time estimate, applying the
/// fallback road factor and assumed speed. Rounded to one decimal place
/// per the numeric semantics used throughout the planner.
pub fn haversine_fallback(a: &Coordinate, b: &Coordinate) -> (f64, f64) {
    let straight_line = a.haversine_miles(b);
    let road_miles = straight_line * ROAD_FACTOR;
    let minutes = road_miles / FALLBACK_SPEED_MPH * 60.0;
    (round1(road_miles), round1(minutes))
}

/// Round to one decimal place — the convention used for distances,
/// durations, and scores throughout the planner.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_within_tolerance_are_equal_and_hash_equal() {
        let a = Coordinate::new(36.1699, -115.1398);
        let b = Coordinate::new(36.1699 + 0.0000009, -115.1398 - 0.0000009);
        assert_eq!(a, b);

        let mut hasher_a = std::collections::hash_map::DefaultHasher::new();
        let mut hasher_b = std::collections::hash_map::DefaultHasher::new();
        use std::hash::Hash;
        a.hash(&mut hasher_a);
        b.hash(&mut hasher_b);
        assert_eq!(
            std::hash::Hasher::finish(&hasher_a),
            std::hash::Hasher::finish(&hasher_b)
        );
    }

    #[test]
    fn coordinates_outside_tolerance_are_not_equal() {
        let a = Coordinate::new(36.1699, -115.1398);
        let b = Coordinate::new(36.18, -115.1398);
        assert_ne!(a, b);
    }

    #[test]
    fn haversine_known_distance_cleveland_to_columbus() {
        let cleveland = Coordinate::new(41.4993, -81.6944);
        let columbus = Coordinate::new(39.9612, -82.9988);
        let miles = cleveland.haversine_miles(&columbus);
        assert!((120.0..150.0).contains(&miles), "got {miles}");
    }

    #[test]
    fn haversine_fallback_applies_road_factor_and_speed() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 1.0);
        let (miles, minutes) = haversine_fallback(&a, &b);
        let straight_line = a.haversine_miles(&b);
        assert!((miles - straight_line * ROAD_FACTOR).abs() < 0.05);
        assert!((minutes - miles / FALLBACK_SPEED_MPH * 60.0).abs() < 0.05);
    }
}
