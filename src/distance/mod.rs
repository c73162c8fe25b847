//! NxN distance/duration matrix assembly: cache lookup, external provider
//! batching, haversine fallback, in that priority order. See
//! `provider` for the two `DistanceProvider` implementations.

pub mod provider;

use crate::geo::Coordinate;
use provider::{DistanceProvider, HaversineProvider};

/// Distance (miles) and duration (minutes) between two locations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceEntry {
    pub distance_miles: f64,
    pub duration_minutes: f64,
}

/// A row persisted in (or loaded from) the `distance_cache` table.
#[derive(Debug, Clone)]
pub struct CacheRow {
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub dest_lat: f64,
    pub dest_lng: f64,
    pub distance_miles: f64,
    pub duration_minutes: f64,
}

/// Read/write access to the persistent cross-run distance cache. Both
/// operations are best-effort from the matrix's point of view: a failure
/// to read means "nothing cached"; a failure to write is silently dropped.
pub trait DistanceCacheStore {
    fn load_cache_rows(&self) -> Vec<CacheRow>;
    fn write_cache_rows(&self, rows: &[CacheRow]);
}

/// A cache store that is always empty and discards writes — used when no
/// store is configured, or in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCacheStore;

impl DistanceCacheStore for NullCacheStore {
    fn load_cache_rows(&self) -> Vec<CacheRow> {
        Vec::new()
    }

    fn write_cache_rows(&self, _rows: &[CacheRow]) {}
}

/// An NxN table of (miles, minutes) between a fixed list of locations.
///
/// `get(i, j)` never fails: the diagonal is always `(0, 0)`, and any other
/// entry is backed by the cache, the external provider, or a haversine
/// estimate computed on the spot, in that priority order.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    pub locations: Vec<Coordinate>,
    data: Vec<Vec<Option<DistanceEntry>>>,
}

impl DistanceMatrix {
    pub fn new(locations: Vec<Coordinate>) -> Self {
        let n = locations.len();
        let mut data = vec![vec![None; n]; n];
        for (i, row) in data.iter_mut().enumerate() {
            row[i] = Some(DistanceEntry {
                distance_miles: 0.0,
                duration_minutes: 0.0,
            });
        }
        Self { locations, data }
    }

    pub fn size(&self) -> usize {
        self.locations.len()
    }

    /// Get the distance/duration between locations `i` and `j`. Falls back
    /// to a haversine estimate computed on the spot if no entry was ever
    /// populated for this pair (this should not normally happen once
    /// `build` has run, but keeps `get` total).
    pub fn get(&self, i: usize, j: usize) -> DistanceEntry {
        match self.data[i][j] {
            Some(entry) => entry,
            None => {
                let (miles, minutes) = crate::geo::haversine_fallback(
                    &self.locations[i],
                    &self.locations[j],
                );
                DistanceEntry {
                    distance_miles: miles,
                    duration_minutes: minutes,
                }
            }
        }
    }

    pub fn set(&mut self, i: usize, j: usize, entry: DistanceEntry) {
        self.data[i][j] = Some(entry);
    }

    pub fn distance_miles(&self, i: usize, j: usize) -> f64 {
        self.get(i, j).distance_miles
    }

    pub fn duration_minutes(&self, i: usize, j: usize) -> f64 {
        self.get(i, j).duration_minutes
    }

    /// Find a location's index via tolerant coordinate equality.
    pub fn location_index(&self, location: &Coordinate) -> Option<usize> {
        self.locations.iter().position(|loc| loc == location)
    }

    fn is_missing(&self, i: usize, j: usize) -> bool {
        i != j && self.data[i][j].is_none()
    }
}

/// Build a complete NxN distance matrix for `locations`:
/// 1. populate from the persistent cache (tolerant coordinate match),
/// 2. fetch remaining pairs from the external provider (best-effort),
/// 3. fill whatever is still missing with the haversine fallback.
pub fn build_distance_matrix(
    locations: Vec<Coordinate>,
    cache: &dyn DistanceCacheStore,
    provider: &dyn DistanceProvider,
    tolerance: f64,
) -> DistanceMatrix {
    let mut matrix = DistanceMatrix::new(locations);
    let n = matrix.size();
    if n <= 1 {
        return matrix;
    }

    // Step 1: cache.
    let cache_rows = cache.load_cache_rows();
    for row in &cache_rows {
        for i in 0..n {
            let loc_a = &matrix.locations[i];
            if (loc_a.lat - row.origin_lat).abs() > tolerance
                || (loc_a.lng - row.origin_lng).abs() > tolerance
            {
                continue;
            }
            for j in 0..n {
                if i == j {
                    continue;
                }
                let loc_b = &matrix.locations[j];
                if (loc_b.lat - row.dest_lat).abs() > tolerance
                    || (loc_b.lng - row.dest_lng).abs() > tolerance
                {
                    continue;
                }
                matrix.set(
                    i,
                    j,
                    DistanceEntry {
                        distance_miles: row.distance_miles,
                        duration_minutes: row.duration_minutes,
                    },
                );
            }
        }
    }

    // Step 2: external provider for whatever is still missing.
    let missing_origin_idx: Vec<usize> = (0..n)
        .filter(|&i| (0..n).any(|j| matrix.is_missing(i, j)))
        .collect();
    let missing_dest_idx: Vec<usize> = (0..n)
        .filter(|&j| (0..n).any(|i| matrix.is_missing(i, j)))
        .collect();

    if !missing_origin_idx.is_empty() && !missing_dest_idx.is_empty() {
        let origins: Vec<Coordinate> = missing_origin_idx
            .iter()
            .map(|&i| matrix.locations[i].clone())
            .collect();
        let destinations: Vec<Coordinate> = missing_dest_idx
            .iter()
            .map(|&j| matrix.locations[j].clone())
            .collect();

        let fetched = provider.fetch(&origins, &destinations);
        let mut cache_writes = Vec::new();
        for (origin, dest, entry) in fetched {
            let (Some(i), Some(j)) = (matrix.location_index(&origin), matrix.location_index(&dest))
            else {
                continue;
            };
            matrix.set(
                i,
                j,
                DistanceEntry {
                    distance_miles: entry.distance_miles,
                    duration_minutes: entry.duration_minutes,
                },
            );
            cache_writes.push(CacheRow {
                origin_lat: origin.lat,
                origin_lng: origin.lng,
                dest_lat: dest.lat,
                dest_lng: dest.lng,
                distance_miles: entry.distance_miles,
                duration_minutes: entry.duration_minutes,
            });
        }
        if !cache_writes.is_empty() {
            cache.write_cache_rows(&cache_writes);
        }
    }

    // Step 3: haversine fallback for whatever is still missing.
    for i in 0..n {
        for j in 0..n {
            if matrix.is_missing(i, j) {
                let (miles, minutes) =
                    crate::geo::haversine_fallback(&matrix.locations[i], &matrix.locations[j]);
                matrix.set(
                    i,
                    j,
                    DistanceEntry {
                        distance_miles: miles,
                        duration_minutes: minutes,
                    },
                );
            }
        }
    }

    matrix
}

/// Convenience alias used by callers that only need the fallback (provider
/// calls disabled — e.g. no API key configured).
pub fn build_distance_matrix_fallback_only(
    locations: Vec<Coordinate>,
    cache: &dyn DistanceCacheStore,
    tolerance: f64,
) -> DistanceMatrix {
    build_distance_matrix(locations, cache, &HaversineProvider, tolerance)
}

pub use provider::MapsClient;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_is_always_zero() {
        let matrix = DistanceMatrix::new(vec![
            Coordinate::new(41.4993, -81.6944),
            Coordinate::new(39.9612, -82.9988),
        ]);
        let diag = matrix.get(0, 0);
        assert_eq!(diag.distance_miles, 0.0);
        assert_eq!(diag.duration_minutes, 0.0);
    }

    #[test]
    fn fallback_only_matrix_has_positive_entries_for_every_off_diagonal_pair() {
        let locations = vec![
            Coordinate::new(41.4993, -81.6944),
            Coordinate::new(39.9612, -82.9988),
            Coordinate::new(41.5061, -81.6995),
        ];
        let matrix =
            build_distance_matrix_fallback_only(locations, &NullCacheStore, 0.001);
        let n = matrix.size();
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    assert!(matrix.distance_miles(i, j) > 0.0);
                    assert!(matrix.duration_minutes(i, j) > 0.0);
                }
            }
        }
    }

    #[test]
    fn cache_hit_takes_priority_over_fallback() {
        struct FakeCache(Vec<CacheRow>);
        impl DistanceCacheStore for FakeCache {
            fn load_cache_rows(&self) -> Vec<CacheRow> {
                self.0.clone()
            }
            fn write_cache_rows(&self, _rows: &[CacheRow]) {}
        }

        let a = Coordinate::new(41.4993, -81.6944);
        let b = Coordinate::new(39.9612, -82.9988);
        let cache = FakeCache(vec![CacheRow {
            origin_lat: a.lat,
            origin_lng: a.lng,
            dest_lat: b.lat,
            dest_lng: b.lng,
            distance_miles: 123.4,
            duration_minutes: 200.0,
        }]);

        let matrix = build_distance_matrix_fallback_only(vec![a, b], &cache, 0.001);
        assert_eq!(matrix.distance_miles(0, 1), 123.4);
        assert_eq!(matrix.duration_minutes(0, 1), 200.0);
    }

    #[test]
    fn location_index_respects_tolerance() {
        let a = Coordinate::new(41.4993, -81.6944);
        let matrix = DistanceMatrix::new(vec![a.clone()]);
        let close = Coordinate::new(41.4993 + 0.0000001, -81.6944);
        assert_eq!(matrix.location_index(&close), Some(0));
        let far = Coordinate::new(42.0, -81.6944);
        assert_eq!(matrix.location_index(&far), None);
    }
}
