//! Intra-trip stop reordering for multi-stop trips (3+ stops).
//!
//! A hand-rolled nearest-neighbor construction followed by time-boxed
//! 2-opt improvement, operating on an integer miles-times-ten local
//! matrix with a large penalty for unindexed pairs.

use std::time::{Duration, Instant};

use crate::distance::DistanceMatrix;

use super::assignment::{Trip, TripStop};

const UNKNOWN_PAIR_PENALTY: i64 = 10_000;

/// Find a location in the matrix by label, matching the labeling
/// convention used when the matrix was built from a week's hubs/venues.
fn location_by_label(dist_matrix: &DistanceMatrix, label: &str) -> Option<usize> {
    dist_matrix
        .locations
        .iter()
        .position(|loc| loc.label.as_deref() == Some(label))
}

fn build_local_matrix(
    dist_matrix: &DistanceMatrix,
    node_indices: &[Option<usize>],
) -> Vec<Vec<i64>> {
    let n = node_indices.len();
    let mut local = vec![vec![0i64; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            local[i][j] = match (node_indices[i], node_indices[j]) {
                (Some(a), Some(b)) => (dist_matrix.distance_miles(a, b) * 10.0).round() as i64,
                _ => UNKNOWN_PAIR_PENALTY,
            };
        }
    }
    local
}

fn tour_length(tour: &[usize], local: &[Vec<i64>]) -> i64 {
    tour.windows(2).map(|w| local[w[0]][w[1]]).sum()
}

/// Nearest-neighbor construction starting at node 0 (the depot).
fn nearest_neighbor_tour(local: &[Vec<i64>]) -> Vec<usize> {
    let n = local.len();
    let mut visited = vec![false; n];
    let mut tour = vec![0];
    visited[0] = true;

    while tour.len() < n {
        let current = *tour.last().unwrap();
        let next = (0..n)
            .filter(|&i| !visited[i])
            .min_by_key(|&i| local[current][i])
            .unwrap();
        visited[next] = true;
        tour.push(next);
    }
    tour.push(0);
    tour
}

/// 2-opt local search within a time budget, keeping the depot (index 0)
/// fixed at both ends of the tour.
fn two_opt_improve(mut tour: Vec<usize>, local: &[Vec<i64>], deadline: Instant) -> Vec<usize> {
    let n = tour.len();
    if n <= 4 {
        return tour;
    }

    let mut improved = true;
    while improved && Instant::now() < deadline {
        improved = false;
        for i in 1..n - 2 {
            if Instant::now() >= deadline {
                break;
            }
            for j in i + 1..n - 1 {
                let delta = local[tour[i - 1]][tour[j]]
                    + local[tour[i]][tour[j + 1]]
                    - local[tour[i - 1]][tour[i]]
                    - local[tour[j]][tour[j + 1]];
                if delta < 0 {
                    tour[i..=j].reverse();
                    improved = true;
                }
            }
        }
    }
    tour
}

/// Reorder a trip's stops to minimize total route distance. Returns the
/// original stop order unchanged if fewer than 3 stops, reordering fails
/// to account for every stop, or the hub/stop labels can't be resolved in
/// the distance matrix.
pub fn reorder_stops(trip: &Trip, dist_matrix: &DistanceMatrix, timeout_ms: u64) -> Vec<TripStop> {
    let stops = &trip.stops;
    let n = stops.len() + 1;
    if n <= 3 {
        return stops.clone();
    }

    let mut node_indices = vec![location_by_label(dist_matrix, &trip.origin_hub_name)];
    for stop in stops {
        node_indices.push(location_by_label(dist_matrix, &stop.venue_name));
    }

    let local = build_local_matrix(dist_matrix, &node_indices);
    let deadline = Instant::now() + Duration::from_millis(timeout_ms.min(5000));

    let initial = nearest_neighbor_tour(&local);
    let improved = two_opt_improve(initial.clone(), &local, deadline);

    let best = if tour_length(&improved, &local) <= tour_length(&initial, &local) {
        improved
    } else {
        initial
    };

    // best: [0, stop indices.., 0] — strip the depot at both ends.
    let order: Vec<usize> = best
        .into_iter()
        .filter(|&node| node != 0)
        .map(|node| node - 1)
        .collect();

    if order.len() != stops.len() {
        return stops.clone();
    }

    order
        .into_iter()
        .enumerate()
        .map(|(i, stop_idx)| {
            let mut stop = stops[stop_idx].clone();
            stop.stop_order = i + 1;
            stop
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{build_distance_matrix_fallback_only, NullCacheStore};
    use crate::geo::Coordinate;

    fn stop(id: &str, order: usize) -> TripStop {
        TripStop {
            venue_id: id.into(),
            venue_name: id.into(),
            stop_order: order,
            arrival_time: None,
            depart_time: None,
            action: "deliver".into(),
            requires_hub_return: false,
            hub_return_reason: None,
            demand: None,
        }
    }

    #[test]
    fn trips_with_fewer_than_three_stops_are_unchanged() {
        let locations = vec![
            Coordinate::labeled(41.5, -81.7, "Hub"),
            Coordinate::labeled(41.6, -81.8, "a"),
        ];
        let matrix = build_distance_matrix_fallback_only(locations, &NullCacheStore, 0.001);
        let trip = Trip {
            vehicle_id: "v".into(),
            vehicle_name: "v".into(),
            origin_hub_id: "h".into(),
            origin_hub_name: "Hub".into(),
            stops: vec![stop("a", 1)],
            assets: Vec::new(),
            personnel: Vec::new(),
            total_miles: 0.0,
            total_drive_hrs: 0.0,
            optimizer_score: 0.0,
            depart_time: None,
            return_time: None,
        };
        let reordered = reorder_stops(&trip, &matrix, 5000);
        assert_eq!(reordered.len(), 1);
    }

    #[test]
    fn reorder_preserves_every_stop_for_unresolvable_labels() {
        let locations = vec![Coordinate::labeled(41.5, -81.7, "Hub")];
        let matrix = build_distance_matrix_fallback_only(locations, &NullCacheStore, 0.001);
        let trip = Trip {
            vehicle_id: "v".into(),
            vehicle_name: "v".into(),
            origin_hub_id: "h".into(),
            origin_hub_name: "Hub".into(),
            stops: vec![stop("a", 1), stop("b", 2), stop("c", 3)],
            assets: Vec::new(),
            personnel: Vec::new(),
            total_miles: 0.0,
            total_drive_hrs: 0.0,
            optimizer_score: 0.0,
            depart_time: None,
            return_time: None,
        };
        let reordered = reorder_stops(&trip, &matrix, 5000);
        let mut ids: Vec<&str> = reordered.iter().map(|s| s.venue_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn reorder_finds_a_shorter_or_equal_route_than_the_given_order() {
        let locations = vec![
            Coordinate::labeled(0.0, 0.0, "Hub"),
            Coordinate::labeled(0.0, 3.0, "far"),
            Coordinate::labeled(0.0, 1.0, "near"),
            Coordinate::labeled(0.0, 2.0, "mid"),
        ];
        let matrix = build_distance_matrix_fallback_only(locations, &NullCacheStore, 0.001);
        let trip = Trip {
            vehicle_id: "v".into(),
            vehicle_name: "v".into(),
            origin_hub_id: "h".into(),
            origin_hub_name: "Hub".into(),
            stops: vec![stop("far", 1), stop("near", 2), stop("mid", 3)],
            assets: Vec::new(),
            personnel: Vec::new(),
            total_miles: 0.0,
            total_drive_hrs: 0.0,
            optimizer_score: 0.0,
            depart_time: None,
            return_time: None,
        };
        let reordered = reorder_stops(&trip, &matrix, 5000);
        assert_eq!(reordered.len(), 3);
        assert_eq!(reordered[0].venue_id, "near");
    }
}
