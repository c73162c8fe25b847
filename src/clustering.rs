//! Greedy geographic clustering: groups nearby venues into multi-stop
//! trips and orders the stops within each cluster.

use crate::distance::DistanceMatrix;
use crate::domain::Venue;
use crate::geo::Coordinate;

/// A group of venues to be served in a single multi-stop trip.
#[derive(Debug, Clone, Default)]
pub struct VenueCluster {
    pub venues: Vec<Venue>,
    pub total_demand_weight: f64,
    pub total_demand_quantity: i32,
}

impl VenueCluster {
    pub fn is_multi_stop(&self) -> bool {
        self.venues.len() > 1
    }

    pub fn venue_ids(&self) -> std::collections::HashSet<&str> {
        self.venues.iter().map(|v| v.id.as_str()).collect()
    }
}

fn nearest_hub_distance(venue: &Venue, hub_locations: &[Coordinate]) -> f64 {
    match venue.location() {
        Some(loc) if !hub_locations.is_empty() => hub_locations
            .iter()
            .map(|h| h.haversine_miles(&loc))
            .fold(f64::INFINITY, f64::min),
        _ => f64::INFINITY,
    }
}

/// Order stops using nearest-neighbor from a starting location, preferring
/// the distance matrix over a fresh haversine computation when both
/// locations are indexed in it.
fn order_stops_nn(venues: &[Venue], start: &Coordinate, dist_matrix: &DistanceMatrix) -> Vec<Venue> {
    if venues.len() <= 1 {
        return venues.to_vec();
    }

    let mut ordered = Vec::with_capacity(venues.len());
    let mut remaining: Vec<Venue> = venues.to_vec();
    let mut current = start.clone();

    while !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_dist = f64::INFINITY;

        for (i, venue) in remaining.iter().enumerate() {
            let Some(loc) = venue.location() else {
                continue;
            };
            let d = match (
                dist_matrix.location_index(&current),
                dist_matrix.location_index(&loc),
            ) {
                (Some(ci), Some(vi)) => dist_matrix.distance_miles(ci, vi),
                _ => current.haversine_miles(&loc),
            };
            if d < best_dist {
                best_dist = d;
                best_idx = i;
            }
        }

        let next_venue = remaining.remove(best_idx);
        if let Some(loc) = next_venue.location() {
            current = loc;
        }
        ordered.push(next_venue);
    }

    ordered
}

/// Group venues into clusters for multi-stop trips: sort by distance from
/// the nearest hub descending (venues far from a hub benefit most from
/// being bundled with a neighbor), then greedily absorb nearby unassigned
/// venues up to `max_stops`, ordering each cluster's stops by
/// nearest-neighbor from the cluster's nearest hub. Venues with no
/// location become trailing single-stop clusters.
pub fn cluster_venues(
    venues: &[Venue],
    hub_locations: &[Coordinate],
    dist_matrix: &DistanceMatrix,
    max_radius_miles: f64,
    max_stops: usize,
) -> Vec<VenueCluster> {
    if venues.is_empty() {
        return Vec::new();
    }

    let valid_venues: Vec<&Venue> = venues.iter().filter(|v| v.location().is_some()).collect();
    if valid_venues.is_empty() {
        return venues
            .iter()
            .map(|v| VenueCluster {
                venues: vec![v.clone()],
                ..Default::default()
            })
            .collect();
    }

    let mut sorted_venues: Vec<&Venue> = valid_venues.clone();
    sorted_venues.sort_by(|a, b| {
        let da = nearest_hub_distance(a, hub_locations);
        let db = nearest_hub_distance(b, hub_locations);
        db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut assigned: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut clusters: Vec<VenueCluster> = Vec::new();

    for venue in &sorted_venues {
        if assigned.contains(&venue.id) {
            continue;
        }
        let Some(loc) = venue.location() else {
            continue;
        };

        let mut members: Vec<Venue> = vec![(*venue).clone()];
        assigned.insert(venue.id.clone());

        for candidate in &sorted_venues {
            if assigned.contains(&candidate.id) {
                continue;
            }
            if members.len() >= max_stops {
                break;
            }
            let Some(cloc) = candidate.location() else {
                continue;
            };
            if loc.haversine_miles(&cloc) <= max_radius_miles {
                members.push((*candidate).clone());
                assigned.insert(candidate.id.clone());
            }
        }

        let cluster_center = members[0].location();
        let nearest_hub_loc = cluster_center.as_ref().and_then(|center| {
            hub_locations.iter().min_by(|a, b| {
                let da = a.haversine_miles(center);
                let db = b.haversine_miles(center);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        let ordered = match nearest_hub_loc {
            Some(hub_loc) => order_stops_nn(&members, hub_loc, dist_matrix),
            None => members,
        };

        clusters.push(VenueCluster {
            venues: ordered,
            ..Default::default()
        });
    }

    // Venues without a usable location become single-stop clusters.
    for venue in venues {
        if !assigned.contains(&venue.id) {
            clusters.push(VenueCluster {
                venues: vec![venue.clone()],
                ..Default::default()
            });
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{build_distance_matrix_fallback_only, NullCacheStore};

    fn venue(id: &str, lat: f64, lng: f64) -> Venue {
        Venue {
            id: id.into(),
            customer_id: Some("c1".into()),
            name: id.into(),
            address: None,
            city: None,
            state: None,
            lat: Some(lat),
            lng: Some(lng),
            is_primary: true,
        }
    }

    #[test]
    fn venues_within_radius_are_grouped_into_one_cluster() {
        let hub_loc = vec![Coordinate::new(41.5, -81.7)];
        let venues = vec![
            venue("near-1", 41.51, -81.71),
            venue("near-2", 41.52, -81.72),
        ];
        let matrix = build_distance_matrix_fallback_only(
            vec![hub_loc[0].clone(), venues[0].location().unwrap(), venues[1].location().unwrap()],
            &NullCacheStore,
            0.001,
        );
        let clusters = cluster_venues(&venues, &hub_loc, &matrix, 150.0, 4);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].is_multi_stop());
    }

    #[test]
    fn venues_beyond_radius_stay_in_separate_clusters() {
        let hub_loc = vec![Coordinate::new(41.5, -81.7)];
        let venues = vec![venue("near", 41.51, -81.71), venue("far", 34.0, -118.0)];
        let matrix = build_distance_matrix_fallback_only(
            vec![hub_loc[0].clone(), venues[0].location().unwrap(), venues[1].location().unwrap()],
            &NullCacheStore,
            0.001,
        );
        let clusters = cluster_venues(&venues, &hub_loc, &matrix, 150.0, 4);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| !c.is_multi_stop()));
    }

    #[test]
    fn locationless_venues_become_trailing_singleton_clusters() {
        let hub_loc = vec![Coordinate::new(41.5, -81.7)];
        let mut locationless = venue("no-loc", 0.0, 0.0);
        locationless.lat = None;
        locationless.lng = None;
        let venues = vec![venue("near", 41.51, -81.71), locationless];
        let matrix = build_distance_matrix_fallback_only(
            vec![hub_loc[0].clone(), venues[0].location().unwrap()],
            &NullCacheStore,
            0.001,
        );
        let clusters = cluster_venues(&venues, &hub_loc, &matrix, 150.0, 4);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[1].venues[0].id, "no-loc");
    }

    #[test]
    fn cluster_respects_max_stops() {
        let hub_loc = vec![Coordinate::new(41.5, -81.7)];
        let venues: Vec<Venue> = (0..6)
            .map(|i| venue(&format!("v{i}"), 41.5 + i as f64 * 0.001, -81.7 + i as f64 * 0.001))
            .collect();
        let mut locations: Vec<Coordinate> = hub_loc.clone();
        locations.extend(venues.iter().map(|v| v.location().unwrap()));
        let matrix = build_distance_matrix_fallback_only(locations, &NullCacheStore, 0.001);
        let clusters = cluster_venues(&venues, &hub_loc, &matrix, 150.0, 4);
        assert!(clusters.iter().all(|c| c.venues.len() <= 4));
        let total: usize = clusters.iter().map(|c| c.venues.len()).sum();
        assert_eq!(total, 6);
    }
}
