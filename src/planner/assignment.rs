//! Core greedy assignment: for each venue cluster, find a hub/vehicle,
//! match assets to demand, assign personnel, and compute route distance.

use std::collections::HashSet;

use crate::clustering::VenueCluster;
use crate::constraints::{check_capacity_weight, match_asset_to_demand, Constraints, Demand};
use crate::distance::DistanceMatrix;
use crate::domain::{Asset, Hub, PersonRole, Vehicle, WeekData};

#[derive(Debug, Clone)]
pub struct TripStop {
    pub venue_id: String,
    pub venue_name: String,
    pub stop_order: usize,
    pub arrival_time: Option<String>,
    pub depart_time: Option<String>,
    pub action: String,
    pub requires_hub_return: bool,
    pub hub_return_reason: Option<String>,
    pub demand: Option<Demand>,
}

#[derive(Debug, Clone)]
pub struct TripAsset {
    pub asset_id: String,
    pub serial_number: String,
    pub asset_type: String,
    pub stop_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TripPerson {
    pub person_id: String,
    pub person_name: String,
    pub role_on_trip: String,
}

#[derive(Debug, Clone)]
pub struct Trip {
    pub vehicle_id: String,
    pub vehicle_name: String,
    pub origin_hub_id: String,
    pub origin_hub_name: String,
    pub stops: Vec<TripStop>,
    pub assets: Vec<TripAsset>,
    pub personnel: Vec<TripPerson>,
    pub total_miles: f64,
    pub total_drive_hrs: f64,
    pub optimizer_score: f64,
    pub depart_time: Option<String>,
    pub return_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UnassignedDemand {
    pub customer_name: String,
    pub venue_name: String,
    pub asset_type: String,
    pub quantity: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstraintRelaxation {
    pub step: u8,
    pub action: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub trips: Vec<Trip>,
    pub unassigned_demands: Vec<UnassignedDemand>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub constraint_relaxations: Vec<ConstraintRelaxation>,
    pub solve_time_ms: u64,
    pub status: RunStatus,
    pub average_score: f64,
}

impl Default for OptimizationResult {
    fn default() -> Self {
        Self {
            trips: Vec::new(),
            unassigned_demands: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            constraint_relaxations: Vec::new(),
            solve_time_ms: 0,
            status: RunStatus::Completed,
            average_score: 0.0,
        }
    }
}

impl OptimizationResult {
    pub fn has_unassigned(&self) -> bool {
        !self.unassigned_demands.is_empty()
    }
}

fn assign_assets_to_demand(
    demand: &Demand,
    available_assets: &mut Vec<Asset>,
    constraints: &Constraints,
    week_data: &WeekData,
) -> (Vec<Asset>, Vec<UnassignedDemand>) {
    let mut assigned = Vec::new();
    let mut unassigned = Vec::new();
    let mut used_ids: HashSet<String> = HashSet::new();

    for item in &demand.items {
        let mut matched_count = 0;
        for asset in available_assets.iter() {
            if used_ids.contains(&asset.id) {
                continue;
            }
            if matched_count >= item.quantity {
                break;
            }
            if match_asset_to_demand(
                asset,
                item,
                &constraints.blocked_asset_ids,
                &week_data.branding_tasks,
            ) {
                assigned.push(asset.clone());
                used_ids.insert(asset.id.clone());
                matched_count += 1;
            }
        }

        if matched_count < item.quantity {
            let venue_name = demand
                .game
                .venue
                .as_ref()
                .map(|v| v.name.clone())
                .unwrap_or_else(|| "Unknown".into());
            unassigned.push(UnassignedDemand {
                customer_name: demand.customer_name.clone(),
                venue_name,
                asset_type: item.asset_type.clone(),
                quantity: item.quantity - matched_count,
                reason: format!(
                    "Only {matched_count} of {} {} available",
                    item.quantity, item.asset_type
                ),
            });
        }
    }

    available_assets.retain(|a| !used_ids.contains(&a.id));
    (assigned, unassigned)
}

fn assign_personnel(hub: &Hub, week_data: &WeekData, used_person_ids: &mut HashSet<String>) -> Vec<TripPerson> {
    let mut personnel = Vec::new();
    let available = week_data.available_personnel_at_hub(&hub.id);

    for person in &available {
        if person.role == PersonRole::Driver && !used_person_ids.contains(&person.id) {
            personnel.push(TripPerson {
                person_id: person.id.clone(),
                person_name: person.name.clone(),
                role_on_trip: "driver".into(),
            });
            used_person_ids.insert(person.id.clone());
            break;
        }
    }

    if personnel.is_empty() {
        for person in &available {
            if used_person_ids.contains(&person.id) {
                continue;
            }
            if matches!(person.role, PersonRole::LeadTech | PersonRole::ServiceTech) {
                personnel.push(TripPerson {
                    person_id: person.id.clone(),
                    person_name: person.name.clone(),
                    role_on_trip: "driver".into(),
                });
                used_person_ids.insert(person.id.clone());
                break;
            }
        }
    }

    for person in &available {
        if used_person_ids.contains(&person.id) {
            continue;
        }
        if matches!(person.role, PersonRole::ServiceTech | PersonRole::LeadTech) {
            personnel.push(TripPerson {
                person_id: person.id.clone(),
                person_name: person.name.clone(),
                role_on_trip: "service_tech".into(),
            });
            used_person_ids.insert(person.id.clone());
            break;
        }
    }

    personnel
}

#[allow(clippy::too_many_arguments)]
fn build_trip_for_cluster(
    cluster: &VenueCluster,
    week_data: &WeekData,
    dist_matrix: &DistanceMatrix,
    constraints: &Constraints,
    used_vehicle_ids: &mut HashSet<String>,
    used_asset_ids: &mut HashSet<String>,
    used_person_ids: &mut HashSet<String>,
) -> (Option<Trip>, Vec<UnassignedDemand>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut all_unassigned = Vec::new();

    let Some(first_venue) = cluster.venues.first() else {
        return (None, Vec::new(), Vec::new());
    };

    let Some(mut hub) = week_data.nearest_hub(first_venue) else {
        warnings.push(format!("No hub found for venue {}", first_venue.name));
        return (None, Vec::new(), warnings);
    };

    let mut vehicle: Option<&Vehicle> = week_data
        .available_vehicles_at_hub(&hub.id)
        .into_iter()
        .find(|v| !used_vehicle_ids.contains(&v.id));

    if vehicle.is_none() {
        'cross_hub: for other_hub in &week_data.hubs {
            if other_hub.id == hub.id {
                continue;
            }
            for v in week_data.available_vehicles_at_hub(&other_hub.id) {
                if !used_vehicle_ids.contains(&v.id) {
                    vehicle = Some(v);
                    hub = other_hub;
                    warnings.push(format!(
                        "Cross-hub: Using {} from {} for venue {}",
                        v.name, other_hub.name, first_venue.name
                    ));
                    break 'cross_hub;
                }
            }
        }
    }

    let Some(vehicle) = vehicle else {
        for venue in &cluster.venues {
            for demand in &constraints.demands {
                if demand.venue_id == venue.id {
                    for item in &demand.items {
                        all_unassigned.push(UnassignedDemand {
                            customer_name: demand.customer_name.clone(),
                            venue_name: venue.name.clone(),
                            asset_type: item.asset_type.clone(),
                            quantity: item.quantity,
                            reason: "No vehicle with sufficient capacity available".into(),
                        });
                    }
                }
            }
        }
        return (None, all_unassigned, warnings);
    };

    used_vehicle_ids.insert(vehicle.id.clone());

    let mut trip_assets = Vec::new();
    let mut trip_stops = Vec::new();
    let mut total_weight = 0.0;

    let mut hub_assets: Vec<Asset> = week_data
        .assets_at_hub(&hub.id)
        .into_iter()
        .filter(|a| !used_asset_ids.contains(&a.id))
        .cloned()
        .collect();

    for (stop_order, venue) in cluster.venues.iter().enumerate() {
        let venue_demands: Vec<&Demand> = constraints
            .demands
            .iter()
            .filter(|d| d.venue_id == venue.id)
            .collect();
        if venue_demands.is_empty() {
            continue;
        }

        for demand in &venue_demands {
            let on_site: Vec<Asset> = week_data
                .assets_at_venue(&venue.id)
                .into_iter()
                .filter(|a| !used_asset_ids.contains(&a.id))
                .cloned()
                .collect();
            let mut available = on_site;
            available.extend(hub_assets.clone());

            let (assigned, unassigned) =
                assign_assets_to_demand(demand, &mut available, constraints, week_data);
            all_unassigned.extend(unassigned);

            for asset in assigned {
                used_asset_ids.insert(asset.id.clone());
                total_weight += asset.weight_lbs.unwrap_or(0.0);
                hub_assets.retain(|a| a.id != asset.id);
                trip_assets.push(TripAsset {
                    asset_id: asset.id,
                    serial_number: asset.serial_number,
                    asset_type: asset.asset_type,
                    stop_id: None,
                });
            }
        }

        trip_stops.push(TripStop {
            venue_id: venue.id.clone(),
            venue_name: venue.name.clone(),
            stop_order: stop_order + 1,
            arrival_time: None,
            depart_time: None,
            action: "deliver".into(),
            requires_hub_return: false,
            hub_return_reason: None,
            demand: venue_demands.first().map(|d| (*d).clone()),
        });
    }

    if trip_stops.is_empty() {
        return (None, all_unassigned, warnings);
    }

    if !check_capacity_weight(vehicle, total_weight) {
        warnings.push(format!(
            "Vehicle {} may be overloaded: {:.0} lbs vs {} lbs capacity",
            vehicle.name,
            total_weight,
            vehicle.capacity_lbs.unwrap_or(0)
        ));
    }

    let mut total_miles = 0.0;
    let mut total_drive_minutes = 0.0;
    let hub_loc = hub.location();
    let hub_idx = dist_matrix.location_index(&hub_loc);
    let mut prev_idx = hub_idx;

    for stop in &trip_stops {
        let venue = cluster.venues.iter().find(|v| v.id == stop.venue_id);
        if let Some(venue) = venue {
            if let Some(loc) = venue.location() {
                let venue_idx = dist_matrix.location_index(&loc);
                if let (Some(p), Some(v)) = (prev_idx, venue_idx) {
                    total_miles += dist_matrix.distance_miles(p, v);
                    total_drive_minutes += dist_matrix.duration_minutes(p, v);
                }
                prev_idx = venue_idx;
            }
        }
    }

    if let (Some(p), Some(h)) = (prev_idx, hub_idx) {
        total_miles += dist_matrix.distance_miles(p, h);
        total_drive_minutes += dist_matrix.duration_minutes(p, h);
    }

    let total_drive_hrs = total_drive_minutes / 60.0;

    let personnel = assign_personnel(hub, week_data, used_person_ids);
    if personnel.is_empty() {
        warnings.push(format!(
            "No personnel available at {} for trip to {}",
            hub.name, first_venue.name
        ));
    }

    let trip = Trip {
        vehicle_id: vehicle.id.clone(),
        vehicle_name: vehicle.name.clone(),
        origin_hub_id: hub.id.clone(),
        origin_hub_name: hub.name.clone(),
        stops: trip_stops,
        assets: trip_assets,
        personnel,
        total_miles: crate::geo::round1(total_miles),
        total_drive_hrs: (total_drive_hrs * 100.0).round() / 100.0,
        optimizer_score: 0.0,
        depart_time: None,
        return_time: None,
    };

    (Some(trip), all_unassigned, warnings)
}

/// Run the weekly optimization: order clusters by demand weight (heaviest
/// first), build a trip per cluster, then TSP-reorder any trip with 3+
/// stops. `pre_used_asset_ids` lets the Week 0 multi-pass loop carry
/// already-shipped assets forward across passes.
pub fn optimize_week(
    week_data: &WeekData,
    dist_matrix: &DistanceMatrix,
    constraints: &Constraints,
    mut clusters: Vec<VenueCluster>,
    timeout_ms: u64,
    pre_used_asset_ids: Option<HashSet<String>>,
) -> OptimizationResult {
    let start = std::time::Instant::now();
    let mut result = OptimizationResult::default();

    let mut used_vehicle_ids = HashSet::new();
    let mut used_asset_ids = pre_used_asset_ids.unwrap_or_default();
    let mut used_person_ids = HashSet::new();

    for cluster in &mut clusters {
        let total_weight: f64 = cluster
            .venues
            .iter()
            .flat_map(|venue| {
                constraints
                    .demands
                    .iter()
                    .filter(move |d| d.venue_id == venue.id)
            })
            .map(|d| d.total_weight_lbs)
            .sum();
        cluster.total_demand_weight = total_weight;
    }
    clusters.sort_by(|a, b| {
        b.total_demand_weight
            .partial_cmp(&a.total_demand_weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for cluster in &clusters {
        let (trip, unassigned, warnings) = build_trip_for_cluster(
            cluster,
            week_data,
            dist_matrix,
            constraints,
            &mut used_vehicle_ids,
            &mut used_asset_ids,
            &mut used_person_ids,
        );
        if let Some(trip) = trip {
            result.trips.push(trip);
        }
        result.unassigned_demands.extend(unassigned);
        result.warnings.extend(warnings);
    }

    for trip in &mut result.trips {
        if trip.stops.len() >= 3 {
            trip.stops = super::tsp::reorder_stops(trip, dist_matrix, timeout_ms);
        }
    }

    result.solve_time_ms = start.elapsed().as_millis() as u64;
    result.status = if result.has_unassigned() {
        RunStatus::Partial
    } else {
        RunStatus::Completed
    };

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::constraints::build_constraints;
    use crate::distance::{build_distance_matrix_fallback_only, NullCacheStore};
    use crate::domain::{
        Asset, AssetCondition, AssetStatus, ContractItem, Game, Hub, Person, PersonRole,
        SeasonPhase, Vehicle, VehicleStatus, Venue, WeekData,
    };

    fn hub() -> Hub {
        Hub {
            id: "h1".into(),
            name: "Hub One".into(),
            city: "Cleveland".into(),
            state: "OH".into(),
            address: "1 Main St".into(),
            lat: 41.4993,
            lng: -81.6944,
        }
    }

    fn venue() -> Venue {
        Venue {
            id: "v1".into(),
            customer_id: Some("c1".into()),
            name: "Arena".into(),
            address: None,
            city: None,
            state: None,
            lat: Some(41.51),
            lng: Some(-81.71),
            is_primary: true,
        }
    }

    fn single_stop_week() -> WeekData {
        let mut week = WeekData::new(2025, 1);
        week.hubs.push(hub());
        let v = venue();
        week.games.push(Game {
            id: "g1".into(),
            customer_id: "c1".into(),
            customer_name: "Customer".into(),
            venue_id: Some(v.id.clone()),
            venue: Some(v.clone()),
            season_year: 2025,
            week_number: 1,
            game_date: "2025-09-07".into(),
            game_time: Some("19:00:00".into()),
            opponent: None,
            is_home_game: true,
            sidelines_served: "both".into(),
            season_phase: SeasonPhase::Regular,
        });
        week.contract_items.push(ContractItem {
            id: "ci1".into(),
            contract_id: "con1".into(),
            customer_id: "c1".into(),
            customer_name: "Customer".into(),
            asset_type: "bench".into(),
            model_version: None,
            quantity: 1,
            branding_spec: None,
        });
        week.assets.push(Asset {
            id: "a1".into(),
            serial_number: "sn1".into(),
            asset_type: "bench".into(),
            model_version: None,
            condition: AssetCondition::InService,
            status: AssetStatus::AtHub,
            home_hub_id: "h1".into(),
            current_hub: Some("h1".into()),
            current_venue_id: None,
            current_trip_id: None,
            weight_lbs: Some(150.0),
            current_branding: None,
        });
        week.vehicles.push(Vehicle {
            id: "veh1".into(),
            name: "Truck 1".into(),
            vehicle_type: Some("box_truck".into()),
            home_hub_id: "h1".into(),
            capacity_lbs: Some(5000),
            capacity_cuft: None,
            status: VehicleStatus::Active,
        });
        week.personnel.push(Person {
            id: "p1".into(),
            name: "Driver One".into(),
            role: PersonRole::Driver,
            home_hub_id: "h1".into(),
            skills: Vec::new(),
            max_drive_hrs: 11,
        });
        week
    }

    #[test]
    fn single_stop_happy_path_produces_one_trip_with_no_unassigned() {
        let week = single_stop_week();
        let config = Config::defaults();
        let constraints = build_constraints(&week, &config);
        let locations = week.all_locations();
        let matrix = build_distance_matrix_fallback_only(locations, &NullCacheStore, config.distance_cache_tolerance);
        let clusters = crate::clustering::cluster_venues(
            &week.game_venues(),
            &week.hub_locations(),
            &matrix,
            config.max_cluster_radius_miles,
            config.max_stops_per_trip,
        );
        let result = optimize_week(&week, &matrix, &constraints, clusters, config.solver_timeout_ms, None);
        assert_eq!(result.trips.len(), 1);
        assert!(!result.has_unassigned());
        assert_eq!(result.status.as_str(), "completed");
    }

    #[test]
    fn capacity_overflow_is_a_warning_not_an_exclusion() {
        let mut week = single_stop_week();
        week.vehicles[0].capacity_lbs = Some(10);
        let config = Config::defaults();
        let constraints = build_constraints(&week, &config);
        let locations = week.all_locations();
        let matrix = build_distance_matrix_fallback_only(locations, &NullCacheStore, config.distance_cache_tolerance);
        let clusters = crate::clustering::cluster_venues(
            &week.game_venues(),
            &week.hub_locations(),
            &matrix,
            config.max_cluster_radius_miles,
            config.max_stops_per_trip,
        );
        let result = optimize_week(&week, &matrix, &constraints, clusters, config.solver_timeout_ms, None);
        assert_eq!(result.trips.len(), 1);
        assert!(result.warnings.iter().any(|w| w.contains("overloaded")));
    }

    #[test]
    fn missing_asset_type_produces_unassigned_demand() {
        let mut week = single_stop_week();
        week.assets.clear();
        let config = Config::defaults();
        let constraints = build_constraints(&week, &config);
        let locations = week.all_locations();
        let matrix = build_distance_matrix_fallback_only(locations, &NullCacheStore, config.distance_cache_tolerance);
        let clusters = crate::clustering::cluster_venues(
            &week.game_venues(),
            &week.hub_locations(),
            &matrix,
            config.max_cluster_radius_miles,
            config.max_stops_per_trip,
        );
        let result = optimize_week(&week, &matrix, &constraints, clusters, config.solver_timeout_ms, None);
        assert!(result.has_unassigned());
        assert_eq!(result.status.as_str(), "partial");
    }
}
