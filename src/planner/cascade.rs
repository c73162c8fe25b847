//! Six-step infeasibility relaxation cascade: when the initial optimization
//! pass leaves demands unassigned, progressively relax constraint
//! categories and re-run, keeping whichever attempt leaves fewest
//! demands unassigned, stopping at the first fully feasible result.

use crate::clustering::{cluster_venues, VenueCluster};
use crate::config::Config;
use crate::constraints::build_constraints;
use crate::distance::DistanceMatrix;
use crate::domain::{AssetCondition, AssetStatus, WeekData};

use super::assignment::{optimize_week, ConstraintRelaxation, OptimizationResult, RunStatus};

fn is_better(new: &OptimizationResult, old: &OptimizationResult) -> bool {
    new.unassigned_demands.len() < old.unassigned_demands.len()
}

fn step1_relax_soft_constraints(
    week_data: &WeekData,
    dist_matrix: &DistanceMatrix,
    config: &Config,
) -> OptimizationResult {
    let mut constraints = build_constraints(week_data, config);
    constraints.weight_minimize_miles = 0.1;
    constraints.weight_minimize_vehicles = 0.1;
    constraints.weight_prefer_closest_hub = 0.1;
    constraints.weight_minimize_rebranding = 0.1;
    constraints.weight_geographic_clustering = 0.1;

    let clusters = cluster_venues(
        &week_data.game_venues(),
        &week_data.hub_locations(),
        dist_matrix,
        config.max_cluster_radius_miles,
        config.max_stops_per_trip,
    );
    optimize_week(week_data, dist_matrix, &constraints, clusters, config.solver_timeout_ms, None)
}

fn step2_relax_branding(
    week_data: &WeekData,
    dist_matrix: &DistanceMatrix,
    config: &Config,
) -> OptimizationResult {
    let mut constraints = build_constraints(week_data, config);
    constraints.blocked_asset_ids.clear();
    constraints.weight_minimize_rebranding = 0.0;

    let clusters = cluster_venues(
        &week_data.game_venues(),
        &week_data.hub_locations(),
        dist_matrix,
        config.max_cluster_radius_miles,
        config.max_stops_per_trip,
    );
    optimize_week(week_data, dist_matrix, &constraints, clusters, config.solver_timeout_ms, None)
}

fn singleton_clusters(week_data: &WeekData) -> Vec<VenueCluster> {
    week_data
        .game_venues()
        .into_iter()
        .map(|venue| VenueCluster {
            venues: vec![venue],
            ..Default::default()
        })
        .collect()
}

fn step3_split_multi_stop(
    week_data: &WeekData,
    dist_matrix: &DistanceMatrix,
    config: &Config,
) -> OptimizationResult {
    let mut constraints = build_constraints(week_data, config);
    constraints.blocked_asset_ids.clear();
    let clusters = singleton_clusters(week_data);
    optimize_week(week_data, dist_matrix, &constraints, clusters, config.solver_timeout_ms, None)
}

fn step4_cross_hub(
    week_data: &WeekData,
    dist_matrix: &DistanceMatrix,
    config: &Config,
) -> OptimizationResult {
    let mut constraints = build_constraints(week_data, config);
    constraints.blocked_asset_ids.clear();
    constraints.weight_prefer_closest_hub = 0.0;
    let clusters = singleton_clusters(week_data);
    optimize_week(week_data, dist_matrix, &constraints, clusters, config.solver_timeout_ms, None)
}

/// Classify remaining unassigned demands with a specific explanation,
/// inspecting inventory/hub/fleet state rather than leaving whatever
/// proximate reason the planner attached on its way through the cascade.
fn classify_unassigned(mut result: OptimizationResult, week_data: &WeekData) -> OptimizationResult {
    for demand in &mut result.unassigned_demands {
        let matching_assets: Vec<_> = week_data
            .assets
            .iter()
            .filter(|a| {
                a.asset_type == demand.asset_type
                    && !matches!(a.condition, AssetCondition::OutOfService | AssetCondition::NeedsRepair)
            })
            .collect();

        demand.reason = if matching_assets.is_empty() {
            "Asset type/model not available in inventory".to_string()
        } else if matching_assets.iter().all(|a| a.status != AssetStatus::AtHub) {
            format!("All {} assets are deployed — none at hub", demand.asset_type)
        } else {
            let total_vehicles = week_data.vehicles.len();
            let total_personnel = week_data
                .personnel
                .iter()
                .filter(|p| matches!(p.role, crate::domain::PersonRole::Driver | crate::domain::PersonRole::LeadTech))
                .count();
            if total_vehicles == 0 {
                "No vehicle with sufficient capacity available".to_string()
            } else if total_personnel == 0 {
                "No personnel available at nearest hub".to_string()
            } else {
                "Insufficient resources to cover all demands this week".to_string()
            }
        };
    }
    result
}

/// Apply the relaxation cascade to `initial_result` if it left any demand
/// unassigned; otherwise return it untouched.
pub fn handle_infeasibility(
    week_data: &WeekData,
    dist_matrix: &DistanceMatrix,
    config: &Config,
    initial_result: OptimizationResult,
) -> OptimizationResult {
    if initial_result.unassigned_demands.is_empty() {
        return initial_result;
    }

    let mut best = initial_result;

    let result = step1_relax_soft_constraints(week_data, dist_matrix, config);
    if is_better(&result, &best) {
        best = result;
        best.constraint_relaxations.push(ConstraintRelaxation {
            step: 1,
            action: "relaxed_soft_constraints",
            detail: "Allowed more miles, more vehicles, relaxed hub preference".into(),
        });
        if !best.has_unassigned() {
            return best;
        }
    }

    let result = step2_relax_branding(week_data, dist_matrix, config);
    if is_better(&result, &best) {
        best = result;
        best.constraint_relaxations.push(ConstraintRelaxation {
            step: 2,
            action: "relaxed_branding",
            detail: "Allowed unbranded or mismatched branding assets".into(),
        });
        best.warnings.push("Some assets may need rebranding before deployment".into());
        if !best.has_unassigned() {
            return best;
        }
    }

    let result = step3_split_multi_stop(week_data, dist_matrix, config);
    if is_better(&result, &best) {
        best = result;
        best.constraint_relaxations.push(ConstraintRelaxation {
            step: 3,
            action: "split_multi_stop",
            detail: "Split multi-stop trips into individual routes".into(),
        });
        if !best.has_unassigned() {
            return best;
        }
    }

    let result = step4_cross_hub(week_data, dist_matrix, config);
    if is_better(&result, &best) {
        best = result;
        best.constraint_relaxations.push(ConstraintRelaxation {
            step: 4,
            action: "cross_hub_assignments",
            detail: "Allowed vehicles from distant hubs to cover nearby games".into(),
        });
        if !best.has_unassigned() {
            return best;
        }
    }

    best = classify_unassigned(best, week_data);

    if best.has_unassigned() {
        best.status = RunStatus::Partial;
        let count = best.unassigned_demands.len();
        best.constraint_relaxations.push(ConstraintRelaxation {
            step: 6,
            action: "partial_solution",
            detail: format!("{count} demands could not be fulfilled"),
        });
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{build_distance_matrix_fallback_only, NullCacheStore};
    use crate::domain::{Asset, AssetCondition, AssetStatus, ContractItem, Game, Hub, SeasonPhase, Venue};

    fn week_with_unfulfillable_demand() -> WeekData {
        let mut week = WeekData::new(2025, 1);
        week.hubs.push(Hub {
            id: "h1".into(),
            name: "Hub One".into(),
            city: "Cleveland".into(),
            state: "OH".into(),
            address: "1 Main St".into(),
            lat: 41.4993,
            lng: -81.6944,
        });
        let venue = Venue {
            id: "v1".into(),
            customer_id: Some("c1".into()),
            name: "Arena".into(),
            address: None,
            city: None,
            state: None,
            lat: Some(41.51),
            lng: Some(-81.71),
            is_primary: true,
        };
        week.games.push(Game {
            id: "g1".into(),
            customer_id: "c1".into(),
            customer_name: "Customer".into(),
            venue_id: Some(venue.id.clone()),
            venue: Some(venue),
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
            quantity: 2,
            branding_spec: None,
        });
        // Only one matching asset exists and it's out of service.
        week.assets.push(Asset {
            id: "a1".into(),
            serial_number: "sn1".into(),
            asset_type: "bench".into(),
            model_version: None,
            condition: AssetCondition::OutOfService,
            status: AssetStatus::AtHub,
            home_hub_id: "h1".into(),
            current_hub: Some("h1".into()),
            current_venue_id: None,
            current_trip_id: None,
            weight_lbs: Some(150.0),
            current_branding: None,
        });
        week
    }

    #[test]
    fn fully_infeasible_week_is_classified_with_inventory_reason() {
        let week = week_with_unfulfillable_demand();
        let config = Config::defaults();
        let constraints = build_constraints(&week, &config);
        let locations = week.all_locations();
        let matrix = build_distance_matrix_fallback_only(locations, &NullCacheStore, config.distance_cache_tolerance);
        let clusters = cluster_venues(
            &week.game_venues(),
            &week.hub_locations(),
            &matrix,
            config.max_cluster_radius_miles,
            config.max_stops_per_trip,
        );
        let initial = optimize_week(&week, &matrix, &constraints, clusters, config.solver_timeout_ms, None);
        assert!(initial.has_unassigned());

        let resolved = handle_infeasibility(&week, &matrix, &config, initial);
        assert_eq!(resolved.status.as_str(), "partial");
        assert!(resolved
            .unassigned_demands
            .iter()
            .any(|d| d.reason.contains("not available in inventory")));
    }
}
