//! Week 0 (pre-season deployment) multi-pass optimizer.
//!
//! Week 0 has no time crunch: trucks make multiple round trips over days.
//! This wraps the standard `optimize_week` in a multi-pass loop that
//! releases vehicles and personnel between passes while keeping consumed
//! assets tracked across passes to prevent double-shipping the same item.

use std::collections::HashSet;

use tracing::debug;

use crate::clustering::cluster_venues;
use crate::constraints::Constraints;
use crate::distance::DistanceMatrix;
use crate::domain::WeekData;

use super::assignment::{optimize_week, OptimizationResult, RunStatus};

/// Safety limit to prevent infinite passes.
const MAX_PASSES: u32 = 10;

/// Run the Week 0 multi-pass optimizer. Each pass assigns fresh vehicles
/// and personnel but accumulates consumed assets globally; the loop stops
/// when every demand is served, a pass makes no further progress, or the
/// total time budget (3x `timeout_ms`) is exhausted.
pub fn optimize_week0(
    week_data: &WeekData,
    dist_matrix: &DistanceMatrix,
    constraints: &Constraints,
    timeout_ms: u64,
    max_cluster_radius_miles: f64,
    max_stops_per_trip: usize,
) -> OptimizationResult {
    let start = std::time::Instant::now();
    let total_budget_ms = timeout_ms * 3;

    let mut combined = OptimizationResult::default();
    let mut global_used_asset_ids: HashSet<String> = HashSet::new();
    let all_demands = constraints.demands.clone();
    let mut served_set: HashSet<(String, String)> = HashSet::new();
    let mut pass_num = 0u32;

    for pass in 1..=MAX_PASSES {
        pass_num = pass;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        if elapsed_ms >= total_budget_ms {
            combined
                .warnings
                .push(format!("Time budget exceeded after {} passes", pass - 1));
            break;
        }

        let remaining_demands: Vec<_> = all_demands
            .iter()
            .filter(|d| !served_set.contains(&(d.venue_id.clone(), d.customer_id.clone())))
            .cloned()
            .collect();

        if remaining_demands.is_empty() {
            break;
        }

        let mut pass_constraints = Constraints {
            demands: remaining_demands.clone(),
            time_windows: Default::default(),
            setup_buffer_hours: 0.0,
            teardown_buffer_hours: 0.0,
            blocked_asset_ids: constraints.blocked_asset_ids.clone(),
            hub_vehicle_counts: constraints.hub_vehicle_counts.clone(),
            hub_personnel_counts: constraints.hub_personnel_counts.clone(),
            ..Default::default()
        };
        pass_constraints.max_drive_hrs = constraints.max_drive_hrs;

        let remaining_venue_ids: HashSet<&str> =
            remaining_demands.iter().map(|d| d.venue_id.as_str()).collect();
        let remaining_venues: Vec<_> = week_data
            .game_venues()
            .into_iter()
            .filter(|v| remaining_venue_ids.contains(v.id.as_str()))
            .collect();

        let pass_clusters = cluster_venues(
            &remaining_venues,
            &week_data.hub_locations(),
            dist_matrix,
            max_cluster_radius_miles,
            max_stops_per_trip,
        );

        if pass_clusters.is_empty() {
            break;
        }

        let remaining_budget = total_budget_ms.saturating_sub(elapsed_ms);
        let pass_timeout = timeout_ms.min(remaining_budget);

        let prev_asset_count = global_used_asset_ids.len();
        let result = optimize_week(
            week_data,
            dist_matrix,
            &pass_constraints,
            pass_clusters,
            pass_timeout,
            Some(global_used_asset_ids.clone()),
        );

        let new_trip_count = result.trips.len();
        if new_trip_count == 0 {
            combined.unassigned_demands.extend(result.unassigned_demands);
            combined.warnings.push(format!(
                "Pass {pass_num}: No trips generated, {} demands remain",
                remaining_demands.len()
            ));
            break;
        }

        combined.trips.extend(result.trips.clone());
        combined.warnings.extend(result.warnings.clone());
        combined
            .warnings
            .push(format!("Pass {pass_num}: {new_trip_count} trips generated"));

        for trip in &result.trips {
            for asset in &trip.assets {
                global_used_asset_ids.insert(asset.asset_id.clone());
            }
        }

        let new_assets_consumed = global_used_asset_ids.len() - prev_asset_count;
        if new_assets_consumed == 0 {
            combined
                .warnings
                .push(format!("Pass {pass_num}: No new assets consumed, stopping"));
            combined.unassigned_demands.extend(result.unassigned_demands);
            break;
        }

        for trip in &result.trips {
            for stop in &trip.stops {
                if let Some(demand) = &stop.demand {
                    served_set.insert((demand.venue_id.clone(), demand.customer_id.clone()));
                }
            }
        }

        debug!(
            pass_num,
            new_trip_count, new_assets_consumed, unassigned = result.unassigned_demands.len(),
            "week0 pass complete"
        );

        if !result.has_unassigned() {
            break;
        }
    }

    combined.solve_time_ms = start.elapsed().as_millis() as u64;
    combined.status = if combined.unassigned_demands.is_empty() {
        RunStatus::Completed
    } else {
        RunStatus::Partial
    };

    debug!(
        total_trips = combined.trips.len(),
        passes = pass_num,
        solve_time_ms = combined.solve_time_ms,
        "week0 optimization complete"
    );

    combined
}
