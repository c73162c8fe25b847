//! Planner orchestration: the two strategies (regular week, preseason
//! multi-pass) behind a single `plan` entry point, plus the shared
//! assignment primitive, TSP reorder, and infeasibility cascade they call.
//!
//! The two strategies are not duplicated pipelines — `optimize_week0` is
//! a multi-pass loop around the same `optimize_week` assignment primitive
//! used by a regular week, distinguished only by whether asset
//! consumption accumulates across passes.

pub mod assignment;
pub mod cascade;
pub mod preseason;
pub mod tsp;

use crate::clustering::cluster_venues;
use crate::config::Config;
use crate::constraints::Constraints;
use crate::distance::DistanceMatrix;
use crate::domain::WeekData;

use assignment::OptimizationResult;

/// Run the full planning pipeline for one week: cluster venues, assign
/// vehicles/assets/personnel (via the week-0 multi-pass loop or the
/// regular single-pass planner), then resolve any leftover infeasibility
/// through the relaxation cascade.
///
/// Scoring and lookahead disposition are applied by the caller
/// (`http.rs`'s request handler) once next-week data is available.
pub fn plan(
    week_data: &WeekData,
    dist_matrix: &DistanceMatrix,
    constraints: &Constraints,
    config: &Config,
) -> OptimizationResult {
    let clusters = cluster_venues(
        &week_data.game_venues(),
        &week_data.hub_locations(),
        dist_matrix,
        config.max_cluster_radius_miles,
        config.max_stops_per_trip,
    );

    let result = if week_data.week_number == 0 {
        preseason::optimize_week0(
            week_data,
            dist_matrix,
            constraints,
            config.solver_timeout_ms,
            config.max_cluster_radius_miles,
            config.max_stops_per_trip,
        )
    } else {
        assignment::optimize_week(
            week_data,
            dist_matrix,
            constraints,
            clusters,
            config.solver_timeout_ms,
            None,
        )
    };

    if result.has_unassigned() {
        cascade::handle_infeasibility(week_data, dist_matrix, config, result)
    } else {
        result
    }
}
