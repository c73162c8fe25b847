//! Weighted 0-100 quality scoring, per trip and per run.
//!
//! Five weighted components make up a trip's score: distance efficiency
//! (0.40), capacity utilization (0.20), time efficiency (0.15), constraint
//! satisfaction (0.15), and a multi-stop bonus (0.10). The run average is
//! the mean trip score, penalized for unassigned demand.

use crate::distance::DistanceMatrix;
use crate::planner::assignment::{ConstraintRelaxation, OptimizationResult, Trip};

const WEIGHT_DISTANCE: f64 = 0.40;
const WEIGHT_CAPACITY: f64 = 0.20;
const WEIGHT_TIME: f64 = 0.15;
const WEIGHT_CONSTRAINTS: f64 = 0.15;
const WEIGHT_MULTI_STOP: f64 = 0.10;

const ESTIMATED_VEHICLE_CAPACITY_LBS: f64 = 10_000.0;
const MAX_DRIVE_HRS: f64 = 11.0;

fn estimated_weight_lbs(asset_type: &str) -> f64 {
    match asset_type {
        "bench" => 150.0,
        "shader" => 200.0,
        "foot_deck" => 50.0,
        _ => 100.0,
    }
}

/// Distance efficiency: how close actual route miles are to a
/// straight-line round trip to the furthest stop. 100 = at the expected
/// ~1.3x road factor or better, tapering to 0 well beyond it.
fn score_distance_efficiency(trip: &Trip, dist_matrix: &DistanceMatrix) -> f64 {
    if trip.total_miles <= 0.0 {
        return 100.0;
    }

    let Some(hub_idx) = dist_matrix
        .locations
        .iter()
        .position(|loc| loc.label.as_deref() == Some(trip.origin_hub_name.as_str()))
    else {
        return 50.0;
    };
    let hub_loc = &dist_matrix.locations[hub_idx];

    let max_straight_line = trip
        .stops
        .iter()
        .filter_map(|stop| {
            dist_matrix
                .locations
                .iter()
                .find(|loc| loc.label.as_deref() == Some(stop.venue_name.as_str()))
                .map(|loc| hub_loc.haversine_miles(loc))
        })
        .fold(0.0_f64, f64::max);

    if max_straight_line <= 0.0 {
        return 50.0;
    }

    let min_round_trip = 2.0 * max_straight_line;
    let ratio = min_round_trip / trip.total_miles;
    let adjusted_ratio = (ratio / 0.77).min(1.0);

    (adjusted_ratio * 100.0).clamp(0.0, 100.0)
}

/// Capacity utilization: estimated payload weight as a fraction of an
/// assumed 10,000 lb vehicle capacity. 50-90% full scores 100; over or
/// under that band tapers off.
fn score_capacity_utilization(trip: &Trip) -> f64 {
    if trip.assets.is_empty() {
        return 0.0;
    }

    let total_weight: f64 = trip
        .assets
        .iter()
        .map(|a| estimated_weight_lbs(&a.asset_type))
        .sum();
    let utilization = total_weight / ESTIMATED_VEHICLE_CAPACITY_LBS;

    if (0.5..=0.9).contains(&utilization) {
        100.0
    } else if utilization > 0.9 {
        (100.0 - (utilization - 0.9) * 200.0).max(60.0)
    } else {
        (utilization / 0.5 * 100.0).max(20.0)
    }
}

/// Time efficiency: drive hours against the 11-hour DOT limit.
fn score_time_efficiency(trip: &Trip) -> f64 {
    if trip.total_drive_hrs <= 0.0 {
        return 100.0;
    }

    let ratio = trip.total_drive_hrs / MAX_DRIVE_HRS;
    if ratio <= 0.7 {
        100.0
    } else if ratio <= 0.9 {
        80.0 + (0.9 - ratio) / 0.2 * 20.0
    } else if ratio <= 1.0 {
        50.0 + (1.0 - ratio) / 0.1 * 30.0
    } else {
        (50.0 - (ratio - 1.0) * 100.0).max(0.0)
    }
}

fn relaxation_penalty(relaxation: &ConstraintRelaxation) -> u32 {
    match relaxation.action {
        "relaxed_soft_constraints" => 10,
        "relaxed_branding" => 20,
        "split_multi_stop" => 15,
        "cross_hub_assignments" => 25,
        "partial_solution" => 30,
        _ => 10,
    }
}

/// Constraint satisfaction: 100 minus a penalty per relaxation step
/// applied to reach this result.
fn score_constraint_satisfaction(result: &OptimizationResult) -> f64 {
    if result.constraint_relaxations.is_empty() {
        return 100.0;
    }
    let total_penalty: u32 = result
        .constraint_relaxations
        .iter()
        .map(relaxation_penalty)
        .sum();
    (100.0 - total_penalty as f64).max(0.0)
}

/// Multi-stop bonus: rewards grouping deliveries into one trip.
fn score_multi_stop_bonus(trip: &Trip) -> f64 {
    match trip.stops.len() {
        0 | 1 => 50.0,
        2 => 75.0,
        3 => 90.0,
        _ => 100.0,
    }
}

/// Score a single trip in [0, 100], combining the five weighted factors.
pub fn score_trip(trip: &Trip, dist_matrix: &DistanceMatrix, result: &OptimizationResult) -> f64 {
    let distance_score = score_distance_efficiency(trip, dist_matrix);
    let capacity_score = score_capacity_utilization(trip);
    let time_score = score_time_efficiency(trip);
    let constraint_score = score_constraint_satisfaction(result);
    let multi_stop_score = score_multi_stop_bonus(trip);

    let total = distance_score * WEIGHT_DISTANCE
        + capacity_score * WEIGHT_CAPACITY
        + time_score * WEIGHT_TIME
        + constraint_score * WEIGHT_CONSTRAINTS
        + multi_stop_score * WEIGHT_MULTI_STOP;

    crate::geo::round1(total.clamp(0.0, 100.0))
}

/// Score every trip in a result and compute the run average, penalizing
/// unassigned demand. An empty, fully-satisfied result scores 100.
pub fn score_run(mut result: OptimizationResult, dist_matrix: &DistanceMatrix) -> OptimizationResult {
    if result.trips.is_empty() {
        result.average_score = if result.has_unassigned() { 0.0 } else { 100.0 };
        return result;
    }

    let scores: Vec<f64> = result
        .trips
        .iter()
        .map(|trip| score_trip(trip, dist_matrix, &result))
        .collect();
    for (trip, score) in result.trips.iter_mut().zip(scores.iter()) {
        trip.optimizer_score = *score;
    }

    let total: f64 = scores.iter().sum();
    let mut average = total / scores.len() as f64;

    if result.has_unassigned() {
        let penalty = (result.unassigned_demands.len() as f64 * 5.0).min(30.0);
        average = (average - penalty).max(0.0);
    }

    result.average_score = crate::geo::round1(average);
    result
}
