//! Hard + soft constraint definitions. Hard constraints must be satisfied
//! or the trip fails; soft constraints are optimized but relaxable during
//! the infeasibility cascade (see `planner::cascade`).

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::config::Config;
use crate::domain::{Asset, AssetCondition, BrandingTask, BrandingTaskStatus, ContractItem, Game, Vehicle, WeekData};

/// Time window for a stop: earliest arrival, latest arrival, and how long
/// the crew needs on-site for setup/teardown.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub earliest_arrival: NaiveDateTime,
    pub latest_arrival: NaiveDateTime,
    pub service_time_minutes: i64,
}

/// Equipment demand for a game at a venue.
#[derive(Debug, Clone)]
pub struct Demand {
    pub game: Game,
    pub venue_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub items: Vec<ContractItem>,
    pub total_quantity: i32,
    pub total_weight_lbs: f64,
    pub time_window: Option<TimeWindow>,
}

/// Complete constraint set for a single optimization run.
#[derive(Debug, Clone)]
pub struct Constraints {
    pub demands: Vec<Demand>,
    pub time_windows: HashMap<String, TimeWindow>,
    pub max_drive_hrs: i32,
    pub setup_buffer_hours: f64,
    pub teardown_buffer_hours: f64,

    pub weight_minimize_miles: f64,
    pub weight_minimize_vehicles: f64,
    pub weight_prefer_closest_hub: f64,
    pub weight_minimize_rebranding: f64,
    pub weight_geographic_clustering: f64,

    pub blocked_asset_ids: HashSet<String>,

    pub hub_vehicle_counts: HashMap<String, usize>,
    pub hub_personnel_counts: HashMap<String, usize>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            demands: Vec::new(),
            time_windows: HashMap::new(),
            max_drive_hrs: 11,
            setup_buffer_hours: 4.0,
            teardown_buffer_hours: 3.0,
            weight_minimize_miles: 1.0,
            weight_minimize_vehicles: 0.8,
            weight_prefer_closest_hub: 0.6,
            weight_minimize_rebranding: 0.7,
            weight_geographic_clustering: 0.5,
            blocked_asset_ids: HashSet::new(),
            hub_vehicle_counts: HashMap::new(),
            hub_personnel_counts: HashMap::new(),
        }
    }
}

impl Constraints {
    /// Whether any soft constraint has been relaxed below its default.
    pub fn is_relaxed(&self) -> bool {
        self.weight_minimize_miles < 1.0
            || self.weight_minimize_vehicles < 0.8
            || self.weight_prefer_closest_hub < 0.6
            || self.weight_minimize_rebranding < 0.7
    }
}

/// Estimated weight (lbs) for an asset type when the asset's own
/// `weight_lbs` is unknown.
fn estimated_weight_lbs(asset_type: &str) -> f64 {
    match asset_type {
        "bench" => 150.0,
        "shader" => 200.0,
        "foot_deck" => 50.0,
        _ => 100.0,
    }
}

fn parse_game_datetime(game_date: &str, game_time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(game_date, "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(game_time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(game_time, "%H:%M"))
        .ok()?;
    Some(NaiveDateTime::new(date, time))
}

/// Build the complete constraint set from a week's data: demands with time
/// windows, blocked-asset set from pending branding tasks, and hub
/// vehicle/personnel capacity counts.
pub fn build_constraints(week_data: &WeekData, config: &Config) -> Constraints {
    let mut constraints = Constraints {
        setup_buffer_hours: config.setup_buffer_hours,
        teardown_buffer_hours: config.teardown_buffer_hours,
        ..Default::default()
    };

    let is_week0 = week_data.week_number == 0;

    for game in &week_data.games {
        let items = week_data.demands_for_game(game);
        let Some(venue_id) = &game.venue_id else {
            continue;
        };
        if items.is_empty() {
            continue;
        }

        let total_qty: i32 = items.iter().map(|i| i.quantity).sum();
        let total_weight: f64 = items
            .iter()
            .map(|i| i.quantity as f64 * estimated_weight_lbs(&i.asset_type))
            .sum();

        let mut time_window = None;
        if !is_week0 {
            if let Some(game_time) = &game.game_time {
                if let Some(game_dt) = parse_game_datetime(&game.game_date, game_time) {
                    let tw = TimeWindow {
                        earliest_arrival: game_dt - TimeDelta::hours(24),
                        latest_arrival: game_dt
                            - TimeDelta::minutes((constraints.setup_buffer_hours * 60.0) as i64),
                        service_time_minutes: 60,
                    };
                    constraints.time_windows.insert(venue_id.clone(), tw);
                    time_window = Some(tw);
                }
            }
        }

        constraints.demands.push(Demand {
            game: game.clone(),
            venue_id: venue_id.clone(),
            customer_id: game.customer_id.clone(),
            customer_name: game.customer_name.clone(),
            items,
            total_quantity: total_qty,
            total_weight_lbs: total_weight,
            time_window,
        });
    }

    for bt in &week_data.branding_tasks {
        if matches!(bt.status, BrandingTaskStatus::Pending | BrandingTaskStatus::InProgress) {
            constraints.blocked_asset_ids.insert(bt.asset_id.clone());
        }
    }

    for hub in &week_data.hubs {
        constraints
            .hub_vehicle_counts
            .insert(hub.id.clone(), week_data.available_vehicles_at_hub(&hub.id).len());
        constraints
            .hub_personnel_counts
            .insert(hub.id.clone(), week_data.available_personnel_at_hub(&hub.id).len());
    }

    constraints
}

/// Whether a vehicle can carry the given assets (weight only).
pub fn check_capacity(vehicle: &Vehicle, assets: &[&Asset]) -> bool {
    let Some(capacity) = vehicle.capacity_lbs else {
        return true;
    };
    let total_weight: f64 = assets.iter().map(|a| a.weight_lbs.unwrap_or(0.0)).sum();
    total_weight <= capacity as f64
}

pub fn check_capacity_weight(vehicle: &Vehicle, total_weight: f64) -> bool {
    match vehicle.capacity_lbs {
        Some(capacity) => total_weight <= capacity as f64,
        None => true,
    }
}

/// Whether an asset's current branding satisfies a customer's required
/// branding spec. Unbranded assets are always usable; a completed branding
/// task retroactively satisfies the spec.
pub fn check_branding(
    asset: &Asset,
    branding_spec: Option<&str>,
    branding_tasks: &[BrandingTask],
) -> bool {
    let Some(spec) = branding_spec else {
        return true;
    };
    let Some(current) = &asset.current_branding else {
        return true;
    };
    if current == spec {
        return true;
    }
    branding_tasks.iter().any(|bt| {
        bt.asset_id == asset.id
            && bt.to_branding.as_deref() == Some(spec)
            && bt.status == BrandingTaskStatus::Completed
    })
}

pub fn check_drive_time(duration_minutes: f64, max_drive_hrs: i32) -> bool {
    duration_minutes <= (max_drive_hrs * 60) as f64
}

pub fn check_time_window(arrival_time: NaiveDateTime, time_window: Option<&TimeWindow>) -> bool {
    match time_window {
        Some(tw) => tw.earliest_arrival <= arrival_time && arrival_time <= tw.latest_arrival,
        None => true,
    }
}

/// Whether an asset can fulfill a specific contract line item: type,
/// model, blocked status, condition, and branding all must line up.
pub fn match_asset_to_demand(
    asset: &Asset,
    demand_item: &ContractItem,
    blocked_ids: &HashSet<String>,
    branding_tasks: &[BrandingTask],
) -> bool {
    if blocked_ids.contains(&asset.id) {
        return false;
    }
    if matches!(
        asset.condition,
        AssetCondition::OutOfService | AssetCondition::NeedsRepair
    ) {
        return false;
    }
    if asset.asset_type != demand_item.asset_type {
        return false;
    }
    if let Some(model) = &demand_item.model_version {
        if asset.model_version.as_ref() != Some(model) {
            return false;
        }
    }
    check_branding(asset, demand_item.branding_spec.as_deref(), branding_tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetStatus, SeasonPhase, Venue};

    fn base_game() -> Game {
        Game {
            id: "g1".into(),
            customer_id: "c1".into(),
            customer_name: "Customer".into(),
            venue_id: Some("v1".into()),
            venue: Some(Venue {
                id: "v1".into(),
                customer_id: Some("c1".into()),
                name: "Arena".into(),
                address: None,
                city: None,
                state: None,
                lat: Some(41.5),
                lng: Some(-81.7),
                is_primary: true,
            }),
            season_year: 2025,
            week_number: 1,
            game_date: "2025-09-07".into(),
            game_time: Some("19:00:00".into()),
            opponent: None,
            is_home_game: true,
            sidelines_served: "both".into(),
            season_phase: SeasonPhase::Regular,
        }
    }

    fn base_asset() -> Asset {
        Asset {
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
            weight_lbs: None,
            current_branding: None,
        }
    }

    #[test]
    fn build_constraints_skips_week0_time_windows() {
        let mut week = WeekData::new(2025, 0);
        week.games.push(base_game());
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
        let constraints = build_constraints(&week, &Config::defaults());
        assert_eq!(constraints.demands.len(), 1);
        assert!(constraints.demands[0].time_window.is_none());
    }

    #[test]
    fn build_constraints_builds_time_window_for_regular_week() {
        let mut week = WeekData::new(2025, 1);
        week.games.push(base_game());
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
        let constraints = build_constraints(&week, &Config::defaults());
        assert!(constraints.demands[0].time_window.is_some());
        assert_eq!(constraints.demands[0].total_weight_lbs, 300.0);
    }

    #[test]
    fn blocked_assets_fail_match() {
        let asset = base_asset();
        let mut blocked = HashSet::new();
        blocked.insert(asset.id.clone());
        let item = ContractItem {
            id: "ci1".into(),
            contract_id: "con1".into(),
            customer_id: "c1".into(),
            customer_name: "Customer".into(),
            asset_type: "bench".into(),
            model_version: None,
            quantity: 1,
            branding_spec: None,
        };
        assert!(!match_asset_to_demand(&asset, &item, &blocked, &[]));
    }

    #[test]
    fn unbranded_asset_satisfies_any_branding_spec() {
        let asset = base_asset();
        assert!(check_branding(&asset, Some("red"), &[]));
    }

    #[test]
    fn mismatched_branding_without_completed_task_fails() {
        let mut asset = base_asset();
        asset.current_branding = Some("blue".into());
        assert!(!check_branding(&asset, Some("red"), &[]));
    }
}
