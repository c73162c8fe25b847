//! Tabular store client: reads week inputs and persists runs/trips from a
//! REST-style (PostgREST-shaped) relational store.
//!
//! Everything the core consumes is behind the `TabularStore` trait so
//! `http.rs`'s request handler — and its tests — never depend on a live
//! store.

mod rows;

use std::collections::HashSet;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::distance::{CacheRow, DistanceCacheStore};
use crate::domain::{Game, WeekData};
use crate::error::StoreError;
use crate::planner::assignment::OptimizationResult;

use rows::*;

const END_OF_SEASON_WEEK: i32 = 18;

/// Everything the planner pipeline needs from a persistent store: the
/// week's data, next week's schedule for lookahead, and a place to write
/// finished runs.
pub trait TabularStore {
    fn load_week_data(&self, season_year: i32, week_number: i32) -> Result<WeekData, StoreError>;
    fn load_next_week_schedule(&self, season_year: i32, week_number: i32) -> Result<Vec<Game>, StoreError>;
    fn write_results(
        &self,
        result: &OptimizationResult,
        season_year: i32,
        week_number: i32,
        triggered_by: &str,
    ) -> Result<String, StoreError>;
}

#[derive(Debug, Clone)]
pub struct TabularStoreClient {
    base_url: String,
    service_key: String,
    client: reqwest::blocking::Client,
}

impl TabularStoreClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: config.store_url.trim_end_matches('/').to_string(),
            service_key: config.store_service_key.clone(),
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn get(&self, table: &str, params: &[(&str, &str)]) -> Result<Vec<Value>, StoreError> {
        let response = self
            .client
            .get(self.table_url(table))
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .query(params)
            .send()?;
        let response = check_status(response)?;
        Ok(response.json()?)
    }

    fn post(&self, table: &str, body: &Value) -> Result<Vec<Value>, StoreError> {
        let response = self
            .client
            .post(self.table_url(table))
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Prefer", "return=representation")
            .json(body)
            .send()?;
        let response = check_status(response)?;
        Ok(response.json()?)
    }

    fn patch(&self, table: &str, params: &[(&str, &str)], body: &Value) -> Result<Vec<Value>, StoreError> {
        let response = self
            .client
            .patch(self.table_url(table))
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Prefer", "return=representation")
            .query(params)
            .json(body)
            .send()?;
        let response = check_status(response)?;
        Ok(response.json()?)
    }

    fn load_hubs(&self) -> Result<Vec<crate::domain::Hub>, StoreError> {
        let rows: Vec<HubRow> = serde_json::from_value(Value::Array(self.get("hubs", &[])?))?;
        Ok(rows.into_iter().map(HubRow::into_domain).collect())
    }

    fn load_assets(&self) -> Result<Vec<crate::domain::Asset>, StoreError> {
        let rows: Vec<AssetRow> = serde_json::from_value(Value::Array(self.get("assets", &[])?))?;
        Ok(rows.into_iter().map(AssetRow::into_domain).collect())
    }

    fn load_vehicles(&self, season_year: i32, week_number: i32) -> Result<Vec<crate::domain::Vehicle>, StoreError> {
        let rows: Vec<VehicleRow> = serde_json::from_value(Value::Array(
            self.get("vehicles", &[("status", "eq.active")])?,
        ))?;
        let unavailable: HashSet<String> = serde_json::from_value::<Vec<AvailabilityRow>>(Value::Array(self.get(
            "vehicle_availability",
            &[
                ("season_year", &format!("eq.{season_year}")),
                ("week_number", &format!("eq.{week_number}")),
                ("is_available", "eq.false"),
            ],
        )?))?
        .into_iter()
        .map(|r| r.entity_id)
        .collect();

        Ok(rows
            .into_iter()
            .filter(|r| !unavailable.contains(&r.id))
            .map(VehicleRow::into_domain)
            .collect())
    }

    fn load_personnel(&self, season_year: i32, week_number: i32) -> Result<Vec<crate::domain::Person>, StoreError> {
        let rows: Vec<PersonRow> = serde_json::from_value(Value::Array(self.get("personnel", &[])?))?;
        let unavailable: HashSet<String> = serde_json::from_value::<Vec<AvailabilityRow>>(Value::Array(self.get(
            "personnel_availability",
            &[
                ("season_year", &format!("eq.{season_year}")),
                ("week_number", &format!("eq.{week_number}")),
                ("is_available", "eq.false"),
            ],
        )?))?
        .into_iter()
        .map(|r| r.entity_id)
        .collect();

        Ok(rows
            .into_iter()
            .filter(|r| !unavailable.contains(&r.id))
            .map(PersonRow::into_domain)
            .collect())
    }

    fn load_branding_tasks(&self) -> Result<Vec<crate::domain::BrandingTask>, StoreError> {
        let rows: Vec<BrandingTaskRow> = serde_json::from_value(Value::Array(
            self.get("branding_tasks", &[("status", "neq.completed")])?,
        ))?;
        Ok(rows.into_iter().map(BrandingTaskRow::into_domain).collect())
    }

    fn load_asset_assignments(&self, season_year: i32) -> Result<Vec<crate::domain::AssetAssignment>, StoreError> {
        let rows: Vec<AssetAssignmentRow> = serde_json::from_value(Value::Array(
            self.get("asset_assignments", &[("season_year", &format!("eq.{season_year}"))])?,
        ))?;
        Ok(rows.into_iter().map(AssetAssignmentRow::into_domain).collect())
    }

    fn load_games_for_week(&self, season_year: i32, week_number: i32) -> Result<Vec<GameRow>, StoreError> {
        serde_json::from_value(Value::Array(self.get(
            "game_schedule",
            &[
                ("season_year", &format!("eq.{season_year}")),
                ("week_number", &format!("eq.{week_number}")),
                (
                    "select",
                    "*, customers(id, name, sport_type), venues(id, customer_id, name, address, city, state, lat, lng, is_primary)",
                ),
            ],
        )?))
        .map_err(StoreError::from)
    }

    fn load_contract_items(&self, customer_ids: &HashSet<String>) -> Result<Vec<crate::domain::ContractItem>, StoreError> {
        if customer_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = customer_ids.iter().cloned().collect::<Vec<_>>().join(",");
        let in_filter = format!("in.({filter})");
        let rows: Vec<ContractRow> = serde_json::from_value(Value::Array(self.get(
            "contracts",
            &[
                ("customer_id", &in_filter),
                ("status", "eq.active"),
                (
                    "select",
                    "id, customer_id, customers(name), contract_items(id, asset_type, model_version, quantity, branding_spec)",
                ),
            ],
        )?))?;

        Ok(rows
            .into_iter()
            .flat_map(|row| {
                let customer_name = row.customers.map(|c| c.name).unwrap_or_default();
                let contract_id = row.id;
                let customer_id = row.customer_id;
                row.contract_items.into_iter().map(move |item| crate::domain::ContractItem {
                    id: item.id,
                    contract_id: contract_id.clone(),
                    customer_id: customer_id.clone(),
                    customer_name: customer_name.clone(),
                    asset_type: item.asset_type,
                    model_version: item.model_version,
                    quantity: item.quantity,
                    branding_spec: item.branding_spec,
                })
            })
            .collect())
    }

    fn load_week0_data(&self, season_year: i32) -> Result<WeekData, StoreError> {
        let mut week_data = WeekData::new(season_year, 0);
        week_data.hubs = self.load_hubs()?;

        let week1_rows = self.load_games_for_week(season_year, 1)?;
        let mut customer_ids = HashSet::new();
        for row in week1_rows {
            customer_ids.insert(row.customer_id.clone());
            week_data.games.push(row.into_domain_week0());
        }

        if customer_ids.is_empty() {
            return Ok(week_data);
        }

        week_data.contract_items = self.load_contract_items(&customer_ids)?;
        week_data.assets = self.load_assets()?;
        // Week 0 has no availability filtering: every active vehicle can
        // make repeated trips over the deployment window.
        let all_vehicle_rows: Vec<VehicleRow> =
            serde_json::from_value(Value::Array(self.get("vehicles", &[("status", "eq.active")])?))?;
        week_data.vehicles = all_vehicle_rows.into_iter().map(VehicleRow::into_domain).collect();
        week_data.personnel = self.load_personnel(season_year, 0).unwrap_or_default();
        week_data.branding_tasks = self.load_branding_tasks()?;
        week_data.asset_assignments = self.load_asset_assignments(season_year)?;

        Ok(week_data)
    }
}

fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl TabularStore for TabularStoreClient {
    fn load_week_data(&self, season_year: i32, week_number: i32) -> Result<WeekData, StoreError> {
        if week_number == 0 {
            return self.load_week0_data(season_year);
        }

        let mut week_data = WeekData::new(season_year, week_number);
        week_data.hubs = self.load_hubs()?;

        let game_rows = self.load_games_for_week(season_year, week_number)?;
        let mut customer_ids = HashSet::new();
        for row in &game_rows {
            customer_ids.insert(row.customer_id.clone());
        }
        week_data.games = game_rows.into_iter().map(GameRow::into_domain).collect();

        if customer_ids.is_empty() {
            return Ok(week_data);
        }

        week_data.contract_items = self.load_contract_items(&customer_ids)?;
        week_data.assets = self.load_assets()?;
        week_data.vehicles = self.load_vehicles(season_year, week_number)?;
        week_data.personnel = self.load_personnel(season_year, week_number)?;
        week_data.branding_tasks = self.load_branding_tasks()?;
        week_data.asset_assignments = self.load_asset_assignments(season_year)?;

        Ok(week_data)
    }

    fn load_next_week_schedule(&self, season_year: i32, week_number: i32) -> Result<Vec<Game>, StoreError> {
        let next_week = week_number + 1;
        if next_week > END_OF_SEASON_WEEK {
            return Ok(Vec::new());
        }
        let rows = self.load_games_for_week(season_year, next_week)?;
        Ok(rows.into_iter().map(GameRow::into_domain).collect())
    }

    fn write_results(
        &self,
        result: &OptimizationResult,
        season_year: i32,
        week_number: i32,
        triggered_by: &str,
    ) -> Result<String, StoreError> {
        if self.service_key.is_empty() || self.base_url.is_empty() {
            return Ok(Uuid::new_v4().to_string());
        }

        let start = std::time::Instant::now();
        let run_id = Uuid::new_v4().to_string();

        let write_body = || -> Result<(), StoreError> {
            self.post(
                "optimizer_runs",
                &json!({
                    "id": run_id,
                    "week_number": week_number,
                    "season_year": season_year,
                    "triggered_by": triggered_by,
                    "status": "running",
                }),
            )?;

            let mut trips_written = 0usize;
            let mut trip_errors = Vec::new();
            for trip in &result.trips {
                match self.write_trip(trip, &run_id, season_year, week_number) {
                    Ok(_) => trips_written += 1,
                    Err(err) => {
                        let venue = trip
                            .stops
                            .first()
                            .map(|s| s.venue_name.as_str())
                            .unwrap_or("unknown");
                        trip_errors.push(format!("Failed to write trip to {venue}: {err}"));
                    }
                }
            }

            let duration_ms = start.elapsed().as_millis() as u64;
            let unassigned_json: Vec<Value> = result
                .unassigned_demands
                .iter()
                .map(|d| {
                    json!({
                        "customer": d.customer_name,
                        "venue": d.venue_name,
                        "asset_type": d.asset_type,
                        "quantity": d.quantity,
                        "reason": d.reason,
                    })
                })
                .collect();
            let relaxations_json: Vec<Value> = result
                .constraint_relaxations
                .iter()
                .map(|r| json!({"step": r.step, "action": r.action, "detail": r.detail}))
                .collect();
            let mut errors = result.errors.clone();
            errors.extend(trip_errors);

            self.patch(
                "optimizer_runs",
                &[("id", format!("eq.{run_id}").as_str())],
                &json!({
                    "status": result.status.as_str(),
                    "duration_ms": duration_ms,
                    "trips_generated": trips_written,
                    "warnings": result.warnings,
                    "errors": errors,
                    "unassigned_demands": unassigned_json,
                    "constraint_relaxations": relaxations_json,
                }),
            )?;
            Ok(())
        };

        if let Err(err) = write_body() {
            let duration_ms = start.elapsed().as_millis() as u64;
            let _ = self.patch(
                "optimizer_runs",
                &[("id", format!("eq.{run_id}").as_str())],
                &json!({
                    "status": "failed",
                    "duration_ms": duration_ms,
                    "errors": [err.to_string()],
                }),
            );
            return Err(err);
        }

        Ok(run_id)
    }
}

impl TabularStoreClient {
    fn write_trip(
        &self,
        trip: &crate::planner::assignment::Trip,
        run_id: &str,
        season_year: i32,
        week_number: i32,
    ) -> Result<String, StoreError> {
        let trip_id = Uuid::new_v4().to_string();

        self.post(
            "trips",
            &json!({
                "id": trip_id,
                "week_number": week_number,
                "season_year": season_year,
                "optimizer_run_id": run_id,
                "status": "recommended",
                "vehicle_id": trip.vehicle_id,
                "origin_type": "hub",
                "origin_id": trip.origin_hub_id,
                "depart_time": trip.depart_time,
                "return_time": trip.return_time,
                "total_miles": trip.total_miles,
                "total_drive_hrs": trip.total_drive_hrs,
                "is_recommended": true,
                "is_manual": false,
                "optimizer_score": trip.optimizer_score,
            }),
        )?;

        for stop in &trip.stops {
            self.post(
                "trip_stops",
                &json!({
                    "trip_id": trip_id,
                    "venue_id": stop.venue_id,
                    "stop_order": stop.stop_order,
                    "arrival_time": stop.arrival_time,
                    "depart_time": stop.depart_time,
                    "action": stop.action,
                    "requires_hub_return": stop.requires_hub_return,
                    "hub_return_reason": stop.hub_return_reason,
                }),
            )?;
        }

        if !trip.assets.is_empty() {
            let rows: Vec<Value> = trip
                .assets
                .iter()
                .map(|a| json!({"trip_id": trip_id, "asset_id": a.asset_id, "stop_id": a.stop_id}))
                .collect();
            for batch in rows.chunks(100) {
                self.post("trip_assets", &Value::Array(batch.to_vec()))?;
            }
        }

        if !trip.personnel.is_empty() {
            let rows: Vec<Value> = trip
                .personnel
                .iter()
                .map(|p| json!({"trip_id": trip_id, "person_id": p.person_id, "role_on_trip": p.role_on_trip}))
                .collect();
            self.post("trip_personnel", &Value::Array(rows))?;
        }

        Ok(trip_id)
    }
}

impl DistanceCacheStore for TabularStoreClient {
    fn load_cache_rows(&self) -> Vec<CacheRow> {
        if self.service_key.is_empty() || self.base_url.is_empty() {
            return Vec::new();
        }
        self.get("distance_cache", &[])
            .ok()
            .and_then(|rows| serde_json::from_value::<Vec<DistanceCacheRow>>(Value::Array(rows)).ok())
            .map(|rows| rows.into_iter().map(DistanceCacheRow::into_cache_row).collect())
            .unwrap_or_default()
    }

    fn write_cache_rows(&self, rows: &[CacheRow]) {
        if self.service_key.is_empty() || self.base_url.is_empty() || rows.is_empty() {
            return;
        }
        let body: Vec<Value> = rows
            .iter()
            .map(|r| {
                json!({
                    "origin_lat": r.origin_lat,
                    "origin_lng": r.origin_lng,
                    "dest_lat": r.dest_lat,
                    "dest_lng": r.dest_lng,
                    "distance_miles": r.distance_miles,
                    "duration_minutes": r.duration_minutes,
                })
            })
            .collect();
        let _ = self.post("distance_cache", &Value::Array(body));
    }
}

/// Back-fills `game_schedule.venue_id` from each customer's primary venue,
/// grouping the patch calls by customer for speed.
///
/// The returned count is the number of *customers* processed (one bulk
/// PATCH per customer), not the number of `game_schedule` rows actually
/// updated — carried forward as observed behavior, not corrected.
pub fn fix_venue_ids(store: &TabularStoreClient) -> Result<usize, StoreError> {
    let venue_rows: Vec<Value> = store.get("venues", &[("select", "id,customer_id,name,is_primary")])?;

    let mut customer_venue_map: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    for row in &venue_rows {
        let Some(customer_id) = row.get("customer_id").and_then(Value::as_str) else {
            continue;
        };
        let Some(venue_id) = row.get("id").and_then(Value::as_str) else {
            continue;
        };
        let is_primary = row.get("is_primary").and_then(Value::as_bool).unwrap_or(false);
        if is_primary || !customer_venue_map.contains_key(customer_id) {
            customer_venue_map.insert(customer_id.to_string(), venue_id.to_string());
        }
    }

    let mut updated_customers = 0usize;
    for (customer_id, venue_id) in &customer_venue_map {
        store.patch(
            "game_schedule",
            &[
                ("customer_id", &format!("eq.{customer_id}")),
                ("venue_id", "is.null"),
            ],
            &json!({"venue_id": venue_id}),
        )?;
        updated_customers += 1;
    }

    Ok(updated_customers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_venue_ids_prefers_the_primary_venue_when_multiple_exist() {
        let mut map: std::collections::HashMap<String, String> = std::collections::HashMap::new();
        let rows = vec![
            json!({"id": "v1", "customer_id": "c1", "name": "Old", "is_primary": false}),
            json!({"id": "v2", "customer_id": "c1", "name": "Primary", "is_primary": true}),
        ];
        for row in &rows {
            let customer_id = row.get("customer_id").and_then(Value::as_str).unwrap();
            let venue_id = row.get("id").and_then(Value::as_str).unwrap();
            let is_primary = row.get("is_primary").and_then(Value::as_bool).unwrap_or(false);
            if is_primary || !map.contains_key(customer_id) {
                map.insert(customer_id.to_string(), venue_id.to_string());
            }
        }
        assert_eq!(map.get("c1").map(String::as_str), Some("v2"));
    }
}
