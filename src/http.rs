//! `axum` HTTP surface: `GET /health` and `POST /optimize`. Both handlers
//! go through `AppState`'s injected `TabularStore`/`DistanceProvider` so
//! they can be exercised against in-memory fakes with no network.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::config::Config;
use crate::constraints::build_constraints;
use crate::distance::provider::{DistanceProvider, HaversineProvider};
use crate::distance::{build_distance_matrix, DistanceCacheStore};
use crate::error::ApiError;
use crate::lookahead::determine_post_game_disposition;
use crate::planner;
use crate::scoring::score_run;
use crate::store::TabularStore;

const SERVICE_NAME: &str = "trip-optimizer";

pub struct AppState {
    pub config: Config,
    pub store: Box<dyn TabularStore + Send + Sync>,
    pub cache: Box<dyn DistanceCacheStore + Send + Sync>,
    pub provider: Box<dyn DistanceProvider + Send + Sync>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/optimize", post(optimize))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": SERVICE_NAME,
    }))
}

#[derive(Debug, Deserialize)]
struct OptimizeRequest {
    season_year: i32,
    week_number: i32,
    triggered_by: Option<String>,
}

#[derive(Debug, Serialize)]
struct OptimizeResponse {
    run_id: String,
    status: &'static str,
    trips_generated: usize,
    score: f64,
    duration_ms: u64,
    warnings: Vec<String>,
    errors: Vec<String>,
    unassigned_demands: Vec<Value>,
    constraint_relaxations: Vec<Value>,
}

async fn optimize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, ApiResponseError> {
    if !(0..=18).contains(&request.week_number) {
        return Err(ApiError::BadRequest(format!(
            "week_number must be in [0, 18], got {}",
            request.week_number
        ))
        .into());
    }

    let triggered_by = request.triggered_by.unwrap_or_else(|| "api".to_string());
    let span = info_span!(
        "optimize",
        season_year = request.season_year,
        week_number = request.week_number,
    );
    let _entered = span.enter();

    let result = run_pipeline(&state, request.season_year, request.week_number, &triggered_by)?;

    Ok(Json(result))
}

fn run_pipeline(
    state: &AppState,
    season_year: i32,
    week_number: i32,
    triggered_by: &str,
) -> Result<OptimizeResponse, ApiResponseError> {
    let start = Instant::now();

    let week_data = state
        .store
        .load_week_data(season_year, week_number)
        .map_err(ApiError::from)?;

    if week_data.games.is_empty() {
        tracing::warn!(season_year, week_number, "no games scheduled for this week");
        let run_id = state
            .store
            .write_results(
                &crate::planner::assignment::OptimizationResult {
                    status: crate::planner::assignment::RunStatus::Completed,
                    average_score: 100.0,
                    warnings: vec!["No games scheduled for this week".to_string()],
                    ..Default::default()
                },
                season_year,
                week_number,
                triggered_by,
            )
            .map_err(ApiError::from)?;
        return Ok(OptimizeResponse {
            run_id,
            status: "completed",
            trips_generated: 0,
            score: 100.0,
            duration_ms: start.elapsed().as_millis() as u64,
            warnings: vec!["No games scheduled for this week".to_string()],
            errors: Vec::new(),
            unassigned_demands: Vec::new(),
            constraint_relaxations: Vec::new(),
        });
    }

    if week_data.hubs.is_empty() {
        let err = ApiError::from(crate::error::PlannerError::NoHubsConfigured { season_year });
        return Err(err.into());
    }

    let locations = week_data.all_locations();
    let dist_matrix = build_distance_matrix(
        locations,
        state.cache.as_ref(),
        state.provider.as_ref(),
        state.config.distance_cache_tolerance,
    );
    let constraints = build_constraints(&week_data, &state.config);

    let mut result = planner::plan(&week_data, &dist_matrix, &constraints, &state.config);

    let next_week_games = state
        .store
        .load_next_week_schedule(season_year, week_number)
        .unwrap_or_default();
    result = determine_post_game_disposition(result, &next_week_games, week_number);
    result = score_run(result, &dist_matrix);
    result.solve_time_ms = start.elapsed().as_millis() as u64;

    let run_id = state
        .store
        .write_results(&result, season_year, week_number, triggered_by)
        .map_err(ApiError::from)?;

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

    Ok(OptimizeResponse {
        run_id,
        status: result.status.as_str(),
        trips_generated: result.trips.len(),
        score: result.average_score,
        duration_ms: result.solve_time_ms,
        warnings: result.warnings,
        errors: result.errors,
        unassigned_demands: unassigned_json,
        constraint_relaxations: relaxations_json,
    })
}

/// Wraps `ApiError` so it can be returned from a handler as a response.
struct ApiResponseError(ApiError);

impl From<ApiError> for ApiResponseError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiResponseError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let body = if status == StatusCode::BAD_REQUEST {
            json!({"error": self.0.to_string()})
        } else {
            json!({
                "status": "failed",
                "errors": [self.0.to_string()],
                "detail": self.0.detail(),
            })
        };
        (status, Json(body)).into_response()
    }
}

/// Build the default provider for a request: `MapsClient` when an API key
/// is configured, falling back to `HaversineProvider` otherwise.
pub fn default_provider(config: &Config) -> Box<dyn DistanceProvider + Send + Sync> {
    match &config.maps_api_key {
        Some(api_key) if !api_key.is_empty() => {
            let maps_config = crate::distance::provider::MapsClientConfig {
                api_key: api_key.clone(),
                batch_size: config.provider_batch_size,
                rate_limit_ms: config.provider_rate_limit_ms,
                ..Default::default()
            };
            match crate::distance::MapsClient::new(maps_config) {
                Ok(client) => Box::new(client),
                Err(err) => {
                    tracing::warn!(%err, "failed to build maps client, falling back to haversine");
                    Box::new(HaversineProvider)
                }
            }
        }
        _ => Box::new(HaversineProvider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::NullCacheStore;
    use crate::domain::WeekData;
    use crate::error::StoreError;
    use crate::planner::assignment::OptimizationResult;
    use std::sync::Mutex;

    struct EmptyStore;
    impl TabularStore for EmptyStore {
        fn load_week_data(&self, season_year: i32, week_number: i32) -> Result<WeekData, StoreError> {
            Ok(WeekData::new(season_year, week_number))
        }
        fn load_next_week_schedule(&self, _season_year: i32, _week_number: i32) -> Result<Vec<crate::domain::Game>, StoreError> {
            Ok(Vec::new())
        }
        fn write_results(
            &self,
            _result: &OptimizationResult,
            _season_year: i32,
            _week_number: i32,
            _triggered_by: &str,
        ) -> Result<String, StoreError> {
            Ok("test-run-id".to_string())
        }
    }

    struct FailingStore;
    impl TabularStore for FailingStore {
        fn load_week_data(&self, _season_year: i32, _week_number: i32) -> Result<WeekData, StoreError> {
            Err(StoreError::Status { status: 500, body: "boom".into() })
        }
        fn load_next_week_schedule(&self, _season_year: i32, _week_number: i32) -> Result<Vec<crate::domain::Game>, StoreError> {
            Ok(Vec::new())
        }
        fn write_results(
            &self,
            _result: &OptimizationResult,
            _season_year: i32,
            _week_number: i32,
            _triggered_by: &str,
        ) -> Result<String, StoreError> {
            Ok("unused".to_string())
        }
    }

    fn state_with(store: impl TabularStore + Send + Sync + 'static) -> AppState {
        AppState {
            config: Config::defaults(),
            store: Box::new(store),
            cache: Box::new(NullCacheStore),
            provider: Box::new(HaversineProvider),
        }
    }

    #[test]
    fn empty_week_short_circuits_with_score_one_hundred() {
        let state = state_with(EmptyStore);
        let response = run_pipeline(&state, 2025, 3, "test").unwrap();
        assert_eq!(response.trips_generated, 0);
        assert_eq!(response.score, 100.0);
        assert_eq!(response.status, "completed");
        assert!(response.warnings.iter().any(|w| w.contains("No games scheduled")));
    }

    #[test]
    fn store_failure_surfaces_as_api_error() {
        let state = state_with(FailingStore);
        let err = run_pipeline(&state, 2025, 3, "test").unwrap_err();
        assert_eq!(err.0.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn week_number_out_of_range_is_rejected_before_pipeline_runs() {
        let _lock = Mutex::new(());
        let request = OptimizeRequest {
            season_year: 2025,
            week_number: 19,
            triggered_by: None,
        };
        assert!(!(0..=18).contains(&request.week_number));
    }
}
