//! Wire-shaped row structs for the tabular store's REST responses —
//! deserialized separately from the domain types in `domain.rs` because
//! the store's joined rows (nested `customers`/`venues` objects) don't
//! match the flattened domain shape the planner consumes.

use serde::Deserialize;

use crate::distance::CacheRow;
use crate::domain::{
    Asset, AssetAssignment, AssetCondition, AssetStatus, BrandingTask, BrandingTaskStatus, Game,
    Hub, Person, PersonRole, SeasonPhase, Vehicle, VehicleStatus, Venue,
};

#[derive(Debug, Deserialize)]
pub struct HubRow {
    pub id: String,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

impl HubRow {
    pub fn into_domain(self) -> Hub {
        Hub {
            id: self.id,
            name: self.name,
            city: self.city,
            state: self.state,
            address: self.address,
            lat: self.lat,
            lng: self.lng,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VenueJoinRow {
    pub id: String,
    pub customer_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(default)]
    pub is_primary: bool,
}

impl VenueJoinRow {
    fn into_domain(self) -> Venue {
        Venue {
            id: self.id,
            customer_id: self.customer_id,
            name: self.name,
            address: self.address,
            city: self.city,
            state: self.state,
            lat: self.lat,
            lng: self.lng,
            is_primary: self.is_primary,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CustomerJoinRow {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GameRow {
    pub id: String,
    pub customer_id: String,
    #[serde(default)]
    pub customers: Option<CustomerJoinRow>,
    pub venue_id: Option<String>,
    #[serde(default)]
    pub venues: Option<VenueJoinRow>,
    pub season_year: i32,
    pub week_number: i32,
    pub game_date: String,
    pub game_time: Option<String>,
    pub opponent: Option<String>,
    #[serde(default = "default_true")]
    pub is_home_game: bool,
    #[serde(default = "default_sidelines")]
    pub sidelines_served: String,
    #[serde(default)]
    pub season_phase: Option<SeasonPhase>,
}

fn default_true() -> bool {
    true
}

fn default_sidelines() -> String {
    "both".to_string()
}

impl GameRow {
    pub fn into_domain(self) -> Game {
        let customer_name = self.customers.map(|c| c.name).unwrap_or_default();
        let venue = self.venues.map(VenueJoinRow::into_domain);
        Game {
            id: self.id,
            customer_id: self.customer_id,
            customer_name,
            venue_id: self.venue_id,
            venue,
            season_year: self.season_year,
            week_number: self.week_number,
            game_date: self.game_date,
            game_time: self.game_time,
            opponent: self.opponent,
            is_home_game: self.is_home_game,
            sidelines_served: self.sidelines_served,
            season_phase: self.season_phase.unwrap_or(SeasonPhase::Regular),
        }
    }

    /// Week-0 transform: keep venue/customer, clear the time constraint,
    /// and stamp `week_number`/`season_phase` for the derived preseason
    /// deployment week — matches `_load_week0_data`'s per-game transform.
    pub fn into_domain_week0(self) -> Game {
        let mut game = GameRow {
            week_number: 0,
            game_time: None,
            season_phase: Some(SeasonPhase::Preseason),
            ..self
        }
        .into_domain();
        game.week_number = 0;
        game
    }
}

#[derive(Debug, Deserialize)]
pub struct ContractItemRow {
    pub id: String,
    pub asset_type: String,
    pub model_version: Option<String>,
    pub quantity: i32,
    pub branding_spec: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContractRow {
    pub id: String,
    pub customer_id: String,
    #[serde(default)]
    pub customers: Option<CustomerJoinRow>,
    #[serde(default)]
    pub contract_items: Vec<ContractItemRow>,
}

#[derive(Debug, Deserialize)]
pub struct AssetRow {
    pub id: String,
    pub serial_number: String,
    pub asset_type: String,
    pub model_version: Option<String>,
    #[serde(default = "default_condition")]
    pub condition: AssetCondition,
    #[serde(default = "default_asset_status")]
    pub status: AssetStatus,
    pub home_hub_id: String,
    pub current_hub: Option<String>,
    pub current_venue_id: Option<String>,
    pub current_trip_id: Option<String>,
    pub weight_lbs: Option<f64>,
    pub current_branding: Option<String>,
}

fn default_condition() -> AssetCondition {
    AssetCondition::InService
}

fn default_asset_status() -> AssetStatus {
    AssetStatus::AtHub
}

impl AssetRow {
    pub fn into_domain(self) -> Asset {
        Asset {
            id: self.id,
            serial_number: self.serial_number,
            asset_type: self.asset_type,
            model_version: self.model_version,
            condition: self.condition,
            status: self.status,
            home_hub_id: self.home_hub_id,
            current_hub: self.current_hub,
            current_venue_id: self.current_venue_id,
            current_trip_id: self.current_trip_id,
            weight_lbs: self.weight_lbs,
            current_branding: self.current_branding,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VehicleRow {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub vehicle_type: Option<String>,
    pub home_hub_id: String,
    pub capacity_lbs: Option<i32>,
    pub capacity_cuft: Option<i32>,
    pub status: VehicleStatus,
}

impl VehicleRow {
    pub fn into_domain(self) -> Vehicle {
        Vehicle {
            id: self.id,
            name: self.name,
            vehicle_type: self.vehicle_type,
            home_hub_id: self.home_hub_id,
            capacity_lbs: self.capacity_lbs,
            capacity_cuft: self.capacity_cuft,
            status: self.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PersonRow {
    pub id: String,
    pub name: String,
    pub role: PersonRole,
    pub home_hub_id: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default = "default_drive_hrs")]
    pub max_drive_hrs: i32,
}

fn default_drive_hrs() -> i32 {
    11
}

impl PersonRow {
    pub fn into_domain(self) -> Person {
        Person {
            id: self.id,
            name: self.name,
            role: self.role,
            home_hub_id: self.home_hub_id,
            skills: self.skills,
            max_drive_hrs: self.max_drive_hrs,
        }
    }
}

/// Shared shape for `vehicle_availability`/`personnel_availability` rows —
/// both only ever queried with `is_available=eq.false`, so only the
/// foreign key id is needed.
#[derive(Debug, Deserialize)]
pub struct AvailabilityRow {
    #[serde(alias = "vehicle_id", alias = "person_id")]
    pub entity_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BrandingTaskRow {
    pub id: String,
    pub asset_id: String,
    pub from_branding: Option<String>,
    pub to_branding: Option<String>,
    pub hub_id: String,
    pub needed_by_date: Option<String>,
    pub status: BrandingTaskStatus,
}

impl BrandingTaskRow {
    pub fn into_domain(self) -> BrandingTask {
        BrandingTask {
            id: self.id,
            asset_id: self.asset_id,
            from_branding: self.from_branding,
            to_branding: self.to_branding,
            hub_id: self.hub_id,
            needed_by_date: self.needed_by_date,
            status: self.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssetAssignmentRow {
    pub id: String,
    pub asset_id: String,
    pub customer_id: String,
    pub season_year: i32,
    #[serde(default)]
    pub is_permanent: bool,
}

impl AssetAssignmentRow {
    pub fn into_domain(self) -> AssetAssignment {
        AssetAssignment {
            id: self.id,
            asset_id: self.asset_id,
            customer_id: self.customer_id,
            season_year: self.season_year,
            is_permanent: self.is_permanent,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DistanceCacheRow {
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub dest_lat: f64,
    pub dest_lng: f64,
    pub distance_miles: f64,
    pub duration_minutes: f64,
}

impl DistanceCacheRow {
    pub fn into_cache_row(self) -> CacheRow {
        CacheRow {
            origin_lat: self.origin_lat,
            origin_lng: self.origin_lng,
            dest_lat: self.dest_lat,
            dest_lng: self.dest_lng,
            distance_miles: self.distance_miles,
            duration_minutes: self.duration_minutes,
        }
    }
}
