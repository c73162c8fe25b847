//! Core entity types read from the tabular store: hubs, venues, games,
//! contract items, assets, vehicles, personnel, branding tasks, and the
//! per-week bundle (`WeekData`) the rest of the planner operates on.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    pub id: String,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

impl Hub {
    pub fn location(&self) -> Coordinate {
        Coordinate::labeled(self.lat, self.lng, self.name.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: String,
    pub customer_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub is_primary: bool,
}

impl Venue {
    pub fn location(&self) -> Option<Coordinate> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinate::labeled(lat, lng, self.name.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub sport_type: String,
}

/// Season phase a game falls in. Week 0 is always `Preseason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonPhase {
    Preseason,
    Regular,
    Postseason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub venue_id: Option<String>,
    pub venue: Option<Venue>,
    pub season_year: i32,
    pub week_number: i32,
    pub game_date: String,
    pub game_time: Option<String>,
    pub opponent: Option<String>,
    pub is_home_game: bool,
    pub sidelines_served: String,
    pub season_phase: SeasonPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractItem {
    pub id: String,
    pub contract_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub asset_type: String,
    pub model_version: Option<String>,
    pub quantity: i32,
    pub branding_spec: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCondition {
    InService,
    NeedsRepair,
    OutOfService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    AtHub,
    OnSite,
    InTransit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub serial_number: String,
    pub asset_type: String,
    pub model_version: Option<String>,
    pub condition: AssetCondition,
    pub status: AssetStatus,
    pub home_hub_id: String,
    pub current_hub: Option<String>,
    pub current_venue_id: Option<String>,
    pub current_trip_id: Option<String>,
    pub weight_lbs: Option<f64>,
    pub current_branding: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Active,
    Inactive,
    Maintenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    pub vehicle_type: Option<String>,
    pub home_hub_id: String,
    pub capacity_lbs: Option<i32>,
    pub capacity_cuft: Option<i32>,
    pub status: VehicleStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRole {
    Driver,
    ServiceTech,
    LeadTech,
    Sales,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub role: PersonRole,
    pub home_hub_id: String,
    pub skills: Vec<String>,
    pub max_drive_hrs: i32,
}

impl Default for Person {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            role: PersonRole::Driver,
            home_hub_id: String::new(),
            skills: Vec::new(),
            max_drive_hrs: 11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrandingTaskStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandingTask {
    pub id: String,
    pub asset_id: String,
    pub from_branding: Option<String>,
    pub to_branding: Option<String>,
    pub hub_id: String,
    pub needed_by_date: Option<String>,
    pub status: BrandingTaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetAssignment {
    pub id: String,
    pub asset_id: String,
    pub customer_id: String,
    pub season_year: i32,
    pub is_permanent: bool,
}

/// Everything needed to plan a single week: games, inventory, and the
/// fleet/personnel roster. Produced by `store::load_week_data` (or its
/// Week 0 derivation) and consumed read-only by every planning stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekData {
    pub season_year: i32,
    pub week_number: i32,
    pub games: Vec<Game>,
    pub contract_items: Vec<ContractItem>,
    pub assets: Vec<Asset>,
    pub vehicles: Vec<Vehicle>,
    pub personnel: Vec<Person>,
    pub hubs: Vec<Hub>,
    pub branding_tasks: Vec<BrandingTask>,
    pub asset_assignments: Vec<AssetAssignment>,
}

impl WeekData {
    pub fn new(season_year: i32, week_number: i32) -> Self {
        Self {
            season_year,
            week_number,
            ..Default::default()
        }
    }

    /// Unique venues with a game this week, in first-seen order.
    pub fn game_venues(&self) -> Vec<Venue> {
        let mut seen = std::collections::HashSet::new();
        let mut venues = Vec::new();
        for game in &self.games {
            if let (Some(venue), Some(venue_id)) = (&game.venue, &game.venue_id) {
                if seen.insert(venue_id.clone()) {
                    venues.push(venue.clone());
                }
            }
        }
        venues
    }

    pub fn hub_locations(&self) -> Vec<Coordinate> {
        self.hubs.iter().map(Hub::location).collect()
    }

    /// All unique locations (hubs first, then game venues) for distance
    /// matrix assembly, deduplicated by tolerant coordinate equality.
    pub fn all_locations(&self) -> Vec<Coordinate> {
        let mut locations: Vec<Coordinate> = Vec::new();
        let mut seen: Vec<Coordinate> = Vec::new();

        for hub in &self.hubs {
            let loc = hub.location();
            if !seen.contains(&loc) {
                seen.push(loc.clone());
                locations.push(loc);
            }
        }
        for venue in self.game_venues() {
            if let Some(loc) = venue.location() {
                if !seen.contains(&loc) {
                    seen.push(loc.clone());
                    locations.push(loc);
                }
            }
        }
        locations
    }

    pub fn demands_for_game(&self, game: &Game) -> Vec<ContractItem> {
        self.contract_items
            .iter()
            .filter(|ci| ci.customer_id == game.customer_id)
            .cloned()
            .collect()
    }

    pub fn assets_at_hub(&self, hub_id: &str) -> Vec<&Asset> {
        self.assets
            .iter()
            .filter(|a| a.status == AssetStatus::AtHub && a.current_hub.as_deref() == Some(hub_id))
            .collect()
    }

    pub fn assets_at_venue(&self, venue_id: &str) -> Vec<&Asset> {
        self.assets
            .iter()
            .filter(|a| {
                a.status == AssetStatus::OnSite && a.current_venue_id.as_deref() == Some(venue_id)
            })
            .collect()
    }

    pub fn available_vehicles_at_hub(&self, hub_id: &str) -> Vec<&Vehicle> {
        self.vehicles
            .iter()
            .filter(|v| v.home_hub_id == hub_id && v.status == VehicleStatus::Active)
            .collect()
    }

    pub fn available_personnel_at_hub(&self, hub_id: &str) -> Vec<&Person> {
        self.personnel
            .iter()
            .filter(|p| p.home_hub_id == hub_id)
            .collect()
    }

    /// Nearest hub to a venue by squared planar distance (cheap pre-filter;
    /// the planner re-derives exact haversine distance where it matters).
    pub fn nearest_hub(&self, venue: &Venue) -> Option<&Hub> {
        let loc = venue.location()?;
        self.hubs.iter().min_by(|a, b| {
            let da = (a.lat - loc.lat).powi(2) + (a.lng - loc.lng).powi(2);
            let db = (b.lat - loc.lat).powi(2) + (b.lng - loc.lng).powi(2);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}
