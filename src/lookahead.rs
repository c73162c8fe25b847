//! Week N+1 lookahead: decides what happens to equipment after a game —
//! left on site, rerouted to a nearby venue, or returned to the hub. This
//! reduces unnecessary hub returns and minimizes transportation cost.

use crate::domain::Game;
use crate::geo::Coordinate;
use crate::planner::assignment::{OptimizationResult, Trip, TripStop};

const REROUTE_SAME_CUSTOMER_MAX_MILES: f64 = 500.0;
const REROUTE_NEARBY_MAX_MILES: f64 = 200.0;
const END_OF_SEASON_WEEK: i32 = 18;

#[derive(Debug, Clone)]
pub struct Disposition {
    pub action: &'static str,
    pub requires_hub_return: bool,
    pub hub_return_reason: Option<String>,
    pub next_venue_id: Option<String>,
    pub next_venue_name: Option<String>,
}

impl Disposition {
    fn leave_on_site() -> Self {
        Self {
            action: "leave_on_site",
            requires_hub_return: false,
            hub_return_reason: None,
            next_venue_id: None,
            next_venue_name: None,
        }
    }

    fn return_to_hub(reason: impl Into<String>) -> Self {
        Self {
            action: "return_to_hub",
            requires_hub_return: true,
            hub_return_reason: Some(reason.into()),
            next_venue_id: None,
            next_venue_name: None,
        }
    }

    fn reroute(venue_id: impl Into<String>, venue_name: Option<String>) -> Self {
        Self {
            action: "reroute_to_next_venue",
            requires_hub_return: false,
            hub_return_reason: None,
            next_venue_id: Some(venue_id.into()),
            next_venue_name: venue_name,
        }
    }
}

fn find_next_week_game_for_customer<'a>(customer_id: &str, next_week_games: &'a [Game]) -> Option<&'a Game> {
    next_week_games.iter().find(|g| g.customer_id == customer_id)
}

fn find_nearby_game_next_week<'a>(
    venue_loc: &Coordinate,
    next_week_games: &'a [Game],
    max_distance_miles: f64,
) -> Option<&'a Game> {
    let mut best: Option<(&Game, f64)> = None;
    for game in next_week_games {
        let Some(venue) = &game.venue else { continue };
        let Some(loc) = venue.location() else { continue };
        let distance = venue_loc.haversine_miles(&loc);
        if distance < max_distance_miles && best.map(|(_, d)| distance < d).unwrap_or(true) {
            best = Some((game, distance));
        }
    }
    best.map(|(g, _)| g)
}

/// Decision tree for a single stop's post-game disposition:
/// 1. Week 0 pre-season → always `leave_on_site` (equipment still being deployed).
/// 2. End of season (week >= 18) → `return_to_hub`.
/// 3. No games scheduled next week at all → `leave_on_site`.
/// 4. Same customer has a game next week at the same venue → `leave_on_site`.
/// 5. Same customer, different (close) venue next week → `reroute_to_next_venue`.
/// 6. Same customer, next venue too far → `return_to_hub`.
/// 7. Customer has a bye next week → `leave_on_site`.
/// 8. A different customer has a nearby game next week → `reroute_to_next_venue`.
/// 9. Otherwise → `leave_on_site`.
pub fn determine_disposition(
    stop: &TripStop,
    next_week_games: &[Game],
    week_number: i32,
    venue_loc: Option<&Coordinate>,
    customer_id: Option<&str>,
) -> Disposition {
    if week_number == 0 {
        return Disposition::leave_on_site();
    }

    if week_number >= END_OF_SEASON_WEEK {
        return Disposition::return_to_hub("End of season — all assets return to hub");
    }

    if next_week_games.is_empty() {
        return Disposition::leave_on_site();
    }

    let cust_id = customer_id.or_else(|| stop.demand.as_ref().map(|d| d.customer_id.as_str()));

    if let Some(cust_id) = cust_id {
        match find_next_week_game_for_customer(cust_id, next_week_games) {
            Some(next_game) => {
                if next_game.venue_id.as_deref() == Some(stop.venue_id.as_str()) {
                    return Disposition::leave_on_site();
                }
                if let (Some(next_venue), Some(venue_loc)) = (&next_game.venue, venue_loc) {
                    if let Some(next_loc) = next_venue.location() {
                        let distance = venue_loc.haversine_miles(&next_loc);
                        return if distance < REROUTE_SAME_CUSTOMER_MAX_MILES {
                            Disposition::reroute(
                                next_game.venue_id.clone().unwrap_or_default(),
                                Some(next_venue.name.clone()),
                            )
                        } else {
                            Disposition::return_to_hub(format!(
                                "Next venue too far ({distance:.0} mi) — return to hub"
                            ))
                        };
                    }
                }
            }
            None => return Disposition::leave_on_site(),
        }
    }

    if let Some(venue_loc) = venue_loc {
        if let Some(nearby_game) = find_nearby_game_next_week(venue_loc, next_week_games, REROUTE_NEARBY_MAX_MILES) {
            if let Some(venue) = &nearby_game.venue {
                return Disposition::reroute(
                    nearby_game.venue_id.clone().unwrap_or_default(),
                    Some(venue.name.clone()),
                );
            }
        }
    }

    Disposition::leave_on_site()
}

/// Apply post-game disposition logic to every stop in every trip in a
/// result, annotating `requires_hub_return`/`hub_return_reason` in place.
pub fn determine_post_game_disposition(
    mut result: OptimizationResult,
    next_week_games: &[Game],
    week_number: i32,
) -> OptimizationResult {
    let mut reroute_notices = Vec::new();

    for trip in &mut result.trips {
        annotate_trip(trip, next_week_games, week_number, &mut reroute_notices);
    }

    result.warnings.extend(reroute_notices);
    result
}

fn annotate_trip(trip: &mut Trip, next_week_games: &[Game], week_number: i32, notices: &mut Vec<String>) {
    for stop in &mut trip.stops {
        let customer_id = stop.demand.as_ref().map(|d| d.customer_id.clone());
        let venue_loc = stop
            .demand
            .as_ref()
            .and_then(|d| d.game.venue.as_ref())
            .and_then(|v| v.location());

        let disposition = determine_disposition(
            stop,
            next_week_games,
            week_number,
            venue_loc.as_ref(),
            customer_id.as_deref(),
        );

        stop.requires_hub_return = disposition.requires_hub_return;
        stop.hub_return_reason = disposition.hub_return_reason.clone();

        if disposition.action == "reroute_to_next_venue" {
            notices.push(format!(
                "{}: Reroute assets to {} for next week",
                stop.venue_name,
                disposition.next_venue_name.as_deref().unwrap_or("next venue")
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SeasonPhase, Venue};

    fn game(customer_id: &str, venue_id: &str, lat: f64, lng: f64) -> Game {
        Game {
            id: format!("g-{venue_id}"),
            customer_id: customer_id.into(),
            customer_name: customer_id.into(),
            venue_id: Some(venue_id.into()),
            venue: Some(Venue {
                id: venue_id.into(),
                customer_id: Some(customer_id.into()),
                name: format!("Venue {venue_id}"),
                address: None,
                city: None,
                state: None,
                lat: Some(lat),
                lng: Some(lng),
                is_primary: true,
            }),
            season_year: 2025,
            week_number: 2,
            game_date: "2025-09-14".into(),
            game_time: Some("19:00:00".into()),
            opponent: None,
            is_home_game: true,
            sidelines_served: "both".into(),
            season_phase: SeasonPhase::Regular,
        }
    }

    fn stop(venue_id: &str) -> TripStop {
        TripStop {
            venue_id: venue_id.into(),
            venue_name: format!("Venue {venue_id}"),
            stop_order: 1,
            arrival_time: None,
            depart_time: None,
            action: "deliver".into(),
            requires_hub_return: false,
            hub_return_reason: None,
            demand: None,
        }
    }

    #[test]
    fn week0_always_leaves_on_site() {
        let d = determine_disposition(&stop("v1"), &[], 0, None, Some("c1"));
        assert_eq!(d.action, "leave_on_site");
    }

    #[test]
    fn end_of_season_returns_to_hub() {
        let d = determine_disposition(&stop("v1"), &[], 18, None, Some("c1"));
        assert_eq!(d.action, "return_to_hub");
        assert!(d.requires_hub_return);
    }

    #[test]
    fn same_customer_same_venue_leaves_on_site() {
        let next_week = vec![game("c1", "v1", 41.5, -81.7)];
        let venue_loc = Coordinate::new(41.5, -81.7);
        let d = determine_disposition(&stop("v1"), &next_week, 5, Some(&venue_loc), Some("c1"));
        assert_eq!(d.action, "leave_on_site");
    }

    #[test]
    fn same_customer_nearby_new_venue_reroutes() {
        let next_week = vec![game("c1", "v2", 41.6, -81.8)];
        let venue_loc = Coordinate::new(41.5, -81.7);
        let d = determine_disposition(&stop("v1"), &next_week, 5, Some(&venue_loc), Some("c1"));
        assert_eq!(d.action, "reroute_to_next_venue");
        assert_eq!(d.next_venue_id.as_deref(), Some("v2"));
    }

    #[test]
    fn same_customer_far_new_venue_returns_to_hub() {
        let next_week = vec![game("c1", "v2", 34.0, -118.0)];
        let venue_loc = Coordinate::new(41.5, -81.7);
        let d = determine_disposition(&stop("v1"), &next_week, 5, Some(&venue_loc), Some("c1"));
        assert_eq!(d.action, "return_to_hub");
    }

    #[test]
    fn bye_week_leaves_on_site() {
        let next_week = vec![game("other", "v9", 41.6, -81.8)];
        let venue_loc = Coordinate::new(0.0, 0.0);
        let d = determine_disposition(&stop("v1"), &next_week, 5, Some(&venue_loc), Some("c1"));
        assert_eq!(d.action, "leave_on_site");
    }
}
