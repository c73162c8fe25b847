//! External driving-distance provider, batched and rate-limited, with the
//! always-available haversine fallback.
//!
//! Batches are dispatched sequentially with a sleep between them; batch
//! counts are small enough that this isn't a bottleneck.

use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::geo::{haversine_fallback, Coordinate};

/// One distance/duration observation between an origin and a destination.
#[derive(Debug, Clone, Copy)]
pub struct ProviderEntry {
    pub distance_miles: f64,
    pub duration_minutes: f64,
}

/// Batched lookup of driving distance/duration for coordinate pairs.
///
/// Implementations may swallow any underlying error and return an empty
/// result — the caller always has the haversine fallback to fill gaps,
/// per the contract that a provider failure must never abort the plan.
pub trait DistanceProvider {
    fn fetch(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Vec<(Coordinate, Coordinate, ProviderEntry)>;
}

/// Always-available fallback: great-circle distance times a road factor,
/// duration from an assumed average speed. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineProvider;

impl DistanceProvider for HaversineProvider {
    fn fetch(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Vec<(Coordinate, Coordinate, ProviderEntry)> {
        let mut out = Vec::with_capacity(origins.len() * destinations.len());
        for o in origins {
            for d in destinations {
                if o == d {
                    continue;
                }
                let (miles, minutes) = haversine_fallback(o, d);
                out.push((
                    o.clone(),
                    d.clone(),
                    ProviderEntry {
                        distance_miles: miles,
                        duration_minutes: minutes,
                    },
                ));
            }
        }
        out
    }
}

/// Configuration for the commercial driving-distance API client.
#[derive(Debug, Clone)]
pub struct MapsClientConfig {
    pub api_key: String,
    pub batch_size: usize,
    pub rate_limit_ms: u64,
    pub timeout_secs: u64,
}

impl Default for MapsClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            batch_size: 25,
            rate_limit_ms: 200,
            timeout_secs: 15,
        }
    }
}

/// Batches coordinate pairs into <=batch_size x batch_size driving-distance
/// requests, sleeping `rate_limit_ms` between batches. Any single batch
/// failure is swallowed: those pairs simply come back missing and the
/// caller falls through to `HaversineProvider`.
#[derive(Debug, Clone)]
pub struct MapsClient {
    config: MapsClientConfig,
    client: reqwest::blocking::Client,
}

impl MapsClient {
    pub fn new(config: MapsClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn fetch_batch(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Option<Vec<(Coordinate, Coordinate, ProviderEntry)>> {
        let origins_param = origins
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lat, c.lng))
            .collect::<Vec<_>>()
            .join("|");
        let destinations_param = destinations
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lat, c.lng))
            .collect::<Vec<_>>()
            .join("|");

        let response = self
            .client
            .get("https://maps.googleapis.com/maps/api/distancematrix/json")
            .query(&[
                ("origins", origins_param.as_str()),
                ("destinations", destinations_param.as_str()),
                ("units", "imperial"),
                ("mode", "driving"),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<DistanceMatrixApiResponse>());

        let body = response.ok()?;

        let mut out = Vec::new();
        for (i, row) in body.rows.into_iter().enumerate() {
            for (j, element) in row.elements.into_iter().enumerate() {
                if element.status != "OK" {
                    continue;
                }
                let (Some(distance), Some(duration)) = (element.distance, element.duration)
                else {
                    continue;
                };
                out.push((
                    origins[i].clone(),
                    destinations[j].clone(),
                    ProviderEntry {
                        distance_miles: crate::geo::round1(distance.value as f64 / 1609.34),
                        duration_minutes: crate::geo::round1(duration.value as f64 / 60.0),
                    },
                ));
            }
        }
        Some(out)
    }
}

impl DistanceProvider for MapsClient {
    fn fetch(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Vec<(Coordinate, Coordinate, ProviderEntry)> {
        if self.config.api_key.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::new();
        let batch_size = self.config.batch_size.max(1);
        let origin_batches: Vec<&[Coordinate]> = origins.chunks(batch_size).collect();
        let dest_batches: Vec<&[Coordinate]> = destinations.chunks(batch_size).collect();
        let mut first = true;

        for origin_batch in &origin_batches {
            for dest_batch in &dest_batches {
                if !first {
                    thread::sleep(Duration::from_millis(self.config.rate_limit_ms));
                }
                first = false;

                if let Some(batch_results) = self.fetch_batch(origin_batch, dest_batch) {
                    results.extend(batch_results);
                }
                // A batch failure is swallowed: those pairs stay missing
                // and the caller falls back to haversine.
            }
        }

        results
    }
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixApiResponse {
    #[serde(default)]
    rows: Vec<DistanceMatrixRow>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixRow {
    #[serde(default)]
    elements: Vec<DistanceMatrixElement>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixElement {
    status: String,
    distance: Option<DistanceMatrixValue>,
    duration: Option<DistanceMatrixValue>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixValue {
    value: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_provider_never_fails_and_skips_self_pairs() {
        let provider = HaversineProvider;
        let a = Coordinate::new(41.4993, -81.6944);
        let b = Coordinate::new(39.9612, -82.9988);
        let entries = provider.fetch(&[a.clone(), b.clone()], &[a.clone(), b.clone()]);
        // 2x2 minus the two diagonal self-pairs = 2 entries
        assert_eq!(entries.len(), 2);
        for (_, _, entry) in &entries {
            assert!(entry.distance_miles > 0.0);
            assert!(entry.duration_minutes > 0.0);
        }
    }

    #[test]
    fn maps_client_with_empty_key_returns_empty() {
        let client = MapsClient::new(MapsClientConfig::default()).unwrap();
        let a = Coordinate::new(41.4993, -81.6944);
        let b = Coordinate::new(39.9612, -82.9988);
        assert!(client.fetch(&[a], &[b]).is_empty());
    }
}
