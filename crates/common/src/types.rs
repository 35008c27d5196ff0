//! Domain types shared across the workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Traffic readings ──────────────────────────────────────────────────

/// Clamp a congestion estimate into `[0, 1]`. NaN maps to 0.
pub fn clamp_congestion(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// A query point plus the search radius around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius in kilometres.
    #[serde(rename = "radius")]
    pub radius_km: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_km,
        }
    }
}

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Google,
    #[serde(rename = "tomtom")]
    TomTom,
    Here,
    Static,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Google => "google",
            DataSource::TomTom => "tomtom",
            DataSource::Here => "here",
            DataSource::Static => "static",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized traffic conditions around one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficReading {
    /// Assigned by the reading store on save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub location: Location,
    /// Always within `[0, 1]`.
    pub congestion_level: f64,
    /// km/h
    pub flow_speed: f64,
    /// km/h
    pub free_flow_speed: f64,
    /// seconds
    pub current_travel_time: Option<u32>,
    /// seconds
    pub free_flow_travel_time: Option<u32>,
    pub road_closure: bool,
    pub data_source: DataSource,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub incidents: Vec<Incident>,
}

impl TrafficReading {
    /// Build a reading; `congestion_level` is clamped into `[0, 1]`.
    pub fn new(
        location: Location,
        data_source: DataSource,
        congestion_level: f64,
        flow_speed: f64,
        free_flow_speed: f64,
    ) -> Self {
        Self {
            id: None,
            location,
            congestion_level: clamp_congestion(congestion_level),
            flow_speed: flow_speed.max(0.0),
            free_flow_speed,
            current_travel_time: None,
            free_flow_travel_time: None,
            road_closure: false,
            data_source,
            fetched_at: Utc::now(),
            incidents: Vec::new(),
        }
    }
}

// ── Incidents ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentType {
    Accident,
    Roadwork,
    Congestion,
    Closure,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map a provider delay magnitude onto a severity bucket.
    pub fn from_magnitude(magnitude: i64) -> Self {
        if magnitude < 1 {
            Severity::Low
        } else if magnitude < 3 {
            Severity::Medium
        } else if magnitude < 5 {
            Severity::High
        } else {
            Severity::Critical
        }
    }
}

/// A traffic incident reported near a reading's location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub description: Option<String>,
    pub delay_minutes: Option<u32>,
    pub reported_at: DateTime<Utc>,
}

// ── Credentials ───────────────────────────────────────────────────────

/// A provider API credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: u64,
    pub provider: String,
    api_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(id: u64, provider: impl Into<String>, api_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            provider: provider.into(),
            api_key: api_key.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The plaintext secret. Only provider clients should call this.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn has_secret(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// `****` followed by the last four characters of the key.
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("****{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("api_key", &self.masked_key())
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

// ── Grid traffic (map visualization) ──────────────────────────────────

/// One lattice cell of a grid traffic request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPoint {
    pub grid_x: usize,
    pub grid_y: usize,
    pub lat: f64,
    pub lng: f64,
    pub congestion: f64,
    pub flow_speed: f64,
    pub free_flow_speed: f64,
    pub data_source: DataSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Response for a grid traffic request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridTrafficResponse {
    pub center: LatLng,
    pub radius: f64,
    pub grid_size: usize,
    pub points: Vec<GridPoint>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

// ── Swarm grid ────────────────────────────────────────────────────────

/// A signalized intersection in the simulated swarm grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intersection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub lat: f64,
    pub lng: f64,
    pub grid_x: usize,
    pub grid_y: usize,
    pub name: String,
    pub congestion: f64,
    /// seconds
    pub cycle_duration: u32,
    /// seconds, never above `cycle_duration`
    pub time_remaining: u32,
}

/// A road segment between two adjacent intersections.
#[derive(Debug, Clone, PartialEq)]
pub struct Road {
    pub id: Option<u64>,
    pub start_lat: f64,
    pub start_lng: f64,
    pub end_lat: f64,
    pub end_lng: f64,
    pub congestion: f64,
}

/// Wire shape of a road: `{start: [lat, lng], end: [lat, lng], congestion}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadView {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub congestion: f64,
}

impl From<&Road> for RoadView {
    fn from(road: &Road) -> Self {
        Self {
            start: [road.start_lat, road.start_lng],
            end: [road.end_lat, road.end_lng],
            congestion: road.congestion,
        }
    }
}

/// Materialized swarm grid as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmSnapshot {
    pub intersections: Vec<Intersection>,
    pub roads: Vec<RoadView>,
    /// Epoch milliseconds at build time.
    pub timestamp: i64,
}

impl SwarmSnapshot {
    pub fn build(intersections: Vec<Intersection>, roads: &[Road]) -> Self {
        Self {
            intersections,
            roads: roads.iter().map(RoadView::from).collect(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}
