//! The traffic aggregator: credential resolution, dispatch, fallback,
//! persistence, and grid fan-out.

use std::sync::Arc;

use chrono::Utc;
use common::config::{GridConfig, RetentionConfig};
use common::{
    Error, GridPoint, GridTrafficResponse, LatLng, Location, Result, TrafficConfig,
    TrafficReading,
};
use futures::stream::{self, StreamExt};
use store::{CredentialStore, IncidentStore, ReadingStore};
use tracing::{debug, error, info, warn};

use crate::dispatch::{ProviderKind, ProviderSet};
use crate::lattice::lattice;
use crate::synthetic::SyntheticGenerator;

pub struct TrafficAggregator {
    credentials: Arc<dyn CredentialStore>,
    readings: Arc<dyn ReadingStore>,
    incidents: Arc<dyn IncidentStore>,
    providers: ProviderSet,
    synthetic: SyntheticGenerator,
    grid: GridConfig,
    retention: RetentionConfig,
}

impl TrafficAggregator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        readings: Arc<dyn ReadingStore>,
        incidents: Arc<dyn IncidentStore>,
        providers: ProviderSet,
        synthetic: SyntheticGenerator,
        cfg: &TrafficConfig,
    ) -> Self {
        Self {
            credentials,
            readings,
            incidents,
            providers,
            synthetic,
            grid: cfg.grid.clone(),
            retention: cfg.retention.clone(),
        }
    }

    /// Current conditions around (lat, lng).
    ///
    /// Provider problems never surface here: they degrade to a synthetic
    /// reading. The only error is a failure to persist the result.
    pub async fn fetch_live_traffic_data(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<TrafficReading> {
        let location = Location::new(lat, lng, radius_km);
        let reading = self.acquire(location).await;
        self.readings.save(reading).await
    }

    async fn acquire(&self, location: Location) -> TrafficReading {
        let credential = match self.credentials.active_credential().await {
            Ok(Some(c)) if c.has_secret() => c,
            Ok(_) => {
                warn!("No active API credential found, using synthetic data");
                return self.synthetic.generate(location);
            }
            Err(e) => {
                error!("Credential lookup failed, using synthetic data: {}", e);
                return self.synthetic.generate(location);
            }
        };

        let kind = ProviderKind::from_identifier(&credential.provider);
        let Some(provider) = self.providers.resolve(kind) else {
            warn!(
                "Unknown provider '{}', using synthetic data",
                credential.provider
            );
            return self.synthetic.generate(location);
        };

        debug!(
            "Fetching live traffic from {} for ({},{}) r={}km",
            kind, location.latitude, location.longitude, location.radius_km
        );

        match provider.fetch_reading(credential.api_key(), location).await {
            Ok(reading) => reading,
            Err(e @ Error::Unauthorized { .. }) => {
                warn!("{} unauthorized, using synthetic data: {}", kind, e);
                self.synthetic.generate(location)
            }
            Err(e) if e.is_provider_failure() => {
                warn!("{} fetch failed, using synthetic data: {}", kind, e);
                self.synthetic.generate(location)
            }
            Err(e) => {
                error!("Unexpected error from {}, using synthetic data: {}", kind, e);
                self.synthetic.generate(location)
            }
        }
    }

    /// Readings for a `grid_size × grid_size` lattice around the centre.
    ///
    /// Points are fetched concurrently but reported in row-major order. A
    /// point whose fetch fails is left out rather than failing the request.
    pub async fn fetch_grid_traffic_data(
        &self,
        center_lat: f64,
        center_lng: f64,
        radius_km: f64,
        grid_size: usize,
    ) -> Result<GridTrafficResponse> {
        if grid_size == 0 || grid_size > self.grid.max_grid_size {
            return Err(Error::InvalidRequest(format!(
                "grid_size must be between 1 and {}, got {}",
                self.grid.max_grid_size, grid_size
            )));
        }
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(Error::InvalidRequest(format!(
                "radius must be a finite number >= 0, got {radius_km}"
            )));
        }

        let point_radius = radius_km / grid_size as f64;
        let concurrency = self.grid.fetch_concurrency.max(1);

        let fetched: Vec<_> = stream::iter(lattice(center_lat, center_lng, radius_km, grid_size))
            .map(|p| async move {
                let result = self.fetch_live_traffic_data(p.lat, p.lng, point_radius).await;
                (p, result)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut points = Vec::with_capacity(fetched.len());
        for (p, result) in fetched {
            match result {
                Ok(reading) => points.push(GridPoint {
                    grid_x: p.grid_x,
                    grid_y: p.grid_y,
                    lat: p.lat,
                    lng: p.lng,
                    congestion: reading.congestion_level,
                    flow_speed: reading.flow_speed,
                    free_flow_speed: reading.free_flow_speed,
                    data_source: reading.data_source,
                }),
                Err(e) => warn!(
                    "Dropping grid point ({},{}) after fetch error: {}",
                    p.grid_x, p.grid_y, e
                ),
            }
        }

        Ok(GridTrafficResponse {
            center: LatLng {
                lat: center_lat,
                lng: center_lng,
            },
            radius: radius_km,
            grid_size,
            points,
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// Purge readings and incidents past the retention window. Best effort:
    /// failures are logged and swallowed.
    pub async fn cleanup_old_data(&self) {
        let cutoff = Utc::now() - chrono::Duration::hours(self.retention.max_age_hours);

        let readings = match self.readings.delete_older_than(cutoff).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Error cleaning up old traffic readings: {}", e);
                0
            }
        };
        let incidents = match self.incidents.delete_incidents_older_than(cutoff).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Error cleaning up old traffic incidents: {}", e);
                0
            }
        };

        info!(
            "Cleaned up old traffic data: {} readings, {} incidents before {}",
            readings, incidents, cutoff
        );
    }
}
