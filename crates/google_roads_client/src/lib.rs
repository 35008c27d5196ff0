//! Google Roads API client.
//!
//! Snaps the query point to nearby roads via `v1/nearestRoads`. The endpoint
//! carries no congestion signal, so a match only proves there is a road; the
//! congestion figure is a bounded random proxy drawn from the injected RNG.

use async_trait::async_trait;
use common::config::HttpConfig;
use common::error::truncate_body;
use common::{DataSource, Error, Location, SharedRng, TrafficProvider, TrafficReading};
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

const NEAREST_ROADS_PATH: &str = "/v1/nearestRoads";
const FREE_FLOW_SPEED_KMH: f64 = 50.0;
/// Upper bound (exclusive) of the congestion proxy on this path.
const MAX_PROXY_CONGESTION: f64 = 0.5;

/// Google Roads API client.
#[derive(Debug, Clone)]
pub struct GoogleRoadsClient {
    client: reqwest::Client,
    base_url: String,
    rng: SharedRng,
}

/// Response from `v1/nearestRoads`.
#[derive(Debug, Deserialize)]
pub struct NearestRoadsResponse {
    #[serde(rename = "snappedPoints", default)]
    pub snapped_points: Vec<SnappedPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnappedPoint {
    #[serde(default)]
    pub location: Option<LatLngLiteral>,
    #[serde(rename = "placeId", default)]
    pub place_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatLngLiteral {
    pub latitude: f64,
    pub longitude: f64,
}

impl GoogleRoadsClient {
    pub fn new(base_url: &str, http: &HttpConfig, rng: SharedRng) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("traffic-track/0.1")
            .pool_max_idle_per_host(4)
            .connect_timeout(http.connect_timeout())
            .timeout(http.request_timeout())
            .build()
            .map_err(|e| Error::Http(format!("failed to build Google Roads HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rng,
        })
    }

    /// Snap (lat, lng) to the nearest roads.
    pub async fn fetch_nearest_roads(
        &self,
        api_key: &str,
        lat: f64,
        lng: f64,
    ) -> Result<NearestRoadsResponse, Error> {
        let url = format!("{}{}", self.base_url, NEAREST_ROADS_PATH);
        let points = format!("{lat:.6},{lng:.6}");

        debug!("Fetching Google nearest roads: {} points={}", url, points);

        let resp = self
            .client
            .get(&url)
            .query(&[("points", points.as_str()), ("key", api_key)])
            .send()
            .await
            .map_err(|e| Error::Google(format!("HTTP error for ({lat},{lng}): {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Google(format!(
                "Google returned {} for ({lat},{lng}): {}",
                status,
                truncate_body(&body, 500)
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::Google(format!("JSON parse error for ({lat},{lng}): {e}")))
    }
}

#[async_trait]
impl TrafficProvider for GoogleRoadsClient {
    fn source(&self) -> DataSource {
        DataSource::Google
    }

    async fn fetch_reading(&self, api_key: &str, location: Location) -> Result<TrafficReading, Error> {
        let payload = self
            .fetch_nearest_roads(api_key, location.latitude, location.longitude)
            .await?;
        let mut rng = self.rng.lock();
        reading_from_response(location, &payload, &mut *rng)
    }
}

/// Normalize a nearest-roads payload. Fails when no road was matched.
pub fn reading_from_response<R: Rng + ?Sized>(
    location: Location,
    payload: &NearestRoadsResponse,
    rng: &mut R,
) -> Result<TrafficReading, Error> {
    if payload.snapped_points.is_empty() {
        return Err(Error::Google(format!(
            "No snapped points near ({},{})",
            location.latitude, location.longitude
        )));
    }

    let congestion = rng.gen_range(0.0..MAX_PROXY_CONGESTION);
    let flow_speed = FREE_FLOW_SPEED_KMH * (1.0 - congestion);

    debug!(
        "Google matched {} road points, proxy congestion={:.2}",
        payload.snapped_points.len(),
        congestion
    );

    Ok(TrafficReading::new(
        location,
        DataSource::Google,
        congestion,
        flow_speed,
        FREE_FLOW_SPEED_KMH,
    ))
}
