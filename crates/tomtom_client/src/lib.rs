//! TomTom Traffic API client.
//!
//! Reads the flow segment nearest to the query point and enriches it with the
//! incidents inside a bounding box derived from the search radius.

pub mod incidents;

use async_trait::async_trait;
use common::config::HttpConfig;
use common::error::truncate_body;
use common::geo::BoundingBox;
use common::{
    clamp_congestion, DataSource, Error, Incident, Location, TrafficProvider, TrafficReading,
};
use serde::Deserialize;
use tracing::{debug, warn};

const FLOW_SEGMENT_PATH: &str = "/traffic/services/4/flowSegmentData/absolute/10/json";
const INCIDENT_DETAILS_PATH: &str = "/traffic/services/5/incidentDetails";
const INCIDENT_FIELDS: &str =
    "{incidents{type,geometry,properties{iconCategory,magnitudeOfDelay,events{description,code}}}}";
const DEFAULT_FREE_FLOW_SPEED_KMH: f64 = 50.0;

/// TomTom Traffic API client.
#[derive(Debug, Clone)]
pub struct TomTomClient {
    client: reqwest::Client,
    base_url: String,
}

/// Response from `flowSegmentData`.
#[derive(Debug, Deserialize)]
pub struct FlowSegmentResponse {
    #[serde(rename = "flowSegmentData", default)]
    pub flow_segment_data: Option<FlowSegmentData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSegmentData {
    #[serde(default)]
    pub current_speed: Option<f64>,
    #[serde(default)]
    pub free_flow_speed: Option<f64>,
    #[serde(default)]
    pub current_travel_time: Option<i64>,
    #[serde(default)]
    pub free_flow_travel_time: Option<i64>,
    #[serde(default)]
    pub road_closure: Option<bool>,
}

impl TomTomClient {
    pub fn new(base_url: &str, http: &HttpConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("traffic-track/0.1")
            .pool_max_idle_per_host(4)
            .connect_timeout(http.connect_timeout())
            .timeout(http.request_timeout())
            .build()
            .map_err(|e| Error::Http(format!("failed to build TomTom HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the flow segment nearest to (lat, lng).
    pub async fn fetch_flow_segment(
        &self,
        api_key: &str,
        lat: f64,
        lng: f64,
    ) -> Result<FlowSegmentResponse, Error> {
        let url = format!("{}{}", self.base_url, FLOW_SEGMENT_PATH);
        let point = format!("{lat:.6},{lng:.6}");

        debug!("Fetching TomTom flow segment: {} point={}", url, point);

        let resp = self
            .client
            .get(&url)
            .query(&[("point", point.as_str()), ("key", api_key)])
            .send()
            .await
            .map_err(|e| Error::TomTom(format!("HTTP error for ({lat},{lng}): {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::TomTom(format!(
                "TomTom returned {} for ({lat},{lng}): {}",
                status,
                truncate_body(&body, 500)
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::TomTom(format!("JSON parse error for ({lat},{lng}): {e}")))
    }

    /// Fetch incidents within `location.radius_km` of the location.
    pub async fn fetch_incidents(
        &self,
        api_key: &str,
        location: Location,
    ) -> Result<Vec<Incident>, Error> {
        let url = format!("{}{}", self.base_url, INCIDENT_DETAILS_PATH);
        let bbox = BoundingBox::around(location.latitude, location.longitude, location.radius_km)
            .to_query();

        debug!("Fetching TomTom incidents: {} bbox={}", url, bbox);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("bbox", bbox.as_str()),
                ("fields", INCIDENT_FIELDS),
                ("key", api_key),
            ])
            .send()
            .await
            .map_err(|e| Error::TomTom(format!("HTTP error for incidents in {bbox}: {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::TomTom(format!(
                "TomTom incidents returned {} for {}: {}",
                status,
                bbox,
                truncate_body(&body, 500)
            )));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::TomTom(format!("JSON parse error for incidents in {bbox}: {e}")))?;

        Ok(incidents::parse_incidents(&payload))
    }
}

#[async_trait]
impl TrafficProvider for TomTomClient {
    fn source(&self) -> DataSource {
        DataSource::TomTom
    }

    async fn fetch_reading(&self, api_key: &str, location: Location) -> Result<TrafficReading, Error> {
        let flow = self
            .fetch_flow_segment(api_key, location.latitude, location.longitude)
            .await?;
        let mut reading = reading_from_flow(location, &flow)?;

        match self.fetch_incidents(api_key, location).await {
            Ok(found) => reading.incidents = found,
            Err(e) => warn!("TomTom incident fetch failed, keeping flow reading: {}", e),
        }

        Ok(reading)
    }
}

/// `1 - current/free_flow`, clamped to `[0, 1]`.
pub fn congestion_from_speeds(current_speed: f64, free_flow_speed: f64) -> f64 {
    if free_flow_speed <= 0.0 {
        return 0.0;
    }
    clamp_congestion(1.0 - current_speed / free_flow_speed)
}

/// Normalize a flow segment payload.
pub fn reading_from_flow(
    location: Location,
    payload: &FlowSegmentResponse,
) -> Result<TrafficReading, Error> {
    let flow = payload.flow_segment_data.as_ref().ok_or_else(|| {
        Error::TomTom(format!(
            "No flowSegmentData for ({},{})",
            location.latitude, location.longitude
        ))
    })?;

    let current_speed = flow.current_speed.unwrap_or(0.0);
    let free_flow_speed = flow
        .free_flow_speed
        .filter(|speed| *speed > 0.0)
        .unwrap_or(DEFAULT_FREE_FLOW_SPEED_KMH);

    let mut reading = TrafficReading::new(
        location,
        DataSource::TomTom,
        congestion_from_speeds(current_speed, free_flow_speed),
        current_speed,
        free_flow_speed,
    );
    reading.current_travel_time = flow.current_travel_time.map(|t| t.max(0) as u32);
    reading.free_flow_travel_time = flow.free_flow_travel_time.map(|t| t.max(0) as u32);
    reading.road_closure = flow.road_closure.unwrap_or(false);

    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    type Route = fn(&str) -> (u16, &'static str);

    /// Minimal HTTP/1.1 responder on an ephemeral port. Answers each request
    /// from `route(path)` and records every request target it sees.
    async fn serve(route: Route) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head);
                    let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let path = target.split('?').next().unwrap_or("/").to_string();
                    log.lock().unwrap().push(target);

                    let (status, body) = route(&path);
                    let response = format!(
                        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{addr}"), seen)
    }

    fn client(base_url: &str) -> TomTomClient {
        TomTomClient::new(base_url, &HttpConfig::default()).expect("client should build")
    }

    fn sample_flow() -> &'static str {
        r#"{
            "flowSegmentData": {
                "frc": "FRC2",
                "currentSpeed": 25,
                "freeFlowSpeed": 50,
                "currentTravelTime": 612,
                "freeFlowTravelTime": 306,
                "roadClosure": false
            }
        }"#
    }

    #[test]
    fn test_half_speed_is_half_congested() {
        assert_eq!(congestion_from_speeds(25.0, 50.0), 0.5);
    }

    #[test]
    fn test_congestion_is_clamped() {
        assert_eq!(congestion_from_speeds(80.0, 50.0), 0.0);
        assert_eq!(congestion_from_speeds(-5.0, 50.0), 1.0);
        assert_eq!(congestion_from_speeds(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_reading_from_flow() {
        let parsed: FlowSegmentResponse =
            serde_json::from_str(sample_flow()).expect("flow should deserialize");
        let reading =
            reading_from_flow(Location::new(52.37, 4.89, 2.0), &parsed).expect("reading");

        assert_eq!(reading.data_source, DataSource::TomTom);
        assert_eq!(reading.congestion_level, 0.5);
        assert_eq!(reading.flow_speed, 25.0);
        assert_eq!(reading.free_flow_speed, 50.0);
        assert_eq!(reading.current_travel_time, Some(612));
        assert_eq!(reading.free_flow_travel_time, Some(306));
        assert!(!reading.road_closure);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed: FlowSegmentResponse =
            serde_json::from_str(r#"{"flowSegmentData": {"roadClosure": true}}"#)
                .expect("flow should deserialize");
        let reading =
            reading_from_flow(Location::new(0.0, 0.0, 1.0), &parsed).expect("reading");

        assert_eq!(reading.free_flow_speed, 50.0);
        assert_eq!(reading.flow_speed, 0.0);
        assert_eq!(reading.congestion_level, 1.0);
        assert!(reading.road_closure);
        assert!(reading.current_travel_time.is_none());
    }

    #[test]
    fn test_missing_segment_is_an_error() {
        let parsed: FlowSegmentResponse = serde_json::from_str("{}").expect("empty object");
        assert!(reading_from_flow(Location::new(0.0, 0.0, 1.0), &parsed).is_err());
    }

    #[tokio::test]
    async fn test_incident_failure_keeps_flow_reading() {
        let (base, seen) = serve(|path| match path {
            FLOW_SEGMENT_PATH => (200, sample_flow()),
            _ => (500, "incident backend down"),
        })
        .await;
        let location = Location::new(52.37, 4.89, 2.0);

        let reading = client(&base)
            .fetch_reading("secret", location)
            .await
            .expect("flow reading should survive incident failure");

        assert_eq!(reading.data_source, DataSource::TomTom);
        assert_eq!(reading.congestion_level, 0.5);
        assert!(reading.incidents.is_empty());

        let expected_bbox = BoundingBox::around(52.37, 4.89, 2.0)
            .to_query()
            .replace(',', "%2C");
        let seen = seen.lock().unwrap();
        let incident_request = seen
            .iter()
            .find(|target| target.starts_with(INCIDENT_DETAILS_PATH))
            .expect("incident endpoint should be called");
        assert!(incident_request.contains(&format!("bbox={expected_bbox}")));
        assert!(incident_request.contains("key=secret"));
    }

    #[tokio::test]
    async fn test_incidents_attach_to_reading() {
        let (base, _) = serve(|path| match path {
            FLOW_SEGMENT_PATH => (200, sample_flow()),
            INCIDENT_DETAILS_PATH => (
                200,
                r#"{"incidents": [{
                    "geometry": {"type": "Point", "coordinates": [4.89, 52.37]},
                    "properties": {"iconCategory": 1, "magnitudeOfDelay": 2,
                                   "events": [{"description": "Crash", "code": 201}]}
                }]}"#,
            ),
            _ => (404, ""),
        })
        .await;

        let reading = client(&base)
            .fetch_reading("secret", Location::new(52.37, 4.89, 2.0))
            .await
            .expect("reading");

        assert_eq!(reading.incidents.len(), 1);
        assert_eq!(reading.incidents[0].description.as_deref(), Some("Crash"));
    }

    #[tokio::test]
    async fn test_flow_failure_is_a_tomtom_error() {
        let (base, _) = serve(|_| (403, "forbidden")).await;

        let err = client(&base)
            .fetch_reading("secret", Location::new(52.37, 4.89, 2.0))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TomTom(ref msg) if msg.contains("403")));
    }
}
