//! HERE Traffic API client.
//!
//! Queries `v7/flow` for every segment inside a circle around the point and
//! averages the per-segment slowdown into one reading.

use async_trait::async_trait;
use common::config::HttpConfig;
use common::error::truncate_body;
use common::{clamp_congestion, DataSource, Error, Location, TrafficProvider, TrafficReading};
use serde::Deserialize;
use tracing::{debug, warn};

const FLOW_PATH: &str = "/v7/flow";
const FREE_FLOW_SPEED_KMH: f64 = 50.0;
const DEFAULT_SEGMENT_FREE_FLOW: f64 = 50.0;

/// HERE Traffic API client.
#[derive(Debug, Clone)]
pub struct HereClient {
    client: reqwest::Client,
    base_url: String,
}

/// Response from `v7/flow`.
#[derive(Debug, Deserialize)]
pub struct FlowResponse {
    #[serde(default)]
    pub results: Vec<FlowResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowResult {
    #[serde(rename = "currentFlow", default)]
    pub current_flow: Option<CurrentFlow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentFlow {
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(rename = "freeFlow", default)]
    pub free_flow: Option<f64>,
}

impl HereClient {
    pub fn new(base_url: &str, http: &HttpConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("traffic-track/0.1")
            .pool_max_idle_per_host(4)
            .connect_timeout(http.connect_timeout())
            .timeout(http.request_timeout())
            .build()
            .map_err(|e| Error::Http(format!("failed to build HERE HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch flow for all segments within `location.radius_km`.
    pub async fn fetch_flow(&self, api_key: &str, location: Location) -> Result<FlowResponse, Error> {
        let url = format!("{}{}", self.base_url, FLOW_PATH);
        let (lat, lng) = (location.latitude, location.longitude);
        let area = format!(
            "circle:{lat:.6},{lng:.6};r={}",
            (location.radius_km * 1000.0) as i64
        );

        debug!("Fetching HERE flow: {} in={}", url, area);

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&[
                ("in", area.as_str()),
                ("locationReferencing", "shape"),
                ("apiKey", api_key),
            ])
            .send()
            .await
            .map_err(|e| Error::Here(format!("HTTP error for ({lat},{lng}): {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            let preview = truncate_body(&body, 200);
            if status == 401 {
                warn!(
                    "HERE returned 401 (unauthorized: check API key validity and permissions): {}",
                    preview
                );
                return Err(Error::Unauthorized {
                    provider: "HERE".into(),
                    message: preview.to_string(),
                });
            }
            warn!("HERE returned {} for ({lat},{lng}): {}", status, preview);
            return Err(Error::Here(format!(
                "HERE returned {} for ({lat},{lng}): {}",
                status, preview
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::Here(format!("JSON parse error for ({lat},{lng}): {e}")))
    }
}

#[async_trait]
impl TrafficProvider for HereClient {
    fn source(&self) -> DataSource {
        DataSource::Here
    }

    async fn fetch_reading(&self, api_key: &str, location: Location) -> Result<TrafficReading, Error> {
        let flow = self.fetch_flow(api_key, location).await?;
        reading_from_flow(location, &flow)
    }
}

/// Average the slowdown across all segments that report a current flow.
pub fn reading_from_flow(location: Location, payload: &FlowResponse) -> Result<TrafficReading, Error> {
    let mut total_congestion = 0.0;
    let mut total_speed = 0.0;
    let mut count = 0usize;

    for flow in payload.results.iter().filter_map(|r| r.current_flow.as_ref()) {
        let speed = flow.speed.unwrap_or(0.0);
        let free_flow = flow
            .free_flow
            .filter(|f| *f > 0.0)
            .unwrap_or(DEFAULT_SEGMENT_FREE_FLOW);
        total_speed += speed;
        total_congestion += 1.0 - speed / free_flow;
        count += 1;
    }

    if count == 0 {
        return Err(Error::Here(format!(
            "No flow segments for ({},{})",
            location.latitude, location.longitude
        )));
    }

    let avg_congestion = clamp_congestion(total_congestion / count as f64);
    let avg_speed = total_speed / count as f64;

    debug!(
        "HERE averaged {} segments: congestion={:.2} speed={:.1}",
        count, avg_congestion, avg_speed
    );

    Ok(TrafficReading::new(
        location,
        DataSource::Here,
        avg_congestion,
        avg_speed,
        FREE_FLOW_SPEED_KMH,
    ))
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

    fn client(base_url: &str) -> HereClient {
        HereClient::new(base_url, &HttpConfig::default()).expect("client should build")
    }

    fn sample_response() -> &'static str {
        r#"{
            "sourceUpdated": "2026-10-19T08:00:00Z",
            "results": [
                {"location": {"length": 120.0}, "currentFlow": {"speed": 10.0, "freeFlow": 20.0, "jamFactor": 4.1}},
                {"location": {"length": 80.0}, "currentFlow": {"speed": 30.0, "freeFlow": 40.0, "jamFactor": 1.2}},
                {"location": {"length": 40.0}}
            ]
        }"#
    }

    #[test]
    fn test_averages_segments() {
        let parsed: FlowResponse =
            serde_json::from_str(sample_response()).expect("response should deserialize");
        let reading =
            reading_from_flow(Location::new(52.52, 13.40, 1.0), &parsed).expect("reading");

        // (0.5 + 0.25) / 2
        assert!((reading.congestion_level - 0.375).abs() < 1e-9);
        assert!((reading.flow_speed - 20.0).abs() < 1e-9);
        assert_eq!(reading.free_flow_speed, 50.0);
        assert_eq!(reading.data_source, DataSource::Here);
    }

    #[test]
    fn test_average_is_clamped() {
        let parsed: FlowResponse = serde_json::from_str(
            r#"{"results": [{"currentFlow": {"speed": 90.0, "freeFlow": 30.0}}]}"#,
        )
        .expect("response should deserialize");
        let reading =
            reading_from_flow(Location::new(0.0, 0.0, 1.0), &parsed).expect("reading");
        assert_eq!(reading.congestion_level, 0.0);
    }

    #[test]
    fn test_no_segments_is_an_error() {
        let parsed: FlowResponse =
            serde_json::from_str(r#"{"results": []}"#).expect("response should deserialize");
        assert!(reading_from_flow(Location::new(0.0, 0.0, 1.0), &parsed).is_err());
    }

    #[tokio::test]
    async fn test_unauthorized_is_distinct() {
        let (base, _) = serve(|_| (401, r#"{"error":"Unauthorized"}"#)).await;

        let err = client(&base)
            .fetch_reading("bad-key", Location::new(52.52, 13.40, 1.0))
            .await
            .unwrap_err();

        match err {
            Error::Unauthorized { provider, message } => {
                assert_eq!(provider, "HERE");
                assert!(message.contains("Unauthorized"));
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_status_is_a_here_error() {
        let (base, _) = serve(|_| (503, "busy")).await;

        let err = client(&base)
            .fetch_reading("key", Location::new(52.52, 13.40, 1.0))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Here(ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_flow_request_targets_circle() {
        let (base, seen) = serve(|path| match path {
            FLOW_PATH => (200, sample_response()),
            _ => (404, ""),
        })
        .await;

        let reading = client(&base)
            .fetch_reading("key", Location::new(52.52, 13.40, 1.5))
            .await
            .expect("reading");
        assert!((reading.congestion_level - 0.375).abs() < 1e-9);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("in=circle%3A52.520000%2C13.400000%3Br%3D1500"));
        assert!(seen[0].contains("apiKey=key"));
    }
}
