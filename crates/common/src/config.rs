//! Service configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficConfig {
    /// Provider name for a credential seeded at startup (e.g. "TomTom Traffic API").
    #[serde(default)]
    pub provider: String,

    /// API key for the seeded credential. Empty means "no credential".
    #[serde(default)]
    pub api_key: String,

    /// Outbound HTTP timeouts.
    #[serde(default)]
    pub http: HttpConfig,

    /// Provider base URLs.
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Grid traffic request limits.
    #[serde(default)]
    pub grid: GridConfig,

    /// Swarm simulation grid and cache.
    #[serde(default)]
    pub swarm: SwarmConfig,

    /// Data retention for persisted readings.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Background loop intervals (seconds).
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Timeouts applied to every provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Base URLs for the provider APIs. Overridable for proxies and staging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_google_base")]
    pub google_base_url: String,

    #[serde(default = "default_tomtom_base")]
    pub tomtom_base_url: String,

    #[serde(default = "default_here_base")]
    pub here_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Largest accepted grid side length.
    #[serde(default = "default_max_grid_size")]
    pub max_grid_size: usize,

    /// Per-point fetches in flight at once.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,

    #[serde(default = "default_center_lng")]
    pub center_lng: f64,

    /// Half the grid's side length, in degrees.
    #[serde(default = "default_half_extent")]
    pub half_extent_deg: f64,

    /// Intersections per side.
    #[serde(default = "default_swarm_grid_size")]
    pub grid_size: usize,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl SwarmConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Readings and incidents older than this are purged by cleanup.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "default_congestion_update_interval")]
    pub congestion_update_interval_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_connect_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    10
}

fn default_google_base() -> String {
    "https://roads.googleapis.com".into()
}
fn default_tomtom_base() -> String {
    "https://api.tomtom.com".into()
}
fn default_here_base() -> String {
    "https://data.traffic.hereapi.com".into()
}

fn default_max_grid_size() -> usize {
    10
}
fn default_fetch_concurrency() -> usize {
    8
}

fn default_center_lat() -> f64 {
    51.505
}
fn default_center_lng() -> f64 {
    -0.09
}
fn default_half_extent() -> f64 {
    0.05
}
fn default_swarm_grid_size() -> usize {
    9
}
fn default_cache_ttl() -> u64 {
    600
}

fn default_max_age_hours() -> i64 {
    24
}

fn default_cleanup_interval() -> u64 {
    3600
}
fn default_congestion_update_interval() -> u64 {
    60
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            google_base_url: default_google_base(),
            tomtom_base_url: default_tomtom_base(),
            here_base_url: default_here_base(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_grid_size: default_max_grid_size(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            center_lat: default_center_lat(),
            center_lng: default_center_lng(),
            half_extent_deg: default_half_extent(),
            grid_size: default_swarm_grid_size(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_hours: default_max_age_hours(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: default_cleanup_interval(),
            congestion_update_interval_secs: default_congestion_update_interval(),
        }
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            api_key: String::new(),
            http: HttpConfig::default(),
            endpoints: EndpointConfig::default(),
            grid: GridConfig::default(),
            swarm: SwarmConfig::default(),
            retention: RetentionConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_fills_defaults() {
        let cfg: TrafficConfig = serde_json::from_str(r#"{"swarm": {"cache_ttl_secs": 30}}"#)
            .expect("partial config should deserialize");
        assert_eq!(cfg.swarm.cache_ttl_secs, 30);
        assert_eq!(cfg.swarm.grid_size, 9);
        assert_eq!(cfg.http.connect_timeout_secs, 10);
        assert_eq!(cfg.retention.max_age_hours, 24);
        assert!(cfg.api_key.is_empty());
    }
}
