//! Configuration loader: merges .env, config.toml, and environment overrides.

use common::config::TrafficConfig;
use common::Error;
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_positive_i64(raw: &str, env_name: &str) -> Result<i64, Error> {
    let parsed = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed <= 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &TrafficConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if !config.api_key.trim().is_empty() && config.provider.trim().is_empty() {
        issues.push("provider is required when api_key is set".into());
    }

    if config.http.connect_timeout_secs == 0 {
        issues.push("http.connect_timeout_secs must be > 0".into());
    }
    if config.http.request_timeout_secs == 0 {
        issues.push("http.request_timeout_secs must be > 0".into());
    }

    for (name, url) in [
        ("endpoints.google_base_url", &config.endpoints.google_base_url),
        ("endpoints.tomtom_base_url", &config.endpoints.tomtom_base_url),
        ("endpoints.here_base_url", &config.endpoints.here_base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            issues.push(format!("{name} must be an http(s) URL"));
        }
    }

    if config.grid.max_grid_size == 0 {
        issues.push("grid.max_grid_size must be > 0".into());
    }
    if config.grid.fetch_concurrency == 0 {
        issues.push("grid.fetch_concurrency must be > 0".into());
    }

    if !(-90.0..=90.0).contains(&config.swarm.center_lat) {
        issues.push("swarm.center_lat must be in [-90,90]".into());
    }
    if !(-180.0..=180.0).contains(&config.swarm.center_lng) {
        issues.push("swarm.center_lng must be in [-180,180]".into());
    }
    if !(config.swarm.half_extent_deg > 0.0) {
        issues.push("swarm.half_extent_deg must be > 0".into());
    }
    if config.swarm.grid_size < 2 {
        issues.push("swarm.grid_size must be >= 2".into());
    }
    if config.swarm.cache_ttl_secs == 0 {
        issues.push("swarm.cache_ttl_secs must be > 0".into());
    }

    if config.retention.max_age_hours <= 0 {
        issues.push("retention.max_age_hours must be > 0".into());
    }

    if config.timing.cleanup_interval_secs == 0 {
        issues.push("timing.cleanup_interval_secs must be > 0".into());
    }
    if config.timing.congestion_update_interval_secs == 0 {
        issues.push("timing.congestion_update_interval_secs must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply environment overrides, reading variables through `var`.
fn apply_env_overrides<F>(config: &mut TrafficConfig, var: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(provider) = var("TRAFFIC_PROVIDER") {
        config.provider = provider.trim().to_string();
    }
    if let Some(key) = var("TRAFFIC_API_KEY") {
        config.api_key = key.trim().to_string();
    }
    if let Some(raw) = var("TRAFFIC_CONNECT_TIMEOUT_SECS") {
        config.http.connect_timeout_secs = parse_positive_u64(&raw, "TRAFFIC_CONNECT_TIMEOUT_SECS")?;
    }
    if let Some(raw) = var("TRAFFIC_REQUEST_TIMEOUT_SECS") {
        config.http.request_timeout_secs = parse_positive_u64(&raw, "TRAFFIC_REQUEST_TIMEOUT_SECS")?;
    }
    if let Some(raw) = var("SWARM_CACHE_TTL_SECS") {
        config.swarm.cache_ttl_secs = parse_positive_u64(&raw, "SWARM_CACHE_TTL_SECS")?;
    }
    if let Some(raw) = var("TRAFFIC_RETENTION_HOURS") {
        config.retention.max_age_hours = parse_positive_i64(&raw, "TRAFFIC_RETENTION_HOURS")?;
    }
    Ok(())
}

/// Load service configuration from environment and optional config file.
pub fn load_config(path: &Path) -> Result<TrafficConfig, Error> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let mut config = TrafficConfig::default();

    if path.exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    }

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_validate() {
        assert!(validate_config(&TrafficConfig::default()).is_ok());
    }

    #[test]
    fn test_toml_sections_override_defaults() {
        let cfg: TrafficConfig = toml::from_str(
            r#"
            provider = "TomTom Traffic API"
            api_key = "abc123"

            [swarm]
            cache_ttl_secs = 120

            [endpoints]
            tomtom_base_url = "http://localhost:9000"
            "#,
        )
        .expect("toml should parse");

        assert_eq!(cfg.provider, "TomTom Traffic API");
        assert_eq!(cfg.swarm.cache_ttl_secs, 120);
        assert_eq!(cfg.swarm.grid_size, 9);
        assert_eq!(cfg.endpoints.tomtom_base_url, "http://localhost:9000");
        assert_eq!(cfg.endpoints.here_base_url, "https://data.traffic.hereapi.com");
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut cfg = TrafficConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("TRAFFIC_PROVIDER", " HERE Traffic API "),
                ("TRAFFIC_API_KEY", "k3y"),
                ("TRAFFIC_REQUEST_TIMEOUT_SECS", "4"),
                ("SWARM_CACHE_TTL_SECS", "30"),
                ("TRAFFIC_RETENTION_HOURS", "48"),
            ]),
        )
        .expect("overrides should apply");

        assert_eq!(cfg.provider, "HERE Traffic API");
        assert_eq!(cfg.api_key, "k3y");
        assert_eq!(cfg.http.request_timeout_secs, 4);
        assert_eq!(cfg.http.connect_timeout_secs, 10);
        assert_eq!(cfg.swarm.cache_ttl_secs, 30);
        assert_eq!(cfg.retention.max_age_hours, 48);
    }

    #[test]
    fn test_bad_env_values_rejected() {
        let mut cfg = TrafficConfig::default();
        assert!(apply_env_overrides(&mut cfg, env(&[("SWARM_CACHE_TTL_SECS", "0")])).is_err());
        assert!(apply_env_overrides(&mut cfg, env(&[("TRAFFIC_RETENTION_HOURS", "soon")])).is_err());
    }

    #[test]
    fn test_validation_collects_every_issue() {
        let mut cfg = TrafficConfig::default();
        cfg.api_key = "orphan".into();
        cfg.grid.max_grid_size = 0;
        cfg.swarm.grid_size = 1;
        cfg.endpoints.google_base_url = "roads.googleapis.com".into();

        let Err(Error::Config(msg)) = validate_config(&cfg) else {
            panic!("expected a config error");
        };
        assert!(msg.contains("provider is required"));
        assert!(msg.contains("grid.max_grid_size"));
        assert!(msg.contains("swarm.grid_size"));
        assert!(msg.contains("endpoints.google_base_url"));
    }
}
