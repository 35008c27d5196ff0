//! Provider selection.

use std::fmt;
use std::sync::Arc;

use common::{Result, SharedRng, TrafficConfig, TrafficProvider};
use google_roads_client::GoogleRoadsClient;
use here_client::HereClient;
use tomtom_client::TomTomClient;

/// The closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Google,
    TomTom,
    Here,
    Unknown,
}

impl ProviderKind {
    /// Match a credential's provider name, case-insensitively.
    ///
    /// Accepts the full product names ("TomTom Traffic API") and the short
    /// tags used in readings ("tomtom").
    pub fn from_identifier(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "google maps traffic api" | "google" => ProviderKind::Google,
            "tomtom traffic api" | "tomtom" => ProviderKind::TomTom,
            "here traffic api" | "here" => ProviderKind::Here,
            _ => ProviderKind::Unknown,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Google => "google",
            ProviderKind::TomTom => "tomtom",
            ProviderKind::Here => "here",
            ProviderKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One client per supported provider.
#[derive(Clone)]
pub struct ProviderSet {
    google: Arc<dyn TrafficProvider>,
    tomtom: Arc<dyn TrafficProvider>,
    here: Arc<dyn TrafficProvider>,
}

impl ProviderSet {
    pub fn new(
        google: Arc<dyn TrafficProvider>,
        tomtom: Arc<dyn TrafficProvider>,
        here: Arc<dyn TrafficProvider>,
    ) -> Self {
        Self {
            google,
            tomtom,
            here,
        }
    }

    /// Build the real HTTP clients from configuration.
    pub fn from_config(cfg: &TrafficConfig, rng: SharedRng) -> Result<Self> {
        let google = GoogleRoadsClient::new(&cfg.endpoints.google_base_url, &cfg.http, rng)?;
        let tomtom = TomTomClient::new(&cfg.endpoints.tomtom_base_url, &cfg.http)?;
        let here = HereClient::new(&cfg.endpoints.here_base_url, &cfg.http)?;
        Ok(Self::new(Arc::new(google), Arc::new(tomtom), Arc::new(here)))
    }

    /// Client for `kind`, or `None` for unknown providers.
    pub fn resolve(&self, kind: ProviderKind) -> Option<&dyn TrafficProvider> {
        match kind {
            ProviderKind::Google => Some(self.google.as_ref()),
            ProviderKind::TomTom => Some(self.tomtom.as_ref()),
            ProviderKind::Here => Some(self.here.as_ref()),
            ProviderKind::Unknown => None,
        }
    }
}
