//! The capability every traffic provider client implements.

use async_trait::async_trait;

use crate::{DataSource, Location, Result, TrafficReading};

/// Turns a location plus API key into a normalized reading.
///
/// Implementations never fall back to synthetic data themselves: any network,
/// status, or decode problem is returned as an error and the caller decides.
#[async_trait]
pub trait TrafficProvider: Send + Sync {
    /// Tag stamped on readings produced by this provider.
    fn source(&self) -> DataSource;

    async fn fetch_reading(&self, api_key: &str, location: Location) -> Result<TrafficReading>;
}
