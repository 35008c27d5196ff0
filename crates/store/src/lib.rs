//! Persistence seams for readings, credentials, and the swarm grid.
//!
//! The core only talks to these traits; `memory` provides the in-process
//! implementations used by the binary and by tests.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Credential, Intersection, Result, Road, TrafficReading};

pub use memory::{MemoryCredentialStore, MemoryGridStore, MemoryReadingStore};

/// Source of the provider credential used for live fetches.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Most recently created credential with a non-empty secret.
    async fn active_credential(&self) -> Result<Option<Credential>>;
}

/// Append-only store of traffic readings. Incidents are owned by their reading.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist a reading, returning it with its assigned id.
    async fn save(&self, reading: TrafficReading) -> Result<TrafficReading>;

    /// Delete readings fetched before `cutoff` (incidents go with them).
    /// Returns the number of readings removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Direct pruning of incidents, independent of their parent reading's age.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn delete_incidents_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Rows backing the swarm grid.
#[async_trait]
pub trait GridStore: Send + Sync {
    async fn find_all_intersections(&self) -> Result<Vec<Intersection>>;

    /// Insert rows without an id, overwrite rows with one. Returns the saved rows.
    async fn save_all_intersections(&self, rows: Vec<Intersection>) -> Result<Vec<Intersection>>;

    async fn delete_all_intersections(&self) -> Result<()>;

    async fn find_all_roads(&self) -> Result<Vec<Road>>;

    async fn save_all_roads(&self, rows: Vec<Road>) -> Result<Vec<Road>>;

    async fn delete_all_roads(&self) -> Result<()>;
}
