//! In-memory store implementations.
//!
//! Readings live in a `DashMap` so concurrent grid fetches can save without
//! contending on one lock; grid rows keep insertion order behind a `RwLock`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Credential, Error, Intersection, Result, Road, TrafficReading};
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{CredentialStore, GridStore, IncidentStore, ReadingStore};

// ── Credentials ───────────────────────────────────────────────────────

/// Credential list ordered by creation.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    rows: Arc<RwLock<Vec<Credential>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new credential. Both fields are trimmed and must be non-empty.
    pub async fn save(&self, provider: &str, api_key: &str) -> Result<Credential> {
        let provider = provider.trim();
        let api_key = api_key.trim();
        if provider.is_empty() || api_key.is_empty() {
            return Err(Error::InvalidRequest(
                "provider and api_key are required".into(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let credential = Credential::new(id, provider, api_key);
        debug!("Stored credential {} for {}", credential.masked_key(), provider);
        self.rows.write().await.push(credential.clone());
        Ok(credential)
    }

    /// Most recently created credential, empty secret or not.
    pub async fn latest(&self) -> Option<Credential> {
        self.rows.read().await.last().cloned()
    }

    pub async fn delete_all(&self) {
        self.rows.write().await.clear();
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn active_credential(&self) -> Result<Option<Credential>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().rev().find(|c| c.has_secret()).cloned())
    }
}

// ── Readings ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryReadingStore {
    rows: Arc<DashMap<u64, TrafficReading>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<TrafficReading> {
        self.rows.get(&id).map(|entry| entry.value().clone())
    }

    pub fn incident_count(&self) -> usize {
        self.rows.iter().map(|entry| entry.incidents.len()).sum()
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn save(&self, mut reading: TrafficReading) -> Result<TrafficReading> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        reading.id = Some(id);
        self.rows.insert(id, reading.clone());
        Ok(reading)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let before = self.rows.len();
        self.rows.retain(|_, reading| reading.fetched_at >= cutoff);
        Ok(before.saturating_sub(self.rows.len()))
    }
}

#[async_trait]
impl IncidentStore for MemoryReadingStore {
    async fn delete_incidents_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for mut entry in self.rows.iter_mut() {
            let before = entry.incidents.len();
            entry.incidents.retain(|incident| incident.reported_at >= cutoff);
            removed += before - entry.incidents.len();
        }
        Ok(removed)
    }
}

// ── Swarm grid ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryGridStore {
    intersections: Arc<RwLock<Vec<Intersection>>>,
    roads: Arc<RwLock<Vec<Road>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryGridStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl GridStore for MemoryGridStore {
    async fn find_all_intersections(&self) -> Result<Vec<Intersection>> {
        Ok(self.intersections.read().await.clone())
    }

    async fn save_all_intersections(&self, rows: Vec<Intersection>) -> Result<Vec<Intersection>> {
        let mut table = self.intersections.write().await;
        let mut saved = Vec::with_capacity(rows.len());
        for mut row in rows {
            let existing = row
                .id
                .and_then(|id| table.iter().position(|r| r.id == Some(id)));
            match existing {
                Some(idx) => table[idx] = row.clone(),
                None => {
                    row.id = Some(self.next_id());
                    table.push(row.clone());
                }
            }
            saved.push(row);
        }
        Ok(saved)
    }

    async fn delete_all_intersections(&self) -> Result<()> {
        self.intersections.write().await.clear();
        Ok(())
    }

    async fn find_all_roads(&self) -> Result<Vec<Road>> {
        Ok(self.roads.read().await.clone())
    }

    async fn save_all_roads(&self, rows: Vec<Road>) -> Result<Vec<Road>> {
        let mut table = self.roads.write().await;
        let mut saved = Vec::with_capacity(rows.len());
        for mut row in rows {
            let existing = row
                .id
                .and_then(|id| table.iter().position(|r| r.id == Some(id)));
            match existing {
                Some(idx) => table[idx] = row.clone(),
                None => {
                    row.id = Some(self.next_id());
                    table.push(row.clone());
                }
            }
            saved.push(row);
        }
        Ok(saved)
    }

    async fn delete_all_roads(&self) -> Result<()> {
        self.roads.write().await.clear();
        Ok(())
    }
}
