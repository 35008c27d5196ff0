//! Time-bounded snapshot cache with a single regenerating writer.
//!
//! Readers clone an `Arc` out of a short read lock and never observe a
//! half-built snapshot. Regeneration runs under `gate`, so concurrent callers
//! that find the entry stale queue behind the first one and re-check before
//! doing any work of their own.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{Result, SwarmSnapshot};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct CacheEntry {
    snapshot: Arc<SwarmSnapshot>,
    populated_at: Instant,
}

#[derive(Debug)]
pub struct SwarmCache {
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
    gate: Mutex<()>,
    /// Bumped by `invalidate`; a rebuild that straddles a bump is not cached.
    epoch: AtomicU64,
}

impl SwarmCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
            gate: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn fresh(&self) -> Option<Arc<SwarmSnapshot>> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|e| e.populated_at.elapsed() < self.ttl)
            .map(|e| Arc::clone(&e.snapshot))
    }

    /// Cached snapshot if fresh, else the result of `regenerate`, which is
    /// published for later callers. At most one `regenerate` runs at a time.
    pub async fn get_or_regenerate<F, Fut>(&self, regenerate: F) -> Result<Arc<SwarmSnapshot>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SwarmSnapshot>>,
    {
        if let Some(snapshot) = self.fresh().await {
            return Ok(snapshot);
        }

        let _writer = self.gate.lock().await;
        if let Some(snapshot) = self.fresh().await {
            debug!("Swarm snapshot refreshed by a concurrent caller");
            return Ok(snapshot);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let snapshot = Arc::new(regenerate().await?);

        let mut slot = self.entry.write().await;
        if self.epoch.load(Ordering::SeqCst) == epoch {
            *slot = Some(CacheEntry {
                snapshot: Arc::clone(&snapshot),
                populated_at: Instant::now(),
            });
            debug!(
                "Published swarm snapshot: {} intersections, {} roads",
                snapshot.intersections.len(),
                snapshot.roads.len()
            );
        } else {
            debug!("Swarm cache invalidated during rebuild, not publishing");
        }

        Ok(snapshot)
    }

    /// Run a mutation of the underlying rows under the writer gate, then
    /// drop the cached snapshot before the gate is released. No rebuild can
    /// interleave with `mutate`.
    pub async fn exclusive<F, Fut, T>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _writer = self.gate.lock().await;
        let result = mutate().await;
        self.invalidate().await;
        result
    }

    /// Drop the cached snapshot; the next read regenerates.
    pub async fn invalidate(&self) {
        let mut slot = self.entry.write().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *slot = None;
    }
}
