//! Swarm grid service: cached reads plus the mutating operations.

use std::sync::Arc;

use common::config::SwarmConfig;
use common::{Result, SharedRng, SwarmSnapshot};
use store::GridStore;
use tracing::{debug, info};

use crate::cache::SwarmCache;
use crate::simulator::{build_grid, perturb_intersections, perturb_roads};

pub struct SwarmService {
    store: Arc<dyn GridStore>,
    cache: SwarmCache,
    cfg: SwarmConfig,
    rng: SharedRng,
}

impl SwarmService {
    pub fn new(store: Arc<dyn GridStore>, cfg: SwarmConfig, rng: SharedRng) -> Self {
        let cache = SwarmCache::new(cfg.cache_ttl());
        Self {
            store,
            cache,
            cfg,
            rng,
        }
    }

    /// Current grid. Served from cache inside the TTL; otherwise rebuilt
    /// from stored rows, seeding a default grid when the store is empty.
    pub async fn get_swarm_data(&self) -> Result<Arc<SwarmSnapshot>> {
        self.cache.get_or_regenerate(|| self.load()).await
    }

    async fn load(&self) -> Result<SwarmSnapshot> {
        let intersections = self.store.find_all_intersections().await?;
        let roads = self.store.find_all_roads().await?;

        if intersections.is_empty() && roads.is_empty() {
            info!("Swarm grid empty, seeding default data");
            return self.seed().await;
        }

        debug!(
            "Loaded swarm grid: {} intersections, {} roads",
            intersections.len(),
            roads.len()
        );
        Ok(SwarmSnapshot::build(intersections, &roads))
    }

    async fn seed(&self) -> Result<SwarmSnapshot> {
        let (intersections, roads) = {
            let mut rng = self.rng.lock();
            build_grid(&self.cfg, &mut *rng)
        };

        let intersections = self.store.save_all_intersections(intersections).await?;
        let roads = self.store.save_all_roads(roads).await?;

        info!(
            "Seeded swarm grid: {} intersections, {} roads around ({},{})",
            intersections.len(),
            roads.len(),
            self.cfg.center_lat,
            self.cfg.center_lng
        );
        Ok(SwarmSnapshot::build(intersections, &roads))
    }

    /// Replace whatever grid is stored with a freshly generated default one.
    pub async fn initialize_default_data(&self) -> Result<SwarmSnapshot> {
        self.cache.exclusive(|| self.reseed()).await
    }

    async fn reseed(&self) -> Result<SwarmSnapshot> {
        self.store.delete_all_roads().await?;
        self.store.delete_all_intersections().await?;
        self.seed().await
    }

    /// Redraw congestion on every stored intersection and road.
    pub async fn update_congestion(&self) -> Result<()> {
        self.cache.exclusive(|| self.perturb()).await
    }

    async fn perturb(&self) -> Result<()> {
        let mut intersections = self.store.find_all_intersections().await?;
        let mut roads = self.store.find_all_roads().await?;

        {
            let mut rng = self.rng.lock();
            perturb_intersections(&mut intersections, &mut *rng);
            perturb_roads(&mut roads, &mut *rng);
        }

        let (n_intersections, n_roads) = (intersections.len(), roads.len());
        self.store.save_all_intersections(intersections).await?;
        self.store.save_all_roads(roads).await?;

        debug!(
            "Updated congestion on {} intersections, {} roads",
            n_intersections, n_roads
        );
        Ok(())
    }

    pub async fn clear_all_data(&self) -> Result<()> {
        self.cache.exclusive(|| self.wipe()).await
    }

    async fn wipe(&self) -> Result<()> {
        self.store.delete_all_roads().await?;
        self.store.delete_all_intersections().await?;
        info!("Cleared swarm grid");
        Ok(())
    }
}
