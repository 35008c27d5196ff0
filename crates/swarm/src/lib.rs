//! Simulated intersection/road grid ("swarm") with a shared snapshot cache.

pub mod cache;
pub mod service;
pub mod simulator;

pub use cache::SwarmCache;
pub use service::SwarmService;
