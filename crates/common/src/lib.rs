//! Shared types, config, and error definitions for traffic-track.

pub mod config;
pub mod error;
pub mod geo;
pub mod provider;
pub mod rng;
pub mod types;

pub use config::TrafficConfig;
pub use error::Error;
pub use provider::TrafficProvider;
pub use rng::SharedRng;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
