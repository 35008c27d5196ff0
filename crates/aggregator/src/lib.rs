//! Live traffic acquisition.
//!
//! Resolves the active credential, dispatches to the matching provider client,
//! and falls back to synthetic data on any provider failure.

pub mod dispatch;
pub mod lattice;
pub mod service;
pub mod synthetic;

pub use dispatch::{ProviderKind, ProviderSet};
pub use service::TrafficAggregator;
pub use synthetic::SyntheticGenerator;
