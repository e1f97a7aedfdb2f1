//! Digit-by-digit account discovery.

pub mod engine;

pub use engine::{DiscoveryConfig, DiscoveryEngine};
