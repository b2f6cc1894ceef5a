//! Uni Core
//!
//! The entity-component-system data layer:
//! - Versioned entities and persistent random handles
//! - Per-world component type registry
//! - Archetypes with fixed-size struct-of-arrays chunks
//! - Private (polymorphic) components with owner indices
//! - Cached queries with serial and parallel `for_each`
//! - System groups driven by a fixed-step frame loop

pub mod config;
pub mod ecs;
pub mod time;

pub use glam;
pub use uni_metrics as metrics;

pub use config::{ConfigError, WorldSettings};
pub use time::WorldTime;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
