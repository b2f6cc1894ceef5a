//! World settings

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::ecs::CHUNK_ALIGN;

/// Bytes per archetype chunk unless configured otherwise.
pub const ARCHETYPE_CHUNK_SIZE: usize = 16 * 1024;

const MIN_CHUNK_BYTES: usize = 1024;
const MAX_CHUNK_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables for a [`World`](crate::ecs::World).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Size of every chunk buffer in bytes.
    pub chunk_byte_budget: usize,
    /// Threads in the `for_each` worker pool. `0` uses one per core.
    pub worker_threads: usize,
    /// Seconds per fixed update.
    pub fixed_time_step: f64,
    /// Upper bound on fixed updates run to catch up in one frame.
    pub max_fixed_steps_per_frame: u32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            chunk_byte_budget: ARCHETYPE_CHUNK_SIZE,
            worker_threads: 0,
            fixed_time_step: 1.0 / 60.0,
            max_fixed_steps_per_frame: 8,
        }
    }
}

impl WorldSettings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.validate())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), ?settings, "loaded world settings");
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamp out-of-range values. Chunk budgets are rounded up to a
    /// multiple of [`CHUNK_ALIGN`].
    pub fn validate(mut self) -> Self {
        let clamped = self
            .chunk_byte_budget
            .clamp(MIN_CHUNK_BYTES, MAX_CHUNK_BYTES)
            .next_multiple_of(CHUNK_ALIGN);
        if clamped != self.chunk_byte_budget {
            tracing::warn!(
                requested = self.chunk_byte_budget,
                used = clamped,
                "chunk byte budget adjusted"
            );
            self.chunk_byte_budget = clamped;
        }

        if !(self.fixed_time_step.is_finite() && self.fixed_time_step > 0.0) {
            let fallback = Self::default().fixed_time_step;
            tracing::warn!(
                requested = self.fixed_time_step,
                used = fallback,
                "fixed time step must be positive"
            );
            self.fixed_time_step = fallback;
        }

        if self.max_fixed_steps_per_frame == 0 {
            tracing::warn!("max_fixed_steps_per_frame of 0 would starve fixed update, using 1");
            self.max_fixed_steps_per_frame = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let settings = WorldSettings::from_json_str(r#"{ "worker_threads": 2 }"#).unwrap();
        assert_eq!(settings.worker_threads, 2);
        assert_eq!(settings.chunk_byte_budget, ARCHETYPE_CHUNK_SIZE);
        assert_eq!(settings.max_fixed_steps_per_frame, 8);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let settings = WorldSettings::from_json_str(
            r#"{ "chunk_byte_budget": 100, "fixed_time_step": -1.0, "max_fixed_steps_per_frame": 0 }"#,
        )
        .unwrap();
        assert_eq!(settings.chunk_byte_budget, MIN_CHUNK_BYTES);
        assert_eq!(settings.fixed_time_step, 1.0 / 60.0);
        assert_eq!(settings.max_fixed_steps_per_frame, 1);

        let odd = WorldSettings {
            chunk_byte_budget: 5000,
            ..WorldSettings::default()
        }
        .validate();
        assert_eq!(odd.chunk_byte_budget % CHUNK_ALIGN, 0);
        assert!(odd.chunk_byte_budget >= 5000);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            WorldSettings::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = WorldSettings {
            worker_threads: 3,
            ..WorldSettings::default()
        };
        let json = settings.to_json_string().unwrap();
        assert_eq!(WorldSettings::from_json_str(&json).unwrap(), settings);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = WorldSettings::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
