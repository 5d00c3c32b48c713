// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Source configuration: which region to read and how long a frame stays valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Result, ShmImageError};

/// Name hosts show for the source.
pub const SOURCE_DISPLAY_NAME: &str = "Shared memory";

pub const DEFAULT_SHARED_ID: &str = "sharedimg";
pub const DEFAULT_TIMEOUT_MS: u32 = 800;
pub const MIN_TIMEOUT_MS: u32 = 0;
pub const MAX_TIMEOUT_MS: u32 = 60_000;
pub const TIMEOUT_STEP_MS: u32 = 100;

/// Largest frame the default region can carry.
pub const DEFAULT_MAX_WIDTH: u32 = 3000;
pub const DEFAULT_MAX_HEIGHT: u32 = 2000;

/// Kind of value a host property UI should render for a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Text,
    Int { min: u32, max: u32, step: u32 },
}

/// Host-facing description of one configurable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: PropertyKind,
}

pub const PROPERTIES: &[PropertyDescriptor] = &[
    PropertyDescriptor {
        key: "shared_id",
        label: "Shared memory id",
        kind: PropertyKind::Text,
    },
    PropertyDescriptor {
        key: "timeout",
        label: "Timeout [ms]",
        kind: PropertyKind::Int {
            min: MIN_TIMEOUT_MS,
            max: MAX_TIMEOUT_MS,
            step: TIMEOUT_STEP_MS,
        },
    },
];

/// Configuration for a shared-memory image source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Name of the shared-memory region to read frames from.
    pub shared_id: String,
    /// How long a received frame stays drawable, in milliseconds.
    #[serde(alias = "timeout")]
    pub timeout_ms: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            shared_id: DEFAULT_SHARED_ID.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl SourceConfig {
    pub fn new(shared_id: impl Into<String>, timeout_ms: u32) -> Self {
        Self {
            shared_id: shared_id.into(),
            timeout_ms,
        }
    }

    /// Timeout as the freshness threshold, in seconds.
    pub fn timeout_secs(&self) -> f64 {
        f64::from(self.timeout_ms) * 1e-3
    }

    /// Clamp `timeout_ms` into the supported range.
    pub fn validated(mut self) -> Self {
        let clamped = self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        if clamped != self.timeout_ms {
            tracing::warn!(
                "timeout {}ms out of range, clamped to {}ms",
                self.timeout_ms,
                clamped
            );
            self.timeout_ms = clamped;
        }
        self
    }

    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShmImageError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            ShmImageError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::info!("Loaded source config from {}", path.display());
        Ok(config.validated())
    }

    /// Load configuration from a YAML file, returning defaults if the file is
    /// missing or unparseable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SourceConfig::default();
        assert_eq!(config.shared_id, "sharedimg");
        assert_eq!(config.timeout_ms, 800);
        assert!((config.timeout_secs() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_validated_clamps_timeout() {
        let config = SourceConfig::new("cam", 90_000).validated();
        assert_eq!(config.timeout_ms, MAX_TIMEOUT_MS);

        let config = SourceConfig::new("cam", 500).validated();
        assert_eq!(config.timeout_ms, 500);
    }

    #[test]
    fn test_load_partial_yaml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.yaml");
        std::fs::write(&path, "timeout: 250\n").unwrap();

        let config = SourceConfig::load(&path).unwrap();
        assert_eq!(config.shared_id, DEFAULT_SHARED_ID);
        assert_eq!(config.timeout_ms, 250);
    }

    #[test]
    fn test_load_invalid_yaml_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.yaml");
        std::fs::write(&path, "shared_id: [unterminated\n").unwrap();

        let err = SourceConfig::load(&path).unwrap_err();
        assert!(matches!(err, ShmImageError::Configuration(_)));
        assert_eq!(SourceConfig::load_or_default(&path), SourceConfig::default());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = SourceConfig::load_or_default(&dir.path().join("missing.yaml"));
        assert_eq!(config, SourceConfig::default());
    }

    #[test]
    fn test_timeout_property_range() {
        let timeout = PROPERTIES.iter().find(|p| p.key == "timeout").unwrap();
        assert_eq!(
            timeout.kind,
            PropertyKind::Int {
                min: 0,
                max: 60_000,
                step: 100
            }
        );
    }
}
