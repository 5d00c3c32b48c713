// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShmImageError {
    #[error("Shared memory allocation failed for '{id}': {reason}")]
    Allocation { id: String, reason: String },

    #[error("Invalid shared id '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Display resource error: {0}")]
    DisplayResource(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShmImageError {
    pub(crate) fn allocation(id: &str, reason: impl Into<String>) -> Self {
        Self::Allocation {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the shared mapping itself could not be provided.
    ///
    /// Invalid ids and unsupported platforms count as allocation failures:
    /// in every case the source simply has no frames to show.
    pub fn is_allocation(&self) -> bool {
        matches!(
            self,
            Self::Allocation { .. } | Self::InvalidId { .. } | Self::NotSupported(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ShmImageError>;
