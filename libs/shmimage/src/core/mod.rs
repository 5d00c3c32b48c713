// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared types: errors, configuration, frame dimensions.

pub mod config;
pub mod dimensions;
pub mod error;

pub use config::{
    PropertyDescriptor, PropertyKind, SourceConfig, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH,
    DEFAULT_SHARED_ID, DEFAULT_TIMEOUT_MS, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS, PROPERTIES,
    SOURCE_DISPLAY_NAME,
};
pub use dimensions::{needs_resize, FrameDimensions, BYTES_PER_PIXEL};
pub use error::{Result, ShmImageError};
