// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared-memory image transport.
//!
//! A producer process publishes RGBA frames into a named POSIX shared-memory
//! region; a host polls that region once per video tick, uploads the latest
//! frame to its own texture, and stops drawing once no frame has arrived for
//! a configurable timeout.
//!
//! - [`shm`]: region mapping, the frame slot protocol, consumer session,
//!   reference writer.
//! - [`source`]: freshness tracking and the host-facing state machine.
//! - [`core`]: errors, configuration and frame dimensions.

pub mod core;
pub mod shm;
pub mod source;

pub use core::{
    needs_resize, FrameDimensions, PropertyDescriptor, PropertyKind, Result, ShmImageError,
    SourceConfig, BYTES_PER_PIXEL, DEFAULT_SHARED_ID, DEFAULT_TIMEOUT_MS, MAX_TIMEOUT_MS,
    MIN_TIMEOUT_MS, PROPERTIES, SOURCE_DISPLAY_NAME,
};
pub use shm::{
    FrameSlotReader, FrameView, FrameWriter, ReceivedFrame, RegionOptions, SharedImageSession,
    SharedRegion, DEFAULT_CAPACITY,
};
pub use source::{
    DisplaySink, FrameUpdate, FreshnessTracker, GraphicsScope, SharedMemorySource, TickOutcome,
};
