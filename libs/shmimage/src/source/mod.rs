// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Host-side source built on a [`crate::shm::SharedImageSession`].

mod display;
mod freshness;
mod shared_memory_source;

pub use display::{DisplaySink, GraphicsScope};
pub use freshness::FreshnessTracker;
pub use shared_memory_source::{FrameUpdate, SharedMemorySource, TickOutcome};
