// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-id consumer session: one region, one frame slot cursor, and the last
//! dimensions seen.

use tracing::info;

use super::frame_slot::{FrameSlotReader, FrameView};
use super::region::{RegionOptions, SharedRegion};
use crate::core::{FrameDimensions, Result};

/// A frame handed out by [`SharedImageSession::receive`].
#[derive(Debug, Clone, Copy)]
pub struct ReceivedFrame<'a> {
    pub frame: FrameView<'a>,
    /// The frame's dimensions differ from the previously received one.
    pub dimensions_changed: bool,
}

/// Consumer side of one named shared image.
///
/// Sessions are bound to a single id for their whole life. To follow a
/// different id, destroy this session and create a new one.
#[derive(Debug)]
pub struct SharedImageSession {
    region: SharedRegion,
    reader: FrameSlotReader,
    last_dimensions: FrameDimensions,
}

impl SharedImageSession {
    /// Open (or create) the region `id` with room for `max_capacity` bytes.
    pub fn create(id: &str, max_capacity: usize) -> Result<Self> {
        Self::create_with_options(id, max_capacity, RegionOptions::reader())
    }

    pub fn create_with_options(
        id: &str,
        max_capacity: usize,
        options: RegionOptions,
    ) -> Result<Self> {
        let region = SharedRegion::open_or_create(id, max_capacity, options)?;
        info!("Shared image session started on '{}'", id);
        Ok(Self {
            region,
            reader: FrameSlotReader::new(),
            last_dimensions: FrameDimensions::default(),
        })
    }

    pub fn id(&self) -> &str {
        self.region.id()
    }

    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    pub fn is_open(&self) -> bool {
        self.region.is_open()
    }

    /// Dimensions of the last frame received (0x0 before the first one).
    pub fn last_dimensions(&self) -> FrameDimensions {
        self.last_dimensions
    }

    /// Number of published frames rejected as malformed.
    pub fn skipped_frames(&self) -> u64 {
        self.reader.skipped()
    }

    /// Poll for a new frame. Never blocks.
    pub fn receive(&mut self) -> Option<ReceivedFrame<'_>> {
        let frame = self.reader.try_receive(&self.region)?;
        let dims = frame.dimensions();
        let dimensions_changed = dims != self.last_dimensions;
        if dimensions_changed {
            info!(
                "Frame size on '{}' changed {} -> {}",
                self.region.id(),
                self.last_dimensions,
                dims
            );
            self.last_dimensions = dims;
        }
        Some(ReceivedFrame {
            frame,
            dimensions_changed,
        })
    }

    /// Close the region. Safe to call more than once; a destroyed session
    /// receives nothing.
    pub fn destroy(&mut self) {
        if self.region.is_open() {
            info!("Shared image session on '{}' destroyed", self.region.id());
        }
        self.region.close();
    }
}
