// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Read side of the frame slot protocol.
//!
//! Protocol (writer):
//! 1) Set the busy bit on `generation`.
//! 2) Copy pixel bytes, then store width / height / bytes_per_line / format.
//! 3) Store the next generation (busy bit cleared, never 0) with release
//!    ordering as the final publish step.
//!
//! The reader polls `generation`: a value that is non-zero, not busy and
//! different from the last one it consumed announces a new frame. There is
//! no lock. A writer that starts the next frame while the host is still
//! uploading the previous one produces a torn image for one frame; the next
//! publish replaces it.

use std::fmt;
use std::sync::atomic::{fence, Ordering};

use tracing::{debug, trace};

use super::layout::{pixel_capacity, validate_frame, HeaderSnapshot};
use super::region::SharedRegion;
use crate::core::{FrameDimensions, BYTES_PER_PIXEL};

/// A received frame. Borrows the region, so it cannot outlive the session
/// it came from or survive the next receive.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    header: HeaderSnapshot,
    pixels: &'a [u8],
}

impl<'a> FrameView<'a> {
    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn bytes_per_line(&self) -> u32 {
        self.header.bytes_per_line
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.header.dimensions()
    }

    /// Generation the producer published this frame under.
    pub fn generation(&self) -> u32 {
        self.header.generation
    }

    /// All `bytes_per_line * height` pixel bytes, rows including padding.
    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    /// Row `y` without trailing padding.
    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        if y >= self.header.height {
            return None;
        }
        let start = y as usize * self.header.bytes_per_line as usize;
        let len = self.header.width as usize * BYTES_PER_PIXEL as usize;
        self.pixels.get(start..start + len)
    }

    /// Copy the frame into a tightly packed RGBA buffer.
    pub fn to_packed_vec(&self) -> Vec<u8> {
        let row_len = self.header.width as usize * BYTES_PER_PIXEL as usize;
        let mut out = Vec::with_capacity(row_len * self.header.height as usize);
        for y in 0..self.header.height {
            if let Some(row) = self.row(y) {
                out.extend_from_slice(row);
            }
        }
        out
    }
}

impl fmt::Debug for FrameView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameView")
            .field("generation", &self.header.generation)
            .field("width", &self.header.width)
            .field("height", &self.header.height)
            .field("bytes_per_line", &self.header.bytes_per_line)
            .field("format", &self.header.format)
            .field("pixels_len", &self.pixels.len())
            .finish()
    }
}

/// Consumer cursor over one region's frame slot.
#[derive(Debug, Default)]
pub struct FrameSlotReader {
    last_generation: u32,
    skipped: u64,
}

impl FrameSlotReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the last frame consumed (0 = none yet).
    pub fn last_generation(&self) -> u32 {
        self.last_generation
    }

    /// Number of published frames rejected by validation.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Poll for a frame published since the last successful receive.
    ///
    /// Returns `None` if nothing new is published, a write is in progress,
    /// the region is closed, or the published header does not describe a frame
    /// that fits in the region. A rejected frame is consumed, so it is not
    /// re-examined on the next poll.
    pub fn try_receive<'a>(&mut self, region: &'a SharedRegion) -> Option<FrameView<'a>> {
        let header = region.header()?;
        let snapshot = header.snapshot();

        if snapshot.is_busy() {
            trace!("Frame write in progress on '{}'", region.id());
            return None;
        }
        if snapshot.generation == 0 || snapshot.generation == self.last_generation {
            return None;
        }

        // A write that started while the header was being read leaves the
        // dimensions mixed; pick the frame up on a later poll instead.
        fence(Ordering::Acquire);
        if header.generation() != snapshot.generation {
            trace!("Frame header changed while reading on '{}'", region.id());
            return None;
        }

        self.last_generation = snapshot.generation;

        let Some(len) = validate_frame(&snapshot, pixel_capacity(region.capacity())) else {
            self.skipped += 1;
            debug!(
                "Skipping malformed frame on '{}': {}x{} stride {} format {} in {} bytes",
                region.id(),
                snapshot.width,
                snapshot.height,
                snapshot.bytes_per_line,
                snapshot.format,
                region.capacity()
            );
            return None;
        };

        let pixels = region.pixels(len)?;
        trace!(
            "Received frame {} on '{}' ({}x{})",
            snapshot.generation,
            region.id(),
            snapshot.width,
            snapshot.height
        );

        Some(FrameView {
            header: snapshot,
            pixels,
        })
    }
}
