// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Write side of the frame slot protocol.
//!
//! Producers normally live in another process and speak the protocol
//! directly against the layout in [`super::layout`]. `FrameWriter` is the
//! reference implementation, used by the CLI publisher and by tests.

use tracing::{trace, warn};

use super::layout::{
    pixel_capacity, validate_frame, HeaderSnapshot, HeaderWriter, FORMAT_RGBA8, GENERATION_BUSY_BIT,
};
use super::region::{RegionOptions, SharedRegion};
use crate::core::{FrameDimensions, Result, ShmImageError};

/// Single writer of one region's frame slot.
///
/// Only one writer may publish into a region at a time; the protocol has no
/// arbitration between writers.
#[derive(Debug)]
pub struct FrameWriter {
    region: SharedRegion,
}

impl FrameWriter {
    /// Open the region `id`, creating it with `capacity` bytes if needed.
    pub fn open_or_create(id: &str, capacity: usize) -> Result<Self> {
        Self::with_options(id, capacity, RegionOptions::writer())
    }

    pub fn with_options(id: &str, capacity: usize, options: RegionOptions) -> Result<Self> {
        if !options.writable {
            return Err(ShmImageError::Configuration(
                "FrameWriter needs a writable mapping".to_string(),
            ));
        }
        let region = SharedRegion::open_or_create(id, capacity, options)?;
        Ok(Self { region })
    }

    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    /// Largest pixel payload this region can carry.
    pub fn pixel_capacity(&self) -> usize {
        pixel_capacity(self.region.capacity())
    }

    /// Publish a frame. `pixels` holds `bytes_per_line * height` bytes of
    /// RGBA data. Returns the generation the frame was published under.
    pub fn publish(
        &mut self,
        dims: FrameDimensions,
        bytes_per_line: u32,
        pixels: &[u8],
    ) -> Result<u32> {
        let candidate = HeaderSnapshot {
            generation: 0,
            width: dims.width,
            height: dims.height,
            bytes_per_line,
            format: FORMAT_RGBA8,
        };
        let len = validate_frame(&candidate, self.pixel_capacity()).ok_or_else(|| {
            ShmImageError::InvalidFrame(format!(
                "{} frame with stride {} does not fit in {} pixel bytes of '{}'",
                dims,
                bytes_per_line,
                self.pixel_capacity(),
                self.region.id()
            ))
        })?;
        if pixels.len() < len {
            return Err(ShmImageError::InvalidFrame(format!(
                "{} frame with stride {} needs {} bytes, got {}",
                dims,
                bytes_per_line,
                len,
                pixels.len()
            )));
        }

        let dst = self.region.pixels_mut_ptr().ok_or_else(|| {
            ShmImageError::InvalidFrame(format!("region '{}' is closed", self.region.id()))
        })?;

        let header = self.header_writer()?;
        let start = self.begin_write(header);
        // SAFETY: `len` was validated against the mapped pixel capacity and
        // `pixels` holds at least `len` bytes. The source is process-private.
        unsafe {
            std::ptr::copy_nonoverlapping(pixels.as_ptr(), dst, len);
        }
        Ok(self.finish_write(header, start, dims.width, dims.height, bytes_per_line))
    }

    /// Publish new header values without touching the pixel buffer.
    ///
    /// No validation happens here: the declared dimensions are exactly what
    /// readers will see and check against their mapping.
    pub fn publish_header(&mut self, width: u32, height: u32, bytes_per_line: u32) -> Result<u32> {
        let header = self.header_writer()?;
        let start = self.begin_write(header);
        Ok(self.finish_write(header, start, width, height, bytes_per_line))
    }

    /// Release the mapping. Further publishes fail.
    pub fn close(&mut self) {
        self.region.close();
    }

    fn header_writer(&self) -> Result<HeaderWriter<'_>> {
        self.region.header_writer().ok_or_else(|| {
            ShmImageError::InvalidFrame(format!("region '{}' is closed", self.region.id()))
        })
    }

    fn begin_write(&self, header: HeaderWriter<'_>) -> u32 {
        let current = header.generation();
        if current & GENERATION_BUSY_BIT != 0 {
            // Left behind by a writer that died mid-frame.
            warn!(
                "Region '{}' was marked busy by a previous writer, taking over",
                self.region.id()
            );
        }
        let start = current & !GENERATION_BUSY_BIT;
        header.store_generation(start | GENERATION_BUSY_BIT);
        start
    }

    fn finish_write(
        &self,
        header: HeaderWriter<'_>,
        start: u32,
        width: u32,
        height: u32,
        bytes_per_line: u32,
    ) -> u32 {
        header.store_frame(width, height, bytes_per_line, FORMAT_RGBA8);

        // Final publish step: bump generation and clear the busy bit. 0 is
        // reserved for "nothing published".
        let mut next = start.wrapping_add(1) & !GENERATION_BUSY_BIT;
        if next == 0 {
            next = 1;
        }
        header.store_generation(next);

        trace!(
            "Published frame {} on '{}' ({}x{}, stride {})",
            next,
            self.region.id(),
            width,
            height,
            bytes_per_line
        );
        next
    }
}
