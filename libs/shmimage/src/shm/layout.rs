// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! In-region memory layout: a 64-byte header followed by the pixel buffer.
//!
//! ```text
//! offset 0    ┌──────────────────────────────┐
//!             │ FrameHeader (64 bytes)       │
//! offset 64   ├──────────────────────────────┤
//!             │ PixelBuffer                  │
//!             │ (capacity - 64 bytes, RGBA)  │
//!             └──────────────────────────────┘
//! ```
//!
//! Every header field is a little-endian `u32` accessed atomically, so
//! producers written in other languages can mirror it as a `uint32_t[16]`.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::core::{FrameDimensions, BYTES_PER_PIXEL, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH};

/// Size of the header at the start of every region.
pub const HEADER_SIZE: usize = 64;

/// Marks `generation` as "write in progress".
///
/// Published generations never carry this bit and never equal zero, so a
/// freshly zeroed region reads as "nothing published yet".
pub const GENERATION_BUSY_BIT: u32 = 1 << 31;

/// Pixel format tag stored in the header. Only RGBA8 is defined.
pub const FORMAT_RGBA8: u32 = 0;

/// Region capacity for the default maximum frame (3000x2000 RGBA).
pub const DEFAULT_CAPACITY: usize =
    HEADER_SIZE
        + (DEFAULT_MAX_WIDTH as usize) * (DEFAULT_MAX_HEIGHT as usize) * BYTES_PER_PIXEL as usize;

pub mod header_offset {
    //! Byte offsets into the header, for producers that do not link this crate.

    pub const GENERATION: usize = 0;
    pub const WIDTH: usize = 4;
    pub const HEIGHT: usize = 8;
    pub const BYTES_PER_LINE: usize = 12;
    pub const FORMAT: usize = 16;
}

/// The header as it sits in the mapping.
///
/// Only loads are public. A reader maps the region read-only, so stores go
/// through [`HeaderWriter`], which only a writable region hands out.
///
/// ```compile_fail
/// # use std::sync::atomic::Ordering;
/// fn bump(header: &shmimage::shm::FrameHeader) {
///     header.generation.store(7, Ordering::SeqCst);
/// }
/// ```
#[repr(C)]
pub struct FrameHeader {
    /// Ready indicator. Bumped by the writer after the pixels and dimensions
    /// of a frame are in place.
    generation: AtomicU32,
    width: AtomicU32,
    height: AtomicU32,
    bytes_per_line: AtomicU32,
    format: AtomicU32,
    _reserved: [AtomicU32; 11],
}

/// A consistent-enough copy of the header, taken by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSnapshot {
    pub generation: u32,
    pub width: u32,
    pub height: u32,
    pub bytes_per_line: u32,
    pub format: u32,
}

impl HeaderSnapshot {
    pub fn dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.width, self.height)
    }

    pub fn is_busy(&self) -> bool {
        self.generation & GENERATION_BUSY_BIT != 0
    }
}

impl FrameHeader {
    /// Read the header. `generation` is loaded first with acquire ordering so
    /// that everything the writer stored before publishing is visible.
    pub fn snapshot(&self) -> HeaderSnapshot {
        let generation = self.generation.load(Ordering::Acquire);
        HeaderSnapshot {
            generation,
            width: self.width.load(Ordering::Relaxed),
            height: self.height.load(Ordering::Relaxed),
            bytes_per_line: self.bytes_per_line.load(Ordering::Relaxed),
            format: self.format.load(Ordering::Relaxed),
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Store access to the header of a writable mapping.
#[derive(Clone, Copy)]
pub(crate) struct HeaderWriter<'a> {
    header: &'a FrameHeader,
}

impl<'a> HeaderWriter<'a> {
    /// # Safety
    ///
    /// `header` must live in memory mapped with write permission.
    pub(super) unsafe fn new(header: &'a FrameHeader) -> Self {
        Self { header }
    }

    pub(crate) fn generation(&self) -> u32 {
        self.header.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn store_generation(&self, generation: u32) {
        self.header.generation.store(generation, Ordering::SeqCst);
    }

    pub(crate) fn store_frame(&self, width: u32, height: u32, bytes_per_line: u32, format: u32) {
        self.header.width.store(width, Ordering::SeqCst);
        self.header.height.store(height, Ordering::SeqCst);
        self.header.bytes_per_line.store(bytes_per_line, Ordering::SeqCst);
        self.header.format.store(format, Ordering::SeqCst);
    }
}

/// Bytes available for pixel data in a region of `capacity` bytes.
pub fn pixel_capacity(capacity: usize) -> usize {
    capacity.saturating_sub(HEADER_SIZE)
}

/// Region capacity needed to carry a frame of `dims` with packed rows, or
/// `None` if it does not fit in `usize`.
pub fn capacity_for(dims: FrameDimensions) -> Option<usize> {
    (dims.width as usize)
        .checked_mul(dims.height as usize)?
        .checked_mul(BYTES_PER_PIXEL as usize)?
        .checked_add(HEADER_SIZE)
}

/// Check that a frame described by `snapshot` lies within `pixel_capacity`
/// bytes. Returns the number of pixel bytes the frame occupies.
pub fn validate_frame(snapshot: &HeaderSnapshot, pixel_capacity: usize) -> Option<usize> {
    if snapshot.format != FORMAT_RGBA8 {
        return None;
    }

    let dims = snapshot.dimensions();
    if dims.is_empty() {
        return None;
    }

    let min_line = dims.packed_bytes_per_line()?;
    if snapshot.bytes_per_line < min_line {
        return None;
    }

    let len = dims.buffer_len(snapshot.bytes_per_line)?;
    (len <= pixel_capacity).then_some(len)
}
