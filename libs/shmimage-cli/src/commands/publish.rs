// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Test pattern publisher.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use shmimage::shm::{capacity_for, RegionOptions};
use shmimage::{FrameDimensions, FrameWriter, BYTES_PER_PIXEL};

pub struct PublishOptions {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames: u64,
    pub resize_every: Option<u64>,
    pub unlink: bool,
}

/// Dimensions of frame `index`: full size, or half size on odd resize
/// periods.
fn frame_dimensions(
    full: FrameDimensions,
    index: u64,
    resize_every: Option<u64>,
) -> FrameDimensions {
    match resize_every {
        Some(n) if n > 0 && (index / n) % 2 == 1 => {
            FrameDimensions::new((full.width / 2).max(1), (full.height / 2).max(1))
        }
        _ => full,
    }
}

/// Fill `pixels` with a diagonal gradient that scrolls with `index`.
fn render_pattern(dims: FrameDimensions, index: u64, pixels: &mut [u8]) {
    let shift = index as u32;
    let row_len = (dims.width * BYTES_PER_PIXEL) as usize;
    for (y, row) in pixels.chunks_exact_mut(row_len).take(dims.height as usize).enumerate() {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let (x, y) = (x as u32, y as u32);
            px[0] = x.wrapping_add(shift) as u8;
            px[1] = y.wrapping_add(shift) as u8;
            px[2] = (x ^ y).wrapping_add(shift.wrapping_mul(2)) as u8;
            px[3] = 0xff;
        }
    }
}

pub fn run(opts: PublishOptions) -> Result<()> {
    if opts.width == 0 || opts.height == 0 {
        bail!("Frame size must be non-zero, got {}x{}", opts.width, opts.height);
    }
    if !(opts.fps > 0.0 && opts.fps.is_finite()) {
        bail!("--fps must be a positive number, got {}", opts.fps);
    }

    let full = FrameDimensions::new(opts.width, opts.height);
    let (Some(capacity), Some(_)) = (capacity_for(full), full.packed_bytes_per_line()) else {
        bail!("Frame size {} is too large for a shared region", full);
    };
    let options = RegionOptions::writer().unlink_on_close(opts.unlink);
    let mut writer = FrameWriter::with_options(&opts.id, capacity, options)
        .with_context(|| format!("Failed to open region '{}'", opts.id))?;

    let needed = capacity - shmimage::shm::HEADER_SIZE;
    if writer.pixel_capacity() < needed {
        bail!(
            "Region '{}' holds {} pixel bytes, {} needs {}; remove it first",
            opts.id,
            writer.pixel_capacity(),
            full,
            needed
        );
    }

    tracing::info!(
        "Publishing {} at {} fps into '{}'{}",
        full,
        opts.fps,
        opts.id,
        if writer.region().created() { " (created)" } else { "" }
    );

    let interval = Duration::from_secs_f64(1.0 / opts.fps);
    let mut pixels = vec![0u8; needed];
    let mut next_deadline = Instant::now();
    let mut previous = None;
    let mut index = 0u64;

    while opts.frames == 0 || index < opts.frames {
        let dims = frame_dimensions(full, index, opts.resize_every);
        if previous != Some(dims) {
            tracing::info!("Frame size {}", dims);
            previous = Some(dims);
        }

        let bytes_per_line = dims.width * BYTES_PER_PIXEL;
        let len = bytes_per_line as usize * dims.height as usize;
        render_pattern(dims, index, &mut pixels[..len]);
        let generation = writer
            .publish(dims, bytes_per_line, &pixels[..len])
            .with_context(|| format!("Failed to publish frame {}", index))?;
        tracing::trace!("Frame {} published as generation {}", index, generation);

        index += 1;
        next_deadline += interval;
        let now = Instant::now();
        if next_deadline > now {
            thread::sleep(next_deadline - now);
        } else {
            next_deadline = now;
        }
    }

    tracing::info!("Published {} frames into '{}'", index, opts.id);
    writer.close();
    Ok(())
}
