// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Consumer loop that reports frames and freshness transitions.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use shmimage::{SharedMemorySource, SourceConfig};

pub fn run(config: SourceConfig, tick_rate: f64, seconds: Option<f64>) -> Result<()> {
    if !(tick_rate > 0.0 && tick_rate.is_finite()) {
        bail!("--tick-rate must be a positive number, got {}", tick_rate);
    }

    let mut source = SharedMemorySource::new(config);
    if !source.has_session() {
        bail!("Could not map region '{}'", source.config().shared_id);
    }
    tracing::info!(
        "Watching '{}' (timeout {}ms, {} ticks/s)",
        source.config().shared_id,
        source.config().timeout_ms,
        tick_rate
    );

    let interval = Duration::from_secs_f64(1.0 / tick_rate);
    let started = Instant::now();
    let mut last_tick = started;
    let mut was_fresh = false;
    let mut received = 0u64;

    loop {
        let now = Instant::now();
        let delta = now.duration_since(last_tick).as_secs_f64();
        last_tick = now;

        if let Some(update) = source.poll(delta) {
            received += 1;
            if update.resized {
                tracing::info!(
                    "Frame size {} (stride {})",
                    update.frame.dimensions(),
                    update.frame.bytes_per_line()
                );
            }
            tracing::debug!("Frame generation {}", update.frame.generation());
        }

        let fresh = source.should_draw();
        if fresh != was_fresh {
            if fresh {
                tracing::info!("Source is live");
            } else {
                tracing::info!("Source went stale");
            }
            was_fresh = fresh;
        }

        if seconds.is_some_and(|limit| started.elapsed().as_secs_f64() >= limit) {
            break;
        }
        thread::sleep(interval);
    }

    tracing::info!(
        "Received {} frames, skipped {} malformed",
        received,
        source.skipped_frames()
    );
    source.teardown();
    Ok(())
}
