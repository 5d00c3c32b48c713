// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Host-facing source: config, session and freshness driven once per video
//! tick.

use tracing::{debug, info, warn};

use super::display::{DisplaySink, GraphicsScope};
use super::freshness::FreshnessTracker;
use crate::core::{needs_resize, FrameDimensions, Result, SourceConfig};
use crate::shm::{FrameView, SharedImageSession, DEFAULT_CAPACITY};

/// A frame handed to a host that manages its own texture.
#[derive(Debug, Clone, Copy)]
pub struct FrameUpdate<'a> {
    pub frame: FrameView<'a>,
    /// The host must recreate its texture before uploading.
    pub resized: bool,
}

/// What [`SharedMemorySource::video_tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No new frame.
    Idle,
    Uploaded {
        dimensions: FrameDimensions,
        resized: bool,
    },
    /// A frame arrived but the texture could not be resized or written.
    UploadFailed,
}

pub struct SharedMemorySource {
    config: SourceConfig,
    capacity: usize,
    session: Option<SharedImageSession>,
    freshness: FreshnessTracker,
    /// Dimensions of the texture the host currently holds.
    current: Option<FrameDimensions>,
}

impl SharedMemorySource {
    /// Create a source with the default region capacity.
    ///
    /// A region that cannot be mapped is logged and leaves the source without
    /// a session: it runs, but never has anything to draw.
    pub fn new(config: SourceConfig) -> Self {
        Self::with_capacity(config, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(config: SourceConfig, capacity: usize) -> Self {
        let config = config.validated();
        let mut source = Self {
            freshness: FreshnessTracker::from_timeout_ms(config.timeout_ms),
            config,
            capacity,
            session: None,
            current: None,
        };
        if let Err(e) = source.open_session() {
            warn!("Shared memory source has no frames: {}", e);
        }
        source
    }

    /// Apply new settings.
    ///
    /// A different id replaces the session and forgets the last frame. An
    /// empty id keeps the current one. The timeout always applies.
    pub fn update(&mut self, config: SourceConfig) -> Result<()> {
        let config = config.validated();
        self.config.timeout_ms = config.timeout_ms;
        self.freshness.set_timeout_ms(config.timeout_ms);

        if config.shared_id.is_empty() {
            debug!("Ignoring empty shared id, keeping '{}'", self.config.shared_id);
        } else if config.shared_id != self.config.shared_id {
            info!(
                "Shared id changed '{}' -> '{}'",
                self.config.shared_id, config.shared_id
            );
            self.close_session();
            self.freshness.reset();
            self.config.shared_id = config.shared_id;
        }

        if self.session.is_none() {
            self.open_session().inspect_err(|e| {
                warn!("Shared memory source has no frames: {}", e);
            })?;
        }
        Ok(())
    }

    /// Advance time and poll for a frame, for hosts that own the texture.
    ///
    /// `resized` compares against the previous frame returned here; the host
    /// is expected to act on it.
    pub fn poll(&mut self, delta_secs: f64) -> Option<FrameUpdate<'_>> {
        self.freshness.on_tick(delta_secs);
        let received = self.session.as_mut()?.receive()?;
        self.freshness.on_frame_received();

        let dims = received.frame.dimensions();
        let resized = needs_resize(self.current, dims);
        self.current = Some(dims);
        Some(FrameUpdate {
            frame: received.frame,
            resized,
        })
    }

    /// Advance time, and upload a new frame to `sink` if one arrived.
    ///
    /// Texture work happens inside a single [`GraphicsScope`]. If the texture
    /// cannot be recreated the previous one is kept and the next frame
    /// retries.
    pub fn video_tick<S: DisplaySink + ?Sized>(
        &mut self,
        delta_secs: f64,
        sink: &mut S,
    ) -> TickOutcome {
        self.freshness.on_tick(delta_secs);
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Idle;
        };
        let Some(received) = session.receive() else {
            return TickOutcome::Idle;
        };
        self.freshness.on_frame_received();

        let frame = received.frame;
        let dims = frame.dimensions();
        let resized = needs_resize(self.current, dims);

        let mut gfx = GraphicsScope::enter(sink);
        if resized {
            if let Err(e) = gfx.recreate_texture(dims) {
                warn!("Failed to create {} texture: {}", dims, e);
                return TickOutcome::UploadFailed;
            }
            debug!("Texture recreated at {}", dims);
            self.current = Some(dims);
        }
        if let Err(e) = gfx.upload(frame.pixels(), frame.bytes_per_line()) {
            warn!("Failed to upload {} frame: {}", dims, e);
            return TickOutcome::UploadFailed;
        }

        TickOutcome::Uploaded {
            dimensions: dims,
            resized,
        }
    }

    /// Draw the current texture if the last frame is still fresh.
    pub fn render<S: DisplaySink + ?Sized>(&self, sink: &mut S) -> bool {
        if self.should_draw() && self.current.is_some() {
            sink.draw();
            true
        } else {
            false
        }
    }

    pub fn should_draw(&self) -> bool {
        self.freshness.is_fresh()
    }

    pub fn width(&self) -> u32 {
        self.current.map_or(0, |d| d.width)
    }

    pub fn height(&self) -> u32 {
        self.current.map_or(0, |d| d.height)
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn has_session(&self) -> bool {
        self.session.as_ref().is_some_and(SharedImageSession::is_open)
    }

    pub fn freshness(&self) -> &FreshnessTracker {
        &self.freshness
    }

    pub fn skipped_frames(&self) -> u64 {
        self.session.as_ref().map_or(0, SharedImageSession::skipped_frames)
    }

    /// Drop the session. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.close_session();
        self.current = None;
        self.freshness.reset();
    }

    /// [`Self::teardown`] plus releasing the host texture.
    pub fn teardown_display<S: DisplaySink + ?Sized>(&mut self, sink: &mut S) {
        if self.current.is_some() {
            let mut gfx = GraphicsScope::enter(sink);
            gfx.destroy_texture();
        }
        self.teardown();
    }

    fn open_session(&mut self) -> Result<()> {
        let session = SharedImageSession::create(&self.config.shared_id, self.capacity)?;
        self.session = Some(session);
        Ok(())
    }

    fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.destroy();
        }
    }
}

impl std::fmt::Debug for SharedMemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemorySource")
            .field("shared_id", &self.config.shared_id)
            .field("timeout_ms", &self.config.timeout_ms)
            .field("capacity", &self.capacity)
            .field("has_session", &self.has_session())
            .field("current", &self.current)
            .finish()
    }
}
