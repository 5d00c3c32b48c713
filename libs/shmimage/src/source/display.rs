// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Host display seam.
//!
//! The source decides *when* to resize, upload and draw; the host owns the
//! graphics context and texture and decides *how*.

use std::ops::{Deref, DerefMut};

use crate::core::{FrameDimensions, Result};

/// Texture owner provided by the host.
///
/// Texture calls are only made between `enter_graphics` and
/// `leave_graphics`, except `draw`, which runs inside the host's own render
/// pass.
pub trait DisplaySink {
    /// Make the graphics context current on this thread.
    fn enter_graphics(&mut self);

    fn leave_graphics(&mut self);

    /// Replace the texture with one of `dims`. On error the previous texture
    /// (if any) must still be valid.
    fn recreate_texture(&mut self, dims: FrameDimensions) -> Result<()>;

    /// Copy `bytes_per_line * height` bytes of RGBA pixels into the texture.
    fn upload(&mut self, pixels: &[u8], bytes_per_line: u32) -> Result<()>;

    fn destroy_texture(&mut self);

    fn draw(&mut self);
}

/// Holds the graphics context for the lifetime of the guard.
pub struct GraphicsScope<'a, S: DisplaySink + ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: DisplaySink + ?Sized> GraphicsScope<'a, S> {
    pub fn enter(sink: &'a mut S) -> Self {
        sink.enter_graphics();
        Self { sink }
    }
}

impl<S: DisplaySink + ?Sized> Deref for GraphicsScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.sink
    }
}

impl<S: DisplaySink + ?Sized> DerefMut for GraphicsScope<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.sink
    }
}

impl<S: DisplaySink + ?Sized> Drop for GraphicsScope<'_, S> {
    fn drop(&mut self) {
        self.sink.leave_graphics();
    }
}
