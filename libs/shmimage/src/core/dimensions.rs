// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Frame dimensions and the display-resize decision.

/// Bytes per RGBA pixel.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Width and height of a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Tightly packed RGBA row length.
    pub fn packed_bytes_per_line(&self) -> Option<u32> {
        self.width.checked_mul(BYTES_PER_PIXEL)
    }

    /// Bytes needed to hold this frame with the given row stride.
    pub fn buffer_len(&self, bytes_per_line: u32) -> Option<usize> {
        (bytes_per_line as usize).checked_mul(self.height as usize)
    }
}

impl std::fmt::Display for FrameDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Whether the display resource must be (re)created to show a frame of
/// `next` size, given the size it currently has (`None` = no resource yet).
#[inline]
pub fn needs_resize(current: Option<FrameDimensions>, next: FrameDimensions) -> bool {
    current != Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_resize() {
        let small = FrameDimensions::new(50, 60);
        let large = FrameDimensions::new(1920, 1080);

        assert!(needs_resize(None, small));
        assert!(!needs_resize(Some(small), small));
        assert!(needs_resize(Some(small), large));
        assert!(needs_resize(Some(large), FrameDimensions::new(1920, 1081)));
    }

    #[test]
    fn test_buffer_len_overflow() {
        let dims = FrameDimensions::new(u32::MAX, u32::MAX);
        assert_eq!(dims.packed_bytes_per_line(), None);
        assert_eq!(FrameDimensions::new(50, 60).buffer_len(200), Some(12_000));
    }
}
