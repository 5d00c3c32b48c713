// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

// FFI cdylib: all public functions are unsafe extern "C" called by the host plugin.
#![allow(clippy::missing_safety_doc)]

//! C ABI for native host plugins.
//!
//! Exposes [`SharedMemorySource`] through functions prefixed with `shmimg_`.
//! The host owns its texture: each tick hands back a pointer into the shared
//! region plus dimensions, and the host uploads from it.

use std::ffi::{c_char, CStr};
use std::sync::Once;

use parking_lot::Mutex;
use shmimage::{SharedMemorySource, SourceConfig, DEFAULT_CAPACITY, DEFAULT_SHARED_ID};

static SOURCE_NAME: &CStr = c"Shared memory";

// ============================================================================
// Types
// ============================================================================

/// Opaque source handle.
pub struct ShmImgSource {
    inner: Mutex<SharedMemorySource>,
}

/// Frame returned by `shmimg_source_tick`.
///
/// `pixels` points into the shared region and holds `bytes_per_line * height`
/// bytes. It stays valid until the next call on the same source.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ShmImgFrame {
    pub pixels: *const u8,
    pub width: u32,
    pub height: u32,
    pub bytes_per_line: u32,
    /// The host must recreate its texture before uploading.
    pub resized: bool,
}

impl Default for ShmImgFrame {
    fn default() -> Self {
        Self {
            pixels: std::ptr::null(),
            width: 0,
            height: 0,
            bytes_per_line: 0,
            resized: false,
        }
    }
}

// ============================================================================
// C ABI: lifecycle
// ============================================================================

/// Create a source reading from `shared_id` (null or empty: the default id).
///
/// Never returns null for a valid call: a region that cannot be mapped, or an
/// id that is not UTF-8, gives a source that never has frames until
/// `shmimg_source_update` names a usable id. Caller must call
/// `shmimg_source_destroy`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shmimg_source_create(
    shared_id: *const c_char,
    timeout_ms: u32,
) -> *mut ShmImgSource {
    init_logging();

    let id = if shared_id.is_null() {
        DEFAULT_SHARED_ID
    } else {
        match unsafe { c_str_to_str(shared_id) } {
            Some("") => DEFAULT_SHARED_ID,
            Some(s) => s,
            None => {
                tracing::error!("[shmimg] shared id is not valid UTF-8, source has no region");
                ""
            }
        }
    };
    let source = SharedMemorySource::new(SourceConfig::new(id, timeout_ms));
    tracing::debug!("[shmimg] Created source {:?}", source);

    Box::into_raw(Box::new(ShmImgSource {
        inner: Mutex::new(source),
    }))
}

/// Apply new settings. A null or empty `shared_id` keeps the current id.
///
/// Returns 0 on success, -1 on bad arguments, -2 if the region could not be
/// mapped (the source stays usable and reports no frames).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shmimg_source_update(
    src: *mut ShmImgSource,
    shared_id: *const c_char,
    timeout_ms: u32,
) -> i32 {
    let Some(src) = (unsafe { src.as_ref() }) else {
        return -1;
    };
    let id = if shared_id.is_null() {
        ""
    } else {
        match unsafe { c_str_to_str(shared_id) } {
            Some(s) => s,
            None => {
                tracing::error!("[shmimg] shared id is not valid UTF-8");
                return -1;
            }
        }
    };

    match src.inner.lock().update(SourceConfig::new(id, timeout_ms)) {
        Ok(()) => 0,
        Err(e) if e.is_allocation() => -2,
        Err(e) => {
            tracing::error!("[shmimg] Failed to update source: {}", e);
            -1
        }
    }
}

/// Destroy a source, unmapping its region.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shmimg_source_destroy(src: *mut ShmImgSource) {
    if !src.is_null() {
        let src = unsafe { Box::from_raw(src) };
        src.inner.lock().teardown();
    }
}

// ============================================================================
// C ABI: per tick
// ============================================================================

/// Advance the source by `delta_secs` and poll for a frame.
///
/// Returns 1 and fills `out` if a new frame arrived, 0 if none, -1 on bad
/// arguments.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shmimg_source_tick(
    src: *mut ShmImgSource,
    delta_secs: f64,
    out: *mut ShmImgFrame,
) -> i32 {
    let Some(src) = (unsafe { src.as_ref() }) else {
        return -1;
    };
    let Some(out) = (unsafe { out.as_mut() }) else {
        return -1;
    };

    let mut source = src.inner.lock();
    match source.poll(delta_secs) {
        Some(update) => {
            *out = ShmImgFrame {
                pixels: update.frame.pixels().as_ptr(),
                width: update.frame.width(),
                height: update.frame.height(),
                bytes_per_line: update.frame.bytes_per_line(),
                resized: update.resized,
            };
            1
        }
        None => {
            *out = ShmImgFrame::default();
            0
        }
    }
}

/// Whether the last frame is recent enough to draw.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shmimg_source_should_draw(src: *const ShmImgSource) -> bool {
    unsafe { src.as_ref() }.is_some_and(|s| s.inner.lock().should_draw())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn shmimg_source_width(src: *const ShmImgSource) -> u32 {
    unsafe { src.as_ref() }.map_or(0, |s| s.inner.lock().width())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn shmimg_source_height(src: *const ShmImgSource) -> u32 {
    unsafe { src.as_ref() }.map_or(0, |s| s.inner.lock().height())
}

/// Display name for the source, NUL-terminated and static.
#[unsafe(no_mangle)]
pub extern "C" fn shmimg_source_name() -> *const c_char {
    SOURCE_NAME.as_ptr()
}

/// Region size a source maps when it creates the region itself.
#[unsafe(no_mangle)]
pub extern "C" fn shmimg_default_capacity() -> usize {
    DEFAULT_CAPACITY
}

// ============================================================================
// Helpers
// ============================================================================

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .try_init();
    });
}

unsafe fn c_str_to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use shmimage::shm::capacity_for;
    use shmimage::{FrameDimensions, FrameWriter, RegionOptions};
    use std::ffi::CString;

    #[test]
    fn test_tick_hands_out_frame_pointer() {
        let id = format!("shmimg-native-{}", uuid::Uuid::new_v4().simple());
        let c_id = CString::new(id.clone()).unwrap();
        let dims = FrameDimensions::new(4, 2);
        let mut writer = FrameWriter::with_options(
            &id,
            capacity_for(FrameDimensions::new(8, 8)).unwrap(),
            RegionOptions::writer().unlink_on_close(true),
        )
        .unwrap();

        unsafe {
            let src = shmimg_source_create(c_id.as_ptr(), 500);
            assert!(!src.is_null());
            assert!(!shmimg_source_should_draw(src));

            let mut frame = ShmImgFrame::default();
            assert_eq!(shmimg_source_tick(src, 0.016, &mut frame), 0);
            assert!(frame.pixels.is_null());

            let pixels: Vec<u8> = (0..32).collect();
            writer.publish(dims, 16, &pixels).unwrap();
            assert_eq!(shmimg_source_tick(src, 0.016, &mut frame), 1);
            assert_eq!((frame.width, frame.height, frame.bytes_per_line), (4, 2, 16));
            assert!(frame.resized);
            assert_eq!(std::slice::from_raw_parts(frame.pixels, 32), pixels.as_slice());
            assert!(shmimg_source_should_draw(src));
            assert_eq!(shmimg_source_width(src), 4);
            assert_eq!(shmimg_source_height(src), 2);

            assert_eq!(shmimg_source_update(src, std::ptr::null(), 0), 0);
            assert!(!shmimg_source_should_draw(src));

            shmimg_source_destroy(src);
        }
    }

    #[test]
    fn test_null_handles_are_rejected() {
        unsafe {
            let mut frame = ShmImgFrame::default();
            assert_eq!(shmimg_source_tick(std::ptr::null_mut(), 0.0, &mut frame), -1);
            assert_eq!(shmimg_source_update(std::ptr::null_mut(), std::ptr::null(), 0), -1);
            assert!(!shmimg_source_should_draw(std::ptr::null()));
            assert_eq!(shmimg_source_width(std::ptr::null()), 0);
            shmimg_source_destroy(std::ptr::null_mut());
        }
        assert_eq!(shmimg_default_capacity(), 64 + 3000 * 2000 * 4);
        let name = unsafe { CStr::from_ptr(shmimg_source_name()) };
        assert_eq!(name.to_str().unwrap(), shmimage::SOURCE_DISPLAY_NAME);
    }

    #[test]
    fn test_bad_id_reports_allocation_failure() {
        let bad = CString::new("not/valid").unwrap();
        unsafe {
            let src = shmimg_source_create(bad.as_ptr(), 800);
            assert!(!src.is_null());
            let mut frame = ShmImgFrame::default();
            assert_eq!(shmimg_source_tick(src, 1.0, &mut frame), 0);
            assert_eq!(shmimg_source_update(src, bad.as_ptr(), 800), -2);
            shmimg_source_destroy(src);
        }
    }

    #[test]
    fn test_non_utf8_id_does_not_fall_back_to_default() {
        let bad = CStr::from_bytes_with_nul(b"\xff\xfe\0").unwrap();
        unsafe {
            let src = shmimg_source_create(bad.as_ptr(), 800);
            assert!(!src.is_null());
            {
                let source = (*src).inner.lock();
                assert!(!source.has_session());
                assert_ne!(source.config().shared_id, DEFAULT_SHARED_ID);
            }
            let mut frame = ShmImgFrame::default();
            assert_eq!(shmimg_source_tick(src, 1.0, &mut frame), 0);
            assert!(!shmimg_source_should_draw(src));
            assert_eq!(shmimg_source_update(src, bad.as_ptr(), 800), -1);
            shmimg_source_destroy(src);
        }
    }
}
