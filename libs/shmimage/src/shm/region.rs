// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Named shared-memory region handle.
//!
//! On unix the region is a POSIX shared-memory object (`shm_open` +
//! `ftruncate` + `mmap`). The object name is the shared id prefixed with `/`.

use std::ptr::NonNull;

use tracing::{debug, info, trace, warn};

use super::layout::{FrameHeader, HeaderWriter, HEADER_SIZE};
use crate::core::{Result, ShmImageError};

/// Longest shared id accepted. Matches the usual `NAME_MAX` minus the
/// leading `/`.
pub const MAX_SHARED_ID_LEN: usize = 254;

/// How a region is mapped and released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOptions {
    /// Map with write access. Readers map read-only so they cannot touch the
    /// producer's pixels.
    pub writable: bool,
    /// Unlink the name on close if this handle created the region.
    pub unlink_on_close: bool,
    /// Permission bits for a newly created object.
    pub mode: u32,
}

impl RegionOptions {
    pub const fn reader() -> Self {
        Self {
            writable: false,
            unlink_on_close: false,
            mode: 0o600,
        }
    }

    pub const fn writer() -> Self {
        Self {
            writable: true,
            unlink_on_close: false,
            mode: 0o600,
        }
    }

    pub const fn unlink_on_close(mut self, unlink: bool) -> Self {
        self.unlink_on_close = unlink;
        self
    }
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self::reader()
    }
}

/// Check that `id` can name a shared-memory object.
pub fn validate_shared_id(id: &str) -> Result<()> {
    let reason = if id.is_empty() {
        "id is empty"
    } else if id.len() > MAX_SHARED_ID_LEN {
        "id is too long"
    } else if id.contains('/') {
        "id must not contain '/'"
    } else if id.contains('\0') {
        "id must not contain NUL"
    } else {
        return Ok(());
    };

    Err(ShmImageError::InvalidId {
        id: id.to_string(),
        reason: reason.to_string(),
    })
}

struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

/// One mapping of a named shared-memory region.
///
/// The mapping is released by [`close`](Self::close) or on drop, whichever
/// comes first.
pub struct SharedRegion {
    id: String,
    mapping: Option<Mapping>,
    created: bool,
    options: RegionOptions,
}

// SAFETY: the mapping is process-wide memory owned exclusively by this
// handle; moving the handle to another thread does not alias it.
unsafe impl Send for SharedRegion {}

impl SharedRegion {
    /// Open the region named `id`, or create it with `capacity` bytes if it
    /// does not exist yet. A new region reads as all zeroes.
    ///
    /// An existing region keeps the size its creator gave it; it is rejected
    /// if it cannot even hold the header.
    pub fn open_or_create(id: &str, capacity: usize, options: RegionOptions) -> Result<Self> {
        validate_shared_id(id)?;
        if capacity < HEADER_SIZE {
            return Err(ShmImageError::allocation(
                id,
                format!("capacity {} is smaller than the {}-byte header", capacity, HEADER_SIZE),
            ));
        }

        let (ptr, len, created) = platform::map(id, capacity, &options)?;

        if created {
            info!("Created shared region '{}' ({} bytes)", id, len);
        } else {
            info!("Opened shared region '{}' ({} bytes)", id, len);
            if len != capacity {
                debug!(
                    "Region '{}' is {} bytes, requested {}; using existing size",
                    id, len, capacity
                );
            }
        }

        Ok(Self {
            id: id.to_string(),
            mapping: Some(Mapping { ptr, len }),
            created,
            options,
        })
    }

    /// Remove the name `id` so later opens create a fresh region.
    ///
    /// Existing mappings stay valid. Returns `false` if no such region exists.
    pub fn remove(id: &str) -> Result<bool> {
        validate_shared_id(id)?;
        platform::unlink(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_open(&self) -> bool {
        self.mapping.is_some()
    }

    /// Whether this handle created the region (as opposed to opening it).
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn is_writable(&self) -> bool {
        self.options.writable
    }

    /// Mapped size in bytes, or 0 once closed.
    pub fn capacity(&self) -> usize {
        self.mapping.as_ref().map_or(0, |m| m.len)
    }

    pub fn header(&self) -> Option<&FrameHeader> {
        let mapping = self.mapping.as_ref()?;
        // SAFETY: the mapping is page-aligned and at least HEADER_SIZE bytes
        // (checked at open), and FrameHeader consists only of atomics.
        Some(unsafe { &*(mapping.ptr.as_ptr() as *const FrameHeader) })
    }

    /// Store access to the header. `None` for read-only mappings.
    pub(crate) fn header_writer(&self) -> Option<HeaderWriter<'_>> {
        if !self.options.writable {
            return None;
        }
        let header = self.header()?;
        // SAFETY: writable regions are mapped PROT_READ | PROT_WRITE.
        Some(unsafe { HeaderWriter::new(header) })
    }

    /// The first `len` bytes of the pixel buffer, if they are mapped.
    ///
    /// The producer may be rewriting these bytes concurrently; callers get
    /// whatever is there at the time of reading.
    pub fn pixels(&self, len: usize) -> Option<&[u8]> {
        let mapping = self.mapping.as_ref()?;
        if len > mapping.len - HEADER_SIZE {
            return None;
        }
        // SAFETY: bounds checked above against the mapped length.
        Some(unsafe { std::slice::from_raw_parts(mapping.ptr.as_ptr().add(HEADER_SIZE), len) })
    }

    /// Pointer to the start of the pixel buffer, for writers.
    pub(crate) fn pixels_mut_ptr(&mut self) -> Option<*mut u8> {
        if !self.options.writable {
            return None;
        }
        let mapping = self.mapping.as_ref()?;
        // SAFETY: HEADER_SIZE is within the mapping (checked at open).
        Some(unsafe { mapping.ptr.as_ptr().add(HEADER_SIZE) })
    }

    /// Release the mapping. Calling this again is a no-op.
    pub fn close(&mut self) {
        let Some(mapping) = self.mapping.take() else {
            return;
        };

        platform::unmap(mapping.ptr, mapping.len);
        trace!("Unmapped shared region '{}'", self.id);

        if self.options.unlink_on_close && self.created {
            if let Err(e) = platform::unlink(&self.id) {
                warn!("Failed to unlink shared region '{}': {}", self.id, e);
            }
        }

        info!("Closed shared region '{}'", self.id);
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("id", &self.id)
            .field("capacity", &self.capacity())
            .field("created", &self.created)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(unix)]
mod platform {
    use std::ffi::CString;
    use std::io;
    use std::ptr::NonNull;

    use tracing::debug;

    use super::RegionOptions;
    use crate::core::{Result, ShmImageError};
    use crate::shm::layout::HEADER_SIZE;

    fn os_name(id: &str) -> Result<CString> {
        CString::new(format!("/{}", id)).map_err(|e| ShmImageError::InvalidId {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    fn close_fd(fd: libc::c_int) {
        // SAFETY: fd was returned by shm_open and is closed exactly once.
        unsafe {
            libc::close(fd);
        }
    }

    /// Open or create the object and map it. Returns the mapping, its length
    /// and whether the object was created by this call.
    pub(super) fn map(
        id: &str,
        capacity: usize,
        options: &RegionOptions,
    ) -> Result<(NonNull<u8>, usize, bool)> {
        let name = os_name(id)?;

        let (fd, len, created) = open_or_create_fd(id, &name, capacity, options)?;

        let prot = if options.writable {
            libc::PROT_READ | libc::PROT_WRITE
        } else {
            libc::PROT_READ
        };

        // SAFETY: fd refers to a shared-memory object of at least `len` bytes.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                prot,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        let mmap_error = io::Error::last_os_error();
        close_fd(fd);

        if ptr == libc::MAP_FAILED {
            if created {
                let _ = unlink(id);
            }
            return Err(ShmImageError::allocation(
                id,
                format!("mmap of {} bytes failed: {}", len, mmap_error),
            ));
        }

        match NonNull::new(ptr as *mut u8) {
            Some(ptr) => Ok((ptr, len, created)),
            None => Err(ShmImageError::allocation(id, "mmap returned null")),
        }
    }

    fn open_or_create_fd(
        id: &str,
        name: &CString,
        capacity: usize,
        options: &RegionOptions,
    ) -> Result<(libc::c_int, usize, bool)> {
        let open_flags = if options.writable {
            libc::O_RDWR
        } else {
            libc::O_RDONLY
        };

        // A producer may create the object between our open and create
        // attempts; one retry covers that race.
        for _ in 0..2 {
            // SAFETY: name is a valid NUL-terminated string.
            let fd = unsafe { libc::shm_open(name.as_ptr(), open_flags, 0) };
            if fd >= 0 {
                let len = match object_len(fd) {
                    Ok(len) => len,
                    Err(e) => {
                        close_fd(fd);
                        return Err(ShmImageError::allocation(id, format!("fstat failed: {}", e)));
                    }
                };
                if len < HEADER_SIZE {
                    close_fd(fd);
                    return Err(ShmImageError::allocation(
                        id,
                        format!(
                            "existing region is {} bytes, too small for the {}-byte header",
                            len, HEADER_SIZE
                        ),
                    ));
                }
                return Ok((fd, len, false));
            }

            let open_error = io::Error::last_os_error();
            if open_error.raw_os_error() != Some(libc::ENOENT) {
                return Err(ShmImageError::allocation(
                    id,
                    format!("shm_open failed: {}", open_error),
                ));
            }

            // SAFETY: name is a valid NUL-terminated string.
            let fd = unsafe {
                libc::shm_open(
                    name.as_ptr(),
                    libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                    // `c_uint` so the call also type-checks where shm_open is variadic.
                    options.mode as libc::c_uint,
                )
            };
            if fd < 0 {
                let create_error = io::Error::last_os_error();
                if create_error.raw_os_error() == Some(libc::EEXIST) {
                    debug!("Region '{}' appeared while creating it, reopening", id);
                    continue;
                }
                return Err(ShmImageError::allocation(
                    id,
                    format!("shm_open(O_CREAT) failed: {}", create_error),
                ));
            }

            // The extended object reads as zeroes, which is the "nothing
            // published" header state.
            // SAFETY: fd is a freshly created shared-memory object.
            if unsafe { libc::ftruncate(fd, capacity as libc::off_t) } != 0 {
                let truncate_error = io::Error::last_os_error();
                close_fd(fd);
                let _ = unlink(id);
                return Err(ShmImageError::allocation(
                    id,
                    format!("ftruncate to {} bytes failed: {}", capacity, truncate_error),
                ));
            }

            return Ok((fd, capacity, true));
        }

        Err(ShmImageError::allocation(
            id,
            "region kept disappearing while opening it",
        ))
    }

    fn object_len(fd: libc::c_int) -> io::Result<usize> {
        // SAFETY: stat is plain data; fstat fills it on success.
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(stat.st_size.max(0) as usize)
    }

    pub(super) fn unmap(ptr: NonNull<u8>, len: usize) {
        // SAFETY: ptr/len describe a live mapping created by `map`.
        let result = unsafe { libc::munmap(ptr.as_ptr() as *mut libc::c_void, len) };
        if result != 0 {
            tracing::warn!(
                "munmap of {} bytes failed: {}",
                len,
                io::Error::last_os_error()
            );
        }
    }

    pub(super) fn unlink(id: &str) -> Result<bool> {
        let name = os_name(id)?;
        // SAFETY: name is a valid NUL-terminated string.
        if unsafe { libc::shm_unlink(name.as_ptr()) } == 0 {
            return Ok(true);
        }
        let error = io::Error::last_os_error();
        if error.raw_os_error() == Some(libc::ENOENT) {
            Ok(false)
        } else {
            Err(ShmImageError::Io(error))
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use std::ptr::NonNull;

    use super::RegionOptions;
    use crate::core::{Result, ShmImageError};

    pub(super) fn map(
        _id: &str,
        _capacity: usize,
        _options: &RegionOptions,
    ) -> Result<(NonNull<u8>, usize, bool)> {
        Err(ShmImageError::NotSupported(
            "named shared memory regions require a unix target".to_string(),
        ))
    }

    pub(super) fn unmap(_ptr: NonNull<u8>, _len: usize) {}

    pub(super) fn unlink(_id: &str) -> Result<bool> {
        Err(ShmImageError::NotSupported(
            "named shared memory regions require a unix target".to_string(),
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn unique_id() -> String {
        format!("shmimage-region-{}", uuid::Uuid::new_v4().simple())
    }

    #[test]
    fn test_validate_shared_id() {
        assert!(validate_shared_id("sharedimg").is_ok());
        assert!(validate_shared_id("").is_err());
        assert!(validate_shared_id("a/b").is_err());
        assert!(validate_shared_id("nul\0").is_err());
        assert!(validate_shared_id(&"x".repeat(MAX_SHARED_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_create_then_open_sees_same_bytes() {
        let id = unique_id();
        let mut creator =
            SharedRegion::open_or_create(&id, 4096, RegionOptions::writer().unlink_on_close(true))
                .unwrap();
        assert!(creator.created());
        assert_eq!(creator.capacity(), 4096);
        assert_eq!(creator.header().unwrap().generation(), 0);

        let ptr = creator.pixels_mut_ptr().unwrap();
        unsafe { ptr.write(0xAB) };

        let opener = SharedRegion::open_or_create(&id, 4096, RegionOptions::reader()).unwrap();
        assert!(!opener.created());
        assert_eq!(opener.pixels(1).unwrap(), &[0xAB]);
    }

    #[test]
    fn test_existing_region_keeps_its_size() {
        let id = unique_id();
        let _creator =
            SharedRegion::open_or_create(&id, 8192, RegionOptions::writer().unlink_on_close(true))
                .unwrap();
        let opener = SharedRegion::open_or_create(&id, 4096, RegionOptions::reader()).unwrap();
        assert_eq!(opener.capacity(), 8192);
    }

    #[test]
    fn test_close_is_idempotent_and_unlinks() {
        let id = unique_id();
        let mut region =
            SharedRegion::open_or_create(&id, 4096, RegionOptions::writer().unlink_on_close(true))
                .unwrap();
        region.close();
        region.close();
        assert!(!region.is_open());
        assert_eq!(region.capacity(), 0);
        assert!(region.header().is_none());
        assert!(region.pixels(1).is_none());
        assert!(!SharedRegion::remove(&id).unwrap());
    }

    #[test]
    fn test_reader_mapping_is_not_writable() {
        let id = unique_id();
        let mut region = SharedRegion::open_or_create(&id, 4096, RegionOptions::reader()).unwrap();
        assert!(region.created());
        assert!(region.pixels_mut_ptr().is_none());
        assert!(region.header_writer().is_none());
        assert_eq!(region.header().unwrap().generation(), 0);
        region.close();
        assert!(SharedRegion::remove(&id).unwrap());
    }

    #[test]
    fn test_pixels_bounds_checked() {
        let id = unique_id();
        let region =
            SharedRegion::open_or_create(&id, 4096, RegionOptions::writer().unlink_on_close(true))
                .unwrap();
        assert!(region.pixels(4096 - HEADER_SIZE).is_some());
        assert!(region.pixels(4096 - HEADER_SIZE + 1).is_none());
    }

    #[test]
    fn test_invalid_id_is_allocation_kind() {
        let err =
            SharedRegion::open_or_create("bad/id", 4096, RegionOptions::reader()).unwrap_err();
        assert!(err.is_allocation());
    }

    #[test]
    fn test_capacity_smaller_than_header_rejected() {
        let err =
            SharedRegion::open_or_create(&unique_id(), 16, RegionOptions::reader()).unwrap_err();
        assert!(matches!(err, ShmImageError::Allocation { .. }));
    }
}
