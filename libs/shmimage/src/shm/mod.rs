// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared-memory transport: named regions, the frame slot protocol, and the
//! consumer session built on them.

mod frame_slot;
pub mod layout;
mod region;
mod session;
mod writer;

pub use frame_slot::{FrameSlotReader, FrameView};
pub use layout::{capacity_for, FrameHeader, HeaderSnapshot, DEFAULT_CAPACITY, HEADER_SIZE};
pub use region::{validate_shared_id, RegionOptions, SharedRegion, MAX_SHARED_ID_LEN};
pub use session::{ReceivedFrame, SharedImageSession};
pub use writer::FrameWriter;
