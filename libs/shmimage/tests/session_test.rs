//! Shared Image Session Integration Test
//!
//! Drives real POSIX regions through two independent mappings, one written by
//! a `FrameWriter` and one read by a `SharedImageSession`:
//! 1. Nothing published
//! 2. A frame round trip with padded rows
//! 3. Oversized declarations against a small region
//! 4. Latest-wins delivery
//! 5. A producer thread racing the consumer

#![cfg(unix)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use shmimage::shm::capacity_for;
use shmimage::{FrameDimensions, FrameWriter, RegionOptions, SharedImageSession, SharedRegion};

// =============================================================================
// Helpers
// =============================================================================

fn unique_id(tag: &str) -> String {
    format!("shmimage-{}-{}", tag, uuid::Uuid::new_v4().simple())
}

/// Writer that unlinks the region name when dropped.
fn writer(id: &str, capacity: usize) -> FrameWriter {
    FrameWriter::with_options(id, capacity, RegionOptions::writer().unlink_on_close(true))
        .expect("writer region")
}

fn pattern(dims: FrameDimensions, bytes_per_line: u32) -> Vec<u8> {
    let mut pixels = vec![0u8; bytes_per_line as usize * dims.height as usize];
    for y in 0..dims.height as usize {
        for x in 0..dims.width as usize {
            let at = y * bytes_per_line as usize + x * 4;
            pixels[at..at + 4].copy_from_slice(&[x as u8, y as u8, (x ^ y) as u8, 0xff]);
        }
    }
    pixels
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_session_without_producer_receives_nothing() {
    let id = unique_id("empty");
    let capacity = capacity_for(FrameDimensions::new(100, 100)).unwrap();
    let mut session = SharedImageSession::create(&id, capacity).expect("session");
    assert!(session.is_open());
    for _ in 0..10 {
        assert!(session.receive().is_none());
    }
    session.destroy();
    assert!(SharedRegion::remove(&id).unwrap());
}

#[test]
fn test_published_frame_round_trips() {
    let id = unique_id("roundtrip");
    let capacity = capacity_for(FrameDimensions::new(100, 100)).unwrap();
    let mut producer = writer(&id, capacity);
    let mut session = SharedImageSession::create(&id, capacity).expect("session");

    let dims = FrameDimensions::new(50, 60);
    let bytes_per_line = 50 * 4 + 16;
    let pixels = pattern(dims, bytes_per_line);
    producer.publish(dims, bytes_per_line, &pixels).unwrap();

    let received = session.receive().expect("frame");
    assert!(received.dimensions_changed);
    assert_eq!(received.frame.dimensions(), dims);
    assert_eq!(received.frame.bytes_per_line(), bytes_per_line);
    assert_eq!(received.frame.pixels().len(), bytes_per_line as usize * 60);
    assert_eq!(received.frame.pixels(), pixels.as_slice());
    assert_eq!(session.last_dimensions(), dims);

    assert!(session.receive().is_none());
}

#[test]
fn test_oversized_declaration_is_never_returned() {
    let id = unique_id("oversize");
    let capacity = capacity_for(FrameDimensions::new(100, 100)).unwrap();
    let mut producer = writer(&id, capacity);
    let mut session = SharedImageSession::create(&id, capacity).expect("session");

    producer.publish_header(10_000, 10_000, 40_000).unwrap();
    assert!(session.receive().is_none());
    assert_eq!(session.skipped_frames(), 1);

    // Stride too small for the width.
    producer.publish_header(100, 10, 100).unwrap();
    assert!(session.receive().is_none());

    // Multiplication that overflows 32 bits.
    producer.publish_header(u32::MAX / 4, 2, u32::MAX).unwrap();
    assert!(session.receive().is_none());
    assert_eq!(session.skipped_frames(), 3);
    assert_eq!(session.last_dimensions(), FrameDimensions::default());
}

#[test]
fn test_only_latest_of_two_publishes_is_observed() {
    let id = unique_id("latest");
    let capacity = capacity_for(FrameDimensions::new(100, 100)).unwrap();
    let mut producer = writer(&id, capacity);
    let mut session = SharedImageSession::create(&id, capacity).expect("session");

    let first = FrameDimensions::new(10, 10);
    let second = FrameDimensions::new(20, 5);
    producer.publish(first, 40, &pattern(first, 40)).unwrap();
    let latest = producer.publish(second, 80, &pattern(second, 80)).unwrap();

    let received = session.receive().expect("frame");
    assert_eq!(received.frame.dimensions(), second);
    assert_eq!(received.frame.generation(), latest);
    assert!(session.receive().is_none());
}

#[test]
fn test_dimension_change_is_reported_once() {
    let id = unique_id("dims");
    let capacity = capacity_for(FrameDimensions::new(64, 64)).unwrap();
    let mut producer = writer(&id, capacity);
    let mut session = SharedImageSession::create(&id, capacity).expect("session");

    let small = FrameDimensions::new(8, 8);
    let large = FrameDimensions::new(32, 16);
    let mut changes = Vec::new();
    for dims in [small, small, large, large, small] {
        producer.publish(dims, dims.width * 4, &pattern(dims, dims.width * 4)).unwrap();
        changes.push(session.receive().expect("frame").dimensions_changed);
    }
    assert_eq!(changes, vec![true, false, true, false, true]);
}

#[test]
fn test_reader_opening_first_sees_producer_frames() {
    let id = unique_id("reader-first");
    let capacity = capacity_for(FrameDimensions::new(16, 16)).unwrap();
    let mut session = SharedImageSession::create(&id, capacity).expect("session");
    let mut producer = FrameWriter::open_or_create(&id, capacity).expect("writer");
    assert!(!producer.region().created());

    let dims = FrameDimensions::new(16, 16);
    producer.publish(dims, 64, &pattern(dims, 64)).unwrap();
    assert_eq!(session.receive().expect("frame").frame.dimensions(), dims);

    producer.close();
    session.destroy();
    assert!(SharedRegion::remove(&id).unwrap());
}

#[test]
fn test_destroy_is_idempotent() {
    let id = unique_id("destroy");
    let capacity = capacity_for(FrameDimensions::new(4, 4)).unwrap();
    let mut producer = writer(&id, capacity);
    let mut session = SharedImageSession::create(&id, capacity).expect("session");

    session.destroy();
    session.destroy();
    assert!(!session.is_open());
    assert_eq!(session.capacity(), 0);

    producer.publish_header(4, 4, 16).unwrap();
    assert!(session.receive().is_none());
}

#[test]
fn test_concurrent_producer_delivers_increasing_generations() {
    const FRAMES: u8 = 200;

    let id = unique_id("thread");
    let dims = FrameDimensions::new(64, 64);
    let capacity = capacity_for(dims).unwrap();
    let mut producer = writer(&id, capacity);
    let mut session = SharedImageSession::create(&id, capacity).expect("session");

    let done = Arc::new(AtomicBool::new(false));
    let done_writer = Arc::clone(&done);
    let handle = thread::spawn(move || {
        for i in 0..FRAMES {
            let pixels = vec![i; 64 * 64 * 4];
            producer.publish(dims, 64 * 4, &pixels).unwrap();
            thread::sleep(Duration::from_micros(200));
        }
        done_writer.store(true, Ordering::SeqCst);
        producer
    });

    let mut last_generation = 0;
    let mut received = 0;
    while !done.load(Ordering::SeqCst) {
        if let Some(frame) = session.receive() {
            assert_eq!(frame.frame.dimensions(), dims);
            assert!(frame.frame.generation() > last_generation);
            last_generation = frame.frame.generation();
            received += 1;
        }
        thread::yield_now();
    }

    let _producer = handle.join().unwrap();
    if let Some(frame) = session.receive() {
        last_generation = frame.frame.generation();
        assert!(frame.frame.pixels().iter().all(|&b| b == FRAMES - 1));
        received += 1;
    }
    assert!(received >= 1);
    assert_eq!(last_generation, u32::from(FRAMES));
}
