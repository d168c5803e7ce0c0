/*
 *  tests/state_persistence.rs
 *
 *  Now playing state written by the writer thread and restored on start
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 */

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};

use statuspane::cache::ImageCaches;
use statuspane::display::compose::Layout;
use statuspane::display::{DisplayState, FrameTarget};
use statuspane::ingest::{Ingest, IngestOptions};
use statuspane::media::{TrackState, TrackUpdate};
use statuspane::persist::{self, StateWriter};
use statuspane::pipeline::Coordinator;
use statuspane::shutdown::Shutdown;

fn track(title: &str, position: f64) -> TrackState {
    TrackState {
        title: title.into(),
        artists: vec!["Band".into()],
        album: "Record".into(),
        position_secs: position,
        duration_secs: 240.0,
        is_playing: true,
        timestamp: Utc.with_ymd_and_hms(2026, 5, 4, 21, 30, 0).unwrap(),
    }
}

fn ingest_with(writer: &StateWriter) -> (Arc<DisplayState>, Coordinator, Ingest) {
    let state = Arc::new(DisplayState::new((128, 64), FrameTarget::NowPlaying, (32, 32), (16, 16)));
    let (coordinator, requester) = Coordinator::new(state.clone(), Arc::new(ImageCaches::new(3, 3, 3)), None, 5);
    let options = IngestOptions { album_size: (32, 32), portrait_size: (16, 16), dither: false, auto_switch: false };
    let ingest = Ingest::new(state.clone(), requester, Some(writer.handle()), Layout::for_size(128, 64), options);
    (state, coordinator, ingest)
}

#[test]
fn test_poll_burst_persists_latest_track() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let writer = StateWriter::new(&path);
    let writes = writer.write_counter();
    let (_state, _coordinator, ingest) = ingest_with(&writer);

    // queued before the writer thread exists, so only the newest survives
    for n in 0..20 {
        ingest.on_track(Some(TrackUpdate { track: track("Tune", n as f64), art: None, portrait: None }), Instant::now());
    }

    let shutdown = Shutdown::new();
    let handle = writer.start(shutdown.clone()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while writes.load(Ordering::Relaxed) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    shutdown.trigger();
    handle.join().unwrap();

    assert_eq!(writes.load(Ordering::Relaxed), 1);
    let restored = persist::load_snapshot(&path).unwrap();
    assert_eq!(restored, track("Tune", 19.0));
}

#[test]
fn test_unchanged_poll_is_not_persisted_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let writer = StateWriter::new(&path);
    let writes = writer.write_counter();
    let (_state, _coordinator, ingest) = ingest_with(&writer);
    let shutdown = Shutdown::new();
    let handle = writer.start(shutdown.clone()).unwrap();

    let update = || TrackUpdate { track: track("Same", 30.0), art: None, portrait: None };
    ingest.on_track(Some(update()), Instant::now());
    let deadline = Instant::now() + Duration::from_secs(5);
    while writes.load(Ordering::Relaxed) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    ingest.on_track(Some(update()), Instant::now());
    ingest.on_track(Some(update()), Instant::now());
    std::thread::sleep(Duration::from_millis(100));
    shutdown.trigger();
    handle.join().unwrap();

    assert_eq!(writes.load(Ordering::Relaxed), 1);
}

#[test]
fn test_missing_or_corrupt_state_restores_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    assert!(persist::load_snapshot(&path).is_none());
    std::fs::write(&path, b"{ not json").unwrap();
    assert!(persist::load_snapshot(&path).is_none());
}
