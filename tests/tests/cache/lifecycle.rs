//! Cancellation, events and teardown of a cache session.

use std::{io::SeekFrom, time::Duration};

use readahead_cache::{CacheError, CacheEvent, EventBus, FileCache};
use readahead_test_utils::{MemorySource, init_tracing, test_bytes};
use readahead_tests::{read_exact, small_settings, wait_until};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

fn drain(rx: &mut tokio::sync::broadcast::Receiver<CacheEvent>, seen: &mut Vec<CacheEvent>) {
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn parent_cancel_stops_the_filler() {
    init_tracing();
    let cancel = CancellationToken::new();
    let source = MemorySource::new(test_bytes(50_000));
    let mut cache = FileCache::new(source, small_settings()).with_cancel(cancel.clone());
    cache.open("memory://cancel").unwrap();
    let handle = cache.handle().unwrap();

    read_exact(&mut cache, 500);
    cancel.cancel();
    assert!(wait_until(Duration::from_secs(2), || !handle.is_running()));

    let err = cache.seek(SeekFrom::Start(40_000)).unwrap_err();
    assert!(matches!(err, CacheError::NotRunning), "got {err:?}");
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn end_of_input_and_stop_are_published() {
    init_tracing();
    let bus = EventBus::new(256);
    let mut rx = bus.subscribe();
    let source = MemorySource::new(test_bytes(3000));
    let mut cache = FileCache::new(source, small_settings()).with_bus(bus);
    cache.open("memory://events").unwrap();

    read_exact(&mut cache, 3000);
    let mut seen = Vec::new();
    assert!(wait_until(Duration::from_secs(2), || {
        drain(&mut rx, &mut seen);
        seen.contains(&CacheEvent::EndOfInput { position: 3000 })
    }));

    cache.close();
    drain(&mut rx, &mut seen);
    assert_eq!(seen.last(), Some(&CacheEvent::FillerStopped));
}

#[rstest]
#[case::explicit_close(true)]
#[case::drop_only(false)]
#[timeout(Duration::from_secs(10))]
fn teardown_closes_the_source(#[case] explicit: bool) {
    init_tracing();
    let source = MemorySource::new(test_bytes(20_000));
    let stats = source.stats();
    let mut cache = FileCache::new(source, small_settings());
    cache.open("memory://teardown").unwrap();
    read_exact(&mut cache, 1000);

    if explicit {
        cache.close();
        assert!(!cache.is_open());
        let mut buf = [0u8; 16];
        assert!(matches!(cache.read(&mut buf), Err(CacheError::NotOpen)));
        assert_eq!(stats.closes(), 1);
    }
    drop(cache);

    assert_eq!(stats.opens(), 1);
    assert_eq!(stats.closes(), 1);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn handle_outlives_the_session() {
    init_tracing();
    let source = MemorySource::new(test_bytes(20_000));
    let mut cache = FileCache::new(source, small_settings());
    cache.open("memory://handle").unwrap();
    let handle = cache.handle().unwrap();
    assert!(handle.is_running());

    drop(cache);
    assert!(!handle.is_running());
    let _ = handle.status();
}
