//! Seeks served from the cache versus seeks that go through the source.

use std::{io::SeekFrom, time::Duration};

use readahead_cache::CacheError;
use readahead_test_utils::{MemorySource, StallGate, StallingSource, test_bytes};
use readahead_tests::{open_cache, read_exact, small_settings};
use rstest::rstest;

#[rstest]
#[timeout(Duration::from_secs(10))]
fn backward_seek_within_history_reuses_cache() {
    let data = test_bytes(10_000);
    let source = MemorySource::new(data.clone());
    let stats = source.stats();
    let mut cache = open_cache(source, small_settings());

    read_exact(&mut cache, 2000);
    assert_eq!(cache.seek(SeekFrom::Start(1500)).unwrap(), 1500);
    assert_eq!(read_exact(&mut cache, 500), data[1500..2000]);
    assert_eq!(stats.seeks(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn forward_seek_within_cached_data_reuses_cache() {
    let data = test_bytes(10_000);
    let source = MemorySource::new(data.clone());
    let stats = source.stats();
    let mut cache = open_cache(source, small_settings());

    read_exact(&mut cache, 100);
    let handle = cache.handle().unwrap();
    assert!(readahead_tests::wait_until(Duration::from_secs(2), || {
        handle.status().forward >= 2000
    }));

    assert_eq!(cache.seek(SeekFrom::Start(1200)).unwrap(), 1200);
    assert_eq!(read_exact(&mut cache, 300), data[1200..1500]);
    assert_eq!(stats.seeks(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn seek_to_current_position_is_a_no_op() {
    let source = MemorySource::new(test_bytes(10_000));
    let stats = source.stats();
    let mut cache = open_cache(source, small_settings());

    read_exact(&mut cache, 700);
    assert_eq!(cache.seek(SeekFrom::Current(0)).unwrap(), 700);
    assert_eq!(cache.seek(SeekFrom::Start(700)).unwrap(), 700);
    assert_eq!(stats.seeks(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn uncached_seek_goes_through_source() {
    let data = test_bytes(10_000);
    let source = MemorySource::new(data.clone());
    let stats = source.stats();
    let mut cache = open_cache(source, small_settings());

    read_exact(&mut cache, 100);
    assert_eq!(cache.seek(SeekFrom::Start(6000)).unwrap(), 6000);
    assert_eq!(read_exact(&mut cache, 1000), data[6000..7000]);
    assert_eq!(stats.seeks(), 1);

    // Far back, long evicted.
    assert_eq!(cache.seek(SeekFrom::Start(10)).unwrap(), 10);
    assert_eq!(read_exact(&mut cache, 90), data[10..100]);
    assert_eq!(stats.seeks(), 2);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn non_seekable_source_stops_at_nearest_cached_position() {
    let data = test_bytes(10_000);
    let source = MemorySource::new(data.clone()).non_seekable();
    let mut cache = open_cache(source, small_settings());

    read_exact(&mut cache, 100);
    assert!(!cache.handle().unwrap().seek_possible());

    let pos = cache.seek(SeekFrom::Start(9000)).unwrap();
    assert!(pos < 9000);
    assert!(pos >= 100);
    assert_eq!(cache.position(), pos);

    let len = (10_000 - pos as usize).min(200);
    assert_eq!(read_exact(&mut cache, len), data[pos as usize..pos as usize + len]);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn unknown_length_seek_requests_exact_target() {
    let data = test_bytes(10_000);
    let source = MemorySource::new(data.clone()).unknown_length();
    let mut cache = open_cache(source, small_settings());

    assert_eq!(cache.len(), 0);
    assert_eq!(cache.seek(SeekFrom::Start(8000)).unwrap(), 8000);
    assert_eq!(read_exact(&mut cache, 2000), data[8000..]);

    let mut buf = [0u8; 10];
    assert_eq!(cache.read(&mut buf).unwrap(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn seek_before_start_is_rejected() {
    let mut cache = open_cache(MemorySource::new(test_bytes(1000)), small_settings());
    assert!(matches!(
        cache.seek(SeekFrom::Current(-1)),
        Err(CacheError::InvalidSeek)
    ));
    assert_eq!(cache.position(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn seek_near_end_times_out_when_the_tail_never_arrives() {
    let data = test_bytes(10_000);
    let gate = StallGate::new();
    let source = StallingSource::new(MemorySource::new(data.clone()), 9000, gate.clone());
    let settings = small_settings().with_read_timeout(Duration::from_millis(200));
    let mut cache = open_cache(source, settings);

    // The request is pulled back one chunk from the end; the 990 bytes up to
    // the target must then arrive within the read timeout.
    let err = cache.seek(SeekFrom::Start(9990)).unwrap_err();
    assert!(matches!(err, CacheError::Timeout), "got {err:?}");
    assert_eq!(cache.position(), 9000);

    gate.open();
    assert_eq!(cache.seek(SeekFrom::Start(9990)).unwrap(), 9990);
    assert_eq!(read_exact(&mut cache, 10), data[9990..]);
}
