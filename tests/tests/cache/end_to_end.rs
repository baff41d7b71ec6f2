//! Read/seek scenarios over a 10 000-byte in-memory source.

use std::{
    io::{Read, SeekFrom},
    time::{Duration, Instant},
};

use readahead_cache::CacheError;
use readahead_test_utils::{MemorySource, StallGate, StallingSource, test_bytes};
use readahead_tests::{open_cache, read_exact, small_settings};
use rstest::rstest;

#[rstest]
#[timeout(Duration::from_secs(10))]
fn sequential_reads_then_seek_near_end() {
    let data = test_bytes(10_000);
    let mut cache = open_cache(MemorySource::new(data.clone()), small_settings());

    for i in 0..5 {
        let block = read_exact(&mut cache, 500);
        assert_eq!(block, data[i * 500..(i + 1) * 500]);
    }
    assert_eq!(cache.position(), 2500);

    assert_eq!(cache.seek(SeekFrom::Start(9500)).unwrap(), 9500);
    assert_eq!(cache.position(), 9500);
    assert_eq!(read_exact(&mut cache, 500), data[9500..]);

    let mut buf = [0u8; 100];
    assert_eq!(cache.read(&mut buf).unwrap(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn seek_from_end_and_current() {
    let data = test_bytes(10_000);
    let mut cache = open_cache(MemorySource::new(data.clone()), small_settings());

    assert_eq!(cache.seek(SeekFrom::End(-100)).unwrap(), 9900);
    assert_eq!(read_exact(&mut cache, 50), data[9900..9950]);
    assert_eq!(cache.seek(SeekFrom::Current(-50)).unwrap(), 9900);
    assert_eq!(read_exact(&mut cache, 100), data[9900..]);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn read_times_out_on_stalled_source() {
    let gate = StallGate::new();
    let source = StallingSource::new(MemorySource::new(test_bytes(10_000)), 0, gate.clone());
    let settings = small_settings().with_read_timeout(Duration::from_millis(200));
    let mut cache = open_cache(source, settings);

    let start = Instant::now();
    let mut buf = [0u8; 100];
    let err = cache.read(&mut buf).unwrap_err();
    assert!(matches!(err, CacheError::Timeout));
    assert!(err.is_retryable());
    assert!(start.elapsed() >= Duration::from_millis(200));

    // Once the source recovers the same read succeeds.
    gate.open();
    let n = cache.read(&mut buf).unwrap();
    assert!(n > 0);
    assert_eq!(buf[..n], test_bytes(n)[..]);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn io_traits_round_trip() {
    use std::io::Seek;

    let data = test_bytes(5000);
    let mut cache = open_cache(MemorySource::new(data.clone()), small_settings());

    let mut all = Vec::new();
    cache.read_to_end(&mut all).unwrap();
    assert_eq!(all, data);

    assert_eq!(Seek::seek(&mut cache, SeekFrom::End(-10)).unwrap(), 4990);
    let mut tail = Vec::new();
    cache.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, data[4990..]);
}
