//! End-of-stream handling and source stalls.

use std::{io::SeekFrom, thread, time::Duration};

use readahead_test_utils::{MemorySource, test_bytes};
use readahead_tests::{open_cache, read_exact, small_settings};
use rstest::rstest;

#[rstest]
#[case::smaller_than_chunk(300)]
#[case::exact_chunks(3000)]
#[case::larger_than_cache(9_999)]
#[timeout(Duration::from_secs(10))]
fn eof_is_idempotent(#[case] len: usize) {
    let data = test_bytes(len);
    let mut cache = open_cache(MemorySource::new(data.clone()), small_settings());

    assert_eq!(read_exact(&mut cache, len), data);
    let mut buf = [0u8; 64];
    for _ in 0..3 {
        assert_eq!(cache.read(&mut buf).unwrap(), 0);
    }
    assert_eq!(cache.position(), len as u64);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn seek_back_after_eof_refills() {
    let data = test_bytes(10_000);
    let source = MemorySource::new(data.clone());
    let stats = source.stats();
    let mut cache = open_cache(source, small_settings());

    read_exact(&mut cache, 10_000);
    let mut buf = [0u8; 16];
    assert_eq!(cache.read(&mut buf).unwrap(), 0);

    assert_eq!(cache.seek(SeekFrom::Start(0)).unwrap(), 0);
    assert_eq!(read_exact(&mut cache, 10_000), data);
    assert_eq!(cache.read(&mut buf).unwrap(), 0);
    assert!(stats.seeks() >= 1);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn seek_within_cache_after_eof_keeps_eof() {
    let data = test_bytes(3500);
    let mut cache = open_cache(MemorySource::new(data.clone()), small_settings());

    read_exact(&mut cache, 3500);
    assert_eq!(cache.seek(SeekFrom::Start(3000)).unwrap(), 3000);
    assert_eq!(read_exact(&mut cache, 500), data[3000..]);
    let mut buf = [0u8; 16];
    assert_eq!(cache.read(&mut buf).unwrap(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn transient_stall_with_cached_data_is_retried() {
    let data = test_bytes(10_000);
    let source = MemorySource::new(data.clone()).with_empty_reads_at(2000, 2);
    let stats = source.stats();
    let mut cache = open_cache(source, small_settings());

    // Let the fill thread reach the stall while data is still unread.
    thread::sleep(Duration::from_millis(100));

    assert_eq!(read_exact(&mut cache, 10_000), data);
    let mut buf = [0u8; 16];
    assert_eq!(cache.read(&mut buf).unwrap(), 0);
    assert!(stats.reads() > 10);
}
