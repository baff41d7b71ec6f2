//! Memory size 0 selects the unbounded temporary-file cache.

use std::{io::SeekFrom, time::Duration};

use readahead_test_utils::{MemorySource, test_bytes};
use readahead_tests::{open_cache, read_exact, small_settings};
use rstest::rstest;

#[rstest]
#[timeout(Duration::from_secs(10))]
fn whole_file_stays_cached_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let data = test_bytes(50_000);
    let source = MemorySource::new(data.clone());
    let stats = source.stats();
    let settings = small_settings()
        .with_memory_size(0)
        .with_temp_dir(dir.path());
    let mut cache = open_cache(source, settings);

    assert_eq!(cache.handle().unwrap().forward_capacity(), 0);
    assert_eq!(read_exact(&mut cache, 50_000), data);

    // Everything written so far is still there.
    assert_eq!(cache.seek(SeekFrom::Start(0)).unwrap(), 0);
    assert_eq!(read_exact(&mut cache, 1000), data[..1000]);
    assert_eq!(cache.seek(SeekFrom::Start(25_000)).unwrap(), 25_000);
    assert_eq!(read_exact(&mut cache, 1000), data[25_000..26_000]);
    assert_eq!(stats.seeks(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn disk_cache_seek_past_written_region() {
    let data = test_bytes(200_000);
    let settings = small_settings().with_memory_size(0).with_write_rate(10_000);
    let mut cache = open_cache(MemorySource::new(data.clone()), settings);

    read_exact(&mut cache, 10);
    assert_eq!(cache.seek(SeekFrom::Start(150_000)).unwrap(), 150_000);
    assert_eq!(read_exact(&mut cache, 5000), data[150_000..155_000]);
}
