//! Reading local files through the facade.

use std::{
    io::{Read, SeekFrom, Write},
    time::Duration,
};

use readahead::prelude::*;
use readahead_test_utils::{init_tracing, test_bytes};
use readahead_tests::small_settings;
use rstest::rstest;

fn temp_file(data: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

#[rstest]
#[case::plain_path(false)]
#[case::file_url(true)]
#[timeout(Duration::from_secs(10))]
fn whole_file_is_read(#[case] as_url: bool) {
    init_tracing();
    let data = test_bytes(50_000);
    let file = temp_file(&data);
    let location = if as_url {
        format!("file://{}", file.path().display())
    } else {
        file.path().display().to_string()
    };

    let mut cache = readahead::open_local(&location, small_settings()).unwrap();
    assert_eq!(cache.len(), 50_000);

    let mut out = Vec::new();
    cache.read_to_end(&mut out).unwrap();
    assert!(out == data);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
fn seeking_in_a_local_file() {
    init_tracing();
    let data = test_bytes(100_000);
    let file = temp_file(&data);
    let mut cache =
        readahead::open_local(&file.path().display().to_string(), small_settings()).unwrap();

    cache.seek(SeekFrom::Start(77_777)).unwrap();
    let mut buf = vec![0u8; 1000];
    cache.read_exact(&mut buf).unwrap();
    assert_eq!(buf, data[77_777..78_777]);

    cache.seek(SeekFrom::End(-10)).unwrap();
    let mut tail = Vec::new();
    cache.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, data[99_990..]);
}

#[rstest]
#[case::remote("http://example.com/a.bin")]
#[case::remote_file_host("file://remote-host/data.bin")]
fn unsupported_locations_are_rejected(#[case] location: &str) {
    let err = readahead::open_local(location, small_settings()).unwrap_err();
    assert!(
        matches!(err, CacheError::Source(SourceError::InvalidLocation(_))),
        "got {err:?}"
    );
}

#[rstest]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.bin");
    let err = readahead::open_local(&path.display().to_string(), small_settings()).unwrap_err();
    assert!(matches!(err, CacheError::Source(SourceError::Io(_))), "got {err:?}");
}
