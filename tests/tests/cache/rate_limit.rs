//! Fill-rate cap and status reporting.

use std::{
    thread,
    time::{Duration, Instant},
};

use readahead_source::{CacheStatus, IoControl, IoReply};
use readahead_test_utils::{MemorySource, test_bytes};
use readahead_tests::{open_cache, small_settings, wait_until};
use rstest::rstest;

const RATE: u32 = 200_000;

fn throttled_source() -> MemorySource {
    // About 4 MB/s uncapped: well above the cap, fast enough for the tests.
    MemorySource::new(test_bytes(8 << 20))
        .with_chunk_size(4096)
        .with_read_delay(Duration::from_millis(1))
}

fn settings() -> readahead_cache::CacheSettings {
    small_settings()
        .with_memory_size(16 << 20)
        .with_chunk_size(4096)
        .with_write_rate(RATE)
        .with_read_factor(1.0)
        .with_rate_poll(Duration::from_millis(20))
}

#[rstest]
#[timeout(Duration::from_secs(20))]
fn idle_consumer_caps_forward_fill() {
    let cache = open_cache(throttled_source(), settings());
    let handle = cache.handle().unwrap();

    thread::sleep(Duration::from_secs(1));
    let forward = handle.status().forward;

    // Lead of RATE * factor, plus about one second at RATE, plus slack.
    assert!(forward >= u64::from(RATE), "forward {forward}");
    assert!(forward <= 1_000_000, "forward {forward}");
}

#[rstest]
#[timeout(Duration::from_secs(20))]
fn sustained_fill_runs_at_the_cap_past_the_allowed_lead() {
    // Default read factor: the first 4 * RATE bytes go at source speed.
    let cache = open_cache(throttled_source(), settings().with_read_factor(4.0));
    let handle = cache.handle().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        handle.status().forward >= 4 * u64::from(RATE)
    }));

    let start = Instant::now();
    let before = handle.status().forward;
    thread::sleep(Duration::from_secs(2));
    let grown = handle.status().forward - before;
    let elapsed = start.elapsed().as_secs_f64();

    #[allow(clippy::cast_precision_loss)]
    let slope = grown as f64 / elapsed;
    let cap = f64::from(RATE);
    assert!(slope > cap * 0.6 && slope < cap * 1.4, "fill rate {slope:.0} B/s");
}

#[rstest]
#[timeout(Duration::from_secs(20))]
fn reported_rate_converges_to_the_cap() {
    let cache = open_cache(throttled_source(), settings());
    let handle = cache.handle().unwrap();

    thread::sleep(Duration::from_secs(3));
    let rate = handle.status().current_rate;
    assert!(
        rate > RATE * 3 / 4 && rate < RATE * 5 / 4,
        "current rate {rate}"
    );
}

#[rstest]
#[timeout(Duration::from_secs(20))]
fn lifting_the_cap_resumes_full_speed() {
    let cache = open_cache(throttled_source(), settings());
    let handle = cache.handle().unwrap();

    thread::sleep(Duration::from_millis(300));
    assert_eq!(
        cache.io_control(IoControl::CacheSetRate(0)).unwrap(),
        IoReply::Done
    );
    assert!(wait_until(Duration::from_secs(10), || {
        handle.status().forward > 2_000_000
    }));
    assert_eq!(handle.status().max_rate, 0);
}

#[rstest]
#[timeout(Duration::from_secs(20))]
fn status_reports_rates() {
    let cache = open_cache(throttled_source(), settings());
    thread::sleep(Duration::from_millis(500));

    let IoReply::CacheStatus(CacheStatus {
        forward,
        max_rate,
        current_rate,
        ..
    }) = cache.io_control(IoControl::CacheStatus).unwrap()
    else {
        panic!("expected a status reply");
    };
    assert!(forward > 0);
    assert_eq!(max_rate, RATE);
    assert!(current_rate > 0);
}

#[rstest]
#[timeout(Duration::from_secs(20))]
fn low_speed_is_flagged_once_and_cleared_by_query() {
    // Uncapped source speed of about 40 KB/s against a 1 MB/s target.
    let source = MemorySource::new(test_bytes(200_000))
        .with_chunk_size(400)
        .with_read_delay(Duration::from_millis(10));
    let settings = small_settings()
        .with_memory_size(4000)
        .with_chunk_size(400)
        .with_write_rate(1 << 20)
        .with_rate_bias(Duration::ZERO);
    let cache = open_cache(source, settings);
    let handle = cache.handle().unwrap();

    // The 3000-byte forward window fills in well under a second.
    assert!(wait_until(Duration::from_secs(5), || !handle.is_filling()));
    let first = handle.status();
    assert!(first.low_speed);
    assert!(first.current_rate < 1 << 20);
    assert!(!handle.status().low_speed);
}
