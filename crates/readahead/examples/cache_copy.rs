//! Example: copy a file through the read-ahead cache.
//!
//! Reads the input in small blocks the way a demuxer would, while a second
//! thread prints the cache status once a second.
//!
//! Run with:
//! ```
//! cargo run -p readahead --example cache_copy -- INPUT OUTPUT [SETTINGS.toml]
//! ```

use std::{
    env::args,
    error::Error,
    fs::{self, File},
    io::{self, BufWriter},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use readahead::prelude::*;
use tracing::{info, metadata::LevelFilter};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::default()
                .add_directive("readahead_cache=debug".parse()?)
                .add_directive("readahead_storage=info".parse()?)
                .add_directive(LevelFilter::INFO.into()),
        )
        .with_line_number(false)
        .with_file(false)
        .init();

    let mut args = args().skip(1);
    let (Some(input), Some(output)) = (args.next(), args.next()) else {
        return Err("usage: cache_copy INPUT OUTPUT [SETTINGS.toml]".into());
    };
    let settings = match args.next() {
        Some(path) => CacheSettings::from_toml_str(&fs::read_to_string(path)?)?,
        None => CacheSettings::default().with_write_rate(0),
    };

    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let mut cache = FileCache::new(LocalFileSource::new(), settings).with_bus(bus);
    cache.open(&input)?;
    info!(len = cache.len(), "opened {input}");

    let done = Arc::new(AtomicBool::new(false));
    let monitor = {
        let handle = cache.handle()?;
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_secs(1));
                let status = handle.status();
                info!(
                    forward = status.forward,
                    rate = status.current_rate,
                    low_speed = status.low_speed,
                    "cache status"
                );
                while let Ok(event) = events.try_recv() {
                    info!(?event);
                }
            }
        })
    };

    let mut out = BufWriter::new(File::create(&output)?);
    let copied = io::copy(&mut cache, &mut out)?;
    info!(copied, "copy complete");

    done.store(true, Ordering::Relaxed);
    let _ = monitor.join();
    cache.close();
    Ok(())
}
