//! Logger setup for the reclass CLI.
//!
//! All diagnostics, including the post-stream statistics block, go
//! through the `log` macros; the CLI turns them on with `-v`.

use std::io::Write;
use std::time::Instant;

fn level_for(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}

/// Install the stderr logger.
///
/// Each line is prefixed with the wall-clock time elapsed since this
/// call, so long runs show where the time went. Repeated calls (as in
/// tests) are harmless.
pub fn init_logger(verbosity: u8) {
    let start = Instant::now();
    env_logger::Builder::from_default_env()
        .filter_level(level_for(verbosity))
        .format(move |buf, record| {
            let secs = start.elapsed().as_secs();
            writeln!(
                buf,
                "[{:02}:{:02}:{:02}] {}: {}",
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60,
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok();
}
