use std::fs;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";

/// Console plus daily-rotated JSON file logging. `RUST_LOG` overrides the
/// default per-crate directive; `--verbose` raises it to debug.
pub fn init_logging(verbose: bool) {
    if !Path::new(LOG_DIR).exists() {
        let _ = fs::create_dir_all(LOG_DIR);
    }

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "souk_scraper.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(file_writer);
    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stdout);

    let directive = if verbose { "souk_scraper=debug" } else { "souk_scraper=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(directive.parse().unwrap()))
        .with(file_layer)
        .with(console_layer)
        .init();

    // The guard flushes buffered log lines on drop; the subscriber lives for
    // the whole process, so leak it instead.
    std::mem::forget(guard);
}
