//! Tracing subscriber setup.
//!
//! Log lines go to stderr so command output on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `filter`. Human-readable output unless
/// `json` is set.
pub fn init_logging(filter: &str, json: bool) {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|e| {
            eprintln!("Warning: invalid log filter '{filter}' ({e}), using 'warn'");
            EnvFilter::new("warn")
        });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_layer)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = if json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Warning: logging already initialized: {e}");
    }
}
