//! Tracing subscriber setup
//!
//! Console output only. `RUST_LOG` overrides the default filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,matchlog=debug";

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    })
}

/// Initialize the global subscriber
///
/// Must be called once at startup before any tracing macros are used. Logs go
/// to stderr so command output on stdout stays machine readable.
pub fn init(verbose: bool) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let result = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt_layer)
        .try_init();

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
