//! Structured logging.
//!
//! All logs go to **stderr**. `synth` prints the template on stdout and a
//! pipeline like `athena-federation-stack synth > template.json` must stay
//! clean.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: overrides the level given on the command line, e.g.
//!   `RUST_LOG=athena_federation_stack=debug`.
//!
//! ```ignore
//! use athena_federation_stack::init_logging;
//!
//! fn main() {
//!     init_logging();
//!     tracing::info!("synthesizing");
//! }
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when neither `RUST_LOG` nor a level is given.
pub const DEFAULT_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(
    default_level: &str,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(env_filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the global subscriber at `info`, honouring `RUST_LOG`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Install the global subscriber with a custom default level
/// (e.g. `"debug"`, `"warn"`), used when `RUST_LOG` is not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Like [`init_logging_with_default`], but returns `false` instead of
/// panicking when a subscriber is already installed.
pub fn try_init_logging(default_level: &str) -> bool {
    subscriber(default_level).try_init().is_ok()
}
