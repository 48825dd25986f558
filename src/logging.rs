//! Tracing subscriber setup for binaries.
//!
//! `RUST_LOG` wins when set; otherwise `default_filter` applies, e.g.
//! `RUST_LOG=donut_rl::learner=debug donut-dqn`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a global fmt subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
