//! Tracing bootstrap for the announcer daemon.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter applied when `RUST_LOG` is unset: announcer and agent crates at
/// info, everything else quieted to warnings. Per-tick heartbeat chatter
/// stays at debug and is opt-in via `RUST_LOG`.
const DEFAULT_FILTER: &str = "herald_announcer=info,herald_agent=info,warn";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
