// SPDX-License-Identifier: Apache-2.0

//! Opt-in tracing setup for binaries and tests.
//!
//! The library itself only emits `tracing` events; nothing is printed unless
//! the host installs a subscriber. [init] wires up a compact fmt subscriber
//! filtered by the `INIT_REGISTRY_LOG` environment variable (falling back to
//! `RUST_LOG`, then `info`).

use tracing_subscriber::EnvFilter;

/// Environment variable consulted first for the log filter.
pub const FILTER_ENV: &str = "INIT_REGISTRY_LOG";

/// Install a global fmt subscriber. Safe to call more than once; only the
/// first call takes effect.
pub fn init() {
    let filter = EnvFilter::try_from_env(FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
