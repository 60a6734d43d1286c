//! # Observability & Tracing
//!
//! The runtime logs through the `tracing` crate and never installs a subscriber on its
//! own. Applications call [`setup_tracing`] once at startup; tests call
//! [`try_setup_tracing`], which tolerates being called from every test.
//!
//! ## What Gets Traced
//!
//! - **Stage lifecycle**: start, plugin passes, termination (`info`)
//! - **Actor lifecycle**: creation (`debug`) and stop (`info`)
//! - **Dead letters**: every undeliverable message (`warn`)
//! - **Panics**: messages that panicked while executing (`error`)
//! - **Delivery**: each executed message with its representation (`trace`)
//!
//! ```bash
//! RUST_LOG=info cargo run
//! RUST_LOG=actor_runtime=trace cargo run
//! ```

use tracing_subscriber::EnvFilter;

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Panics if a global subscriber is already installed.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`], but writes through the test harness and ignores an
/// already-installed subscriber.
pub fn try_setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init();
}
