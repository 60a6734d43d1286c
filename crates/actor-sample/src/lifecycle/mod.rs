//! # System Lifecycle & Orchestration
//!
//! This module owns the runtime lifecycle of the sample: starting a stage with its
//! plugins, creating the actors, and shutting everything down in order.
//!
//! ## The Orchestration Pattern
//!
//! Individual actors are simple; **wiring them together** is where complexity lives.
//! [`ProcessingSystem`] is the "conductor" for this sample.
//!
//! **Key Responsibilities:**
//! 1. **Stage Setup** - Register plugins before any actor exists
//! 2. **Actor Creation** - Create the pool and heartbeat through [`Stage::actor_for`](actor_runtime::Stage::actor_for)
//! 3. **Graceful Shutdown** - Cancel timers, collect results, terminate the stage
//!
//! ## Startup Order
//!
//! ```text
//! Stage::builder(config)
//!   pass 0: queueMailbox, ringBufferMailbox   (mailbox types)
//!   pass 1: pendingMessages                   (mailbox observer)
//! actor_for(pool)      ── started() ──▶ creates worker-0..N on the ring buffer mailbox
//! actor_for(heartbeat) ── start_beating() ──▶ scheduler timer
//! ```
//!
//! The pool creates its workers from inside its own `started` hook, so the workers exist
//! before any job sent after `start` reaches the pool.
//!
//! ## Graceful Shutdown
//!
//! 1. **Cancel the heartbeat** - no further beats are enqueued once `stop_beating` answers
//! 2. **Collect the report** - queries drain behind every job already submitted
//! 3. **Terminate the stage** - every actor stops, then plugins close in reverse order
//!
//! Jobs still queued when the stage terminates become dead letters; the report counts them.
//!
//! ## Observability
//!
//! Call [`actor_runtime::tracing::setup_tracing`] once before starting the system:
//!
//! ```bash
//! RUST_LOG=info cargo run      # Lifecycle only
//! RUST_LOG=debug cargo run     # Every job and beat
//! ```

pub mod error;
pub mod processing_system;

pub use error::*;
pub use processing_system::*;
