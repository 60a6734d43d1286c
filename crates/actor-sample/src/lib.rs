//! # Actor Runtime Sample
//!
//! A job processing system built on `actor-runtime`, exposed as a library for
//! integration testing.

pub mod heartbeat_actor;
pub mod lifecycle;
pub mod model;
pub mod plugins;
pub mod pool_actor;
pub mod worker_actor;
