//! Plain data passed between the sample actors.

pub mod job;

pub use job::*;
