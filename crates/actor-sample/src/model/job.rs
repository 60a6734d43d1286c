use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Type-safe identifier for Jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job_{}", self.0)
    }
}

/// A unit of work handed to the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub payload: String,
}

impl Job {
    pub fn new(id: u64, payload: impl Into<String>) -> Self {
        Self {
            id: JobId(id),
            payload: payload.into(),
        }
    }

    /// Cheap deterministic digest of the payload, standing in for real work.
    pub fn checksum(&self) -> u64 {
        self.payload
            .bytes()
            .fold(self.id.0, |sum, byte| sum.wrapping_mul(31).wrapping_add(u64::from(byte)))
    }
}

/// Payload of a heartbeat timer signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beat {
    pub label: &'static str,
}
