//! # Stage Configuration
//!
//! [`StageConfig`] is plain data: it can be built in code with the `with_*` setters or
//! deserialized from any serde format. Missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for a [`Stage`](crate::Stage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Stage name, used in logs.
    pub name: String,
    /// Number of dispatcher workers.
    pub pool_size: usize,
    /// Messages a worker executes from one mailbox before moving on.
    pub throughput: usize,
    /// Dead letters kept in memory for inspection.
    pub dead_letter_capacity: usize,
    /// Mailbox used when a definition does not name one. When unset, the default
    /// registered by plugins applies.
    pub default_mailbox: Option<String>,
    /// How long `terminate` waits for actors to finish stopping.
    pub terminate_timeout_ms: u64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            pool_size: std::thread::available_parallelism()
                .map(|cores| cores.get())
                .unwrap_or(4),
            throughput: 32,
            dead_letter_capacity: 1024,
            default_mailbox: None,
            terminate_timeout_ms: 5_000,
        }
    }
}

impl StageConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_throughput(mut self, throughput: usize) -> Self {
        self.throughput = throughput;
        self
    }

    pub fn with_dead_letter_capacity(mut self, capacity: usize) -> Self {
        self.dead_letter_capacity = capacity;
        self
    }

    pub fn with_default_mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.default_mailbox = Some(mailbox.into());
        self
    }

    pub fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: StageConfig =
            serde_json::from_str(r#"{ "name": "orders", "throughput": 8 }"#).unwrap();
        assert_eq!(config.name, "orders");
        assert_eq!(config.throughput, 8);
        assert_eq!(config.dead_letter_capacity, 1024);
        assert_eq!(config.default_mailbox, None);
        assert_eq!(config.terminate_timeout(), Duration::from_secs(5));
        assert!(config.pool_size >= 1);
    }

    #[test]
    fn test_builder_setters_survive_serialization() {
        let config = StageConfig::named("telemetry")
            .with_pool_size(2)
            .with_throughput(1)
            .with_dead_letter_capacity(16)
            .with_default_mailbox("ringBufferMailbox")
            .with_terminate_timeout(Duration::from_millis(250));

        let json = serde_json::to_string(&config).unwrap();
        let decoded: StageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, config);
        assert_eq!(decoded.terminate_timeout_ms, 250);
    }
}
