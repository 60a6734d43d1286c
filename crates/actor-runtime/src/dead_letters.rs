//! # Dead Letters
//!
//! Messages that could not reach a live actor are recorded here instead of being dropped
//! silently or reported back to the caller. The sink never blocks and never fails: it logs
//! the record, keeps the most recent `capacity` records for diagnostics, and publishes
//! each record to any subscribers.

use crate::address::Address;
use crate::error::MailboxError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::warn;

const SUBSCRIBER_BUFFER: usize = 256;

/// Why a message became a dead letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// The target actor had already stopped.
    ActorStopped,
    /// The target mailbox was closed when the message arrived.
    MailboxClosed,
    /// The target mailbox had no free slot.
    MailboxFull,
}

impl From<MailboxError> for DeadLetterReason {
    fn from(error: MailboxError) -> Self {
        match error {
            MailboxError::Closed => DeadLetterReason::MailboxClosed,
            MailboxError::Full => DeadLetterReason::MailboxFull,
        }
    }
}

/// Evidence of one undeliverable message.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    target: Address,
    representation: &'static str,
    reason: DeadLetterReason,
    timestamp: SystemTime,
}

impl DeadLetter {
    pub fn new(target: Address, representation: &'static str, reason: DeadLetterReason) -> Self {
        Self {
            target,
            representation,
            reason,
            timestamp: SystemTime::now(),
        }
    }

    pub fn target(&self) -> &Address {
        &self.target
    }

    pub fn representation(&self) -> &'static str {
        self.representation
    }

    pub fn reason(&self) -> DeadLetterReason {
        self.reason
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

/// Append-only sink for undeliverable messages.
pub struct DeadLetters {
    records: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
    total: AtomicU64,
    listeners: broadcast::Sender<DeadLetter>,
}

impl DeadLetters {
    pub fn new(capacity: usize) -> Self {
        let (listeners, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            total: AtomicU64::new(0),
            listeners,
        }
    }

    /// Records a failed delivery.
    pub fn failed_delivery(&self, dead_letter: DeadLetter) {
        warn!(
            target_address = %dead_letter.target,
            representation = dead_letter.representation,
            reason = ?dead_letter.reason,
            "Dead letter"
        );
        {
            let mut records = self.records.lock();
            if records.len() == self.capacity {
                records.pop_front();
            }
            records.push_back(dead_letter.clone());
        }
        self.total.fetch_add(1, Ordering::Relaxed);
        // No subscribers is fine.
        let _ = self.listeners.send(dead_letter);
    }

    /// Snapshot of the retained records, oldest first.
    pub fn records(&self) -> Vec<DeadLetter> {
        self.records.lock().iter().cloned().collect()
    }

    /// Retained records addressed to `target`.
    pub fn records_for(&self, target: &Address) -> Vec<DeadLetter> {
        self.records
            .lock()
            .iter()
            .filter(|record| &record.target == target)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Number of dead letters ever recorded, including ones no longer retained.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Receives every dead letter recorded from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DeadLetter> {
        self.listeners.subscribe()
    }
}
