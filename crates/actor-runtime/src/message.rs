//! # Messages
//!
//! A [`Message`] is a deferred invocation: the address of the actor it targets, the bound
//! operation to run against that actor, and a human-readable representation of the call
//! (for example `"Counter::increment(u64)"`) used in logs and dead letters.
//!
//! Messages are built by proxies and executed exactly once by the mailbox drain that
//! pops them. The consumer closure already captures the actor cell, so a mailbox does
//! not need to know the concrete actor type it serves.

use crate::address::Address;
use std::fmt;

/// The bound operation carried by a message.
pub type Consumer = Box<dyn FnOnce() + Send>;

/// A bound, deferred invocation awaiting execution.
pub struct Message {
    target: Address,
    representation: &'static str,
    consumer: Consumer,
}

impl Message {
    pub fn new(target: Address, representation: &'static str, consumer: Consumer) -> Self {
        Self {
            target,
            representation,
            consumer,
        }
    }

    pub fn target(&self) -> &Address {
        &self.target
    }

    pub fn representation(&self) -> &'static str {
        self.representation
    }

    /// Runs the bound operation. Consumes the message, so it can run at most once.
    pub fn deliver(self) {
        (self.consumer)()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("target", &self.target)
            .field("representation", &self.representation)
            .finish()
    }
}
