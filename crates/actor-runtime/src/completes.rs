//! # Completion Handles
//!
//! A [`Completes<T>`] is the reply side of a query-style protocol call. The proxy creates
//! it, hands it back to the caller immediately, and the actor's eventual answer settles
//! it later from whichever dispatcher worker executed the message.
//!
//! The handle is single-assignment: the first `complete` or `fail` wins and every later
//! attempt is ignored (returning `false`). Consumers can either register callbacks
//! ([`Completes::and_then_consume`], [`Completes::otherwise`]) or await the outcome.
//!
//! ```rust
//! use actor_runtime::Completes;
//!
//! #[tokio::main]
//! async fn main() {
//!     let answer = Completes::new();
//!     let writer = answer.clone();
//!     tokio::spawn(async move { writer.complete(42) });
//!     assert_eq!(answer.outcome().await, Ok(42));
//! }
//! ```

use crate::error::CompletesError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Settled value of a [`Completes`].
pub type Outcome<T> = Result<T, CompletesError>;

type Consumer<T> = Box<dyn FnOnce(Outcome<T>) + Send>;

struct Slot<T> {
    outcome: Option<Outcome<T>>,
    consumers: Vec<Consumer<T>>,
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    settled: Notify,
}

/// Thread-safe, single-assignment result cell.
pub struct Completes<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Completes<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Completes<T> {
    /// A pending handle.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    outcome: None,
                    consumers: Vec::new(),
                }),
                settled: Notify::new(),
            }),
        }
    }

    /// A handle that is already completed with `value`.
    ///
    /// This is what actors return from query methods that can answer right away.
    pub fn with(value: T) -> Self {
        let completes = Self::new();
        completes.complete(value);
        completes
    }

    /// A handle that has already failed.
    pub fn failed(error: CompletesError) -> Self {
        let completes = Self::new();
        completes.fail(error);
        completes
    }

    /// Completes the handle. Returns `false` if it was already settled.
    pub fn complete(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Fails the handle. Returns `false` if it was already settled.
    pub fn fail(&self, error: CompletesError) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: Outcome<T>) -> bool {
        let consumers = {
            let mut slot = self.inner.slot.lock();
            if slot.outcome.is_some() {
                debug!("Completes already settled, ignoring later outcome");
                return false;
            }
            slot.outcome = Some(outcome.clone());
            std::mem::take(&mut slot.consumers)
        };

        for consumer in consumers {
            consumer(outcome.clone());
        }
        self.inner.settled.notify_waiters();
        true
    }

    pub fn is_completed(&self) -> bool {
        self.inner.slot.lock().outcome.is_some()
    }

    /// The outcome if already settled, without waiting.
    pub fn try_outcome(&self) -> Option<Outcome<T>> {
        self.inner.slot.lock().outcome.clone()
    }

    /// Registers `consumer` to receive the outcome. Runs immediately when already settled.
    pub fn on_outcome(&self, consumer: impl FnOnce(Outcome<T>) + Send + 'static) {
        let settled = {
            let mut slot = self.inner.slot.lock();
            match &slot.outcome {
                Some(outcome) => outcome.clone(),
                None => {
                    slot.consumers.push(Box::new(consumer));
                    return;
                }
            }
        };
        consumer(settled);
    }

    /// Registers a consumer for the successful value only.
    pub fn and_then_consume(&self, consumer: impl FnOnce(T) + Send + 'static) {
        self.on_outcome(move |outcome| {
            if let Ok(value) = outcome {
                consumer(value);
            }
        });
    }

    /// Registers a consumer for the failure only.
    pub fn otherwise(&self, consumer: impl FnOnce(CompletesError) + Send + 'static) {
        self.on_outcome(move |outcome| {
            if let Err(error) = outcome {
                consumer(error);
            }
        });
    }

    /// A new handle settled with `f` applied to this handle's value.
    pub fn map<U: Clone + Send + 'static>(
        &self,
        f: impl FnOnce(T) -> U + Send + 'static,
    ) -> Completes<U> {
        let mapped = Completes::new();
        let target = mapped.clone();
        self.on_outcome(move |outcome| {
            target.settle(outcome.map(f));
        });
        mapped
    }

    /// Forwards this handle's outcome, once settled, into `target`.
    pub fn relay_to(&self, target: &Completes<T>) {
        let target = target.clone();
        self.on_outcome(move |outcome| {
            target.settle(outcome);
        });
    }

    /// Waits for the outcome without blocking the executing thread.
    pub async fn outcome(&self) -> Outcome<T> {
        loop {
            let notified = self.inner.settled.notified();
            if let Some(outcome) = self.try_outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Like [`Completes::outcome`], failing with [`CompletesError::TimedOut`] after `timeout`.
    pub async fn outcome_within(&self, timeout: Duration) -> Outcome<T> {
        tokio::time::timeout(timeout, self.outcome())
            .await
            .unwrap_or(Err(CompletesError::TimedOut))
    }
}

impl<T: Clone + Send + 'static> Default for Completes<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Completes<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settled = self.inner.slot.lock().outcome.is_some();
        f.debug_struct("Completes")
            .field("settled", &settled)
            .finish()
    }
}
