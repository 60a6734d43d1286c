//! # Scheduler
//!
//! Delivers timed signals to actors through the ordinary message path. A timer never
//! runs actor code itself: each firing enqueues an
//! [`interval_signal`](Scheduled::interval_signal) message on the target's mailbox, so
//! the actor sees ticks in order with the rest of its messages.
//!
//! ```text
//! schedule(target, data, 100ms, 1s, Repeat::Times(3))
//!
//!   t=100ms   ──► interval_signal(data, 1)
//!   t=1.1s    ──► interval_signal(data, 2)
//!   t=2.1s    ──► interval_signal(data, 3)   (timer expires)
//! ```
//!
//! Cancelling is synchronous with respect to firings: once [`Cancellable::cancel`]
//! returns, no further signal is enqueued. A signal already sitting in the mailbox
//! still runs.

use crate::actor::Actor;
use crate::error::ActorError;
use crate::reference::{ActorRef, Protocol, Proxy};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, info};

const INTERVAL_SIGNAL: &str = "Scheduled::interval_signal(D, u64)";

/// Protocol for actors that receive timer signals.
///
/// `D` is the payload handed to [`Scheduler::schedule`]; `firing` counts from 1.
pub trait Scheduled<D: Send + 'static> {
    fn interval_signal(&mut self, data: D, firing: u64);
}

/// Proxy delivering [`Scheduled`] signals as messages.
pub struct ScheduledProxy<D: Send + 'static> {
    reference: ActorRef<dyn Scheduled<D>>,
}

impl<D: Send + 'static> Clone for ScheduledProxy<D> {
    fn clone(&self) -> Self {
        Self {
            reference: self.reference.clone(),
        }
    }
}

impl<D: Send + 'static> fmt::Debug for ScheduledProxy<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledProxy")
            .field("reference", &self.reference)
            .finish()
    }
}

impl<D: Send + 'static> ScheduledProxy<D> {
    pub fn interval_signal(&self, data: D, firing: u64) {
        self.reference
            .send(INTERVAL_SIGNAL, move |actor| actor.interval_signal(data, firing));
    }
}

impl<D: Send + 'static> Proxy for ScheduledProxy<D> {
    type Protocol = dyn Scheduled<D>;

    fn reference(&self) -> &ActorRef<dyn Scheduled<D>> {
        &self.reference
    }
}

impl<A, D> Protocol<A> for dyn Scheduled<D>
where
    A: Actor + Scheduled<D>,
    D: Send + 'static,
{
    type Proxy = ScheduledProxy<D>;

    fn cast(actor: &mut A) -> &mut Self {
        actor
    }

    fn proxy(reference: ActorRef<Self>) -> Self::Proxy {
        ScheduledProxy { reference }
    }
}

/// How many times a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Times(u32),
    Forever,
}

impl Repeat {
    fn is_exhausted(self, firings: u64) -> bool {
        match self {
            Repeat::Times(times) => firings >= u64::from(times),
            Repeat::Forever => false,
        }
    }
}

struct TimerState {
    id: u64,
    cancelled: Mutex<bool>,
    task: Mutex<Option<AbortHandle>>,
    scheduler: Weak<SchedulerInner>,
}

/// Handle to a scheduled timer.
#[derive(Clone)]
pub struct Cancellable {
    state: Arc<TimerState>,
}

impl Cancellable {
    fn new(id: u64, scheduler: Weak<SchedulerInner>) -> Self {
        Self {
            state: Arc::new(TimerState {
                id,
                cancelled: Mutex::new(false),
                task: Mutex::new(None),
                scheduler,
            }),
        }
    }

    /// Stops future firings. Returns `false` if the timer had already been cancelled or
    /// had run out of repetitions.
    pub fn cancel(&self) -> bool {
        let was_active = {
            let mut cancelled = self.state.cancelled.lock();
            !std::mem::replace(&mut *cancelled, true)
        };
        self.release();
        if was_active {
            debug!(timer = self.state.id, "Timer cancelled");
        }
        was_active
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.cancelled.lock()
    }

    /// Runs `signal` unless the timer was cancelled. Holds the cancellation lock while
    /// signalling so a concurrent `cancel` waits for the enqueue to finish.
    fn fire(&self, signal: impl FnOnce()) -> bool {
        let cancelled = self.state.cancelled.lock();
        if *cancelled {
            return false;
        }
        signal();
        true
    }

    fn expire(&self) {
        *self.state.cancelled.lock() = true;
        self.release();
    }

    fn attach(&self, task: AbortHandle) {
        if self.is_cancelled() {
            task.abort();
        } else {
            *self.state.task.lock() = Some(task);
        }
    }

    fn release(&self) {
        if let Some(task) = self.state.task.lock().take() {
            task.abort();
        }
        if let Some(scheduler) = self.state.scheduler.upgrade() {
            scheduler.timers.lock().remove(&self.state.id);
        }
    }
}

impl fmt::Debug for Cancellable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellable")
            .field("id", &self.state.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

struct SchedulerInner {
    handle: Handle,
    timers: Mutex<HashMap<u64, Cancellable>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Timer service owned by a stage.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                handle,
                timers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Delivers `interval_signal(data, n)` to `target` after `initial_delay`, then every
    /// `interval`, as many times as `repeat` allows.
    ///
    /// Fails with [`ActorError::InvalidSchedule`] for `Repeat::Times(0)` or for a zero
    /// interval on a timer that fires more than once.
    pub fn schedule<D>(
        &self,
        target: ScheduledProxy<D>,
        data: D,
        initial_delay: Duration,
        interval: Duration,
        repeat: Repeat,
    ) -> Result<Cancellable, ActorError>
    where
        D: Clone + Send + 'static,
    {
        match repeat {
            Repeat::Times(0) => {
                return Err(ActorError::InvalidSchedule(
                    "a timer must fire at least once".to_string(),
                ))
            }
            Repeat::Times(1) => {}
            _ if interval.is_zero() => {
                return Err(ActorError::InvalidSchedule(
                    "a repeating timer needs a non-zero interval".to_string(),
                ))
            }
            _ => {}
        }
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(ActorError::StageTerminated);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let timer = Cancellable::new(id, Arc::downgrade(&self.inner));
        self.inner.timers.lock().insert(id, timer.clone());

        debug!(
            timer = id,
            target = %target.address(),
            ?initial_delay,
            ?interval,
            ?repeat,
            "Timer scheduled"
        );

        let firing_timer = timer.clone();
        let task = self.inner.handle.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut firing: u64 = 0;
            loop {
                firing += 1;
                let signalled =
                    firing_timer.fire(|| target.interval_signal(data.clone(), firing));
                if !signalled {
                    break;
                }
                if repeat.is_exhausted(firing) {
                    firing_timer.expire();
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });
        timer.attach(task.abort_handle());
        Ok(timer)
    }

    /// Fires once after `delay`.
    pub fn schedule_once<D>(
        &self,
        target: ScheduledProxy<D>,
        data: D,
        delay: Duration,
    ) -> Result<Cancellable, ActorError>
    where
        D: Clone + Send + 'static,
    {
        self.schedule(target, data, delay, Duration::ZERO, Repeat::Times(1))
    }

    /// Fires every `interval` until cancelled.
    pub fn schedule_every<D>(
        &self,
        target: ScheduledProxy<D>,
        data: D,
        initial_delay: Duration,
        interval: Duration,
    ) -> Result<Cancellable, ActorError>
    where
        D: Clone + Send + 'static,
    {
        self.schedule(target, data, initial_delay, interval, Repeat::Forever)
    }

    /// Number of timers still able to fire.
    pub fn active_timers(&self) -> usize {
        self.inner.timers.lock().len()
    }

    /// Cancels every timer and refuses new ones.
    pub(crate) fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let timers: Vec<Cancellable> = self.inner.timers.lock().values().cloned().collect();
        let cancelled = timers.iter().filter(|timer| timer.cancel()).count();
        info!(cancelled, "Scheduler closed");
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("active_timers", &self.active_timers())
            .finish()
    }
}
