//! # Heartbeat Actor
//!
//! Counts timer signals from the stage [`Scheduler`](actor_runtime::Scheduler). The
//! actor schedules itself through [`Context::self_as`], so the timer holds a
//! [`ScheduledProxy`](actor_runtime::ScheduledProxy) and every beat arrives as an
//! ordinary mailbox message.

use crate::model::Beat;
use actor_runtime::{actor_protocol, Actor, Cancellable, Completes, Context, Scheduled};
use std::time::Duration;
use tracing::{debug, warn};

actor_protocol! {
    pub trait Heartbeat {
        fn start_beating(&mut self, interval: Duration);
        fn stop_beating(&mut self) -> Completes<bool>;
        fn beats(&mut self) -> Completes<u64>;
    }
}

#[derive(Default)]
pub struct HeartbeatActor {
    context: Option<Context<HeartbeatActor>>,
    timer: Option<Cancellable>,
    beats: u64,
}

impl HeartbeatActor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for HeartbeatActor {
    fn started(&mut self, context: &Context<Self>) {
        self.context = Some(context.clone());
    }

    fn stopped(&mut self, _context: &Context<Self>) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

impl Heartbeat for HeartbeatActor {
    fn start_beating(&mut self, interval: Duration) {
        let Some(context) = &self.context else {
            return;
        };
        if self.timer.is_some() {
            debug!("Heartbeat already running");
            return;
        }
        let Some(myself) = context.self_as::<dyn Scheduled<Beat>>() else {
            return;
        };
        match context
            .scheduler()
            .schedule_every(myself, Beat { label: "heartbeat" }, interval, interval)
        {
            Ok(timer) => self.timer = Some(timer),
            Err(e) => warn!(error = %e, "Heartbeat could not be scheduled"),
        }
    }

    fn stop_beating(&mut self) -> Completes<bool> {
        let cancelled = self.timer.take().is_some_and(|timer| timer.cancel());
        Completes::with(cancelled)
    }

    fn beats(&mut self) -> Completes<u64> {
        Completes::with(self.beats)
    }
}

impl Scheduled<Beat> for HeartbeatActor {
    fn interval_signal(&mut self, data: Beat, firing: u64) {
        self.beats += 1;
        debug!(label = data.label, firing, "Beat");
    }
}
