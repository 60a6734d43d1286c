//! # Actors
//!
//! This module defines the [`Actor`] trait and the [`ActorCell`] that hosts an actor
//! instance inside a [`Stage`].
//!
//! ## ActorCell
//!
//! The cell is the "Server" half of an actor. It owns the actor's state and its
//! [`Mailbox`], and it is the only thing that ever touches the state. Callers never hold
//! the cell directly; they hold a protocol proxy (see [`ActorRef`](crate::ActorRef)) that
//! turns each method call into a message.
//!
//! **Concurrency Model**:
//! Many cells share a handful of dispatcher workers, but the mailbox hands a given actor
//! to at most one worker at a time. The state sits behind a mutex only so the cell can be
//! shared across workers; that lock is never contended.
//!
//! ## Lifecycle
//!
//! 1.  **Start**: [`Stage::actor_for`] creates the cell and enqueues a start message,
//!     so [`Actor::started`] runs before any protocol message.
//! 2.  **Run**: protocol messages execute one at a time in arrival order.
//! 3.  **Stop**: a stop message (or [`Context::stop`] from inside a handler) closes the
//!     mailbox, turns everything still queued into dead letters, runs
//!     [`Actor::stopped`] and removes the actor from the stage directory.
//!
//! Once stopped, an actor never executes another message.

use crate::address::Address;
use crate::completes::Completes;
use crate::dead_letters::{DeadLetter, DeadLetterReason};
use crate::mailbox::Mailbox;
use crate::message::{Consumer, Message};
use crate::reference::{ActorRef, Protocol};
use crate::scheduler::Scheduler;
use crate::stage::Stage;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

pub(crate) const START_REPRESENTATION: &str = "Actor::started()";
pub(crate) const STOP_REPRESENTATION: &str = "Actor::stop()";

/// State and behavior hosted by an [`ActorCell`].
///
/// The lifecycle hooks are optional. Protocol behavior comes from implementing one or
/// more traits declared with [`actor_protocol!`](crate::actor_protocol).
pub trait Actor: Send + Sized + 'static {
    /// Runs once, before the first protocol message.
    fn started(&mut self, _context: &Context<Self>) {}

    /// Runs once, after the mailbox has been closed.
    fn stopped(&mut self, _context: &Context<Self>) {}
}

/// Everything needed to create an actor: the initial state plus optional placement.
pub struct Definition<A> {
    actor: A,
    name: Option<String>,
    address: Option<Address>,
    mailbox: Option<String>,
}

impl<A: Actor> Definition<A> {
    /// An actor with a fresh anonymous address on the default mailbox.
    pub fn has(actor: A) -> Self {
        Self {
            actor,
            name: None,
            address: None,
            mailbox: None,
        }
    }

    /// Gives the fresh address a name. Ignored when an explicit address is supplied.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Uses a pre-allocated address instead of a fresh one.
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Selects a registered mailbox type such as `"ringBufferMailbox"`.
    pub fn with_mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = Some(mailbox.into());
        self
    }

    pub fn mailbox(&self) -> Option<&str> {
        self.mailbox.as_deref()
    }

    pub(crate) fn into_parts(self) -> (A, Option<String>, Option<Address>, Option<String>) {
        (self.actor, self.name, self.address, self.mailbox)
    }
}

/// Handle an actor receives in its lifecycle hooks.
pub struct Context<A: Actor> {
    cell: Weak<ActorCell<A>>,
    address: Address,
    stage: Stage,
}

impl<A: Actor> Clone for Context<A> {
    fn clone(&self) -> Self {
        Self {
            cell: Weak::clone(&self.cell),
            address: self.address.clone(),
            stage: self.stage.clone(),
        }
    }
}

impl<A: Actor> Context<A> {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.stage.scheduler()
    }

    /// Stops the actor once the message currently executing returns.
    ///
    /// Meant to be called from inside the actor's own handlers. Other parties stop an
    /// actor through its proxy.
    pub fn stop(&self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.stop_requested.store(true, Ordering::SeqCst);
        }
    }

    /// A proxy to this same actor, typed as protocol `P`.
    ///
    /// Lets an actor hand itself to others, for example as a scheduler target. Returns
    /// `None` while the actor is being torn down.
    pub fn self_as<P>(&self) -> Option<P::Proxy>
    where
        P: ?Sized + Protocol<A>,
    {
        let cell: Arc<ActorCell<A>> = self.cell.upgrade()?;
        Some(P::proxy(ActorRef::new(cell)))
    }
}

/// Erased view of a cell, used by the stage directory.
pub(crate) trait Stoppable: Send + Sync {
    fn address(&self) -> &Address;

    fn is_stopped(&self) -> bool;

    /// Enqueues a stop message.
    fn request_stop(self: Arc<Self>);

    fn terminated(&self) -> Completes<()>;
}

/// Runtime host of one actor instance.
pub struct ActorCell<A: Actor> {
    address: Address,
    actor: Mutex<A>,
    stopped: AtomicBool,
    stop_requested: AtomicBool,
    mailbox: Arc<Mailbox>,
    stage: Stage,
    terminated: Completes<()>,
    myself: Weak<ActorCell<A>>,
}

impl<A: Actor> ActorCell<A> {
    pub(crate) fn new(actor: A, mailbox: Arc<Mailbox>, stage: Stage) -> Arc<Self> {
        Arc::new_cyclic(|myself| Self {
            address: mailbox.address().clone(),
            actor: Mutex::new(actor),
            stopped: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            mailbox,
            stage,
            terminated: Completes::new(),
            myself: myself.clone(),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub(crate) fn context(&self) -> Context<A> {
        Context {
            cell: Weak::clone(&self.myself),
            address: self.address.clone(),
            stage: self.stage.clone(),
        }
    }

    /// Records an undeliverable message aimed at this actor.
    pub(crate) fn dead_letter(&self, representation: &'static str, reason: DeadLetterReason) {
        self.stage.dead_letters().failed_delivery(DeadLetter::new(
            self.address.clone(),
            representation,
            reason,
        ));
    }

    /// Runs `operation` against the actor state. Called only from mailbox drains.
    pub(crate) fn execute(&self, representation: &'static str, operation: impl FnOnce(&mut A)) {
        if self.is_stopped() {
            self.dead_letter(representation, DeadLetterReason::ActorStopped);
            return;
        }

        let mut actor = self.actor.lock();
        operation(&mut actor);
        if self.stop_requested.load(Ordering::SeqCst) {
            self.finish_stop(&mut actor);
        }
    }

    /// Enqueues the start message. Must be the first message the mailbox sees.
    pub(crate) fn start(self: &Arc<Self>) {
        let cell = Arc::clone(self);
        let consumer: Consumer = Box::new(move || {
            let context = cell.context();
            cell.execute(START_REPRESENTATION, |actor| actor.started(&context));
        });
        self.deliver(START_REPRESENTATION, consumer);
    }

    /// Consumer that stops the actor when its turn in the mailbox comes.
    pub(crate) fn stop_consumer(self: Arc<Self>) -> Consumer {
        Box::new(move || {
            if self.is_stopped() {
                return;
            }
            let mut actor = self.actor.lock();
            self.finish_stop(&mut actor);
        })
    }

    /// Hands a bound consumer to the mailbox, choosing the preallocated path when the
    /// mailbox supports it. Refusals become dead letters.
    pub(crate) fn deliver(&self, representation: &'static str, consumer: Consumer) {
        let sent = if self.mailbox.is_preallocated() {
            self.mailbox.send_preallocated(representation, consumer)
        } else {
            self.mailbox.send(Message::new(
                self.address.clone(),
                representation,
                consumer,
            ))
        };
        if let Err(error) = sent {
            self.dead_letter(representation, error.into());
        }
    }

    /// Enqueues a stop request. A full bounded mailbox still accepts it behind the
    /// messages already queued; only a closed mailbox turns it into a dead letter.
    pub(crate) fn deliver_stop(self: Arc<Self>) {
        let message = Message::new(
            self.address.clone(),
            STOP_REPRESENTATION,
            Arc::clone(&self).stop_consumer(),
        );
        if let Err(error) = self.mailbox.send_overflow(message) {
            self.dead_letter(STOP_REPRESENTATION, error.into());
        }
    }

    fn finish_stop(&self, actor: &mut A) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let pending = self.mailbox.close();
        let dropped = pending.len();
        for message in pending {
            self.dead_letter(message.representation(), DeadLetterReason::ActorStopped);
        }
        self.stage.unregister(&self.address);

        actor.stopped(&self.context());
        self.terminated.complete(());

        let actor_type = std::any::type_name::<A>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        info!(actor_type, address = %self.address, dropped, "Actor stopped");
    }
}

impl<A: Actor> Stoppable for ActorCell<A> {
    fn address(&self) -> &Address {
        &self.address
    }

    fn is_stopped(&self) -> bool {
        ActorCell::is_stopped(self)
    }

    fn request_stop(self: Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        debug!(address = %self.address, "Stop requested");
        self.deliver_stop();
    }

    fn terminated(&self) -> Completes<()> {
        self.terminated.clone()
    }
}

impl<A: Actor> fmt::Debug for ActorCell<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorCell")
            .field("address", &self.address)
            .field("stopped", &self.is_stopped())
            .field("pending", &self.mailbox.pending_messages())
            .finish()
    }
}
