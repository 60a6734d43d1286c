//! # Actor References and Proxies
//!
//! Callers never see an actor. They hold a **proxy**: a cheap, cloneable value that
//! implements the actor's protocol and turns every method call into a [`Message`]
//! enqueued on the actor's mailbox.
//!
//! The pieces fit together like this:
//!
//! 1.  **Protocol** - a trait declared with [`actor_protocol!`](crate::actor_protocol).
//!     The macro also generates `<Name>Proxy` and implements [`Protocol`] for
//!     `dyn Name`, which is what ties an actor type to the proxy type.
//! 2.  **Reference** - [`ActorRef<dyn Name>`] is the untyped-by-actor handle inside every
//!     proxy. It knows the target's address and how to deliver a bound operation.
//! 3.  **Target** - [`ProtocolTarget`] is implemented by the actor cell for every
//!     protocol its actor implements.
//!
//! A call against a stopped actor is never enqueued: it becomes exactly one dead letter
//! and the call returns normally. A query in that case hands back a [`Completes`] that
//! never settles.
//!
//! [`Message`]: crate::Message

use crate::actor::{Actor, ActorCell, STOP_REPRESENTATION};
use crate::address::Address;
use crate::completes::Completes;
use crate::dead_letters::DeadLetterReason;
use crate::message::Consumer;
use std::fmt;
use std::sync::Arc;

/// Links a protocol trait object type to an actor type implementing it.
///
/// Implemented by [`actor_protocol!`](crate::actor_protocol) for `dyn Name`; hand-written
/// implementations are only needed for protocols with generic parameters (see
/// [`Scheduled`](crate::Scheduled)).
pub trait Protocol<A: Actor>: 'static {
    /// The proxy callers use to talk to an actor through this protocol.
    type Proxy: Proxy<Protocol = Self>;

    /// Views the actor as the protocol trait object.
    fn cast(actor: &mut A) -> &mut Self;

    /// Wraps a reference into the protocol's proxy.
    fn proxy(reference: ActorRef<Self>) -> Self::Proxy;
}

/// Behavior shared by every generated proxy.
///
/// Only [`Proxy::reference`] must be provided; the rest delegate to it.
pub trait Proxy: Clone + Send + Sync + 'static {
    type Protocol: ?Sized + 'static;

    fn reference(&self) -> &ActorRef<Self::Protocol>;

    fn address(&self) -> &Address {
        self.reference().address()
    }

    fn is_stopped(&self) -> bool {
        self.reference().is_stopped()
    }

    /// Messages waiting in the target's mailbox.
    fn pending_messages(&self) -> usize {
        self.reference().pending_messages()
    }

    /// Asks the actor to stop after the messages already queued ahead of the request.
    fn stop(&self) {
        self.reference().stop()
    }
}

/// Something that can execute operations of protocol `P`.
pub trait ProtocolTarget<P: ?Sized>: Send + Sync {
    fn address(&self) -> &Address;

    fn is_stopped(&self) -> bool;

    fn pending_messages(&self) -> usize;

    /// Binds `operation` into a message and enqueues it, or records a dead letter.
    fn send(
        self: Arc<Self>,
        representation: &'static str,
        operation: Box<dyn FnOnce(&mut P) + Send>,
    );

    /// Enqueues a stop request, or records a dead letter when already stopped.
    fn stop(self: Arc<Self>);
}

impl<A, P> ProtocolTarget<P> for ActorCell<A>
where
    A: Actor,
    P: ?Sized + Protocol<A>,
{
    fn address(&self) -> &Address {
        ActorCell::address(self)
    }

    fn is_stopped(&self) -> bool {
        ActorCell::is_stopped(self)
    }

    fn pending_messages(&self) -> usize {
        self.mailbox().pending_messages()
    }

    fn send(
        self: Arc<Self>,
        representation: &'static str,
        operation: Box<dyn FnOnce(&mut P) + Send>,
    ) {
        if ActorCell::is_stopped(&self) {
            self.dead_letter(representation, DeadLetterReason::ActorStopped);
            return;
        }
        let cell = Arc::clone(&self);
        let consumer: Consumer = Box::new(move || {
            cell.execute(representation, |actor| operation(P::cast(actor)));
        });
        self.deliver(representation, consumer);
    }

    fn stop(self: Arc<Self>) {
        if ActorCell::is_stopped(&self) {
            self.dead_letter(STOP_REPRESENTATION, DeadLetterReason::ActorStopped);
            return;
        }
        self.deliver_stop();
    }
}

/// Handle to an actor, seen through protocol `P`.
pub struct ActorRef<P: ?Sized> {
    target: Arc<dyn ProtocolTarget<P>>,
}

impl<P: ?Sized> Clone for ActorRef<P> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
        }
    }
}

impl<P: ?Sized + 'static> ActorRef<P> {
    pub fn new(target: Arc<dyn ProtocolTarget<P>>) -> Self {
        Self { target }
    }

    pub fn address(&self) -> &Address {
        self.target.address()
    }

    pub fn is_stopped(&self) -> bool {
        self.target.is_stopped()
    }

    pub fn pending_messages(&self) -> usize {
        self.target.pending_messages()
    }

    /// Delivers a command. Returns as soon as the message is enqueued.
    pub fn send(
        &self,
        representation: &'static str,
        operation: impl FnOnce(&mut P) + Send + 'static,
    ) {
        Arc::clone(&self.target).send(representation, Box::new(operation));
    }

    /// Delivers a query. The returned handle settles with whatever the actor's own
    /// [`Completes`] eventually holds.
    pub fn query<T: Clone + Send + 'static>(
        &self,
        representation: &'static str,
        operation: impl FnOnce(&mut P) -> Completes<T> + Send + 'static,
    ) -> Completes<T> {
        let answer = Completes::new();
        let reply = answer.clone();
        self.send(representation, move |actor| operation(actor).relay_to(&reply));
        answer
    }

    pub fn stop(&self) {
        Arc::clone(&self.target).stop();
    }
}

impl<P: ?Sized + 'static> PartialEq for ActorRef<P> {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl<P: ?Sized + 'static> Eq for ActorRef<P> {}

impl<P: ?Sized + 'static> fmt::Debug for ActorRef<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("address", self.address())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
