//! # Routers
//!
//! A router spreads messages over a set of routees, each a proxy to another actor. A
//! router is usually embedded in an actor of its own, whose protocol methods forward
//! to [`Router::dispatch_command`] or [`Router::dispatch_query`]; that way subscription
//! changes and routing decisions are serialized by the router actor's mailbox.
//!
//! Which routees receive a message is decided by a [`RoutingStrategy`]:
//!
//! | Strategy | Picks |
//! |----------|-------|
//! | [`RoundRobin`] | the next routee in subscription order, wrapping around |
//! | [`Broadcast`] | every routee |
//! | [`SmallestMailbox`] | the routee with the fewest pending messages |
//! | [`RandomRouting`] | a uniformly random routee |

use crate::actor::{Actor, Definition};
use crate::address::Address;
use crate::completes::Completes;
use crate::error::{ActorError, CompletesError};
use crate::reference::{Protocol, Proxy};
use crate::stage::Stage;
use rand::Rng;
use std::fmt;
use tracing::debug;

/// One routing target.
///
/// Two routees are the same routee when they address the same actor.
#[derive(Clone)]
pub struct Routee<P> {
    proxy: P,
}

impl<P: Proxy> Routee<P> {
    pub fn of(proxy: P) -> Self {
        Self { proxy }
    }

    pub fn address(&self) -> &Address {
        self.proxy.address()
    }

    pub fn proxy(&self) -> &P {
        &self.proxy
    }

    pub fn into_proxy(self) -> P {
        self.proxy
    }

    pub fn pending_messages(&self) -> usize {
        self.proxy.pending_messages()
    }
}

impl<P: Proxy> PartialEq for Routee<P> {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl<P: Proxy> Eq for Routee<P> {}

impl<P: Proxy> fmt::Debug for Routee<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routee")
            .field("address", self.address())
            .finish()
    }
}

/// What a strategy may look at when choosing routees.
pub trait RouteeSet {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending messages in the mailbox of the routee at `index`.
    fn pending_messages(&self, index: usize) -> usize;
}

impl<P: Proxy> RouteeSet for [Routee<P>] {
    fn len(&self) -> usize {
        <[Routee<P>]>::len(self)
    }

    fn pending_messages(&self, index: usize) -> usize {
        self[index].pending_messages()
    }
}

/// Indices of the routees chosen for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routing {
    indices: Vec<usize>,
}

impl Routing {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn one(index: usize) -> Self {
        Self {
            indices: vec![index],
        }
    }

    pub fn many(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn first(&self) -> Option<usize> {
        self.indices.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Chooses routees for each message.
pub trait RoutingStrategy: Send + 'static {
    fn compute_routing<R: RouteeSet + ?Sized>(&mut self, routees: &R) -> Routing;

    /// Called after the routee at `index` was removed, leaving `remaining` routees.
    fn routee_removed(&mut self, _index: usize, _remaining: usize) {}
}

/// Cycles through routees in subscription order.
#[derive(Debug, Clone, Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    /// Index the next message will go to, before wrapping to the current routee count.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl RoutingStrategy for RoundRobin {
    fn compute_routing<R: RouteeSet + ?Sized>(&mut self, routees: &R) -> Routing {
        let count = routees.len();
        if count == 0 {
            return Routing::none();
        }
        let index = self.cursor % count;
        self.cursor = (index + 1) % count;
        Routing::one(index)
    }

    fn routee_removed(&mut self, index: usize, remaining: usize) {
        if remaining == 0 {
            self.cursor = 0;
            return;
        }
        if index < self.cursor {
            self.cursor -= 1;
        }
        self.cursor %= remaining;
    }
}

/// Sends every message to every routee.
#[derive(Debug, Clone, Copy, Default)]
pub struct Broadcast;

impl RoutingStrategy for Broadcast {
    fn compute_routing<R: RouteeSet + ?Sized>(&mut self, routees: &R) -> Routing {
        Routing::many((0..routees.len()).collect())
    }
}

/// Picks the routee with the fewest pending messages; ties go to the earliest subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmallestMailbox;

impl RoutingStrategy for SmallestMailbox {
    fn compute_routing<R: RouteeSet + ?Sized>(&mut self, routees: &R) -> Routing {
        (0..routees.len())
            .min_by_key(|&index| routees.pending_messages(index))
            .map(Routing::one)
            .unwrap_or_default()
    }
}

/// Picks a routee uniformly at random.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomRouting;

impl RoutingStrategy for RandomRouting {
    fn compute_routing<R: RouteeSet + ?Sized>(&mut self, routees: &R) -> Routing {
        match routees.len() {
            0 => Routing::none(),
            count => Routing::one(rand::thread_rng().gen_range(0..count)),
        }
    }
}

/// How to create a router's initial routees.
pub struct RouterSpecification<A> {
    initial_routees: usize,
    definition: Box<dyn Fn(usize) -> Definition<A> + Send + Sync>,
}

impl<A: Actor> RouterSpecification<A> {
    /// `definition` is called once per routee with the routee's index.
    pub fn new(
        initial_routees: usize,
        definition: impl Fn(usize) -> Definition<A> + Send + Sync + 'static,
    ) -> Self {
        Self {
            initial_routees,
            definition: Box::new(definition),
        }
    }

    pub fn initial_routees(&self) -> usize {
        self.initial_routees
    }
}

/// Ordered routee set plus the strategy that picks from it.
pub struct Router<P, S = RoundRobin> {
    routees: Vec<Routee<P>>,
    strategy: S,
}

impl<P: Proxy> Router<P, RoundRobin> {
    pub fn round_robin() -> Self {
        Self::new(RoundRobin::default())
    }
}

impl<P: Proxy, S: RoutingStrategy> Router<P, S> {
    pub fn new(strategy: S) -> Self {
        Self {
            routees: Vec::new(),
            strategy,
        }
    }

    /// Creates the specification's initial routees on `stage` and subscribes them.
    pub fn populate<Pr, A>(
        &mut self,
        stage: &Stage,
        specification: &RouterSpecification<A>,
    ) -> Result<(), ActorError>
    where
        A: Actor,
        Pr: ?Sized + Protocol<A, Proxy = P>,
    {
        for index in 0..specification.initial_routees {
            let proxy = stage.actor_for::<Pr, A>((specification.definition)(index))?;
            self.subscribe(Routee::of(proxy));
        }
        Ok(())
    }

    /// Appends `routee`. Returns `false` if it is already subscribed.
    pub fn subscribe(&mut self, routee: Routee<P>) -> bool {
        if self.routees.contains(&routee) {
            return false;
        }
        debug!(routee = %routee.address(), routees = self.routees.len() + 1, "Routee subscribed");
        self.routees.push(routee);
        true
    }

    /// Removes the routee for `address`. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, address: &Address) -> bool {
        let Some(index) = self
            .routees
            .iter()
            .position(|routee| routee.address() == address)
        else {
            return false;
        };
        self.routees.remove(index);
        self.strategy.routee_removed(index, self.routees.len());
        debug!(routee = %address, routees = self.routees.len(), "Routee unsubscribed");
        true
    }

    pub fn routees(&self) -> &[Routee<P>] {
        &self.routees
    }

    pub fn routee(&self, index: usize) -> Option<&Routee<P>> {
        self.routees.get(index)
    }

    pub fn len(&self) -> usize {
        self.routees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routees.is_empty()
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Asks the strategy for the next routing decision.
    pub fn compute_routing(&mut self) -> Routing {
        self.strategy.compute_routing(self.routees.as_slice())
    }

    /// Sends a command to every selected routee. With no routees this does nothing.
    pub fn dispatch_command(&mut self, command: impl Fn(&P)) {
        let routing = self.compute_routing();
        if routing.is_empty() {
            debug!("No routees, command dropped");
            return;
        }
        for &index in routing.indices() {
            command(self.routees[index].proxy());
        }
    }

    /// Sends a query to the first selected routee and relays its answer.
    ///
    /// Fails the returned handle with [`CompletesError::NoRoutees`] when there is nobody
    /// to ask.
    pub fn dispatch_query<T: Clone + Send + 'static>(
        &mut self,
        query: impl FnOnce(&P) -> Completes<T>,
    ) -> Completes<T> {
        match self.compute_routing().first() {
            Some(index) => query(self.routees[index].proxy()),
            None => Completes::failed(CompletesError::NoRoutees),
        }
    }
}

impl<P: Proxy, S: fmt::Debug> fmt::Debug for Router<P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routees", &self.routees)
            .field("strategy", &self.strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pending-message counts standing in for live routees.
    struct Mailboxes(Vec<usize>);

    impl RouteeSet for Mailboxes {
        fn len(&self) -> usize {
            self.0.len()
        }

        fn pending_messages(&self, index: usize) -> usize {
            self.0[index]
        }
    }

    fn picks(strategy: &mut impl RoutingStrategy, routees: &Mailboxes, rounds: usize) -> Vec<usize> {
        (0..rounds)
            .filter_map(|_| strategy.compute_routing(routees).first())
            .collect()
    }

    #[test]
    fn test_round_robin_cycles_in_order() {
        let mut strategy = RoundRobin::default();
        let routees = Mailboxes(vec![0, 0, 0]);
        assert_eq!(picks(&mut strategy, &routees, 7), vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_round_robin_continues_after_removal() {
        let mut strategy = RoundRobin::default();
        let three = Mailboxes(vec![0, 0, 0]);
        assert_eq!(picks(&mut strategy, &three, 1), vec![0]);

        // Remove the routee at index 1; the old index 2 becomes index 1.
        strategy.routee_removed(1, 2);
        let two = Mailboxes(vec![0, 0]);
        assert_eq!(picks(&mut strategy, &two, 3), vec![1, 0, 1]);
    }

    #[test]
    fn test_round_robin_removal_of_last_wraps_cursor() {
        let mut strategy = RoundRobin::default();
        let three = Mailboxes(vec![0, 0, 0]);
        picks(&mut strategy, &three, 2);
        assert_eq!(strategy.cursor(), 2);

        strategy.routee_removed(2, 2);
        assert_eq!(strategy.cursor(), 0);
        strategy.routee_removed(0, 0);
        assert!(strategy.compute_routing(&Mailboxes(vec![])).is_empty());
    }

    #[test]
    fn test_round_robin_removal_before_cursor_keeps_next_routee() {
        let mut strategy = RoundRobin::default();
        let three = Mailboxes(vec![0, 0, 0]);
        assert_eq!(picks(&mut strategy, &three, 2), vec![0, 1]);

        // The old index 2 is next in line and is now index 1.
        strategy.routee_removed(0, 2);
        assert_eq!(strategy.cursor(), 1);
        let two = Mailboxes(vec![0, 0]);
        assert_eq!(picks(&mut strategy, &two, 3), vec![1, 0, 1]);
    }

    #[test]
    fn test_smallest_mailbox_prefers_earliest_on_ties() {
        let mut strategy = SmallestMailbox;
        assert_eq!(
            strategy.compute_routing(&Mailboxes(vec![3, 1, 1, 2])),
            Routing::one(1)
        );
        assert!(strategy.compute_routing(&Mailboxes(vec![])).is_empty());
    }

    #[test]
    fn test_broadcast_and_random_stay_in_range() {
        let routees = Mailboxes(vec![0; 4]);
        assert_eq!(
            Broadcast.compute_routing(&routees).indices(),
            &[0, 1, 2, 3]
        );

        let mut random = RandomRouting;
        for _ in 0..100 {
            let index = random.compute_routing(&routees).first().unwrap();
            assert!(index < 4);
        }
    }
}
