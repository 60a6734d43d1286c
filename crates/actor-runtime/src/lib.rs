//! # Actor Runtime
//!
//! This crate provides the message-passing core of an actor runtime: typed protocols
//! whose calls become mailbox messages, a shared dispatcher that multiplexes many actors
//! onto a few tokio workers, and the services around them (dead letters, timers,
//! routers and startup plugins).
//!
//! ## Why a Shared Dispatcher?
//!
//! A task per actor is the simplest actor design, but it ties actor count to task count
//! and gives no control over fairness. Here every actor owns only a [`Mailbox`]; a fixed
//! pool of workers drains whichever mailboxes have work, at most `throughput` messages
//! at a time. Thousands of mostly idle actors cost a queue each, not a task each.
//!
//! **Further Reading**:
//! - [Actor Model (Wikipedia)](https://en.wikipedia.org/wiki/Actor_model) - Foundational concurrency pattern by Carl Hewitt
//! - [Actors in Rust](https://ryhl.io/blog/actors-with-tokio/) - Practical guide to implementing actors with Tokio
//!
//! ## Architecture Overview
//!
//! The runtime separates concerns into three layers:
//!
//! 1. **Protocol Layer** ([`actor_protocol!`]) - the traits your actors implement and the proxies callers hold
//! 2. **Runtime Layer** ([`Stage`], [`Mailbox`], [`Dispatcher`]) - message queuing, scheduling and execution
//! 3. **Services** ([`DeadLetters`], [`Scheduler`], [`Router`], [`Plugin`]) - everything around delivery
//!
//! ## Core Abstractions
//!
//! ### Protocols and Proxies
//!
//! A protocol is a trait whose methods return nothing (commands) or a [`Completes<T>`]
//! (queries). The [`actor_protocol!`] macro generates a proxy type implementing the same
//! calls as messages:
//!
//! ```rust
//! use actor_runtime::{actor_protocol, Actor, Completes, Definition, Stage, StageConfig};
//!
//! actor_protocol! {
//!     pub trait Greeter {
//!         fn greet(&mut self, name: String);
//!         fn greeted(&mut self) -> Completes<usize>;
//!     }
//! }
//!
//! #[derive(Default)]
//! struct GreeterActor {
//!     greeted: usize,
//!     last: Option<String>,
//! }
//!
//! impl Actor for GreeterActor {}
//!
//! impl Greeter for GreeterActor {
//!     fn greet(&mut self, name: String) {
//!         self.greeted += 1;
//!         self.last = Some(name);
//!     }
//!
//!     fn greeted(&mut self) -> Completes<usize> {
//!         Completes::with(self.greeted)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), actor_runtime::ActorError> {
//!     let stage = Stage::builder(StageConfig::named("greetings")).start().await?;
//!     let greeter = stage.actor_for::<dyn Greeter, _>(Definition::has(GreeterActor::default()))?;
//!
//!     greeter.greet("Ada".to_string());
//!     greeter.greet("Grace".to_string());
//!     assert_eq!(greeter.greeted().outcome().await, Ok(2));
//!
//!     stage.terminate().await;
//!     Ok(())
//! }
//! ```
//!
//! ### Delivery Guarantees
//!
//! - Messages from one sender to one actor execute in the order they were sent
//! - An actor never executes two messages at the same time
//! - A call against a stopped actor is never executed; it becomes one [`DeadLetter`]
//! - A panicking message is logged and skipped; the actor keeps running
//!
//! ## Concurrency Model
//!
//! - Actors do not own tasks; the [`Dispatcher`] workers execute them on demand
//! - A mailbox is scheduled at most once at a time, guarded by an atomic token
//! - Proxies are `Clone + Send + Sync` and can be shared freely
//! - Query answers travel back through [`Completes`], which can be awaited or consumed
//!
//! ## Testing
//!
//! Protocol proxies can be pointed at any [`ProtocolTarget`], so unit tests can run a
//! protocol inline against a plain struct. For end-to-end tests, start a real [`Stage`]
//! inside `#[tokio::test]` and await query results with [`Completes::outcome_within`].

pub mod actor;
pub mod address;
pub mod completes;
pub mod config;
pub mod dead_letters;
pub mod dispatcher;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod plugin;
pub mod protocol;
pub mod reference;
pub mod router;
pub mod scheduler;
pub mod stage;
pub mod tracing;

// Re-export core types for convenience
pub use actor::{Actor, ActorCell, Context, Definition};
pub use address::{Address, AddressFactory};
pub use completes::{Completes, Outcome};
pub use config::StageConfig;
pub use dead_letters::{DeadLetter, DeadLetterReason, DeadLetters};
pub use dispatcher::Dispatcher;
pub use error::{ActorError, CompletesError, MailboxError, PluginError};
pub use mailbox::{
    ConcurrentQueue, ConcurrentQueueProvider, Mailbox, MailboxObserver, MailboxProvider,
    MessageQueue, RingBufferProvider, RingBufferQueue, QUEUE_MAILBOX, RING_BUFFER_MAILBOX,
};
pub use message::{Consumer, Message};
pub use plugin::{
    Plugin, PluginConfiguration, PluginLifecycle, PluginLoader, PluginState, QueueMailboxPlugin,
    Registrar, RingBufferMailboxPlugin,
};
pub use reference::{ActorRef, Protocol, ProtocolTarget, Proxy};
pub use router::{
    Broadcast, RandomRouting, RoundRobin, Routee, RouteeSet, Router, RouterSpecification,
    Routing, RoutingStrategy, SmallestMailbox,
};
pub use scheduler::{Cancellable, Repeat, Scheduled, ScheduledProxy, Scheduler};
pub use stage::{Stage, StageBuilder};

#[doc(hidden)]
pub mod __private {
    pub use paste::paste;
}
