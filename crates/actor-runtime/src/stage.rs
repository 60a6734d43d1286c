//! # Stage
//!
//! The [`Stage`] is the runtime container: it owns the dispatcher, the scheduler, the
//! dead letters sink, the registered mailbox types and the directory of live actors.
//!
//! ## Lifecycle
//!
//! 1.  **Start**: [`Stage::builder`] collects configuration and plugins;
//!     [`StageBuilder::start`] runs the plugins pass by pass and spawns the dispatcher
//!     workers on the current tokio runtime.
//! 2.  **Run**: [`Stage::actor_for`] creates actors and hands back their proxies.
//! 3.  **Terminate**: [`Stage::terminate`] cancels all timers, stops every actor,
//!     waits for them to finish (bounded by `terminate_timeout_ms`), closes the plugins
//!     in reverse start order and shuts the dispatcher down.

use crate::actor::{Actor, ActorCell, Definition, Stoppable};
use crate::address::{Address, AddressFactory};
use crate::config::StageConfig;
use crate::dead_letters::DeadLetters;
use crate::dispatcher::Dispatcher;
use crate::error::ActorError;
use crate::mailbox::{Mailbox, QUEUE_MAILBOX};
use crate::plugin::{MailboxRegistry, Plugin, PluginLoader, QueueMailboxPlugin, Registrar};
use crate::reference::{ActorRef, Protocol};
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Collects configuration and plugins for a new [`Stage`].
pub struct StageBuilder {
    config: StageConfig,
    plugins: Vec<Box<dyn Plugin>>,
}

impl StageBuilder {
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn with_boxed_plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Starts the plugins and the dispatcher.
    ///
    /// Must be called from within a tokio runtime. The queue mailbox plugin is added
    /// ahead of the supplied plugins unless one with the same name was supplied, so a
    /// supplied plugin can still claim the default mailbox.
    #[instrument(skip(self), fields(stage = %self.config.name))]
    pub async fn start(mut self) -> Result<Stage, ActorError> {
        let handle = Handle::try_current().map_err(|_| ActorError::NoRuntime)?;

        if !self.plugins.iter().any(|plugin| plugin.name() == QUEUE_MAILBOX) {
            self.plugins.insert(0, Box::new(QueueMailboxPlugin::new()));
        }

        let registrar = Registrar::new();
        let mut plugins = PluginLoader::start_all(self.plugins, &registrar).await?;
        let mailboxes = match registrar.into_registry(self.config.default_mailbox.as_deref()) {
            Ok(mailboxes) => mailboxes,
            Err(error) => {
                plugins.close_all();
                return Err(error);
            }
        };

        let dispatcher = Dispatcher::start(&handle, self.config.pool_size);
        let stage = Stage {
            inner: Arc::new(StageInner {
                addresses: AddressFactory::new(),
                dispatcher,
                dead_letters: DeadLetters::new(self.config.dead_letter_capacity),
                scheduler: Scheduler::new(handle),
                mailboxes,
                directory: Mutex::new(HashMap::new()),
                plugins: Mutex::new(plugins),
                terminated: AtomicBool::new(false),
                config: self.config,
            }),
        };

        info!(
            pool_size = stage.inner.dispatcher.pool_size(),
            default_mailbox = stage.inner.mailboxes.default_mailbox(),
            plugins = ?stage.inner.plugins.lock().plugin_names(),
            "Stage started"
        );
        Ok(stage)
    }
}

struct StageInner {
    config: StageConfig,
    addresses: AddressFactory,
    dispatcher: Dispatcher,
    dead_letters: DeadLetters,
    scheduler: Scheduler,
    mailboxes: MailboxRegistry,
    directory: Mutex<HashMap<Address, Arc<dyn Stoppable>>>,
    plugins: Mutex<PluginLoader>,
    terminated: AtomicBool,
}

/// Runtime container for actors. Cheap to clone.
#[derive(Clone)]
pub struct Stage {
    inner: Arc<StageInner>,
}

impl Stage {
    pub fn builder(config: StageConfig) -> StageBuilder {
        StageBuilder {
            config,
            plugins: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &StageConfig {
        &self.inner.config
    }

    pub fn address_factory(&self) -> &AddressFactory {
        &self.inner.addresses
    }

    pub fn dead_letters(&self) -> &DeadLetters {
        &self.inner.dead_letters
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn default_mailbox(&self) -> &str {
        self.inner.mailboxes.default_mailbox()
    }

    /// Number of live actors.
    pub fn actor_count(&self) -> usize {
        self.inner.directory.lock().len()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::SeqCst)
    }

    /// Creates an actor from `definition` and returns its proxy for protocol `P`.
    ///
    /// ```rust,ignore
    /// let worker = stage.actor_for::<dyn Worker, _>(Definition::has(WorkerActor::new()))?;
    /// ```
    pub fn actor_for<P, A>(&self, definition: Definition<A>) -> Result<P::Proxy, ActorError>
    where
        P: ?Sized + Protocol<A>,
        A: Actor,
    {
        let cell = self.spawn(definition)?;
        Ok(P::proxy(ActorRef::new(cell)))
    }

    fn spawn<A: Actor>(&self, definition: Definition<A>) -> Result<Arc<ActorCell<A>>, ActorError> {
        if self.is_terminated() {
            return Err(ActorError::StageTerminated);
        }

        let (actor, name, address, mailbox) = definition.into_parts();
        let provider = self.inner.mailboxes.provider(mailbox.as_deref())?;
        let address = match (address, name) {
            (Some(address), _) => address,
            (None, Some(name)) => self.inner.addresses.unique_with(name),
            (None, None) => self.inner.addresses.unique(),
        };

        let mailbox = Mailbox::new(
            address.clone(),
            provider.provide_queue(&address),
            self.inner.dispatcher.clone(),
            self.inner.config.throughput,
            Arc::clone(self.inner.mailboxes.observers()),
        );
        let cell = ActorCell::new(actor, mailbox, self.clone());

        {
            let mut directory = self.inner.directory.lock();
            if directory.contains_key(&address) {
                return Err(ActorError::AddressInUse(address));
            }
            directory.insert(address.clone(), cell.clone() as Arc<dyn Stoppable>);
        }

        cell.start();
        debug!(
            actor_type = std::any::type_name::<A>().split("::").last().unwrap_or("Unknown"),
            %address,
            "Actor created"
        );
        Ok(cell)
    }

    pub(crate) fn unregister(&self, address: &Address) {
        self.inner.directory.lock().remove(address);
    }

    /// Stops everything. Calling it again is a no-op.
    #[instrument(skip(self), fields(stage = %self.name()))]
    pub async fn terminate(&self) {
        if self.inner.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(actors = self.actor_count(), "Stage terminating");

        self.inner.scheduler.close();

        let actors: Vec<Arc<dyn Stoppable>> = self
            .inner
            .directory
            .lock()
            .values()
            .filter(|actor| !actor.is_stopped())
            .cloned()
            .collect();
        let pending: Vec<_> = actors
            .into_iter()
            .map(|actor| {
                let terminated = actor.terminated();
                let address = actor.address().clone();
                actor.request_stop();
                (address, terminated)
            })
            .collect();

        let deadline = Instant::now() + self.inner.config.terminate_timeout();
        for (address, terminated) in pending {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if terminated.outcome_within(remaining).await.is_err() {
                warn!(%address, "Actor did not stop before the terminate timeout");
            }
        }

        self.inner.plugins.lock().close_all();
        self.inner.dispatcher.close();
        self.inner.dispatcher.join().await;
        self.inner.directory.lock().clear();
        info!(dead_letters = self.inner.dead_letters.total(), "Stage terminated");
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name())
            .field("actors", &self.actor_count())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
