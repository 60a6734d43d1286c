//! # Plugins
//!
//! Plugins extend a stage at startup, mainly by registering mailbox types and mailbox
//! observers through the [`Registrar`]. Each plugin declares a `pass`; the
//! [`PluginLoader`] starts all pass-0 plugins before any pass-1 plugin, and so on, so a
//! later pass can rely on whatever an earlier pass registered.
//!
//! The two mailbox types the runtime ships with are plugins as well:
//! [`QueueMailboxPlugin`] (always installed) and [`RingBufferMailboxPlugin`].

use crate::error::{ActorError, PluginError};
use crate::mailbox::{
    ConcurrentQueueProvider, MailboxObserver, MailboxProvider, RingBufferProvider, QUEUE_MAILBOX,
    RING_BUFFER_MAILBOX,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Named set of string properties for a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfiguration {
    name: String,
    properties: BTreeMap<String, String>,
}

impl PluginConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Parses a property, returning `Ok(None)` when it is absent.
    pub fn parse_property<T: FromStr>(&self, key: &str) -> Result<Option<T>, PluginError> {
        match self.property(key) {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| PluginError::InvalidProperty {
                    property: key.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    /// This configuration with `overrides` applied on top. The name only changes when
    /// the override carries one.
    pub fn merged_with(&self, overrides: &PluginConfiguration) -> Self {
        let mut merged = self.clone();
        if !overrides.name.is_empty() {
            merged.name = overrides.name.clone();
        }
        merged.properties.extend(
            overrides
                .properties
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        merged
    }
}

/// Extension started by a stage before any actor exists.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Startup pass. Lower passes start first.
    fn pass(&self) -> u32;

    fn configuration(&self) -> &PluginConfiguration;

    /// Registers whatever the plugin contributes.
    async fn start(&self, registrar: &Registrar) -> Result<(), PluginError>;

    /// Releases what `start` acquired. Must be safe to call more than once.
    fn close(&self);

    /// A copy of this plugin with `overrides` merged into its configuration.
    fn with(&self, overrides: &PluginConfiguration) -> Box<dyn Plugin>;
}

/// Where a plugin is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Configured,
    Started,
    Closed,
}

/// Lifecycle flag shared by the built-in plugins.
#[derive(Debug, Default)]
pub struct PluginLifecycle {
    state: AtomicU8,
}

impl PluginLifecycle {
    const CONFIGURED: u8 = 0;
    const STARTED: u8 = 1;
    const CLOSED: u8 = 2;

    pub fn state(&self) -> PluginState {
        match self.state.load(Ordering::SeqCst) {
            Self::CONFIGURED => PluginState::Configured,
            Self::STARTED => PluginState::Started,
            _ => PluginState::Closed,
        }
    }

    pub fn mark_started(&self) {
        self.state.store(Self::STARTED, Ordering::SeqCst);
    }

    /// Returns `true` only for the first close.
    pub fn mark_closed(&self) -> bool {
        self.state.swap(Self::CLOSED, Ordering::SeqCst) != Self::CLOSED
    }
}

/// Collects what plugins contribute while they start.
#[derive(Default)]
pub struct Registrar {
    providers: Mutex<HashMap<String, Arc<dyn MailboxProvider>>>,
    default_mailbox: Mutex<Option<String>>,
    observers: Mutex<Vec<Arc<dyn MailboxObserver>>>,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mailbox type under `name`. A later registration under the same name
    /// replaces the earlier one.
    pub fn register_mailbox_provider(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn MailboxProvider>,
        is_default: bool,
    ) {
        let name = name.into();
        debug!(mailbox = %name, is_default, "Mailbox provider registered");
        if is_default {
            *self.default_mailbox.lock() = Some(name.clone());
        }
        self.providers.lock().insert(name, provider);
    }

    pub fn register_default_mailbox(&self, name: impl Into<String>) {
        *self.default_mailbox.lock() = Some(name.into());
    }

    pub fn register_mailbox_observer(&self, observer: Arc<dyn MailboxObserver>) {
        self.observers.lock().push(observer);
    }

    pub fn is_registered(&self, mailbox: &str) -> bool {
        self.providers.lock().contains_key(mailbox)
    }

    /// Freezes the registrations. `configured_default` takes precedence over any default
    /// registered by plugins.
    pub(crate) fn into_registry(
        self,
        configured_default: Option<&str>,
    ) -> Result<MailboxRegistry, ActorError> {
        let providers = self.providers.into_inner();
        let default = configured_default
            .map(str::to_string)
            .or_else(|| self.default_mailbox.into_inner())
            .unwrap_or_else(|| QUEUE_MAILBOX.to_string());
        if !providers.contains_key(&default) {
            return Err(ActorError::UnknownMailbox(default));
        }
        Ok(MailboxRegistry {
            providers,
            default,
            observers: Arc::from(self.observers.into_inner()),
        })
    }
}

/// Mailbox types available to a running stage.
pub(crate) struct MailboxRegistry {
    providers: HashMap<String, Arc<dyn MailboxProvider>>,
    default: String,
    observers: Arc<[Arc<dyn MailboxObserver>]>,
}

impl MailboxRegistry {
    pub(crate) fn provider(
        &self,
        mailbox: Option<&str>,
    ) -> Result<&Arc<dyn MailboxProvider>, ActorError> {
        let name = mailbox.unwrap_or(&self.default);
        self.providers
            .get(name)
            .ok_or_else(|| ActorError::UnknownMailbox(name.to_string()))
    }

    pub(crate) fn default_mailbox(&self) -> &str {
        &self.default
    }

    pub(crate) fn observers(&self) -> &Arc<[Arc<dyn MailboxObserver>]> {
        &self.observers
    }
}

/// Starts plugins pass by pass and closes them in reverse.
pub struct PluginLoader {
    started: Vec<Box<dyn Plugin>>,
}

impl PluginLoader {
    /// Starts `plugins` in ascending pass order. Within a pass, plugins start one after
    /// another in the order given.
    ///
    /// If one fails, every plugin already started is closed again and the error names
    /// the failing plugin.
    #[instrument(skip_all, fields(plugins = plugins.len()))]
    pub async fn start_all(
        plugins: Vec<Box<dyn Plugin>>,
        registrar: &Registrar,
    ) -> Result<Self, ActorError> {
        let mut passes: BTreeMap<u32, Vec<Box<dyn Plugin>>> = BTreeMap::new();
        for plugin in plugins {
            passes.entry(plugin.pass()).or_default().push(plugin);
        }

        let mut loader = Self {
            started: Vec::new(),
        };
        for (pass, plugins) in passes {
            for plugin in plugins {
                info!(plugin = plugin.name(), pass, "Starting plugin");
                if let Err(source) = plugin.start(registrar).await {
                    let name = plugin.name().to_string();
                    warn!(plugin = %name, pass, error = %source, "Plugin failed to start");
                    plugin.close();
                    loader.close_all();
                    return Err(ActorError::PluginStart {
                        plugin: name,
                        source,
                    });
                }
                loader.started.push(plugin);
            }
        }
        Ok(loader)
    }

    /// Names of the started plugins, in start order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.started.iter().map(|plugin| plugin.name()).collect()
    }

    /// Closes every started plugin, most recently started first.
    pub fn close_all(&mut self) {
        while let Some(plugin) = self.started.pop() {
            debug!(plugin = plugin.name(), "Closing plugin");
            plugin.close();
        }
    }
}

/// Registers the unbounded [`QUEUE_MAILBOX`] type.
pub struct QueueMailboxPlugin {
    configuration: PluginConfiguration,
    lifecycle: PluginLifecycle,
}

impl QueueMailboxPlugin {
    pub fn new() -> Self {
        Self {
            configuration: PluginConfiguration::new(QUEUE_MAILBOX).with_property("default", true),
            lifecycle: PluginLifecycle::default(),
        }
    }

    pub fn state(&self) -> PluginState {
        self.lifecycle.state()
    }
}

impl Default for QueueMailboxPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for QueueMailboxPlugin {
    fn name(&self) -> &str {
        self.configuration.name()
    }

    fn pass(&self) -> u32 {
        0
    }

    fn configuration(&self) -> &PluginConfiguration {
        &self.configuration
    }

    async fn start(&self, registrar: &Registrar) -> Result<(), PluginError> {
        let is_default = self.configuration.parse_property("default")?.unwrap_or(false);
        registrar.register_mailbox_provider(
            self.configuration.name(),
            Arc::new(ConcurrentQueueProvider),
            is_default,
        );
        self.lifecycle.mark_started();
        Ok(())
    }

    fn close(&self) {
        self.lifecycle.mark_closed();
    }

    fn with(&self, overrides: &PluginConfiguration) -> Box<dyn Plugin> {
        Box::new(Self {
            configuration: self.configuration.merged_with(overrides),
            lifecycle: PluginLifecycle::default(),
        })
    }
}

/// Registers the preallocated [`RING_BUFFER_MAILBOX`] type.
///
/// Properties: `size` (slots per mailbox, default 1024) and `default`.
pub struct RingBufferMailboxPlugin {
    configuration: PluginConfiguration,
    lifecycle: PluginLifecycle,
}

impl RingBufferMailboxPlugin {
    pub const DEFAULT_SIZE: usize = 1024;

    pub fn new() -> Self {
        Self::with_size(Self::DEFAULT_SIZE)
    }

    pub fn with_size(size: usize) -> Self {
        Self {
            configuration: PluginConfiguration::new(RING_BUFFER_MAILBOX)
                .with_property("size", size)
                .with_property("default", false),
            lifecycle: PluginLifecycle::default(),
        }
    }

    pub fn state(&self) -> PluginState {
        self.lifecycle.state()
    }
}

impl Default for RingBufferMailboxPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for RingBufferMailboxPlugin {
    fn name(&self) -> &str {
        self.configuration.name()
    }

    fn pass(&self) -> u32 {
        0
    }

    fn configuration(&self) -> &PluginConfiguration {
        &self.configuration
    }

    async fn start(&self, registrar: &Registrar) -> Result<(), PluginError> {
        let size: usize = self
            .configuration
            .parse_property("size")?
            .unwrap_or(Self::DEFAULT_SIZE);
        if size == 0 {
            return Err(PluginError::InvalidProperty {
                property: "size".to_string(),
                value: "0".to_string(),
            });
        }
        let is_default = self.configuration.parse_property("default")?.unwrap_or(false);
        registrar.register_mailbox_provider(
            self.configuration.name(),
            Arc::new(RingBufferProvider::new(size)),
            is_default,
        );
        self.lifecycle.mark_started();
        Ok(())
    }

    fn close(&self) {
        self.lifecycle.mark_closed();
    }

    fn with(&self, overrides: &PluginConfiguration) -> Box<dyn Plugin> {
        Box::new(Self {
            configuration: self.configuration.merged_with(overrides),
            lifecycle: PluginLifecycle::default(),
        })
    }
}
