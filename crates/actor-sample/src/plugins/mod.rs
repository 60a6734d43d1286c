//! # Stage Plugins
//!
//! [`PendingMessagesPlugin`] shows how a plugin extends a stage without touching actor
//! code: during startup it registers a [`MailboxObserver`] that keeps the current and
//! peak queue depth of every mailbox.
//!
//! It starts in pass 1, after the mailbox plugins of pass 0.

use actor_runtime::{
    Address, MailboxObserver, Plugin, PluginConfiguration, PluginError, PluginLifecycle,
    PluginState, Registrar,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Queue depth of one mailbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Depth {
    pub pending: usize,
    pub peak: usize,
}

/// Observer recording pending messages per address.
#[derive(Debug, Default)]
pub struct PendingMessages {
    depths: Mutex<HashMap<Address, Depth>>,
}

impl PendingMessages {
    pub fn depth(&self, address: &Address) -> Option<Depth> {
        self.depths.lock().get(address).copied()
    }

    /// Deepest queue seen on any mailbox still open.
    pub fn peak(&self) -> usize {
        self.depths
            .lock()
            .values()
            .map(|depth| depth.peak)
            .max()
            .unwrap_or(0)
    }

    pub fn tracked(&self) -> usize {
        self.depths.lock().len()
    }

    fn record(&self, address: &Address, pending: usize) {
        let mut depths = self.depths.lock();
        let depth = depths.entry(address.clone()).or_default();
        depth.pending = pending;
        depth.peak = depth.peak.max(pending);
    }
}

impl MailboxObserver for PendingMessages {
    fn on_send(&self, address: &Address, pending: usize) {
        self.record(address, pending);
    }

    fn on_receive(&self, address: &Address, pending: usize) {
        self.record(address, pending);
    }

    fn on_close(&self, address: &Address) {
        if let Some(depth) = self.depths.lock().remove(address) {
            debug!(%address, peak = depth.peak, "Mailbox closed");
        }
    }
}

pub struct PendingMessagesPlugin {
    configuration: PluginConfiguration,
    lifecycle: PluginLifecycle,
    observer: Arc<PendingMessages>,
}

impl PendingMessagesPlugin {
    pub const NAME: &'static str = "pendingMessages";

    pub fn new() -> Self {
        Self {
            configuration: PluginConfiguration::new(Self::NAME),
            lifecycle: PluginLifecycle::default(),
            observer: Arc::new(PendingMessages::default()),
        }
    }

    /// The observer this plugin registers. Shared with every copy made by `with`.
    pub fn observer(&self) -> Arc<PendingMessages> {
        Arc::clone(&self.observer)
    }

    pub fn state(&self) -> PluginState {
        self.lifecycle.state()
    }
}

impl Default for PendingMessagesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for PendingMessagesPlugin {
    fn name(&self) -> &str {
        self.configuration.name()
    }

    fn pass(&self) -> u32 {
        1
    }

    fn configuration(&self) -> &PluginConfiguration {
        &self.configuration
    }

    async fn start(&self, registrar: &Registrar) -> Result<(), PluginError> {
        registrar.register_mailbox_observer(self.observer.clone());
        self.lifecycle.mark_started();
        Ok(())
    }

    fn close(&self) {
        if self.lifecycle.mark_closed() {
            info!(
                plugin = self.name(),
                peak = self.observer.peak(),
                "Pending messages plugin closed"
            );
        }
    }

    fn with(&self, overrides: &PluginConfiguration) -> Box<dyn Plugin> {
        Box::new(Self {
            configuration: self.configuration.merged_with(overrides),
            lifecycle: PluginLifecycle::default(),
            observer: Arc::clone(&self.observer),
        })
    }
}
