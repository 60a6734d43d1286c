//! # Dispatcher
//!
//! The dispatcher is a fixed pool of worker tasks on the tokio runtime that pull ready
//! mailboxes from a shared channel and drain them. Thousands of actors therefore share
//! `pool_size` workers instead of owning a task each.
//!
//! A mailbox enters the ready channel only when its `scheduled` token flips, so the same
//! mailbox is never queued twice and never drained by two workers at once.

use crate::mailbox::Mailbox;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

type ReadyQueue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<Mailbox>>>>;

struct DispatcherInner {
    ready: Mutex<Option<mpsc::UnboundedSender<Arc<Mailbox>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pool_size: usize,
}

/// Shared worker pool draining ready mailboxes.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Spawns `pool_size` workers on `handle`.
    pub fn start(handle: &Handle, pool_size: usize) -> Self {
        let pool_size = pool_size.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver: ReadyQueue = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..pool_size)
            .map(|worker| handle.spawn(work(worker, Arc::clone(&receiver))))
            .collect();
        info!(pool_size, "Dispatcher started");

        Self {
            inner: Arc::new(DispatcherInner {
                ready: Mutex::new(Some(sender)),
                workers: Mutex::new(workers),
                pool_size,
            }),
        }
    }

    /// A dispatcher that refuses all work. Mailboxes bound to it can only be drained by
    /// calling [`Mailbox::run`] directly.
    pub fn closed() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                ready: Mutex::new(None),
                workers: Mutex::new(Vec::new()),
                pool_size: 0,
            }),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.inner.pool_size
    }

    pub fn is_closed(&self) -> bool {
        self.inner.ready.lock().is_none()
    }

    /// Queues `mailbox` for draining. Returns `false` once the dispatcher is closed.
    pub fn execute(&self, mailbox: Arc<Mailbox>) -> bool {
        match self.inner.ready.lock().as_ref() {
            Some(ready) => ready.send(mailbox).is_ok(),
            None => false,
        }
    }

    /// Stops accepting mailboxes. Workers finish what is already queued, then exit.
    pub fn close(&self) {
        if self.inner.ready.lock().take().is_some() {
            info!(pool_size = self.inner.pool_size, "Dispatcher closing");
        }
    }

    /// Waits for every worker to exit. Only returns after [`Dispatcher::close`].
    pub async fn join(&self) {
        let workers = std::mem::take(&mut *self.inner.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
    }
}

async fn work(worker: usize, ready: ReadyQueue) {
    debug!(worker, "Dispatcher worker started");
    loop {
        let next = ready.lock().await.recv().await;
        let Some(mailbox) = next else {
            break;
        };
        mailbox.run();
        tokio::task::yield_now().await;
    }
    debug!(worker, "Dispatcher worker stopped");
}
