//! # Mailboxes
//!
//! A [`Mailbox`] is the per-actor FIFO queue plus the scheduling contract that guarantees
//! single-consumer execution. The storage itself is pluggable through [`MessageQueue`]:
//!
//! - [`ConcurrentQueue`] - unbounded queue, the default (`queueMailbox`).
//! - [`RingBufferQueue`] - bounded ring whose slots are allocated once up front
//!   (`ringBufferMailbox`). Proxies detect it via [`Mailbox::is_preallocated`] and write
//!   calls straight into a slot with [`Mailbox::send_preallocated`].
//!
//! ## Scheduling
//!
//! The mailbox owns a `scheduled` token. Whoever flips it from idle to scheduled hands
//! the mailbox to the [`Dispatcher`]; every other sender just appends. A drain executes
//! at most `throughput` messages, then releases the token and re-schedules itself if
//! messages arrived in the meantime, so a busy actor cannot starve the pool.
//!
//! A second `draining` flag makes overlapping [`Mailbox::run`] calls harmless: only one
//! of them pops messages, the other returns immediately.

use crate::address::Address;
use crate::dispatcher::Dispatcher;
use crate::error::MailboxError;
use crate::message::{Consumer, Message};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{error, trace, warn};

/// Registered name of the unbounded queue mailbox.
pub const QUEUE_MAILBOX: &str = "queueMailbox";

/// Registered name of the preallocated ring buffer mailbox.
pub const RING_BUFFER_MAILBOX: &str = "ringBufferMailbox";

/// Storage behind a [`Mailbox`].
pub trait MessageQueue: Send + Sync {
    fn push(&self, message: Message) -> Result<(), MailboxError>;

    /// Writes a call directly into queue storage. Queues without preallocated storage
    /// just wrap the parts into a [`Message`].
    fn push_parts(
        &self,
        target: Address,
        representation: &'static str,
        consumer: Consumer,
    ) -> Result<(), MailboxError> {
        self.push(Message::new(target, representation, consumer))
    }

    /// Appends a message that capacity must not refuse, such as a stop request.
    ///
    /// Bounded queues keep it behind everything already queued and report themselves
    /// full until it has been popped.
    fn push_overflow(&self, message: Message);

    fn pop(&self) -> Option<Message>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_preallocated(&self) -> bool {
        false
    }

    /// Removes everything still queued, oldest first.
    fn drain(&self) -> Vec<Message> {
        let mut drained = Vec::with_capacity(self.len());
        while let Some(message) = self.pop() {
            drained.push(message);
        }
        drained
    }
}

/// Unbounded FIFO queue.
#[derive(Default)]
pub struct ConcurrentQueue {
    messages: Mutex<VecDeque<Message>>,
}

impl ConcurrentQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageQueue for ConcurrentQueue {
    fn push(&self, message: Message) -> Result<(), MailboxError> {
        self.messages.lock().push_back(message);
        Ok(())
    }

    fn push_overflow(&self, message: Message) {
        self.messages.lock().push_back(message);
    }

    fn pop(&self) -> Option<Message> {
        self.messages.lock().pop_front()
    }

    fn len(&self) -> usize {
        self.messages.lock().len()
    }
}

struct Ring {
    slots: Box<[Option<Message>]>,
    head: usize,
    len: usize,
    overflow: VecDeque<Message>,
}

/// Bounded FIFO ring with all slots allocated at construction.
///
/// A full ring rejects new messages with [`MailboxError::Full`]. Messages pushed with
/// [`MessageQueue::push_overflow`] wait behind the ring contents.
pub struct RingBufferQueue {
    ring: Mutex<Ring>,
}

impl RingBufferQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                len: 0,
                overflow: VecDeque::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().slots.len()
    }
}

impl MessageQueue for RingBufferQueue {
    fn push(&self, message: Message) -> Result<(), MailboxError> {
        let mut ring = self.ring.lock();
        let capacity = ring.slots.len();
        if ring.len == capacity || !ring.overflow.is_empty() {
            return Err(MailboxError::Full);
        }
        let index = (ring.head + ring.len) % capacity;
        ring.slots[index] = Some(message);
        ring.len += 1;
        Ok(())
    }

    fn push_overflow(&self, message: Message) {
        let mut ring = self.ring.lock();
        if ring.len < ring.slots.len() && ring.overflow.is_empty() {
            let index = (ring.head + ring.len) % ring.slots.len();
            ring.slots[index] = Some(message);
            ring.len += 1;
        } else {
            ring.overflow.push_back(message);
        }
    }

    fn pop(&self) -> Option<Message> {
        let mut ring = self.ring.lock();
        if ring.len == 0 {
            return ring.overflow.pop_front();
        }
        let capacity = ring.slots.len();
        let head = ring.head;
        ring.head = (head + 1) % capacity;
        ring.len -= 1;
        ring.slots[head].take()
    }

    fn len(&self) -> usize {
        let ring = self.ring.lock();
        ring.len + ring.overflow.len()
    }

    fn is_preallocated(&self) -> bool {
        true
    }
}

/// Optional telemetry hook notified as messages flow through a mailbox.
///
/// All methods default to no-ops; observers never influence delivery.
pub trait MailboxObserver: Send + Sync {
    fn on_send(&self, _address: &Address, _pending: usize) {}

    fn on_receive(&self, _address: &Address, _pending: usize) {}

    fn on_close(&self, _address: &Address) {}
}

/// Creates queue storage for new actors. Installed through the plugin registrar.
pub trait MailboxProvider: Send + Sync {
    fn provide_queue(&self, address: &Address) -> Box<dyn MessageQueue>;
}

/// Provides [`ConcurrentQueue`] storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConcurrentQueueProvider;

impl MailboxProvider for ConcurrentQueueProvider {
    fn provide_queue(&self, _address: &Address) -> Box<dyn MessageQueue> {
        Box::new(ConcurrentQueue::new())
    }
}

/// Provides [`RingBufferQueue`] storage of a fixed capacity.
#[derive(Debug, Clone, Copy)]
pub struct RingBufferProvider {
    capacity: usize,
}

impl RingBufferProvider {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl MailboxProvider for RingBufferProvider {
    fn provide_queue(&self, _address: &Address) -> Box<dyn MessageQueue> {
        Box::new(RingBufferQueue::new(self.capacity))
    }
}

/// Per-actor message queue with a single-drain scheduling guarantee.
pub struct Mailbox {
    address: Address,
    queue: Box<dyn MessageQueue>,
    closed: RwLock<bool>,
    scheduled: AtomicBool,
    draining: AtomicBool,
    throughput: usize,
    dispatcher: Dispatcher,
    observers: Arc<[Arc<dyn MailboxObserver>]>,
    myself: Weak<Mailbox>,
}

impl Mailbox {
    pub fn new(
        address: Address,
        queue: Box<dyn MessageQueue>,
        dispatcher: Dispatcher,
        throughput: usize,
        observers: Arc<[Arc<dyn MailboxObserver>]>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|myself| Self {
            address,
            queue,
            closed: RwLock::new(false),
            scheduled: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            throughput: throughput.max(1),
            dispatcher,
            observers,
            myself: myself.clone(),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn is_preallocated(&self) -> bool {
        self.queue.is_preallocated()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    pub fn pending_messages(&self) -> usize {
        self.queue.len()
    }

    /// Appends a boxed message and schedules the mailbox if it was idle.
    pub fn send(&self, message: Message) -> Result<(), MailboxError> {
        self.enqueue(|queue| queue.push(message))
    }

    /// Zero-copy variant used by proxies when [`Mailbox::is_preallocated`] is true.
    ///
    /// Ordering and delivery are the same as [`Mailbox::send`].
    pub fn send_preallocated(
        &self,
        representation: &'static str,
        consumer: Consumer,
    ) -> Result<(), MailboxError> {
        let target = self.address.clone();
        self.enqueue(|queue| queue.push_parts(target, representation, consumer))
    }

    /// Appends a message regardless of queue capacity. Only a closed mailbox refuses it.
    pub fn send_overflow(&self, message: Message) -> Result<(), MailboxError> {
        self.enqueue(|queue| {
            queue.push_overflow(message);
            Ok(())
        })
    }

    fn enqueue(
        &self,
        push: impl FnOnce(&dyn MessageQueue) -> Result<(), MailboxError>,
    ) -> Result<(), MailboxError> {
        {
            let closed = self.closed.read();
            if *closed {
                return Err(MailboxError::Closed);
            }
            push(self.queue.as_ref())?;
        }

        if !self.observers.is_empty() {
            let pending = self.queue.len();
            for observer in self.observers.iter() {
                observer.on_send(&self.address, pending);
            }
        }
        self.schedule();
        Ok(())
    }

    fn schedule(&self) {
        if self.scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let accepted = match self.myself.upgrade() {
            Some(mailbox) => self.dispatcher.execute(mailbox),
            None => false,
        };
        if !accepted {
            self.scheduled.store(false, Ordering::SeqCst);
            warn!(address = %self.address, pending = self.queue.len(), "Dispatcher closed, mailbox not scheduled");
        }
    }

    /// Drains up to `throughput` messages in arrival order.
    ///
    /// Panics raised by a message are logged and contained; the drain moves on to the
    /// next message.
    pub fn run(&self) {
        if self.draining.swap(true, Ordering::SeqCst) {
            return;
        }

        for _ in 0..self.throughput {
            let Some(message) = self.queue.pop() else {
                break;
            };
            if !self.observers.is_empty() {
                let pending = self.queue.len();
                for observer in self.observers.iter() {
                    observer.on_receive(&self.address, pending);
                }
            }

            let representation = message.representation();
            trace!(address = %self.address, representation, "Deliver");
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| message.deliver())) {
                error!(
                    address = %self.address,
                    representation,
                    panic = panic_message(panic.as_ref()),
                    "Message execution panicked"
                );
            }
        }

        self.draining.store(false, Ordering::SeqCst);
        self.scheduled.store(false, Ordering::SeqCst);
        if !self.queue.is_empty() && !self.is_closed() {
            self.schedule();
        }
    }

    /// Closes the mailbox and returns the messages that were still queued.
    ///
    /// Later sends fail with [`MailboxError::Closed`]. Closing twice returns nothing the
    /// second time.
    pub fn close(&self) -> Vec<Message> {
        let pending = {
            let mut closed = self.closed.write();
            if *closed {
                return Vec::new();
            }
            *closed = true;
            self.queue.drain()
        };
        for observer in self.observers.iter() {
            observer.on_close(&self.address);
        }
        pending
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressFactory;
    use std::sync::atomic::AtomicUsize;

    fn message(factory: &AddressFactory, log: &Arc<Mutex<Vec<u32>>>, value: u32) -> Message {
        let log = Arc::clone(log);
        Message::new(
            factory.unique(),
            "Test::record(u32)",
            Box::new(move || log.lock().push(value)),
        )
    }

    #[test]
    fn test_concurrent_queue_is_fifo() {
        let factory = AddressFactory::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = ConcurrentQueue::new();
        for value in 0..5 {
            queue.push(message(&factory, &log, value)).unwrap();
        }
        assert_eq!(queue.len(), 5);
        while let Some(message) = queue.pop() {
            message.deliver();
        }
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_ring_buffer_wraps_and_rejects_when_full() {
        let factory = AddressFactory::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let ring = RingBufferQueue::new(3);
        assert!(ring.is_preallocated());

        for value in 0..3 {
            ring.push(message(&factory, &log, value)).unwrap();
        }
        assert_eq!(
            ring.push(message(&factory, &log, 99)).unwrap_err(),
            MailboxError::Full
        );

        ring.pop().unwrap().deliver();
        let log_clone = Arc::clone(&log);
        ring.push_parts(
            factory.unique(),
            "Test::record(u32)",
            Box::new(move || log_clone.lock().push(3)),
        )
        .unwrap();

        for message in ring.drain() {
            message.deliver();
        }
        assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 3);
    }

    #[test]
    fn test_full_ring_accepts_overflow_behind_queued_messages() {
        let factory = AddressFactory::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mailbox = Mailbox::new(
            factory.unique(),
            Box::new(RingBufferQueue::new(2)),
            Dispatcher::closed(),
            16,
            Arc::from(Vec::new()),
        );

        mailbox.send(message(&factory, &log, 1)).unwrap();
        mailbox.send(message(&factory, &log, 2)).unwrap();
        mailbox.send_overflow(message(&factory, &log, 3)).unwrap();
        assert_eq!(mailbox.pending_messages(), 3);

        mailbox.run();
        assert_eq!(*log.lock(), vec![1, 2, 3]);
        assert_eq!(mailbox.pending_messages(), 0);
    }

    #[test]
    fn test_ring_stays_full_until_overflow_is_taken() {
        let factory = AddressFactory::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let ring = RingBufferQueue::new(1);

        ring.push(message(&factory, &log, 1)).unwrap();
        ring.push_overflow(message(&factory, &log, 2));
        ring.pop().unwrap().deliver();
        assert_eq!(
            ring.push(message(&factory, &log, 99)).unwrap_err(),
            MailboxError::Full
        );

        ring.pop().unwrap().deliver();
        ring.push(message(&factory, &log, 3)).unwrap();
        for message in ring.drain() {
            message.deliver();
        }
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_closed_mailbox_refuses_overflow() {
        let factory = AddressFactory::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mailbox = Mailbox::new(
            factory.unique(),
            Box::new(RingBufferQueue::new(1)),
            Dispatcher::closed(),
            16,
            Arc::from(Vec::new()),
        );
        mailbox.close();
        assert_eq!(
            mailbox.send_overflow(message(&factory, &log, 1)).unwrap_err(),
            MailboxError::Closed
        );
    }

    #[test]
    fn test_closed_mailbox_rejects_and_returns_pending() {
        let factory = AddressFactory::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::closed();
        let mailbox = Mailbox::new(
            factory.unique(),
            Box::new(ConcurrentQueue::new()),
            dispatcher,
            8,
            Arc::from(Vec::new()),
        );

        mailbox.send(message(&factory, &log, 1)).unwrap();
        mailbox.send(message(&factory, &log, 2)).unwrap();
        let pending = mailbox.close();
        assert_eq!(pending.len(), 2);
        assert!(mailbox.close().is_empty());
        assert_eq!(
            mailbox.send(message(&factory, &log, 3)).unwrap_err(),
            MailboxError::Closed
        );
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_overlapping_runs_never_execute_concurrently() {
        let factory = AddressFactory::new();
        let mailbox = Mailbox::new(
            factory.unique(),
            Box::new(ConcurrentQueue::new()),
            Dispatcher::closed(),
            usize::MAX,
            Arc::from(Vec::new()),
        );

        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let executed = Arc::new(AtomicUsize::new(0));
        for _ in 0..2_000 {
            let active = Arc::clone(&active);
            let overlaps = Arc::clone(&overlaps);
            let executed = Arc::clone(&executed);
            mailbox
                .send(Message::new(
                    factory.unique(),
                    "Test::enter()",
                    Box::new(move || {
                        if active.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        std::hint::spin_loop();
                        active.fetch_sub(1, Ordering::SeqCst);
                        executed.fetch_add(1, Ordering::SeqCst);
                    }),
                ))
                .unwrap();
        }

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    while !mailbox.queue.is_empty() {
                        mailbox.run();
                    }
                });
            }
        });

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(executed.load(Ordering::SeqCst), 2_000);
    }

    #[test]
    fn test_panicking_message_does_not_stop_the_drain() {
        let factory = AddressFactory::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mailbox = Mailbox::new(
            factory.unique(),
            Box::new(ConcurrentQueue::new()),
            Dispatcher::closed(),
            16,
            Arc::from(Vec::new()),
        );
        mailbox.send(message(&factory, &log, 1)).unwrap();
        mailbox
            .send(Message::new(
                factory.unique(),
                "Test::explode()",
                Box::new(|| panic!("boom")),
            ))
            .unwrap();
        mailbox.send(message(&factory, &log, 2)).unwrap();

        mailbox.run();
        assert_eq!(*log.lock(), vec![1, 2]);
    }
}
