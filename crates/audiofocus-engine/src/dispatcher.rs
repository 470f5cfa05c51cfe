//! Per-subscriber delivery of interrupt and volume events.
//!
//! Each subscription owns an unbounded queue. Publishing only enqueues, so a
//! slow handler never holds up the arbiter; handlers run on their own
//! delivery thread and see their events in publish order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use tracing::{debug, trace};

use audiofocus_ipc::{InterruptEvent, StreamId, VolumeEvent};

use crate::metrics::MetricsCollector;

/// Identifies one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

struct Subscriber<E> {
    id: SubscriptionId,
    tx: Sender<E>,
    live: Arc<AtomicBool>,
}

impl<E> Subscriber<E> {
    fn close(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

/// Pull side of a subscription.
///
/// Events still queued when the subscription ends are discarded.
pub struct Subscription<E> {
    id: SubscriptionId,
    rx: Receiver<E>,
    live: Arc<AtomicBool>,
    metrics: Arc<MetricsCollector>,
}

impl<E> Subscription<E> {
    /// Subscription handle.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns true until the subscription is removed.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<E> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => self.accept(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Next event if one is queued.
    pub fn try_recv(&self) -> Option<E> {
        self.rx.try_recv().ok().and_then(|event| self.accept(event))
    }

    /// Drain every queued event.
    pub fn drain(&self) -> Vec<E> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    fn accept(&self, event: E) -> Option<E> {
        if self.is_live() {
            self.metrics.record_delivered();
            Some(event)
        } else {
            self.metrics.record_dropped();
            None
        }
    }
}

/// Delivers events to subscribed owners.
pub struct NotificationDispatcher {
    interrupt: RwLock<BTreeMap<StreamId, Vec<Subscriber<InterruptEvent>>>>,
    volume: RwLock<Vec<Subscriber<VolumeEvent>>>,
    next_id: AtomicU64,
    metrics: Arc<MetricsCollector>,
}

impl NotificationDispatcher {
    /// Create a dispatcher reporting into `metrics`.
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            interrupt: RwLock::new(BTreeMap::new()),
            volume: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            metrics,
        }
    }

    /// Run `handler` on its own thread for every interrupt event of `stream`.
    pub fn on_interrupt<F>(&self, stream: StreamId, handler: F) -> SubscriptionId
    where
        F: Fn(InterruptEvent) + Send + 'static,
    {
        let (subscriber, rx) = self.subscriber();
        let id = subscriber.id;
        self.spawn_delivery(rx, Arc::clone(&subscriber.live), handler);
        self.interrupt.write().entry(stream).or_default().push(subscriber);

        debug!(%stream, subscription = id.0, "Interrupt handler subscribed");
        id
    }

    /// Queue interrupt events of `stream` for the caller to pull.
    pub fn subscribe_interrupt(&self, stream: StreamId) -> Subscription<InterruptEvent> {
        let (subscriber, rx) = self.subscriber();
        let subscription = self.subscription(&subscriber, rx);
        self.interrupt.write().entry(stream).or_default().push(subscriber);

        debug!(%stream, subscription = subscription.id.0, "Interrupt receiver subscribed");
        subscription
    }

    /// Remove every interrupt subscription of `stream`. Idempotent.
    pub fn off_interrupt(&self, stream: StreamId) {
        if let Some(subscribers) = self.interrupt.write().remove(&stream) {
            subscribers.iter().for_each(Subscriber::close);
            debug!(%stream, count = subscribers.len(), "Interrupt subscriptions removed");
        }
    }

    /// Run `handler` on its own thread for every volume event.
    pub fn on_volume_change<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(VolumeEvent) + Send + 'static,
    {
        let (subscriber, rx) = self.subscriber();
        let id = subscriber.id;
        self.spawn_delivery(rx, Arc::clone(&subscriber.live), handler);
        self.volume.write().push(subscriber);
        id
    }

    /// Queue volume events for the caller to pull.
    pub fn subscribe_volume(&self) -> Subscription<VolumeEvent> {
        let (subscriber, rx) = self.subscriber();
        let subscription = self.subscription(&subscriber, rx);
        self.volume.write().push(subscriber);
        subscription
    }

    /// Remove every volume subscription. Idempotent.
    pub fn off_volume_change(&self) {
        let subscribers = std::mem::take(&mut *self.volume.write());
        subscribers.iter().for_each(Subscriber::close);
    }

    /// Remove a single subscription of either kind. Idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut interrupt = self.interrupt.write();
        for subscribers in interrupt.values_mut() {
            remove_subscriber(subscribers, id);
        }
        interrupt.retain(|_, subscribers| !subscribers.is_empty());
        drop(interrupt);

        remove_subscriber(&mut self.volume.write(), id);
    }

    /// Enqueue one event for every live subscription of `stream`.
    pub fn publish_interrupt(&self, stream: StreamId, event: InterruptEvent) {
        trace!(%stream, hint = ?event.hint_type, "Publishing interrupt event");
        if let Some(subscribers) = self.interrupt.read().get(&stream) {
            self.enqueue(subscribers, event);
        }
    }

    /// Enqueue one event for every volume subscription.
    pub fn publish_volume(&self, event: VolumeEvent) {
        trace!(volume_type = ?event.volume_type, volume = event.volume, "Publishing volume event");
        self.enqueue(&self.volume.read(), event);
    }

    /// Returns true if `stream` has at least one interrupt subscription.
    pub fn has_interrupt_subscribers(&self, stream: StreamId) -> bool {
        self.interrupt.read().contains_key(&stream)
    }

    fn enqueue<E: Clone>(&self, subscribers: &[Subscriber<E>], event: E) {
        for subscriber in subscribers {
            if subscriber.tx.send(event.clone()).is_ok() {
                self.metrics.record_published();
            } else {
                self.metrics.record_dropped();
            }
        }
    }

    fn subscriber<E>(&self) -> (Subscriber<E>, Receiver<E>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let subscriber = Subscriber {
            id: SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            tx,
            live: Arc::new(AtomicBool::new(true)),
        };
        (subscriber, rx)
    }

    fn subscription<E>(&self, subscriber: &Subscriber<E>, rx: Receiver<E>) -> Subscription<E> {
        Subscription {
            id: subscriber.id,
            rx,
            live: Arc::clone(&subscriber.live),
            metrics: Arc::clone(&self.metrics),
        }
    }

    fn spawn_delivery<E, F>(&self, rx: Receiver<E>, live: Arc<AtomicBool>, handler: F)
    where
        E: Send + 'static,
        F: Fn(E) + Send + 'static,
    {
        let metrics = Arc::clone(&self.metrics);

        // Ends once the subscriber's sender is dropped and the queue is drained
        thread::spawn(move || {
            for event in rx.iter() {
                if live.load(Ordering::SeqCst) {
                    handler(event);
                    metrics.record_delivered();
                } else {
                    metrics.record_dropped();
                }
            }
        });
    }
}

fn remove_subscriber<E>(subscribers: &mut Vec<Subscriber<E>>, id: SubscriptionId) {
    subscribers.retain(|s| {
        if s.id == id {
            s.close();
            false
        } else {
            true
        }
    });
}

impl Drop for NotificationDispatcher {
    fn drop(&mut self) {
        for subscribers in self.interrupt.get_mut().values() {
            subscribers.iter().for_each(Subscriber::close);
        }
        self.volume.get_mut().iter().for_each(Subscriber::close);
    }
}
