//! Typed notification bus owned by a session or manager

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Per-owner publish/subscribe channel.
///
/// `emit` hands the event to every live subscriber synchronously, in
/// subscription order. Once closed, existing receivers observe end of stream
/// and new subscriptions are closed immediately.
pub struct EventBus<E: Clone> {
    inner: Mutex<BusInner<E>>,
}

struct BusInner<E> {
    subscribers: Vec<mpsc::UnboundedSender<E>>,
    closed: bool,
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BusInner {
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        rx
    }

    /// Deliver an event, returning how many subscribers received it
    pub fn emit(&self, event: E) -> usize {
        let mut inner = self.inner.lock();
        // Dropped receivers are pruned here.
        inner
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
        inner.subscribers.len()
    }

    /// Drop every subscriber and refuse new ones
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
