//! Change-notification bus for cart consumers.
//!
//! Every mounted surface (header badge, cart page, product page)
//! subscribes to the store it was handed. Notifications are
//! deliberately payload-free: the durable record is the single source
//! of truth, so consumers re-read it on every notification instead of
//! trusting in-memory deltas.

use crate::error::CartError;
use std::sync::mpsc::{self, Receiver};
use std::sync::Mutex;
use std::time::Duration;

/// Where a cart change came from, as seen by one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A mutation made through this store.
    Local,
    /// A write observed on the shared storage from another context.
    External,
}

/// A cart changed; re-read before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartEvent {
    pub origin: ChangeOrigin,
}

/// A subscription to a stream of messages.
///
/// Designed for single-threaded consumption: one surface drains its
/// subscription on its own event-loop tick.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub(crate) fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently queued, returning the message count.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        while self.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

/// In-process pub/sub with broadcast semantics: every subscriber gets a
/// copy of every published event. Dead subscribers are dropped on
/// publish.
#[derive(Debug, Default)]
pub struct ChangeBus {
    subscribers: Mutex<Vec<mpsc::Sender<CartEvent>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<CartEvent> {
        let (tx, rx) = mpsc::channel();
        // A poisoned lock yields a subscription that never fires; the
        // subscriber still re-reads on its own ticks.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        Subscription::new(rx)
    }

    pub fn publish(&self, event: CartEvent) -> Result<(), CartError> {
        let mut subs = self.subscribers.lock().map_err(|_| CartError::Poisoned)?;
        subs.retain(|tx| tx.send(event).is_ok());
        Ok(())
    }

    /// Number of live subscribers (diagnostics only).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}
