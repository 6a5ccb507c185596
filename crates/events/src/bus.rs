//! Publish/subscribe mechanics for committed events.
//!
//! The log is the source of truth; the bus only fans committed envelopes out
//! to listeners after the append. A listener that joins late sees nothing
//! from before it subscribed and must rebuild from the store instead.

use std::sync::mpsc::{Receiver, RecvError, TryRecvError};

/// One listener's queue. Every subscriber sees every message published
/// after it subscribed, in publish order.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message. Errors once the bus is gone.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }
}

pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}
