//! Bounded FIFO queues connecting pipeline stages.
//!
//! A [`Channel`] is split into exactly one write capability ([`Inlet`]) and a
//! read capability ([`Outlet`]) that may be cloned to give several workers
//! competing access to the same queue. Closing consumes the `Inlet`, so writing
//! after close or closing twice cannot be expressed.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Capacity used for stage queues unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 128;

/// A bounded queue before it is split into its two ends.
pub struct Channel<T> {
    inlet: Inlet<T>,
    outlet: Outlet<T>,
}

impl<T: Send> Channel<T> {
    /// Create a channel with [`DEFAULT_CAPACITY`]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a channel buffering at most `capacity` values (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            inlet: Inlet { tx, capacity },
            outlet: Outlet {
                rx: Arc::new(Mutex::new(rx)),
                capacity,
            },
        }
    }

    /// Split into the write and read capabilities
    pub fn split(self) -> (Inlet<T>, Outlet<T>) {
        (self.inlet, self.outlet)
    }
}

impl<T: Send> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write capability of a [`Channel`].
///
/// Owned by the single worker that feeds the queue. Dropping it closes the
/// queue just like [`Inlet::close`].
pub struct Inlet<T> {
    tx: mpsc::Sender<T>,
    capacity: usize,
}

impl<T: Send> Inlet<T> {
    /// Push a value, waiting while the queue is full.
    ///
    /// Returns the value back if every reader has gone away.
    pub async fn send(&self, item: T) -> std::result::Result<(), T> {
        self.tx.send(item).await.map_err(|e| e.0)
    }

    /// Signal end-of-stream. Readers drain what is buffered, then see `None`.
    pub fn close(self) {
        drop(self);
    }

    /// Whether every reader has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Another handle onto the same queue for fan-in relays. The queue closes
    /// once the original and every share are gone.
    pub(crate) fn share(&self) -> Inlet<T> {
        Inlet {
            tx: self.tx.clone(),
            capacity: self.capacity,
        }
    }
}

/// Read capability of a [`Channel`].
///
/// Clones read from the same queue; each value is delivered to exactly one of
/// them.
pub struct Outlet<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
    capacity: usize,
}

impl<T: Send> Outlet<T> {
    /// Pull the next value, waiting while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and drained. Cancel safe.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Number of buffered values, or `None` if another reader is mid-receive
    pub fn len(&self) -> Option<usize> {
        self.rx.try_lock().ok().map(|rx| rx.len())
    }

    /// Whether the queue is currently empty, or `None` if another reader is mid-receive
    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Clone for Outlet<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            capacity: self.capacity,
        }
    }
}
