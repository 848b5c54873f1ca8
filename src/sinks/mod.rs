//! Ready-made consumers for the end of a pipeline.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

use crate::proxy::Receiver;
use crate::traits::Consumer;

/// A sink that collects items into a vector.
///
/// Clones share the same vector, so a clone kept by the caller can read what
/// the pipeline delivered.
pub struct CollectSink<T> {
    items: Arc<TokioMutex<Vec<T>>>,
}

impl<T: Send + 'static> CollectSink<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(TokioMutex::new(Vec::new())),
        }
    }

    /// Take the collected items, leaving the shared vector empty
    pub async fn into_items(self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock().await)
    }

    /// Get a clone of the items Arc for external access
    pub fn items(&self) -> Arc<TokioMutex<Vec<T>>> {
        self.items.clone()
    }
}

#[async_trait]
impl<T: Send + 'static> Consumer<T> for CollectSink<T> {
    async fn consume(&self, mut input: Receiver<T>) {
        while input.next().await.is_ready() {
            if let Some(item) = input.take() {
                self.items.lock().await.push(item);
            }
        }
    }
}

impl<T: Send + 'static> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

/// A sink that calls a function on every item.
pub struct ForEachSink<F> {
    f: F,
}

impl<F> ForEachSink<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<T, F> Consumer<T> for ForEachSink<F>
where
    T: Send + 'static,
    F: Fn(T) + Send + Sync,
{
    async fn consume(&self, mut input: Receiver<T>) {
        while input.next().await.is_ready() {
            if let Some(item) = input.take() {
                (self.f)(item);
            }
        }
    }
}

/// A sink that counts items and discards them
#[derive(Debug, Clone, Default)]
pub struct CountSink {
    count: Arc<AtomicUsize>,
}

impl CountSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<T: Send + 'static> Consumer<T> for CountSink {
    async fn consume(&self, mut input: Receiver<T>) {
        while input.next().await.is_ready() {
            input.take();
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }
}
