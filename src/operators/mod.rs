//! Standard operators built on the [`Proxy`] cursor.
//!
//! Each operator runs as one stage worker. They all follow the same loop:
//! pull with `next`, decide, push with `emit`, and return as soon as either
//! step stops reporting [`Step::Ready`](crate::proxy::Step::Ready).

mod flatten;

pub use flatten::{Expand, Expansion, Flatten};

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::proxy::Proxy;
use crate::traits::Operator;

/// Forwards the values for which the predicate holds.
pub struct Filter<F> {
    predicate: F,
}

impl<F> Filter<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<T, F> Operator<T> for Filter<F>
where
    T: Send + 'static,
    F: Fn(&T) -> bool + Send + Sync,
{
    async fn operate(&self, mut proxy: Proxy<T>) {
        while proxy.next().await.is_ready() {
            let Some(item) = proxy.take() else { continue };
            if !(self.predicate)(&item) {
                continue;
            }
            if !proxy.emit(item).await.is_ready() {
                break;
            }
        }
    }
}

/// Replaces each value with the result of a function.
pub struct Map<F> {
    f: F,
}

impl<F> Map<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<T, F> Operator<T> for Map<F>
where
    T: Send + 'static,
    F: Fn(T) -> T + Send + Sync,
{
    async fn operate(&self, mut proxy: Proxy<T>) {
        while proxy.next().await.is_ready() {
            let Some(item) = proxy.take() else { continue };
            if !proxy.emit((self.f)(item)).await.is_ready() {
                break;
            }
        }
    }
}

/// Calls a side-effecting callback on every value, then forwards it.
pub struct Each<F> {
    f: F,
}

impl<F> Each<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<T, F> Operator<T> for Each<F>
where
    T: Send + 'static,
    F: Fn(&T) + Send + Sync,
{
    async fn operate(&self, mut proxy: Proxy<T>) {
        while proxy.next().await.is_ready() {
            let Some(item) = proxy.take() else { continue };
            (self.f)(&item);
            if !proxy.emit(item).await.is_ready() {
                break;
            }
        }
    }
}

/// Hands every value together with the proxy to a callback, which may emit
/// any number of outputs for it.
///
/// ```rust
/// use pipestream::operators::Process;
///
/// // Emit every value twice.
/// let twice = Process::new(|item: u32, proxy: &mut pipestream::Proxy<u32>| {
///     Box::pin(async move {
///         if proxy.emit(item).await.is_ready() {
///             let _ = proxy.emit(item).await;
///         }
///     }) as futures::future::BoxFuture<'_, ()>
/// });
/// # let _ = twice;
/// ```
pub struct Process<F> {
    f: F,
}

impl<F> Process<F> {
    pub fn new<T>(f: F) -> Self
    where
        T: Send + 'static,
        F: for<'a> Fn(T, &'a mut Proxy<T>) -> BoxFuture<'a, ()> + Send + Sync,
    {
        Self { f }
    }
}

#[async_trait]
impl<T, F> Operator<T> for Process<F>
where
    T: Send + 'static,
    F: for<'a> Fn(T, &'a mut Proxy<T>) -> BoxFuture<'a, ()> + Send + Sync,
{
    async fn operate(&self, mut proxy: Proxy<T>) {
        // The callback sees emit failures itself; a stopped or cancelled
        // proxy ends the loop on the following `next`.
        while proxy.next().await.is_ready() {
            let Some(item) = proxy.take() else { continue };
            (self.f)(item, &mut proxy).await;
        }
    }
}

/// Forwards the first `limit` values, then stops the stage gracefully.
pub struct TakeFirst {
    limit: usize,
}

impl TakeFirst {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl<T: Send + 'static> Operator<T> for TakeFirst {
    async fn operate(&self, mut proxy: Proxy<T>) {
        let mut taken = 0;
        while taken < self.limit && proxy.next().await.is_ready() {
            let Some(item) = proxy.take() else { continue };
            if !proxy.emit(item).await.is_ready() {
                return;
            }
            taken += 1;
        }
        if taken == self.limit {
            proxy.stop();
        }
    }
}

/// Discards the first `count` values and forwards the rest.
pub struct DropFirst {
    count: usize,
}

impl DropFirst {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

#[async_trait]
impl<T: Send + 'static> Operator<T> for DropFirst {
    async fn operate(&self, mut proxy: Proxy<T>) {
        let mut dropped = 0;
        while dropped < self.count && proxy.next().await.is_ready() {
            proxy.take();
            dropped += 1;
        }
        while proxy.next().await.is_ready() {
            let Some(item) = proxy.take() else { continue };
            if !proxy.emit(item).await.is_ready() {
                break;
            }
        }
    }
}
