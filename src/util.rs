//! Closure adapters for the stage traits.

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

use crate::proxy::{Emitter, Proxy, Receiver};
use crate::traits::{Consumer, Generator, Operator};

/// Helper function to create a generator from an async closure
///
/// ```rust
/// use pipestream::util::generator_fn;
///
/// let numbers = generator_fn(|mut out| async move {
///     for n in 0..3u8 {
///         if !out.emit(n).await.is_ready() {
///             break;
///         }
///     }
/// });
/// # let _ = numbers;
/// ```
pub fn generator_fn<F, Fut, T>(f: F) -> FnGenerator<F, Fut, T>
where
    F: Fn(Emitter<T>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
    T: Send + 'static,
{
    FnGenerator {
        f,
        _phantom: PhantomData,
    }
}

/// A generator created from a function
pub struct FnGenerator<F, Fut, T> {
    f: F,
    _phantom: PhantomData<fn() -> (Fut, T)>,
}

#[async_trait]
impl<F, Fut, T> Generator<T> for FnGenerator<F, Fut, T>
where
    F: Fn(Emitter<T>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
    T: Send + 'static,
{
    async fn generate(&self, out: Emitter<T>) {
        (self.f)(out).await
    }
}

/// Helper function to create an operator from an async closure
pub fn operator_fn<F, Fut, T>(f: F) -> FnOperator<F, Fut, T>
where
    F: Fn(Proxy<T>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
    T: Send + 'static,
{
    FnOperator {
        f,
        _phantom: PhantomData,
    }
}

/// An operator created from a function
pub struct FnOperator<F, Fut, T> {
    f: F,
    _phantom: PhantomData<fn() -> (Fut, T)>,
}

#[async_trait]
impl<F, Fut, T> Operator<T> for FnOperator<F, Fut, T>
where
    F: Fn(Proxy<T>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
    T: Send + 'static,
{
    async fn operate(&self, proxy: Proxy<T>) {
        (self.f)(proxy).await
    }
}

/// Helper function to create a consumer from an async closure
pub fn consumer_fn<F, Fut, T>(f: F) -> FnConsumer<F, Fut, T>
where
    F: Fn(Receiver<T>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
    T: Send + 'static,
{
    FnConsumer {
        f,
        _phantom: PhantomData,
    }
}

/// A consumer created from a function
pub struct FnConsumer<F, Fut, T> {
    f: F,
    _phantom: PhantomData<fn() -> (Fut, T)>,
}

#[async_trait]
impl<F, Fut, T> Consumer<T> for FnConsumer<F, Fut, T>
where
    F: Fn(Receiver<T>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
    T: Send + 'static,
{
    async fn consume(&self, input: Receiver<T>) {
        (self.f)(input).await
    }
}
