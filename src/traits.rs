//! Stage capabilities of the pipeline.
//!
//! A pipeline is built from three kinds of user routines, each of which only
//! sees a [`Proxy`](crate::proxy::Proxy):
//!
//! - a [`Generator`] emits values,
//! - an [`Operator`] pulls values and emits transformed ones,
//! - a [`Consumer`] drains the final queue.
//!
//! The wrapping layer turns generators and operators into [`Producer`]s and
//! [`Runner`]s, which spawn a worker per stage and hand back the read end of
//! that stage's output queue without waiting for it.

use async_trait::async_trait;

use crate::channel::Outlet;
use crate::context::Context;
use crate::proxy::{Emitter, Proxy, Receiver};

/// A routine that emits the values of a pipeline.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pipestream::proxy::Emitter;
/// use pipestream::traits::Generator;
///
/// struct Countdown(u32);
///
/// #[async_trait]
/// impl Generator<u32> for Countdown {
///     async fn generate(&self, mut out: Emitter<u32>) {
///         for n in (0..=self.0).rev() {
///             if !out.emit(n).await.is_ready() {
///                 break;
///             }
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Generator<T: Send + 'static>: Send + Sync {
    /// Emit values until done or until `emit` stops returning `Ready`.
    ///
    /// The output queue is closed when `out` is dropped.
    async fn generate(&self, out: Emitter<T>);
}

/// A routine that transforms one queue of values into another.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pipestream::proxy::Proxy;
/// use pipestream::traits::Operator;
///
/// struct Double;
///
/// #[async_trait]
/// impl Operator<i64> for Double {
///     async fn operate(&self, mut proxy: Proxy<i64>) {
///         while proxy.next().await.is_ready() {
///             let Some(item) = proxy.take() else { continue };
///             if !proxy.emit(item * 2).await.is_ready() {
///                 break;
///             }
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Operator<T: Send + 'static>: Send + Sync {
    /// Drive the transformation until the input is exhausted or a step
    /// reports that the stage should stop.
    async fn operate(&self, proxy: Proxy<T>);
}

/// A routine that drains the final queue of a pipeline.
///
/// Its only outputs are side effects, or a terminal error via
/// [`Proxy::fail`](crate::proxy::Proxy::fail).
#[async_trait]
pub trait Consumer<T: Send + 'static>: Send + Sync {
    async fn consume(&self, input: Receiver<T>);
}

/// Anything that, given a context, starts emitting and returns the read end
/// of its output queue.
pub trait Producer<T: Send + 'static>: Send + Sync {
    fn produce(&self, ctx: &Context) -> Outlet<T>;
}

/// Anything that, given a context and an input queue, starts transforming
/// and returns the read end of its output queue.
pub trait Runner<T: Send + 'static>: Send + Sync {
    fn run(&self, ctx: &Context, input: Outlet<T>) -> Outlet<T>;

    /// Label used for the worker's tracing span
    fn name(&self) -> &str {
        "stage"
    }
}
