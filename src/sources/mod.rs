//! Ready-made generators for the common ways of feeding a pipeline.
//!
//! Each generator hands out its values once: a second `generate` call on the
//! same instance emits nothing.

use async_trait::async_trait;
use std::ops::RangeInclusive;
use tokio::sync::Mutex as TokioMutex;
use tokio_stream::{Stream, StreamExt};

use crate::proxy::Emitter;
use crate::traits::Generator;

/// Emits every item of an iterator in order.
pub struct IterSource<I> {
    iter: TokioMutex<Option<I>>,
}

impl<I: Iterator> IterSource<I> {
    pub fn new<C>(items: C) -> Self
    where
        C: IntoIterator<IntoIter = I>,
    {
        Self {
            iter: TokioMutex::new(Some(items.into_iter())),
        }
    }
}

#[async_trait]
impl<T, I> Generator<T> for IterSource<I>
where
    T: Send + 'static,
    I: Iterator<Item = T> + Send,
{
    async fn generate(&self, mut out: Emitter<T>) {
        let Some(iter) = self.iter.lock().await.take() else {
            return;
        };
        for item in iter {
            if !out.emit(item).await.is_ready() {
                break;
            }
        }
    }
}

/// Emits the integers of an inclusive range, `from` and `to` included.
pub struct RangeSource {
    inner: IterSource<RangeInclusive<i64>>,
}

impl RangeSource {
    pub fn new(from: i64, to: i64) -> Self {
        Self {
            inner: IterSource::new(from..=to),
        }
    }
}

#[async_trait]
impl Generator<i64> for RangeSource {
    async fn generate(&self, out: Emitter<i64>) {
        self.inner.generate(out).await
    }
}

/// Emits the items of an async stream until it ends or the context is done.
pub struct StreamSource<S> {
    stream: TokioMutex<Option<S>>,
}

impl<S> StreamSource<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: TokioMutex::new(Some(stream)),
        }
    }
}

#[async_trait]
impl<T, S> Generator<T> for StreamSource<S>
where
    T: Send + 'static,
    S: Stream<Item = T> + Send + Unpin,
{
    async fn generate(&self, mut out: Emitter<T>) {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return;
        };
        loop {
            // A quiet stream must not keep the worker alive past cancellation.
            let item = tokio::select! {
                biased;
                _ = out.context().done() => break,
                item = stream.next() => item,
            };
            let Some(item) = item else { break };
            if !out.emit(item).await.is_ready() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::context::Context;
    use crate::proxy::Proxy;
    use std::time::Duration;

    async fn run<G: Generator<T>, T: Send + 'static>(ctx: &Context, generator: &G) -> Vec<T> {
        let (inlet, outlet) = Channel::with_capacity(64).split();
        generator.generate(Proxy::emitter(ctx.clone(), inlet)).await;
        let mut out = Vec::new();
        while let Some(item) = outlet.recv().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn test_iter_source_emits_once() {
        let ctx = Context::background();
        let source = IterSource::new(vec!["a", "b"]);
        assert_eq!(run(&ctx, &source).await, vec!["a", "b"]);
        assert!(run(&ctx, &source).await.is_empty());
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let ctx = Context::background();
        assert_eq!(run(&ctx, &RangeSource::new(1, 5)).await, vec![1, 2, 3, 4, 5]);
        assert!(run(&ctx, &RangeSource::new(3, 2)).await.is_empty());
    }

    #[tokio::test]
    async fn test_stream_source() {
        let ctx = Context::background();
        let source = StreamSource::new(tokio_stream::iter(vec![3u8, 1, 2]));
        assert_eq!(run(&ctx, &source).await, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_pending_stream_ends_on_cancel() {
        let ctx = Context::background();
        let source = StreamSource::new(tokio_stream::pending::<u8>());

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let out = tokio::time::timeout(Duration::from_secs(1), run(&ctx, &source))
            .await
            .expect("stream source should end on cancel");
        assert!(out.is_empty());
    }
}
