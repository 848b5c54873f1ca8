//! Pipeline orchestration and execution.
//!
//! A [`Pipeline`] connects one producer, an ordered [`Flow`] of stages and one
//! consumer. [`Pipeline::exec`] derives a fresh [`Context`] from the caller's,
//! starts every stage as its own worker, runs the consumer on the calling
//! task and returns the first terminal error, if any.

pub mod flow;
pub mod parallel;

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;

use crate::channel::DEFAULT_CAPACITY;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::operators::Expand;
use crate::proxy::Proxy;
use crate::sinks::{CollectSink, ForEachSink};
use crate::sources::{IterSource, RangeSource, StreamSource};
use crate::traits::{Consumer, Generator, Operator, Producer, Runner};

pub use flow::{Flow, Source, Stage};
pub use parallel::Parallel;

/// Configuration for pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of every queue between stages
    pub buffer_size: usize,
    /// How long `exec` waits for stage workers to exit once the consumer is done
    pub drain_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_CAPACITY,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// A producer, a flow of stages and a consumer.
///
/// ```rust
/// use pipestream::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> pipestream::Result<()> {
/// let out = Pipeline::range(1, 10)
///     .filter(|x| x % 2 == 0)
///     .map(|x| x * 10)
///     .collect(&Context::background())
///     .await?;
/// assert_eq!(out, vec![20, 40, 60, 80, 100]);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<T> {
    source: Option<Arc<dyn Producer<T>>>,
    flow: Flow<T>,
    sink: Option<Arc<dyn Consumer<T>>>,
    config: PipelineConfig,
}

impl<T: Send + 'static> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline<i64> {
    /// A pipeline over the integers `from..=to`
    pub fn range(from: i64, to: i64) -> Self {
        Self::from_generator(RangeSource::new(from, to))
    }
}

impl<T: Send + 'static> Pipeline<T> {
    /// An empty pipeline; set a source and a sink before calling `exec`
    pub fn new() -> Self {
        Self {
            source: None,
            flow: Flow::new(),
            sink: None,
            config: PipelineConfig::default(),
        }
    }

    pub fn from_producer<P>(producer: P) -> Self
    where
        P: Producer<T> + 'static,
    {
        Self::new().source(producer)
    }

    pub fn from_generator<G>(generator: G) -> Self
    where
        G: Generator<T> + 'static,
    {
        Self::from_producer(Source::new(generator))
    }

    /// A pipeline over the items of `items`, in order
    pub fn from_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::from_generator(IterSource::new(items))
    }

    /// A pipeline over the items of an async stream
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + Unpin + 'static,
    {
        Self::from_generator(StreamSource::new(stream))
    }

    /// Replace the producer
    pub fn source<P>(mut self, producer: P) -> Self
    where
        P: Producer<T> + 'static,
    {
        self.source = Some(Arc::new(producer));
        self
    }

    /// Append the stages built by `build` to the flow
    pub fn flow<F>(mut self, build: F) -> Self
    where
        F: FnOnce(Flow<T>) -> Flow<T>,
    {
        self.flow = self.flow.then(build(Flow::new()));
        self
    }

    /// Apply `f` to the flow built so far
    fn with_flow(mut self, f: impl FnOnce(Flow<T>) -> Flow<T>) -> Self {
        self.flow = f(self.flow);
        self
    }

    pub fn add<O>(self, operator: O) -> Self
    where
        O: Operator<T> + 'static,
    {
        self.with_flow(|flow| flow.add(operator))
    }

    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.with_flow(|flow| flow.filter(predicate))
    }

    pub fn take<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.with_flow(|flow| flow.take(predicate))
    }

    pub fn drop_where<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.with_flow(|flow| flow.drop_where(predicate))
    }

    pub fn map<F>(self, f: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.with_flow(|flow| flow.map(f))
    }

    pub fn each<F>(self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.with_flow(|flow| flow.each(f))
    }

    pub fn process<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(T, &'a mut Proxy<T>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.with_flow(|flow| flow.process(f))
    }

    pub fn take_first(self, n: usize) -> Self {
        self.with_flow(|flow| flow.take_first(n))
    }

    pub fn drop_first(self, n: usize) -> Self {
        self.with_flow(|flow| flow.drop_first(n))
    }

    pub fn flatten(self) -> Self
    where
        T: Expand,
    {
        self.with_flow(|flow| flow.flatten())
    }

    /// Run every stage added so far as `replicas` concurrent copies
    pub fn parallel(self, replicas: usize) -> Self {
        self.with_flow(|flow| flow.parallel(replicas))
    }

    /// Set the consumer
    pub fn sink<C>(mut self, consumer: C) -> Self
    where
        C: Consumer<T> + 'static,
    {
        self.sink = Some(Arc::new(consumer));
        self
    }

    /// Set a consumer that calls `f` on every final value
    pub fn consume_each<F>(self, f: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.sink(ForEachSink::new(f))
    }

    /// Set the buffer size
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set how long `exec` waits for workers to exit
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.drain_timeout = timeout;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline to completion under a context derived from `parent`.
    ///
    /// Returns once the consumer has returned and the pipeline context is
    /// closed. The result is the context's terminal error: the first failure,
    /// panic, cancellation or deadline, or `Ok(())` on graceful completion.
    ///
    /// Before returning, `exec` waits up to [`PipelineConfig::drain_timeout`]
    /// for the stage workers to exit. A stage that ignores cancellation
    /// delays the return by at most that long and is then left running; the
    /// result is the same either way.
    pub async fn exec(self, parent: &Context) -> Result<()> {
        let Pipeline {
            source,
            flow,
            sink,
            config,
        } = self;
        let source = source.ok_or(Error::Incomplete("source"))?;
        let sink = sink.ok_or(Error::Incomplete("sink"))?;

        let ctx = Context::with_buffer_size(parent, config.buffer_size);
        tracing::debug!(
            stages = flow.len(),
            buffer_size = config.buffer_size,
            "pipeline executing"
        );

        let input = source.produce(&ctx);
        let output = flow.run(&ctx, input);
        ctx.guard(sink.consume(Proxy::receiver(ctx.clone(), output)))
            .await;

        // Pick up a parent cancellation or deadline the watcher has not
        // delivered yet, then finish gracefully unless something failed.
        let _ = ctx.status();
        let outcome = ctx.close(None);

        let drained = ctx.drain(config.drain_timeout).await;
        tracing::debug!(drained, ok = outcome.is_none(), "pipeline drained");

        match outcome {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run the pipeline and return every value that reached the end
    pub async fn collect(self, parent: &Context) -> Result<Vec<T>> {
        let sink = CollectSink::new();
        self.sink(sink.clone()).exec(parent).await?;
        Ok(sink.into_items().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{consumer_fn, generator_fn};

    #[tokio::test]
    async fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer_size, 128);
        assert_eq!(config.drain_timeout, Duration::from_secs(30));

        let pipeline = Pipeline::<u8>::new()
            .buffer_size(4)
            .drain_timeout(Duration::from_secs(1));
        assert_eq!(pipeline.config().buffer_size, 4);
        assert_eq!(pipeline.config().drain_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_incomplete_pipeline() {
        let ctx = Context::background();
        let err = Pipeline::<u8>::new().exec(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::Incomplete("source")));

        let err = Pipeline::from_iter(vec![1u8]).exec(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::Incomplete("sink")));
    }

    #[tokio::test]
    async fn test_flow_builder_appends() {
        let ctx = Context::background();
        let out = Pipeline::from_iter(1..=6)
            .filter(|x: &i32| x % 2 == 1)
            .flow(|f| f.map(|x| x + 100).drop_first(1))
            .collect(&ctx)
            .await
            .unwrap();
        assert_eq!(out, vec![103, 105]);
    }

    #[tokio::test]
    async fn test_consumer_fail_is_returned() {
        let ctx = Context::background();
        let result = Pipeline::from_iter(0..100)
            .sink(consumer_fn(|mut input: Proxy<i32>| async move {
                while input.next().await.is_ready() {
                    if input.get() == Some(&3) {
                        input.fail("three is not allowed");
                    }
                }
            }))
            .exec(&ctx)
            .await;
        assert_eq!(result.unwrap_err().to_string(), "three is not allowed");
        assert!(!ctx.is_done());
    }

    #[tokio::test]
    async fn test_done_error_is_graceful() {
        let ctx = Context::background();
        let result = Pipeline::from_generator(generator_fn(|mut out: Proxy<u8>| async move {
            let _ = out.emit(1).await;
            out.fail(Error::Done);
        }))
        .consume_each(|_| {})
        .exec(&ctx)
        .await;
        assert!(result.is_ok());
    }
}
