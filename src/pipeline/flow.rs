//! Stage wrappers and the ordered operator chain.

use futures::future::BoxFuture;
use std::sync::Arc;

use crate::channel::{Channel, Outlet};
use crate::context::Context;
use crate::operators::{DropFirst, Each, Expand, Filter, Flatten, Map, Process, TakeFirst};
use crate::pipeline::parallel::Parallel;
use crate::proxy::Proxy;
use crate::traits::{Generator, Operator, Producer, Runner};

/// Turns a [`Generator`] into a [`Producer`] that runs it on its own worker.
pub struct Source<G> {
    generator: Arc<G>,
    name: &'static str,
}

impl<G> Source<G> {
    pub fn new(generator: G) -> Self {
        Self::named("source", generator)
    }

    pub fn named(name: &'static str, generator: G) -> Self {
        Self {
            generator: Arc::new(generator),
            name,
        }
    }
}

impl<T, G> Producer<T> for Source<G>
where
    T: Send + 'static,
    G: Generator<T> + 'static,
{
    fn produce(&self, ctx: &Context) -> Outlet<T> {
        let (inlet, outlet) = Channel::with_capacity(ctx.buffer_size()).split();
        let generator = self.generator.clone();
        let hold = inlet.share();
        let emitter = Proxy::emitter(ctx.clone(), inlet);
        // The queue closes however the worker ends, but never before a panic
        // has reached the context.
        ctx.spawn_holding(self.name, hold, async move {
            generator.generate(emitter).await;
        });
        outlet
    }
}

/// Turns an [`Operator`] into a [`Runner`] that runs it on its own worker.
pub struct Stage<O> {
    operator: Arc<O>,
    name: &'static str,
}

impl<O> Stage<O> {
    pub fn new(operator: O) -> Self {
        Self::named("operator", operator)
    }

    pub fn named(name: &'static str, operator: O) -> Self {
        Self {
            operator: Arc::new(operator),
            name,
        }
    }
}

impl<T, O> Runner<T> for Stage<O>
where
    T: Send + 'static,
    O: Operator<T> + 'static,
{
    fn run(&self, ctx: &Context, input: Outlet<T>) -> Outlet<T> {
        let (inlet, outlet) = Channel::with_capacity(ctx.buffer_size()).split();
        let operator = self.operator.clone();
        let hold = inlet.share();
        let proxy = Proxy::new(ctx.clone(), input, inlet);
        ctx.spawn_holding(self.name, hold, async move {
            operator.operate(proxy).await;
        });
        outlet
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// An ordered chain of stages.
///
/// Running a flow threads the input queue through every stage in order; each
/// stage spawns exactly one worker. A flow is itself a [`Runner`], so a whole
/// chain can be wrapped by a transform such as [`Flow::parallel`].
pub struct Flow<T> {
    stages: Vec<Arc<dyn Runner<T>>>,
}

impl<T> Clone for Flow<T> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<T: Send + 'static> Default for Flow<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Flow<T> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Append an operator as a new stage
    pub fn add<O>(self, operator: O) -> Self
    where
        O: Operator<T> + 'static,
    {
        self.add_runner(Stage::new(operator))
    }

    /// Append an already-wrapped runner
    pub fn add_runner<R>(mut self, runner: R) -> Self
    where
        R: Runner<T> + 'static,
    {
        self.stages.push(Arc::new(runner));
        self
    }

    /// Append every stage of `other` after the stages of this flow
    pub fn then(mut self, other: Flow<T>) -> Self {
        self.stages.extend(other.stages);
        self
    }

    /// Replace the whole flow built so far with `f` applied to it
    pub fn transform<F>(self, f: F) -> Self
    where
        F: FnOnce(Arc<dyn Runner<T>>) -> Arc<dyn Runner<T>>,
    {
        Self {
            stages: vec![f(Arc::new(self))],
        }
    }

    /// Run everything added so far as `replicas` concurrent copies sharing
    /// one input queue. Output order across replicas is not preserved.
    pub fn parallel(self, replicas: usize) -> Self {
        self.transform(|inner| Arc::new(Parallel::new(inner, replicas)))
    }

    /// Keep the values matching `predicate`
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.add_runner(Stage::named("filter", Filter::new(predicate)))
    }

    /// Same as [`filter`](Self::filter)
    pub fn take<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter(predicate)
    }

    /// Discard the values matching `predicate`
    pub fn drop_where<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter(move |item| !predicate(item))
    }

    pub fn map<F>(self, f: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.add_runner(Stage::named("map", Map::new(f)))
    }

    /// Call `f` on each value before forwarding it
    pub fn each<F>(self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add_runner(Stage::named("each", Each::new(f)))
    }

    /// Hand each value and the stage's proxy to `f`
    pub fn process<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(T, &'a mut Proxy<T>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.add_runner(Stage::named("process", Process::new(f)))
    }

    /// Forward only the first `n` values
    pub fn take_first(self, n: usize) -> Self {
        self.add_runner(Stage::named("take_first", TakeFirst::new(n)))
    }

    /// Skip the first `n` values
    pub fn drop_first(self, n: usize) -> Self {
        self.add_runner(Stage::named("drop_first", DropFirst::new(n)))
    }

    /// Expand sequence-valued items into their elements
    pub fn flatten(self) -> Self
    where
        T: Expand,
    {
        self.add_runner(Stage::named("flatten", Flatten::new()))
    }
}

impl<T: Send + 'static> Runner<T> for Flow<T> {
    fn run(&self, ctx: &Context, input: Outlet<T>) -> Outlet<T> {
        self.stages
            .iter()
            .fold(input, |input, stage| stage.run(ctx, input))
    }

    fn name(&self) -> &str {
        "flow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::generator_fn;

    async fn drain(outlet: Outlet<i32>) -> Vec<i32> {
        let mut out = Vec::new();
        while let Some(item) = outlet.recv().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn test_source_closes_queue_when_done() {
        let ctx = Context::background();
        let source = Source::new(generator_fn(|mut out| async move {
            for i in 0..3 {
                let _ = out.emit(i).await;
            }
        }));
        let outlet = source.produce(&ctx);
        assert_eq!(drain(outlet).await, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_source_panic_closes_queue_and_context() {
        let ctx = Context::background();
        let source = Source::new(generator_fn(|mut out: Proxy<i32>| async move {
            let _ = out.emit(1).await;
            panic!("generator blew up");
        }));
        let outlet = source.produce(&ctx);
        // The queue ends rather than hanging, whatever made it through first.
        let _ = drain(outlet).await;
        assert!(matches!(ctx.err(), Some(crate::Error::Panic(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stage_panic_recorded_before_queue_closes() {
        for _ in 0..200 {
            let ctx = Context::background();
            let flow = Flow::new().map(|x: i32| {
                if x == 2 {
                    panic!("bad value {}", x);
                }
                x
            });

            let (inlet, outlet) = Channel::new().split();
            for i in 1..=3 {
                inlet.send(i).await.unwrap();
            }
            inlet.close();

            let _ = drain(flow.run(&ctx, outlet)).await;
            assert!(matches!(ctx.err(), Some(crate::Error::Panic(_))));
        }
    }

    #[tokio::test]
    async fn test_flow_runs_in_order() {
        let ctx = Context::background();
        let flow = Flow::new()
            .filter(|x: &i32| x % 2 == 0)
            .map(|x| x * 10)
            .drop_where(|x| *x == 40);
        assert_eq!(flow.len(), 3);

        let (inlet, outlet) = Channel::new().split();
        for i in 1..=6 {
            inlet.send(i).await.unwrap();
        }
        inlet.close();

        assert_eq!(drain(flow.run(&ctx, outlet)).await, vec![20, 60]);
    }

    #[tokio::test]
    async fn test_empty_flow_is_identity() {
        let ctx = Context::background();
        let flow: Flow<i32> = Flow::new();
        assert!(flow.is_empty());

        let (inlet, outlet) = Channel::new().split();
        inlet.send(5).await.unwrap();
        inlet.close();
        assert_eq!(drain(flow.run(&ctx, outlet)).await, vec![5]);
    }

    #[tokio::test]
    async fn test_then_appends() {
        let ctx = Context::background();
        let flow = Flow::new().map(|x: i32| x + 1).then(Flow::new().take_first(2));
        assert_eq!(flow.len(), 2);

        let (inlet, outlet) = Channel::new().split();
        for i in 0..5 {
            inlet.send(i).await.unwrap();
        }
        inlet.close();
        assert_eq!(drain(flow.run(&ctx, outlet)).await, vec![1, 2]);
    }
}
