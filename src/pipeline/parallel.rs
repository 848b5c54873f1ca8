//! Fan-out / fan-in concurrency transform.

use futures::future::join_all;
use std::sync::Arc;

use crate::channel::{Channel, Outlet};
use crate::context::Context;
use crate::proxy::Proxy;
use crate::traits::Runner;

/// Runs `replicas` copies of a runner against one shared input queue and
/// merges their outputs into a single queue.
///
/// Replicas compete for input values, so work is distributed unordered and
/// the merged output carries no ordering guarantee; only the set of values
/// matches a single-replica run.
pub struct Parallel<T> {
    inner: Arc<dyn Runner<T>>,
    replicas: usize,
}

impl<T: Send + 'static> Parallel<T> {
    /// `replicas` below 1 is treated as 1
    pub fn new(inner: Arc<dyn Runner<T>>, replicas: usize) -> Self {
        Self {
            inner,
            replicas: replicas.max(1),
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

impl<T: Send + 'static> Runner<T> for Parallel<T> {
    fn run(&self, ctx: &Context, input: Outlet<T>) -> Outlet<T> {
        let outputs: Vec<Outlet<T>> = (0..self.replicas)
            .map(|_| self.inner.run(ctx, input.clone()))
            .collect();
        drop(input);

        let (inlet, merged) = Channel::with_capacity(ctx.buffer_size()).split();

        let relays: Vec<_> = outputs
            .into_iter()
            .map(|output| {
                let proxy = Proxy::new(ctx.clone(), output, inlet.share());
                ctx.spawn("relay", relay(proxy))
            })
            .collect();

        tracing::debug!(replicas = self.replicas, stage = self.inner.name(), "fan-out started");

        ctx.spawn("merge", async move {
            join_all(relays).await;
            inlet.close();
        });

        merged
    }

    fn name(&self) -> &str {
        "parallel"
    }
}

/// Copy one replica's output into the merged queue
async fn relay<T: Send + 'static>(mut proxy: Proxy<T>) {
    while proxy.next().await.is_ready() {
        let Some(item) = proxy.take() else { continue };
        if !proxy.emit(item).await.is_ready() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::flow::Flow;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn feed(values: impl IntoIterator<Item = i32>) -> Outlet<i32> {
        let (inlet, outlet) = Channel::with_capacity(256).split();
        for v in values {
            inlet.send(v).await.unwrap();
        }
        inlet.close();
        outlet
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_preserves_value_set() {
        let ctx = Context::background();
        let flow = Flow::new().map(|x: i32| x * 3).parallel(4);

        let merged = flow.run(&ctx, feed(0..100).await);
        let mut seen = HashSet::new();
        while let Some(v) = merged.recv().await {
            assert!(seen.insert(v), "value {} delivered twice", v);
        }
        assert_eq!(seen, (0..100).map(|x| x * 3).collect::<HashSet<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_replicas_share_work() {
        let ctx = Context::background();
        let busy = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (busy_ref, peak_ref) = (busy.clone(), peak.clone());
        let flow = Flow::new()
            .process(move |item: i32, proxy: &mut Proxy<i32>| {
                let busy = busy_ref.clone();
                let peak = peak_ref.clone();
                Box::pin(async move {
                    let now = busy.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    busy.fetch_sub(1, Ordering::SeqCst);
                    let _ = proxy.emit(item).await;
                }) as futures::future::BoxFuture<'_, ()>
            })
            .parallel(3);

        let merged = flow.run(&ctx, feed(0..30).await);
        let mut count = 0;
        while merged.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 30);
        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_zero_replicas_runs_one() {
        let parallel = Parallel::new(Arc::new(Flow::<i32>::new()), 0);
        assert_eq!(parallel.replicas(), 1);

        let ctx = Context::background();
        let merged = parallel.run(&ctx, feed(vec![1, 2, 3]).await);
        let mut out = Vec::new();
        while let Some(v) = merged.recv().await {
            out.push(v);
        }
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_merged_queue_closes_on_cancel() {
        let ctx = Context::background();
        // Input that never closes
        let (_inlet, outlet) = Channel::<i32>::new().split();
        let merged = Flow::new().map(|x: i32| x).parallel(2).run(&ctx, outlet);

        ctx.cancel();
        let end = tokio::time::timeout(Duration::from_secs(1), merged.recv()).await;
        assert_eq!(end.expect("merged queue should close"), None);
        assert!(ctx.drain(Duration::from_secs(1)).await);
    }
}
