//! Basic usage examples for pipestream
//!
//! Run with: cargo run --example basic

use async_trait::async_trait;
use futures::future::BoxFuture;
use pipestream::prelude::*;
use std::time::Duration;

/// Emits Fibonacci numbers up to a limit
struct Fibonacci {
    limit: usize,
}

#[async_trait]
impl Generator<u64> for Fibonacci {
    async fn generate(&self, mut out: Emitter<u64>) {
        let (mut a, mut b) = (0u64, 1u64);
        for _ in 0..self.limit {
            if !out.emit(a).await.is_ready() {
                break;
            }
            (a, b) = (b, a.saturating_add(b));
        }
    }
}

/// Example 1: Simple number processing
async fn simple_example(ctx: &Context) -> Result<()> {
    println!("=== Simple Number Processing ===");

    Pipeline::range(1, 10)
        .buffer_size(3)
        .consume_each(|x| println!("Number: {}", x))
        .exec(ctx)
        .await?;

    println!();
    Ok(())
}

/// Example 2: Transform and filter
async fn transform_filter_example(ctx: &Context) -> Result<()> {
    println!("=== Transform and Filter ===");

    Pipeline::range(1, 20)
        .filter(|x| x % 3 == 0)
        .map(|x| x * x)
        .consume_each(|x| println!("Square: {}", x))
        .exec(ctx)
        .await?;

    println!();
    Ok(())
}

/// Example 3: Function-based stages
async fn functional_example(ctx: &Context) -> Result<()> {
    println!("=== Functional Components ===");

    let source = generator_fn(|mut out: Emitter<String>| async move {
        for n in 1..=5 {
            if !out.emit(format!("item-{}", n)).await.is_ready() {
                break;
            }
        }
    });

    let sink = consumer_fn(|mut input: Receiver<String>| async move {
        while let Some(item) = input.recv().await {
            println!("Processed: {}", item);
        }
    });

    Pipeline::from_generator(source)
        .map(|s| s.to_uppercase())
        .sink(sink)
        .exec(ctx)
        .await?;

    println!();
    Ok(())
}

/// Example 4: Collection
async fn collection_example(ctx: &Context) -> Result<()> {
    println!("=== Collection ===");

    let items = Pipeline::from_generator(Fibonacci { limit: 10 })
        .collect(ctx)
        .await?;
    println!("Collected Fibonacci numbers: {:?}", items);

    println!();
    Ok(())
}

/// Example 5: One input, many outputs
async fn process_example(ctx: &Context) -> Result<()> {
    println!("=== Process ===");

    let items = Pipeline::range(1, 4)
        .process(|n: i64, proxy: &mut Proxy<i64>| {
            Box::pin(async move {
                for _ in 0..n {
                    if !proxy.emit(n).await.is_ready() {
                        return;
                    }
                }
            }) as BoxFuture<'_, ()>
        })
        .collect(ctx)
        .await?;
    println!("Repeated: {:?}", items);

    println!();
    Ok(())
}

/// Example 6: Parallel stages
async fn parallel_example(ctx: &Context) -> Result<()> {
    println!("=== Parallel ===");

    let mut items = Pipeline::range(1, 20)
        .map(|x| x * 100)
        .parallel(4)
        .collect(ctx)
        .await?;
    println!("Unordered: {:?}", items);
    items.sort_unstable();
    println!("Sorted:    {:?}", items);

    println!();
    Ok(())
}

/// Example 7: Deadlines and failures
async fn termination_example(ctx: &Context) -> Result<()> {
    println!("=== Termination ===");

    let endless = generator_fn(|mut out: Emitter<u64>| async move {
        let mut n = 0;
        while out.emit(n).await.is_ready() {
            n += 1;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let limited = Context::with_timeout(ctx, Duration::from_millis(100));
    match Pipeline::from_generator(endless).consume_each(|_| {}).exec(&limited).await {
        Err(Error::DeadlineExceeded) => println!("Endless source stopped by deadline"),
        other => println!("Unexpected: {:?}", other),
    }

    let failed = Pipeline::range(1, 10)
        .process(|n: i64, proxy: &mut Proxy<i64>| {
            Box::pin(async move {
                if n == 5 {
                    proxy.fail(Error::custom(format!("rejected {}", n)));
                    return;
                }
                let _ = proxy.emit(n).await;
            }) as BoxFuture<'_, ()>
        })
        .consume_each(|n| println!("Accepted: {}", n))
        .exec(ctx)
        .await;
    if let Err(err) = failed {
        println!("Pipeline failed: {}", err);
    }

    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("pipestream {} examples\n", pipestream::VERSION);

    let ctx = Context::background();

    simple_example(&ctx).await?;
    transform_filter_example(&ctx).await?;
    functional_example(&ctx).await?;
    collection_example(&ctx).await?;
    process_example(&ctx).await?;
    parallel_example(&ctx).await?;
    termination_example(&ctx).await?;

    println!("All examples completed successfully!");
    Ok(())
}
