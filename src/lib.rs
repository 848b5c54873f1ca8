//! # Concurrent stream-processing pipelines for Rust
//!
//! This crate wires a producer, a chain of operators and a consumer into a
//! pipeline where every stage runs as its own tokio task, connected to its
//! neighbours by bounded queues. A shared [`Context`] carries cancellation
//! and the first terminal error across all of them.
//!
//! ## Core Concepts
//!
//! - **Generator / Producer**: emits the values of a pipeline
//! - **Operator / Runner**: pulls values, transforms them, emits results
//! - **Consumer**: drains the final queue
//! - **Proxy**: the cancellation-aware cursor every stage works through
//! - **Flow**: an ordered chain of stages, optionally run in parallel
//! - **Pipeline**: producer + flow + consumer, executed under a context
//!
//! ## Example
//!
//! ```rust
//! use pipestream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ctx = Context::background();
//!
//!     Pipeline::range(1, 100)
//!         .filter(|x| x % 3 == 0)
//!         .map(|x| x * 2)
//!         .parallel(4)
//!         .consume_each(|x| println!("{}", x))
//!         .exec(&ctx)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod context;
pub mod error;
pub mod operators;
pub mod pipeline;
pub mod proxy;
pub mod sinks;
pub mod sources;
pub mod traits;
pub mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::channel::{Channel, Inlet, Outlet};
    pub use crate::context::{Context, Status};
    pub use crate::error::{Error, IntoError, Result};
    pub use crate::operators::{Expand, Expansion};
    pub use crate::pipeline::{Flow, Parallel, Pipeline, PipelineConfig, Source, Stage};
    pub use crate::proxy::{Emitter, Proxy, Receiver, Step, StopHandle};
    pub use crate::sinks::{CollectSink, CountSink, ForEachSink};
    pub use crate::sources::{IterSource, RangeSource, StreamSource};
    pub use crate::traits::{Consumer, Generator, Operator, Producer, Runner};
    pub use crate::util::{consumer_fn, generator_fn, operator_fn};
}

pub use context::Context;
pub use error::{Error, Result};
pub use pipeline::{Flow, Pipeline};
pub use proxy::{Proxy, Step};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
