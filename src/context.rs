//! Cancellation and error propagation shared by every stage of a pipeline.
//!
//! A [`Context`] moves from running to done exactly once. The first caller of
//! `close` decides the outcome; everyone else observes that same outcome.
//! Parents, deadlines and external tokens all funnel into that single
//! transition, so a stage only ever has to watch one signal.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::channel::DEFAULT_CAPACITY;
use crate::error::Error;

/// Observable state of a [`Context`].
#[derive(Debug, Clone)]
pub enum Status {
    /// Not done yet
    Running,
    /// Done without an error (graceful completion)
    Completed,
    /// Done with a terminal error
    Failed(Error),
}

impl Status {
    pub fn is_done(&self) -> bool {
        !matches!(self, Status::Running)
    }

    fn from_outcome(outcome: &Option<Error>) -> Self {
        match outcome {
            Some(err) => Status::Failed(err.clone()),
            None => Status::Completed,
        }
    }
}

struct Shared {
    parent: Option<Context>,
    deadline: Option<Instant>,
    external: Option<CancellationToken>,
    outcome: OnceLock<Option<Error>>,
    done: CancellationToken,
    tracker: TaskTracker,
    buffer_size: usize,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Releases the watcher task of a context that was never closed.
        self.done.cancel();
    }
}

/// Shared cancellation/error token for one pipeline execution.
///
/// Cloning is cheap; every clone refers to the same token.
#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("status", &self.status())
            .field("deadline", &self.deadline())
            .field("buffer_size", &self.shared.buffer_size)
            .finish()
    }
}

impl Context {
    fn build(
        parent: Option<Context>,
        deadline: Option<Instant>,
        external: Option<CancellationToken>,
        buffer_size: usize,
    ) -> Self {
        let ctx = Context {
            shared: Arc::new(Shared {
                parent,
                deadline,
                external,
                outcome: OnceLock::new(),
                done: CancellationToken::new(),
                tracker: TaskTracker::new(),
                buffer_size,
            }),
        };
        ctx.watch();
        ctx
    }

    /// A root context that is only done once cancelled or closed
    pub fn background() -> Self {
        Self::build(None, None, None, DEFAULT_CAPACITY)
    }

    /// A root context that is cancelled when `token` fires
    pub fn with_token(token: CancellationToken) -> Self {
        Self::build(None, None, Some(token), DEFAULT_CAPACITY)
    }

    /// A child context. It becomes done with the parent's outcome when the
    /// parent is done, but closing the child never affects the parent.
    pub fn new(parent: &Context) -> Self {
        Self::build(
            Some(parent.clone()),
            parent.deadline(),
            None,
            parent.shared.buffer_size,
        )
    }

    /// A child context that closes with [`Error::DeadlineExceeded`] at `deadline`
    pub fn with_deadline(parent: &Context, deadline: Instant) -> Self {
        let deadline = match parent.deadline() {
            Some(inherited) if inherited < deadline => inherited,
            _ => deadline,
        };
        Self::build(
            Some(parent.clone()),
            Some(deadline),
            None,
            parent.shared.buffer_size,
        )
    }

    /// A child context that closes with [`Error::DeadlineExceeded`] after `timeout`
    pub fn with_timeout(parent: &Context, timeout: Duration) -> Self {
        Self::with_deadline(parent, Instant::now() + timeout)
    }

    pub(crate) fn with_buffer_size(parent: &Context, buffer_size: usize) -> Self {
        Self::build(
            Some(parent.clone()),
            parent.deadline(),
            None,
            buffer_size.max(1),
        )
    }

    /// Capacity of the queues stages allocate under this context
    pub fn buffer_size(&self) -> usize {
        self.shared.buffer_size
    }

    /// The effective deadline, inherited from the parent when not set here
    pub fn deadline(&self) -> Option<Instant> {
        self.shared.deadline
    }

    /// Resolves once the context is done
    pub async fn done(&self) {
        self.shared.done.cancelled().await
    }

    /// Current state.
    ///
    /// If the context is still running but its parent is done, its deadline
    /// has passed, or its external token fired, the context is closed with
    /// that cause first.
    pub fn status(&self) -> Status {
        if let Some(outcome) = self.shared.outcome.get() {
            return Status::from_outcome(outcome);
        }

        if let Some(parent) = &self.shared.parent {
            match parent.status() {
                Status::Running => {}
                Status::Completed => return Status::from_outcome(&self.close(None)),
                Status::Failed(cause) => return Status::from_outcome(&self.close(Some(cause))),
            }
        }

        if let Some(token) = &self.shared.external {
            if token.is_cancelled() {
                return Status::from_outcome(&self.close(Some(Error::Cancelled)));
            }
        }

        if let Some(deadline) = self.shared.deadline {
            if Instant::now() >= deadline {
                return Status::from_outcome(&self.close(Some(Error::DeadlineExceeded)));
            }
        }

        Status::Running
    }

    /// The terminal error, if the context is done with one
    pub fn err(&self) -> Option<Error> {
        match self.status() {
            Status::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status().is_done()
    }

    /// Close with [`Error::Cancelled`] unless already done
    pub fn cancel(&self) {
        self.close(Some(Error::Cancelled));
    }

    /// Transition to done. The first call stores `err` (with [`Error::Done`]
    /// stored as no error); every call returns the stored outcome.
    pub(crate) fn close(&self, err: Option<Error>) -> Option<Error> {
        let outcome = self.shared.outcome.get_or_init(|| {
            let err = err.filter(|e| !e.is_done());
            match &err {
                Some(err) => tracing::debug!(error = %err, "context closed"),
                None => tracing::debug!("context closed"),
            }
            err
        });
        self.shared.done.cancel();
        outcome.clone()
    }

    /// Convert a caught panic payload into a terminal error and close with it.
    ///
    /// An [`Error`] payload passes through unchanged; anything else becomes
    /// [`Error::Panic`]. The panic message itself is printed by the panic
    /// hook; with the default hook a backtrace follows only when
    /// `RUST_BACKTRACE` is set.
    pub(crate) fn recover(&self, payload: Box<dyn Any + Send>) -> Option<Error> {
        let err = match payload.downcast::<Error>() {
            Ok(err) => *err,
            Err(payload) => {
                let message = if let Some(msg) = payload.downcast_ref::<String>() {
                    msg.clone()
                } else if let Some(msg) = payload.downcast_ref::<&'static str>() {
                    (*msg).to_string()
                } else {
                    "unknown payload".to_string()
                };
                Error::Panic(format!("recovered from {}", message))
            }
        };

        if !err.is_done() {
            tracing::error!(error = %err, "stage terminated abnormally");
        }
        self.close(Some(err))
    }

    /// Drive `fut` to completion, recovering a panic into this context.
    ///
    /// Whatever `fut` still owns after a panic is dropped only once the
    /// context is closed.
    pub async fn guard<F>(&self, fut: F)
    where
        F: Future<Output = ()>,
    {
        let mut caught = std::pin::pin!(AssertUnwindSafe(fut).catch_unwind());
        if let Err(payload) = caught.as_mut().await {
            self.recover(payload);
        }
    }

    /// Run a stage worker on this context.
    ///
    /// The worker is tracked so the pipeline can wait for it to exit, runs
    /// inside a `stage` span, and any panic closes the context.
    pub fn spawn<F>(&self, name: &str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_holding(name, (), fut)
    }

    /// Like [`spawn`](Self::spawn), but `hold` is dropped only after the
    /// worker has finished and any panic has closed the context.
    ///
    /// Unwinding drops the locals of a panicking worker, its output queue
    /// included. A stage passes a share of that queue here so downstream
    /// never sees end-of-stream before the failure is recorded.
    pub(crate) fn spawn_holding<F, H>(&self, name: &str, hold: H, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
        H: Send + 'static,
    {
        let ctx = self.clone();
        let span = tracing::debug_span!("stage", name = %name);
        self.shared.tracker.spawn(
            async move {
                tracing::debug!("stage started");
                ctx.guard(fut).await;
                drop(hold);
                tracing::debug!("stage finished");
            }
            .instrument(span),
        )
    }

    /// Wait for every worker spawned on this context, at most `timeout`.
    ///
    /// Returns `false` if some worker was still running when time ran out.
    pub(crate) async fn drain(&self, timeout: Duration) -> bool {
        let tracker = &self.shared.tracker;
        tracker.close();
        match tokio::time::timeout(timeout, tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = tracker.len(),
                    timeout_ms = timeout.as_millis() as u64,
                    "stage workers still running after drain timeout"
                );
                false
            }
        }
    }

    /// Spawn the supervisory wait that propagates parent completion,
    /// deadlines and external cancellation into this context.
    fn watch(&self) {
        let shared = &self.shared;
        if shared.parent.is_none() && shared.deadline.is_none() && shared.external.is_none() {
            return;
        }
        // Without a runtime, `status` still picks these up lazily.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let done = shared.done.clone();
        let parent = shared.parent.clone();
        let deadline = shared.deadline;
        let external = shared.external.clone();
        let this: Weak<Shared> = Arc::downgrade(&self.shared);

        handle.spawn(async move {
            let cause = tokio::select! {
                _ = done.cancelled() => return,
                cause = parent_finished(parent) => cause,
                _ = deadline_reached(deadline) => Some(Error::DeadlineExceeded),
                _ = token_fired(external) => Some(Error::Cancelled),
            };
            if let Some(shared) = this.upgrade() {
                Context { shared }.close(cause);
            }
        });
    }
}

async fn parent_finished(parent: Option<Context>) -> Option<Error> {
    match parent {
        Some(parent) => {
            parent.done().await;
            parent.err()
        }
        None => std::future::pending().await,
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn token_fired(token: Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
