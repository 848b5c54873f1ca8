//! The per-stage cursor used to pull upstream values and push downstream ones.
//!
//! Every suspension point returns a [`Step`] instead of a bare flag, so a
//! stage can tell a local stop from a pipeline-wide cancellation from a
//! closed queue.

use tokio_util::sync::CancellationToken;

use crate::channel::{Inlet, Outlet};
use crate::context::Context;
use crate::error::Error;

/// Outcome of [`Proxy::next`] and [`Proxy::emit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Step {
    /// The value was pulled or pushed
    Ready,
    /// This stage was stopped locally via [`Proxy::stop`] or [`Proxy::fail`]
    Stopped,
    /// The shared context is done
    Cancelled,
    /// The input is exhausted, the downstream readers are gone, or the proxy
    /// has no queue on that side
    Closed,
}

impl Step {
    /// Whether the operation succeeded and the stage may carry on
    pub fn is_ready(self) -> bool {
        self == Step::Ready
    }
}

/// One-shot local stop gate of a [`Proxy`].
///
/// Independent of the [`Context`]: tripping it ends one stage without marking
/// the pipeline as failed. Clones share the gate.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("stage stopped locally");
            self.token.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    async fn stopped(&self) {
        self.token.cancelled().await
    }
}

/// A cancellation-aware cursor over a stage's input and output queues.
///
/// Owning the proxy means owning the stage's output queue: dropping it closes
/// that queue, which is how a finished worker signals end-of-stream.
pub struct Proxy<T> {
    context: Context,
    input: Option<Outlet<T>>,
    output: Option<Inlet<T>>,
    gate: StopHandle,
    current: Option<T>,
}

/// A proxy with only an output queue, handed to generators.
pub type Emitter<T> = Proxy<T>;

/// A proxy with only an input queue, handed to consumers.
pub type Receiver<T> = Proxy<T>;

impl<T: Send> Proxy<T> {
    /// A proxy reading `input` and writing `output`
    pub fn new(context: Context, input: Outlet<T>, output: Inlet<T>) -> Self {
        Self::build(context, Some(input), Some(output))
    }

    /// A proxy that only emits
    pub fn emitter(context: Context, output: Inlet<T>) -> Emitter<T> {
        Self::build(context, None, Some(output))
    }

    /// A proxy that only receives
    pub fn receiver(context: Context, input: Outlet<T>) -> Receiver<T> {
        Self::build(context, Some(input), None)
    }

    fn build(context: Context, input: Option<Outlet<T>>, output: Option<Inlet<T>>) -> Self {
        Self {
            context,
            input,
            output,
            gate: StopHandle::default(),
            current: None,
        }
    }

    /// The shared context of the pipeline
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Push `item` downstream.
    ///
    /// Returns without pushing if the context is done or this stage was
    /// stopped; otherwise waits for room in the queue. Once every downstream
    /// reader is gone the stage is stopped and [`Step::Closed`] is returned.
    pub async fn emit(&mut self, item: T) -> Step {
        let Some(output) = self.output.as_ref() else {
            return Step::Closed;
        };

        let sent = tokio::select! {
            biased;
            _ = self.context.done() => return Step::Cancelled,
            _ = self.gate.stopped() => return Step::Stopped,
            sent = output.send(item) => sent,
        };

        match sent {
            Ok(()) => Step::Ready,
            Err(_) => {
                self.gate.stop();
                Step::Closed
            }
        }
    }

    /// Pull the next upstream value into the current slot.
    ///
    /// Returns without pulling if the context is done or this stage was
    /// stopped; [`Step::Closed`] once the input is exhausted.
    pub async fn next(&mut self) -> Step {
        let Some(input) = self.input.as_ref() else {
            return Step::Closed;
        };

        let received = tokio::select! {
            biased;
            _ = self.context.done() => return Step::Cancelled,
            _ = self.gate.stopped() => return Step::Stopped,
            received = input.recv() => received,
        };

        match received {
            Some(item) => {
                self.current = Some(item);
                Step::Ready
            }
            None => Step::Closed,
        }
    }

    /// The value captured by the last successful [`next`](Self::next)
    pub fn get(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Move the current value out, leaving the slot empty
    pub fn take(&mut self) -> Option<T> {
        self.current.take()
    }

    /// [`next`](Self::next) followed by a copy of [`get`](Self::get)
    pub async fn recv(&mut self) -> Option<T>
    where
        T: Clone,
    {
        match self.next().await {
            Step::Ready => self.current.clone(),
            _ => None,
        }
    }

    /// Stop this stage gracefully. Later `next`/`emit` calls return
    /// [`Step::Stopped`]; sibling stages and the context are unaffected.
    pub fn stop(&self) {
        self.gate.stop();
    }

    /// Stop this stage and fail the whole pipeline with `err`.
    ///
    /// The context keeps the first error it was closed with.
    pub fn fail(&self, err: impl Into<Error>) {
        let err = err.into();
        if !err.is_done() {
            tracing::warn!(error = %err, "stage failed");
        }
        self.gate.stop();
        self.context.close(Some(err));
    }

    pub fn is_stopped(&self) -> bool {
        self.gate.is_stopped()
    }

    /// A handle that stops this stage from elsewhere, even while it is
    /// suspended in `next` or `emit`
    pub fn stop_handle(&self) -> StopHandle {
        self.gate.clone()
    }
}
