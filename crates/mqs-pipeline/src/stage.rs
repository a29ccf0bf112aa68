// SPDX-License-Identifier: MIT OR Apache-2.0
//! The stage contract: cancellation-aware channel halves and the three
//! stage traits.

use crate::cancel::CancelToken;
use async_trait::async_trait;
use mqs_error::MqError;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Channel halves
// ---------------------------------------------------------------------------

/// Sending half of an inter-stage channel.
///
/// `send` suspends when the downstream buffer is full (backpressure) and
/// fails with [`MqError::Aborted`] once the pipeline is cancelled or the
/// downstream stage is gone.
#[derive(Debug)]
pub struct StageTx<T> {
    tx: mpsc::Sender<T>,
    cancel: CancelToken,
}

impl<T> Clone for StageTx<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T: Send> StageTx<T> {
    /// Forward one item downstream, honoring backpressure and cancellation.
    pub async fn send(&self, item: T) -> Result<(), MqError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(MqError::Aborted),
            res = self.tx.send(item) => res.map_err(|_| MqError::Aborted),
        }
    }
}

/// Receiving half of an inter-stage channel.
#[derive(Debug)]
pub struct StageRx<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancelToken,
}

impl<T: Send> StageRx<T> {
    /// Receive the next item.
    ///
    /// `Ok(None)` is a clean upstream end-of-stream; `Err(Aborted)` means the
    /// pipeline was cancelled and the stage must unwind without flushing.
    /// The distinction matters for aggregating stages.
    pub async fn recv(&mut self) -> Result<Option<T>, MqError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(MqError::Aborted),
            item = self.rx.recv() => Ok(item),
        }
    }

    /// Clone of the pipeline's cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Unwrap the raw receiver, giving up cancellation-aware receives.
    ///
    /// Used by sinks that hand the receiver to an external consumer (the
    /// HTTP request body); those sinks must watch the token themselves.
    pub fn into_inner(self) -> mpsc::Receiver<T> {
        self.rx
    }
}

/// Create a bounded inter-stage channel bound to `cancel`.
pub fn stage_channel<T: Send>(capacity: usize, cancel: CancelToken) -> (StageTx<T>, StageRx<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        StageTx {
            tx,
            cancel: cancel.clone(),
        },
        StageRx { rx, cancel },
    )
}

// ---------------------------------------------------------------------------
// Stage traits
// ---------------------------------------------------------------------------

/// Head of a pipeline: produces items from some external origin.
///
/// A source runs once, pushing items into `tx` until the origin is
/// exhausted. Returning `Ok(())` signals a clean end-of-stream (the channel
/// closes when `tx` drops); returning an error faults the whole pipeline.
#[async_trait]
pub trait Source: Send + 'static {
    /// Item type produced.
    type Out: Send + 'static;

    /// Drive the source to completion.
    async fn run(self, tx: StageTx<Self::Out>) -> Result<(), MqError>;
}

/// Middle stage: consumes items from upstream, produces items downstream.
///
/// Transforms own their buffering policy but must forward a clean upstream
/// end-of-stream (after any final flush) and must not flush buffered state
/// when `rx.recv()` reports cancellation.
#[async_trait]
pub trait Transform: Send + 'static {
    /// Item type consumed.
    type In: Send + 'static;
    /// Item type produced.
    type Out: Send + 'static;

    /// Drive the transform until upstream ends or the pipeline faults.
    async fn run(self, rx: StageRx<Self::In>, tx: StageTx<Self::Out>) -> Result<(), MqError>;
}

/// Tail of a pipeline: consumes every item and yields one completion value.
#[async_trait]
pub trait Sink: Send + 'static {
    /// Item type consumed.
    type In: Send + 'static;
    /// Completion value confirming the sink flushed and closed.
    type Done: Send + 'static;

    /// Drive the sink until upstream ends or the pipeline faults.
    async fn run(self, rx: StageRx<Self::In>) -> Result<Self::Done, MqError>;
}
