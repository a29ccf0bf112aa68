// SPDX-License-Identifier: MIT OR Apache-2.0
//! The pipeline composer: chains stages into one logical duplex stream.

use crate::fault::FaultHub;
use crate::stage::{Sink, Source, StageRx, StageTx, Transform, stage_channel};
use futures::Stream;
use mqs_error::MqError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

/// Default bound of each inter-stage channel.
pub const DEFAULT_STAGE_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// Stage spawning
// ---------------------------------------------------------------------------

/// Run a stage future in its own task, funneling any fault into the hub.
///
/// `guard` is a clone of the stage's outgoing channel half. Holding it until
/// after the fault is recorded guarantees downstream stages can never
/// observe the channel closing before cancellation has fired, so a faulted
/// chain is never mistaken for a clean end-of-stream.
fn spawn_stage<F, G>(hub: &FaultHub, guard: G, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), MqError>> + Send + 'static,
    G: Send + 'static,
{
    let hub = hub.clone();
    tokio::spawn(async move {
        if let Err(err) = fut.await {
            hub.report(err);
        }
        drop(guard);
    })
}

// ---------------------------------------------------------------------------
// PipelineBuilder
// ---------------------------------------------------------------------------

/// Chains an ordered list of stages into one pipeline.
///
/// Every `transform` call spawns the previous tail as a task and moves the
/// builder's tail forward; the chain is sealed by [`into_stream`],
/// [`drive`], or constructed writable via [`open`].
///
/// Stages are spawned eagerly, so the builder must be used inside a tokio
/// runtime.
///
/// [`into_stream`]: PipelineBuilder::into_stream
/// [`drive`]: PipelineBuilder::drive
/// [`open`]: PipelineBuilder::open
#[derive(Debug)]
pub struct PipelineBuilder<T> {
    hub: FaultHub,
    tasks: Vec<JoinHandle<()>>,
    rx: StageRx<T>,
    capacity: usize,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    /// Start a pipeline from a [`Source`] with the default channel capacity.
    pub fn from_source<S>(source: S) -> Self
    where
        S: Source<Out = T>,
    {
        Self::from_source_with(source, DEFAULT_STAGE_CAPACITY)
    }

    /// Start a pipeline from a [`Source`] with an explicit channel capacity.
    pub fn from_source_with<S>(source: S, capacity: usize) -> Self
    where
        S: Source<Out = T>,
    {
        let hub = FaultHub::new();
        let (tx, rx) = stage_channel(capacity, hub.cancel_token());
        let guard = tx.clone();
        let task = spawn_stage(&hub, guard, source.run(tx));
        Self {
            hub,
            tasks: vec![task],
            rx,
            capacity,
        }
    }

    /// Start a writable pipeline: the caller feeds items in through the
    /// returned [`PipelineHead`].
    pub fn open(capacity: usize) -> (PipelineHead<T>, Self) {
        let hub = FaultHub::new();
        let (tx, rx) = stage_channel(capacity, hub.cancel_token());
        let head = PipelineHead {
            tx,
            hub: hub.clone(),
        };
        (
            head,
            Self {
                hub,
                tasks: Vec::new(),
                rx,
                capacity,
            },
        )
    }

    /// Append a [`Transform`], spawning it immediately.
    pub fn transform<X>(mut self, stage: X) -> PipelineBuilder<X::Out>
    where
        X: Transform<In = T>,
    {
        let (tx, rx) = stage_channel(self.capacity, self.hub.cancel_token());
        let guard = tx.clone();
        let task = spawn_stage(&self.hub, guard, stage.run(self.rx, tx));
        self.tasks.push(task);
        PipelineBuilder {
            hub: self.hub,
            tasks: self.tasks,
            rx,
            capacity: self.capacity,
        }
    }

    /// Seal the pipeline into a consumer-facing [`ItemStream`].
    pub fn into_stream(self) -> ItemStream<T> {
        ItemStream {
            rx: self.rx.into_inner(),
            hub: self.hub,
            tasks: self.tasks,
            state: StreamState::Running,
        }
    }

    /// Seal the pipeline with a terminal [`Sink`].
    pub fn drive<K>(self, sink: K) -> PipelineRun<K::Done>
    where
        K: Sink<In = T>,
    {
        let hub = self.hub.clone();
        let rx = self.rx;
        let sink_task = tokio::spawn(async move {
            match sink.run(rx).await {
                Ok(done) => Some(done),
                Err(err) => {
                    hub.report(err);
                    None
                }
            }
        });
        PipelineRun {
            hub: self.hub,
            sink_task,
            tasks: self.tasks,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineHead
// ---------------------------------------------------------------------------

/// Writable entry of a pipeline created with [`PipelineBuilder::open`].
///
/// Dropping the head (or calling [`close`](PipelineHead::close)) signals a
/// clean end-of-stream to the first stage.
#[derive(Debug)]
pub struct PipelineHead<T> {
    tx: StageTx<T>,
    hub: FaultHub,
}

impl<T: Send> PipelineHead<T> {
    /// Feed one item into the pipeline, suspending on backpressure.
    ///
    /// If the pipeline has already faulted, returns the concrete fault the
    /// first time and [`MqError::Aborted`] afterwards.
    pub async fn send(&self, item: T) -> Result<(), MqError> {
        match self.tx.send(item).await {
            Ok(()) => Ok(()),
            Err(_) => Err(self.hub.take()),
        }
    }

    /// Signal end-of-stream.
    pub fn close(self) {}
}

// ---------------------------------------------------------------------------
// ItemStream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum StreamState {
    Running,
    Draining,
    Finished,
}

/// Consumer-facing end of a read-shaped pipeline.
///
/// Yields `Ok(item)` per item, then either ends cleanly or yields the
/// pipeline's fault exactly once before ending. The stream only ends after
/// every stage task has finished, so completion implies the whole chain
/// flushed and closed. Dropping the stream cancels the pipeline.
#[derive(Debug)]
pub struct ItemStream<T> {
    rx: tokio::sync::mpsc::Receiver<T>,
    hub: FaultHub,
    tasks: Vec<JoinHandle<()>>,
    state: StreamState,
}

impl<T: Send + 'static> ItemStream<T> {
    /// Drain the stream into a vec, failing on the first pipeline fault.
    pub async fn collect_all(mut self) -> Result<Vec<T>, MqError> {
        use futures::StreamExt;
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            out.push(item?);
        }
        Ok(out)
    }
}

impl<T: Send + 'static> Stream for ItemStream<T> {
    type Item = Result<T, MqError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.state {
                StreamState::Running => match this.rx.poll_recv(cx) {
                    Poll::Ready(Some(item)) => return Poll::Ready(Some(Ok(item))),
                    Poll::Ready(None) => this.state = StreamState::Draining,
                    Poll::Pending => return Poll::Pending,
                },
                StreamState::Draining => {
                    // Wait for every stage task so a fault reported during
                    // teardown is never missed.
                    while let Some(task) = this.tasks.last_mut() {
                        match Pin::new(task).poll(cx) {
                            Poll::Ready(_) => {
                                this.tasks.pop();
                            }
                            Poll::Pending => return Poll::Pending,
                        }
                    }
                    this.state = StreamState::Finished;
                    return Poll::Ready(this.hub.try_take().map(Err));
                }
                StreamState::Finished => return Poll::Ready(None),
            }
        }
    }
}

impl<T> Drop for ItemStream<T> {
    fn drop(&mut self) {
        self.hub.cancel();
    }
}

// ---------------------------------------------------------------------------
// PipelineRun
// ---------------------------------------------------------------------------

/// Handle on a write-shaped pipeline driving a [`Sink`].
///
/// [`join`](PipelineRun::join) resolves only after the sink confirmed its
/// completion value and every other stage task finished. Dropping the handle
/// without joining cancels the pipeline and aborts any in-flight request.
#[derive(Debug)]
pub struct PipelineRun<D> {
    hub: FaultHub,
    sink_task: JoinHandle<Option<D>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<D: Send + 'static> PipelineRun<D> {
    /// Await overall completion.
    pub async fn join(mut self) -> Result<D, MqError> {
        let done = match (&mut self.sink_task).await {
            Ok(done) => done,
            // A panicked stage counts as an abort; the panic itself is
            // already visible through tokio's task instrumentation.
            Err(_) => {
                self.hub.report(MqError::Aborted);
                None
            }
        };
        for task in &mut self.tasks {
            let _ = task.await;
        }
        match self.hub.try_take() {
            Some(err) => Err(err),
            None => done.ok_or(MqError::Aborted),
        }
    }
}

impl<D> Drop for PipelineRun<D> {
    fn drop(&mut self) {
        self.hub.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
