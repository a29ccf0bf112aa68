// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stage traits and channel-based pipeline composition for the mq-stream
//! client.
//!
//! A pipeline is an ephemeral, single-use chain of stages: one [`Source`],
//! zero or more [`Transform`]s, and either a consumer-facing [`ItemStream`]
//! or a terminal [`Sink`]. Stages run as tokio tasks joined by bounded
//! channels, so a slow downstream suspends the whole chain instead of
//! buffering without bound. Errors from any stage funnel through a shared
//! [`FaultHub`] and surface exactly once at the terminal observer; every
//! later observation sees the generic [`MqError::Aborted`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod cancel;
mod fault;
mod stage;
mod transforms;

pub use builder::{DEFAULT_STAGE_CAPACITY, ItemStream, PipelineBuilder, PipelineHead, PipelineRun};
pub use cancel::CancelToken;
pub use fault::FaultHub;
pub use stage::{Sink, Source, StageRx, StageTx, Transform, stage_channel};
pub use transforms::{DeleteAggregator, WritePreparer, coerce_id};
