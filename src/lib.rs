// SPDX-License-Identifier: MIT OR Apache-2.0
//! Streaming pipeline client for HTTP message-queue services.
//!
//! Queue operations are composable data-flow pipelines rather than single
//! request/response calls: reads decode the response body incrementally into
//! a stream of messages, writes and deletes frame caller-supplied items into
//! the request body as it uploads. Backpressure propagates end to end over
//! bounded channels and a fault anywhere in a chain cancels the whole
//! pipeline, surfacing exactly once.
//!
//! ```no_run
//! use mq_stream::{ClientOptions, MqClient};
//!
//! # async fn demo() -> Result<(), mq_stream::MqError> {
//! let client = MqClient::new("my-token", ClientOptions::default())?;
//! let queue = client.project("my-project")?.queue("jobs")?;
//!
//! let writer = queue.write()?;
//! writer.send("hello").await?;
//! writer.send("world").await?;
//! writer.finish().await?;
//!
//! use futures::StreamExt;
//! let mut messages = queue.read()?;
//! while let Some(message) = messages.next().await {
//!     println!("{}", message?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The crates behind this facade split by concern: [`pipeline`] holds the
//! stage traits and composer, [`codec`] the incremental JSON codecs,
//! [`transport`] the HTTP byte-stream stages, [`config`] the endpoint
//! options, and [`error`] the shared taxonomy.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use mqs_client::{
    DEFAULT_QUEUE_NAME, DEFAULT_READ_BATCH, IdBatch, MessageStream, MessageWriter, MqClient,
    ProjectRef, Queue, QueryParams,
};
pub use mqs_config::{ClientOptions, ConfigError, ConfigWarning};
pub use mqs_error::{ErrorKind, MqError};

/// Queue-level API: client construction and the read/write/delete/clear
/// operations.
pub mod client {
    pub use mqs_client::*;
}

/// Incremental JSON decoding and framing encode.
pub mod codec {
    pub use mqs_codec::*;
}

/// Endpoint configuration: defaults, TOML profiles, environment overrides.
pub mod config {
    pub use mqs_config::*;
}

/// The shared error taxonomy.
pub mod error {
    pub use mqs_error::*;
}

/// Stage traits, the pipeline composer, and the built-in transforms.
pub mod pipeline {
    pub use mqs_pipeline::*;
}

/// HTTP requests as pipeline byte streams.
pub mod transport {
    pub use mqs_transport::*;
}
