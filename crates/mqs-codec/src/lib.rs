// SPDX-License-Identifier: MIT OR Apache-2.0
//! Incremental JSON codecs for the mq-stream client.
//!
//! [`JsonStreamDecoder`] turns a stream of raw bytes into the sequence of
//! JSON values sitting at a [`SelectPath`] inside a larger document, without
//! ever holding the whole document in memory. [`JsonFrameEncoder`] does the
//! reverse: it frames a sequence of values into one well-formed JSON body
//! using a fixed prefix, separator, and suffix. [`DecodeStage`] and
//! [`EncodeStage`] adapt both codecs to the pipeline stage contract.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decode;
mod encode;
mod stages;

pub use decode::{JsonStreamDecoder, SelectPath};
pub use encode::{Framing, JsonFrameEncoder};
pub use stages::{DecodeStage, EncodeStage};
