// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pipeline-stage adapters for the two codecs.

use crate::decode::{JsonStreamDecoder, SelectPath};
use crate::encode::{Framing, JsonFrameEncoder};
use async_trait::async_trait;
use bytes::Bytes;
use mqs_error::MqError;
use mqs_pipeline::{StageRx, StageTx, Transform};
use serde_json::Value;

/// Transform stage: raw response bytes in, selected JSON values out.
#[derive(Debug)]
pub struct DecodeStage {
    decoder: JsonStreamDecoder,
}

impl DecodeStage {
    /// Decode the elements at `path`.
    pub fn new(path: SelectPath) -> Self {
        Self {
            decoder: JsonStreamDecoder::new(path),
        }
    }
}

#[async_trait]
impl Transform for DecodeStage {
    type In = Bytes;
    type Out = Value;

    async fn run(mut self, mut rx: StageRx<Bytes>, tx: StageTx<Value>) -> Result<(), MqError> {
        while let Some(chunk) = rx.recv().await? {
            for value in self.decoder.push(&chunk)? {
                tx.send(value).await?;
            }
        }
        // Upstream ended cleanly; the document must be complete.
        self.decoder.finish()?;
        Ok(())
    }
}

/// Transform stage: JSON values in, framed request-body bytes out.
#[derive(Debug)]
pub struct EncodeStage {
    encoder: JsonFrameEncoder,
}

impl EncodeStage {
    /// Encode with the given framing.
    pub fn new(framing: Framing) -> Self {
        Self {
            encoder: JsonFrameEncoder::new(framing),
        }
    }
}

#[async_trait]
impl Transform for EncodeStage {
    type In = Value;
    type Out = Bytes;

    async fn run(mut self, mut rx: StageRx<Value>, tx: StageTx<Bytes>) -> Result<(), MqError> {
        while let Some(value) = rx.recv().await? {
            tx.send(self.encoder.push(&value)?).await?;
        }
        // The suffix is only written on a clean end-of-stream; a cancelled
        // pipeline must not produce a well-formed body.
        tx.send(self.encoder.finish()).await?;
        Ok(())
    }
}
