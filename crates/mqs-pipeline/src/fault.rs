// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exactly-once error funnel shared by every stage of one pipeline.

use crate::cancel::CancelToken;
use mqs_error::MqError;
use std::sync::{Arc, Mutex};

/// Shared fault slot plus the pipeline's [`CancelToken`].
///
/// The first concrete fault reported wins and fires cancellation; the
/// terminal observer takes it exactly once. Anyone observing the pipeline
/// after the fault was taken sees [`MqError::Aborted`] instead.
#[derive(Debug, Clone, Default)]
pub struct FaultHub {
    slot: Arc<Mutex<Option<MqError>>>,
    cancel: CancelToken,
}

impl FaultHub {
    /// Create an empty hub with a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault and fire cancellation.
    ///
    /// The first concrete error wins. A stored [`MqError::Aborted`] is only
    /// a placeholder from a stage that unwound on cancellation, so a concrete
    /// error arriving later still replaces it.
    pub fn report(&self, err: MqError) {
        {
            let mut slot = self.slot.lock().expect("fault slot poisoned");
            match slot.as_ref() {
                None => *slot = Some(err),
                Some(stored) if stored.is_aborted() && !err.is_aborted() => *slot = Some(err),
                Some(_) => {
                    tracing::debug!(target: "mqs.pipeline", %err, "suppressing secondary fault");
                }
            }
        }
        self.cancel.cancel();
    }

    /// Take the stored fault, if any.
    pub fn try_take(&self) -> Option<MqError> {
        self.slot.lock().expect("fault slot poisoned").take()
    }

    /// Take the stored fault, falling back to [`MqError::Aborted`].
    pub fn take(&self) -> MqError {
        self.try_take().unwrap_or(MqError::Aborted)
    }

    /// Fire cancellation without recording a fault (used on drop).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the pipeline has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clone of the pipeline's cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
