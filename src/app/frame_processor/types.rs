// SPDX-License-Identifier: MPL-2.0

//! Frame processor types

use crate::backends::capture::CaptureFrame;
use crate::errors::{EncodeError, InferenceError};
use crate::media::DataUrl;

/// Everything one swap request needs, captured at dispatch time
#[derive(Debug, Clone)]
pub struct SwapJob {
    /// Session epoch at dispatch; the result only applies if it still matches
    pub epoch: u64,
    /// Source frame
    pub frame: CaptureFrame,
    /// Persona image
    pub target: DataUrl,
    /// Previous result, when synced
    pub anchor: Option<DataUrl>,
}

/// Result of one swap request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The service returned an image, re-enveloped for display
    Produced(DataUrl),
    /// The request failed; retried on the next tick
    Failed(InferenceError),
    /// The frame could not be encoded, so nothing was sent
    Skipped(EncodeError),
}

impl SwapOutcome {
    pub fn is_produced(&self) -> bool {
        matches!(self, SwapOutcome::Produced(_))
    }
}
