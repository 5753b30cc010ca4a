// SPDX-License-Identifier: MPL-2.0

//! Inference service boundary
//!
//! Two stateless request/response operations:
//! - `refine`: describe a persona face once, right after it is added
//! - `swap`: re-render the source frame with the target face
//!
//! Neither retries. The swap loop retries on its own cadence, and a
//! refinement failure just marks the identity as errored.

pub mod gemini;

pub use gemini::GeminiClient;

use crate::errors::InferenceError;
use crate::media::{DataUrl, TransportPayload, strip_envelope};
use async_trait::async_trait;

/// Payloads of one swap request, already stripped of their envelopes
///
/// Part order on the wire is always source, target, then the optional anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    /// Current camera frame
    pub source: TransportPayload,
    /// Persona face
    pub target: TransportPayload,
    /// Previous result, sent to keep the face stable between frames
    pub anchor: Option<TransportPayload>,
}

impl SwapRequest {
    /// Build a request from enveloped images
    pub fn from_urls(source: &DataUrl, target: &DataUrl, anchor: Option<&DataUrl>) -> Self {
        Self {
            source: strip_envelope(source),
            target: strip_envelope(target),
            anchor: anchor.map(strip_envelope),
        }
    }

    pub fn has_anchor(&self) -> bool {
        self.anchor.is_some()
    }

    /// Instruction block for this request
    pub fn instruction(&self) -> String {
        crate::constants::prompts::swap_instruction(self.has_anchor())
    }
}

/// External image generation service
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Describe the face in a persona image
    async fn refine(
        &self,
        identity: &TransportPayload,
        instruction: &str,
    ) -> Result<String, InferenceError>;

    /// Produce exactly one swapped image
    ///
    /// A response without an image is an error, never an empty success.
    async fn swap(&self, request: &SwapRequest) -> Result<TransportPayload, InferenceError>;
}
