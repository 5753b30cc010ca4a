// SPDX-License-Identifier: GPL-3.0-only

//! Swap task
//!
//! Encodes the source frame (JPEG, in a blocking task), strips the envelopes
//! off source, target and anchor, sends the request with a deadline and
//! re-envelopes the returned image for display.

use crate::app::frame_processor::types::{SwapJob, SwapOutcome};
use crate::backends::inference::{InferenceService, SwapRequest};
use crate::errors::InferenceError;
use crate::media::{DataUrl, frame_to_transportable};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Runs swap jobs against an inference service
#[derive(Clone)]
pub struct SwapTask {
    inference: Arc<dyn InferenceService>,
    quality: u8,
    timeout: Duration,
}

impl SwapTask {
    pub fn new(inference: Arc<dyn InferenceService>, quality: u8, timeout: Duration) -> Self {
        Self {
            inference,
            quality,
            timeout,
        }
    }

    /// Run one job to completion
    ///
    /// Never fails: every error becomes an outcome the event loop can count.
    pub async fn run(&self, job: SwapJob) -> SwapOutcome {
        let start = Instant::now();

        let source = match frame_to_transportable(&job.frame, self.quality).await {
            Ok(url) => url,
            Err(e) => {
                warn!(epoch = job.epoch, error = %e, "Failed to encode frame, skipping tick");
                return SwapOutcome::Skipped(e);
            }
        };
        debug!(
            epoch = job.epoch,
            width = job.frame.width,
            height = job.frame.height,
            size = source.len(),
            "Frame encoded"
        );

        let request = SwapRequest::from_urls(&source, &job.target, job.anchor.as_ref());

        let result = match tokio::time::timeout(self.timeout, self.inference.swap(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(self.timeout.as_secs())),
        };

        match result.and_then(|payload| DataUrl::envelope(&payload).map_err(InferenceError::from)) {
            Ok(url) => {
                info!(
                    epoch = job.epoch,
                    anchored = request.has_anchor(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Swap produced a frame"
                );
                SwapOutcome::Produced(url)
            }
            Err(e) => {
                warn!(epoch = job.epoch, error = %e, "Swap request failed");
                SwapOutcome::Failed(e)
            }
        }
    }
}

impl std::fmt::Debug for SwapTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapTask")
            .field("quality", &self.quality)
            .field("timeout", &self.timeout)
            .finish()
    }
}
