// SPDX-License-Identifier: GPL-3.0-only

//! Swap loop handlers
//!
//! A tick either dispatches exactly one request or does nothing. The `busy`
//! flag is checked and set in the same synchronous step, so a second tick
//! can never slip in while a request is outstanding. Ticks that find the
//! loop busy are dropped, not queued.

use crate::app::frame_processor::{SwapJob, SwapOutcome};
use crate::app::state::{Effect, SessionContext, SessionStatus, SwapState, Target};
use crate::constants::timing::TICK_LOG_INTERVAL;
use tracing::{debug, info, trace, warn};

impl SessionContext {
    // =========================================================================
    // Tick
    // =========================================================================

    pub(crate) fn handle_tick(&mut self) -> Vec<Effect> {
        if self.status != SessionStatus::Swapping {
            trace!(status = %self.status, "Tick outside swapping");
            return Vec::new();
        }

        self.ticks += 1;
        if self.ticks % TICK_LOG_INTERVAL == 0 {
            debug!(
                ticks = self.ticks,
                completed = self.counters.completed,
                failed = self.counters.failed,
                "Swap loop heartbeat"
            );
        }

        if self.busy {
            self.counters.skipped_ticks += 1;
            debug!(epoch = self.epoch, "Request in flight, dropping tick");
            return Vec::new();
        }

        let Some(target) = self.target.as_ref().and_then(Target::payload) else {
            self.counters.skipped_ticks += 1;
            debug!("Target not resolved, skipping tick");
            return Vec::new();
        };

        let Some(frame) = self.capture.as_ref().and_then(|c| c.snapshot()) else {
            self.counters.skipped_ticks += 1;
            debug!("No frame decoded yet, skipping tick");
            return Vec::new();
        };

        let job = SwapJob {
            epoch: self.epoch,
            frame,
            target: target.clone(),
            anchor: self.swap.anchor().cloned(),
        };

        self.busy = true;
        self.counters.dispatched += 1;
        debug!(
            epoch = job.epoch,
            phase = %self.swap.phase(),
            anchored = job.anchor.is_some(),
            "Dispatching swap"
        );
        vec![Effect::DispatchSwap(job)]
    }

    // =========================================================================
    // Completion
    // =========================================================================

    pub(crate) fn handle_swap_finished(&mut self, epoch: u64, outcome: SwapOutcome) -> Vec<Effect> {
        // The request has ended whatever happens to its result
        self.busy = false;

        if epoch != self.epoch || self.status != SessionStatus::Swapping {
            self.counters.discarded += 1;
            debug!(
                epoch,
                current = self.epoch,
                produced = outcome.is_produced(),
                "Discarding result from a previous swap epoch"
            );
            return Vec::new();
        }

        match outcome {
            SwapOutcome::Produced(anchor) => {
                self.counters.completed += 1;
                self.swap = SwapState::Synced { anchor };
                debug!(epoch, completed = self.counters.completed, "Anchor updated");
            }
            SwapOutcome::Failed(e) => {
                self.counters.failed += 1;
                warn!(epoch, error = %e, phase = %self.swap.phase(), "Swap failed, keeping state");
            }
            SwapOutcome::Skipped(e) => {
                self.counters.encode_failures += 1;
                debug!(epoch, error = %e, "Frame skipped");
            }
        }
        Vec::new()
    }

    /// Leave `Swapping`, dropping the anchor and invalidating in-flight results
    pub(crate) fn exit_swapping(&mut self, next: SessionStatus) -> Vec<Effect> {
        self.status = next;
        self.swap = SwapState::Idle;
        self.epoch += 1;
        info!(epoch = self.epoch, status = %next, "Swapping stopped");
        vec![Effect::StopTicker]
    }
}
