// SPDX-License-Identifier: GPL-3.0-only

//! Camera power handlers
//!
//! Handles the power toggle and the result of device acquisition. Each
//! acquisition is tagged with an attempt number; a result for any attempt
//! other than the current one is dropped on arrival, which releases the
//! device it carries.

use crate::app::state::{Effect, SessionContext, SessionStatus};
use crate::backends::capture::{CaptureResult, CaptureSession};
use tracing::{debug, info, warn};

impl SessionContext {
    // =========================================================================
    // Power Handlers
    // =========================================================================

    pub(crate) fn handle_toggle_power(&mut self) -> Vec<Effect> {
        match self.status {
            SessionStatus::Inactive => {
                self.capture_attempt += 1;
                self.status = SessionStatus::Loading;
                self.last_error = None;
                info!(attempt = self.capture_attempt, "Powering on, acquiring capture");
                vec![Effect::AcquireCapture {
                    attempt: self.capture_attempt,
                }]
            }
            SessionStatus::Loading => {
                // Abandon the pending acquisition; its result will be stale
                self.capture_attempt += 1;
                self.status = SessionStatus::Inactive;
                info!("Powered off while loading");
                Vec::new()
            }
            SessionStatus::Active | SessionStatus::Swapping => self.power_off(),
        }
    }

    /// Leave any capturing status, dropping the device and the swap state
    pub(crate) fn power_off(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.status {
            SessionStatus::Swapping => {
                effects.extend(self.exit_swapping(SessionStatus::Inactive));
            }
            SessionStatus::Loading => {
                self.capture_attempt += 1;
                self.status = SessionStatus::Inactive;
            }
            SessionStatus::Active | SessionStatus::Inactive => {
                self.status = SessionStatus::Inactive;
            }
        }

        if let Some(capture) = self.capture.take() {
            capture.release();
        }
        info!("Powered off");
        effects
    }

    pub(crate) fn handle_capture_acquired(
        &mut self,
        attempt: u64,
        result: CaptureResult<CaptureSession>,
    ) -> Vec<Effect> {
        if self.status != SessionStatus::Loading || attempt != self.capture_attempt {
            match result {
                Ok(session) => {
                    debug!(
                        attempt,
                        current = self.capture_attempt,
                        "Releasing capture from an abandoned attempt"
                    );
                    session.release();
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Ignoring failure of an abandoned attempt");
                }
            }
            return Vec::new();
        }

        match result {
            Ok(session) => {
                self.capture = Some(session);
                self.status = SessionStatus::Active;
                info!(attempt, "Session active");
            }
            Err(e) => {
                warn!(attempt, error = %e, "Capture acquisition failed");
                self.last_error = Some(e.to_string());
                self.status = SessionStatus::Inactive;
            }
        }
        Vec::new()
    }
}
