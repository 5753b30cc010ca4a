// SPDX-License-Identifier: GPL-3.0-only

//! Message update handling
//!
//! `update()` is the only way session state changes. It routes each message
//! to a handler in the `handlers` submodules and returns the effects the
//! controller must execute. Handlers never perform I/O themselves.
//!
//! # Handler Modules
//!
//! - `handlers::camera`: power toggle, capture acquisition
//! - `handlers::persona`: active identity, target resolution, persona toggle
//! - `handlers::swap`: ticks and swap completion

use crate::app::state::{Effect, Message, SessionContext};
use tracing::info;

impl SessionContext {
    /// Main message handler - routes messages to handler methods
    pub fn update(&mut self, message: Message) -> Vec<Effect> {
        match message {
            // ===== User Intent =====
            Message::TogglePower => self.handle_toggle_power(),
            Message::TogglePersona => self.handle_toggle_persona(),
            Message::Shutdown => {
                info!(status = %self.status, "Shutting down session");
                self.power_off()
            }

            // ===== Identity =====
            Message::ActiveIdentityChanged(identity) => {
                self.handle_active_identity_changed(identity)
            }
            Message::TargetResolved { id, result } => self.handle_target_resolved(id, result),

            // ===== Capture =====
            Message::CaptureAcquired { attempt, result } => {
                self.handle_capture_acquired(attempt, result)
            }

            // ===== Swap Loop =====
            Message::Tick => self.handle_tick(),
            Message::SwapFinished { epoch, outcome } => self.handle_swap_finished(epoch, outcome),
        }
    }
}
