// SPDX-License-Identifier: GPL-3.0-only

//! Persona handlers
//!
//! Tracks the active identity's transportable image and gates the persona
//! toggle on it.

use crate::app::state::{Effect, SessionContext, SessionStatus, SwapState, Target};
use crate::errors::EncodeError;
use crate::identity::{Identity, IdentityId};
use crate::media::DataUrl;
use tracing::{debug, info, warn};

impl SessionContext {
    // =========================================================================
    // Active Identity Handlers
    // =========================================================================

    pub(crate) fn handle_active_identity_changed(
        &mut self,
        identity: Option<Identity>,
    ) -> Vec<Effect> {
        let current = self.target.as_ref().map(Target::id);
        if current == identity.as_ref().map(|i| &i.id) {
            return Vec::new();
        }

        let Some(identity) = identity else {
            info!("Active identity cleared");
            self.target = None;
            if self.status == SessionStatus::Swapping {
                return self.exit_swapping(SessionStatus::Active);
            }
            return Vec::new();
        };

        info!(identity = %identity.id, name = %identity.name, "Active identity changed");
        self.target = Some(Target::Pending(identity.id.clone()));

        if self.status == SessionStatus::Swapping {
            // A result for the old persona must never become the new anchor
            self.swap = SwapState::Armed;
            self.epoch += 1;
            debug!(epoch = self.epoch, "Anchor dropped for new identity");
        }

        vec![Effect::ResolveTarget(identity)]
    }

    pub(crate) fn handle_target_resolved(
        &mut self,
        id: IdentityId,
        result: Result<DataUrl, EncodeError>,
    ) -> Vec<Effect> {
        match &self.target {
            Some(Target::Pending(pending)) if *pending == id => {}
            _ => {
                debug!(identity = %id, "Ignoring resolution for an identity no longer active");
                return Vec::new();
            }
        }

        match result {
            Ok(payload) => {
                info!(identity = %id, size = payload.len(), "Target resolved");
                self.target = Some(Target::Resolved { id, payload });
                // Re-armed after an identity switch: try right away
                if self.status == SessionStatus::Swapping {
                    return self.handle_tick();
                }
                Vec::new()
            }
            Err(e) => {
                warn!(identity = %id, error = %e, "Failed to resolve target image");
                self.target = Some(Target::Failed(id));
                // Swapping needs a resolved target
                if self.status == SessionStatus::Swapping {
                    return self.exit_swapping(SessionStatus::Active);
                }
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Persona Toggle
    // =========================================================================

    pub(crate) fn handle_toggle_persona(&mut self) -> Vec<Effect> {
        match self.status {
            SessionStatus::Active => {
                if self.target.as_ref().and_then(Target::payload).is_none() {
                    debug!("No resolved identity, persona toggle ignored");
                    return Vec::new();
                }
                self.status = SessionStatus::Swapping;
                self.swap = SwapState::Armed;
                self.epoch += 1;
                self.ticks = 0;
                info!(epoch = self.epoch, "Swapping started");
                vec![Effect::StartTicker]
            }
            SessionStatus::Swapping => self.exit_swapping(SessionStatus::Active),
            SessionStatus::Inactive | SessionStatus::Loading => {
                debug!(status = %self.status, "Persona toggle ignored while not capturing");
                Vec::new()
            }
        }
    }
}
