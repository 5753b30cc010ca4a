// SPDX-License-Identifier: GPL-3.0-only

//! Session state
//!
//! Everything the event loop mutates lives in one [`SessionContext`]. It is
//! plain data plus the owned capture session, so the state machine can be
//! driven in tests without a runtime, a device or a network.

use crate::app::frame_processor::{SwapJob, SwapOutcome};
use crate::backends::capture::{CaptureResult, CaptureSession};
use crate::errors::EncodeError;
use crate::identity::{Identity, IdentityId};
use crate::media::DataUrl;
use std::fmt;

/// Camera and activation status
///
/// ```text
/// Inactive ──power──► Loading ──acquired──► Active ◄──persona──► Swapping
///    ▲                   │                    │                    │
///    └───────power / failure ◄────────────────┴──────power─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No capture device held
    #[default]
    Inactive,
    /// Waiting for the capture device
    Loading,
    /// Capturing, not swapping
    Active,
    /// Capturing and swapping on every tick
    Swapping,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Inactive => write!(f, "inactive"),
            SessionStatus::Loading => write!(f, "loading"),
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Swapping => write!(f, "swapping"),
        }
    }
}

/// Swap orchestrator state
///
/// The consistency anchor only exists inside `Synced`, so there is never
/// more than one and it cannot outlive swapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SwapState {
    /// Not swapping
    #[default]
    Idle,
    /// Swapping requested, no result yet
    Armed,
    /// Swapping with a previous result to stay consistent with
    Synced {
        /// Most recent successful output frame
        anchor: DataUrl,
    },
}

impl SwapState {
    /// Current anchor, if any
    pub fn anchor(&self) -> Option<&DataUrl> {
        match self {
            SwapState::Synced { anchor } => Some(anchor),
            _ => None,
        }
    }

    pub fn phase(&self) -> SwapPhase {
        match self {
            SwapState::Idle => SwapPhase::Idle,
            SwapState::Armed => SwapPhase::Armed,
            SwapState::Synced { .. } => SwapPhase::Synced,
        }
    }
}

/// Payload-free copy of [`SwapState`] for logs and views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapPhase {
    #[default]
    Idle,
    Armed,
    Synced,
}

impl fmt::Display for SwapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapPhase::Idle => write!(f, "idle"),
            SwapPhase::Armed => write!(f, "armed"),
            SwapPhase::Synced => write!(f, "synced"),
        }
    }
}

/// Transportable image of the active identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Resolution in progress
    Pending(IdentityId),
    /// Ready to be sent
    Resolved { id: IdentityId, payload: DataUrl },
    /// Resource could not be resolved; reselect to retry
    Failed(IdentityId),
}

impl Target {
    pub fn id(&self) -> &IdentityId {
        match self {
            Target::Pending(id) | Target::Failed(id) => id,
            Target::Resolved { id, .. } => id,
        }
    }

    /// Payload if resolved
    pub fn payload(&self) -> Option<&DataUrl> {
        match self {
            Target::Resolved { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// Swap bookkeeping published in the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapCounters {
    /// Requests dispatched
    pub dispatched: u64,
    /// Results applied as the new anchor
    pub completed: u64,
    /// Requests the service failed
    pub failed: u64,
    /// Ticks that could not encode their frame
    pub encode_failures: u64,
    /// Results that arrived after the session moved on
    pub discarded: u64,
    /// Ticks skipped by the busy flag or a missing precondition
    pub skipped_ticks: u64,
}

/// Events consumed by the session state machine
#[derive(Debug)]
pub enum Message {
    // ===== User intent =====
    /// Power toggle (Inactive ↔ Active)
    TogglePower,
    /// Persona toggle (Active ↔ Swapping)
    TogglePersona,
    /// Stop the session and release everything
    Shutdown,

    // ===== Identity store =====
    /// The active selection changed (or its identity was removed)
    ActiveIdentityChanged(Option<Identity>),
    /// Target resolution finished
    TargetResolved {
        id: IdentityId,
        result: Result<DataUrl, EncodeError>,
    },

    // ===== Capture =====
    /// Device acquisition finished
    CaptureAcquired {
        attempt: u64,
        result: CaptureResult<CaptureSession>,
    },

    // ===== Swap loop =====
    /// Timer tick
    Tick,
    /// A swap request finished
    SwapFinished { epoch: u64, outcome: SwapOutcome },
}

/// Side effects requested by a transition, executed by the controller
#[derive(Debug, Clone)]
pub enum Effect {
    /// Start acquiring the capture device
    AcquireCapture { attempt: u64 },
    /// Start the periodic tick (first tick fires immediately)
    StartTicker,
    /// Stop the periodic tick
    StopTicker,
    /// Resolve an identity's image to its transportable form
    ResolveTarget(Identity),
    /// Send one swap request
    DispatchSwap(SwapJob),
}

/// The whole mutable session
#[derive(Debug, Default)]
pub struct SessionContext {
    pub status: SessionStatus,
    pub swap: SwapState,
    /// A swap request is in flight
    pub busy: bool,
    /// Image of the active identity
    pub target: Option<Target>,
    /// Advanced whenever in-flight results stop being applicable
    pub epoch: u64,
    /// Advanced for every acquisition started or abandoned
    pub capture_attempt: u64,
    /// Held while Active or Swapping; dropping it releases the device
    pub capture: Option<CaptureSession>,
    pub counters: SwapCounters,
    /// Last capture failure, cleared on the next successful acquisition
    pub last_error: Option<String>,
    /// Ticks seen while swapping
    pub ticks: u64,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only copy for the display layer
    pub fn view(&self) -> SessionView {
        SessionView {
            status: self.status,
            phase: self.swap.phase(),
            anchor: self.swap.anchor().cloned(),
            busy: self.busy,
            active_identity: self.target.as_ref().map(|t| t.id().clone()),
            target_ready: self.target.as_ref().is_some_and(|t| t.payload().is_some()),
            counters: self.counters,
            last_error: self.last_error.clone(),
        }
    }
}

/// Snapshot of the session published after every transition
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionView {
    pub status: SessionStatus,
    pub phase: SwapPhase,
    /// Latest output frame while swapping
    pub anchor: Option<DataUrl>,
    pub busy: bool,
    pub active_identity: Option<IdentityId>,
    /// The active identity's image is resolved
    pub target_ready: bool,
    pub counters: SwapCounters,
    pub last_error: Option<String>,
}

impl SessionView {
    /// Whether the persona toggle would do anything right now
    pub fn can_toggle_persona(&self) -> bool {
        match self.status {
            SessionStatus::Swapping => true,
            SessionStatus::Active => self.target_ready,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(data: &str) -> DataUrl {
        DataUrl::parse(format!("data:image/png;base64,{}", data)).unwrap()
    }

    #[test]
    fn test_anchor_only_in_synced() {
        assert!(SwapState::Idle.anchor().is_none());
        assert!(SwapState::Armed.anchor().is_none());
        let synced = SwapState::Synced { anchor: url("WA==") };
        assert_eq!(synced.anchor(), Some(&url("WA==")));
        assert_eq!(synced.phase(), SwapPhase::Synced);
    }

    #[test]
    fn test_target_accessors() {
        let id = IdentityId::from("a");
        assert!(Target::Pending(id.clone()).payload().is_none());
        let resolved = Target::Resolved {
            id: id.clone(),
            payload: url("AAAA"),
        };
        assert_eq!(resolved.id(), &id);
        assert!(resolved.payload().is_some());
    }

    #[test]
    fn test_view_of_default_context() {
        let view = SessionContext::new().view();
        assert_eq!(view.status, SessionStatus::Inactive);
        assert_eq!(view.phase, SwapPhase::Idle);
        assert!(view.anchor.is_none());
        assert!(!view.can_toggle_persona());
    }

    #[test]
    fn test_persona_toggle_gated_on_resolved_target() {
        let mut view = SessionView {
            status: SessionStatus::Active,
            ..SessionView::default()
        };
        assert!(!view.can_toggle_persona());
        view.target_ready = true;
        assert!(view.can_toggle_persona());

        view.status = SessionStatus::Loading;
        assert!(!view.can_toggle_persona());
    }
}
