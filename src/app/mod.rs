// SPDX-License-Identifier: MPL-2.0

//! Session application module
//!
//! Contains the session state machine, its message handling and the event
//! loop that drives it.
//!
//! # Architecture
//!
//! - `state`: session types (SessionContext, Message, Effect, SessionView)
//! - `update`: message dispatch into the handlers
//! - `handlers`: power, persona and swap transitions
//! - `frame_processor`: the detached swap request task
//!
//! ```text
//!  SessionHandle ──┐
//!  identity watch ─┼──► SessionController::run ──► SessionContext::update
//!  interval tick ──┤            │                         │
//!  task results ───┘            └──── execute(Effect) ◄───┘
//! ```
//!
//! All transitions happen on the loop task. Slow work (device acquisition,
//! target resolution, swap requests) runs in spawned tasks that report back
//! through the same message queue.

pub mod frame_processor;
mod handlers;
mod state;
mod update;

pub use frame_processor::{SwapJob, SwapOutcome};
pub use state::{
    Effect, Message, SessionContext, SessionStatus, SessionView, SwapCounters, SwapPhase,
    SwapState, Target,
};

use crate::backends::capture::{self, CaptureBackend, CaptureFormat};
use crate::backends::inference::InferenceService;
use crate::config::Config;
use crate::constants::timing;
use crate::errors::{AppError, AppResult};
use crate::identity::{IdentityId, IdentitySnapshot, IdentityStore};
use crate::media::ImageCodec;
use frame_processor::swap_task::SwapTask;
use futures::future::OptionFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Loop parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub tick_interval: Duration,
    pub capture_format: CaptureFormat,
    pub capture_timeout: Duration,
    pub request_timeout: Duration,
    pub jpeg_quality: u8,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            capture_format: CaptureFormat {
                width: config.capture_width,
                height: config.capture_height,
            },
            capture_timeout: config.capture_timeout(),
            request_timeout: config.request_timeout(),
            jpeg_quality: config.jpeg_quality(),
        }
    }

    /// Raise zero or tiny durations to their accepted minimum
    pub fn clamped(self) -> Self {
        Self {
            tick_interval: self.tick_interval.max(timing::MIN_TICK_INTERVAL),
            capture_timeout: self.capture_timeout.max(timing::MIN_TIMEOUT),
            request_timeout: self.request_timeout.max(timing::MIN_TIMEOUT),
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
            ..self
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Control surface for a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Message>,
    view_rx: watch::Receiver<SessionView>,
}

impl SessionHandle {
    fn send(&self, message: Message) -> AppResult<()> {
        self.tx.send(message).map_err(|_| AppError::SessionClosed)
    }

    /// Inactive ↔ Active
    pub fn toggle_power(&self) -> AppResult<()> {
        self.send(Message::TogglePower)
    }

    /// Active ↔ Swapping; ignored without a resolved active identity
    pub fn toggle_persona(&self) -> AppResult<()> {
        self.send(Message::TogglePersona)
    }

    /// Stop the loop, releasing the device
    pub fn shutdown(&self) -> AppResult<()> {
        self.send(Message::Shutdown)
    }

    /// Receive a view after every transition
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }
}

/// Owns the session context and executes its effects
pub struct SessionController {
    ctx: SessionContext,
    settings: SessionSettings,
    backend: Arc<dyn CaptureBackend>,
    codec: ImageCodec,
    swap_task: SwapTask,
    identities: watch::Receiver<IdentitySnapshot>,
    /// Active identity as last forwarded to the context
    active: Option<IdentityId>,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    /// Present only while swapping
    ticker: Option<Interval>,
    view_tx: watch::Sender<SessionView>,
}

impl SessionController {
    /// Create a controller and its handle
    ///
    /// Nothing happens until [`SessionController::run`] is awaited.
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        inference: Arc<dyn InferenceService>,
        store: &IdentityStore,
        settings: SessionSettings,
    ) -> (Self, SessionHandle) {
        let settings = settings.clamped();
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = SessionContext::new();
        let (view_tx, view_rx) = watch::channel(ctx.view());

        let controller = Self {
            ctx,
            settings,
            backend,
            codec: ImageCodec::new(settings.jpeg_quality),
            swap_task: SwapTask::new(inference, settings.jpeg_quality, settings.request_timeout),
            identities: store.subscribe(),
            active: None,
            tx: tx.clone(),
            rx,
            ticker: None,
            view_tx,
        };
        (controller, SessionHandle { tx, view_rx })
    }

    /// Run until a shutdown message arrives
    pub async fn run(mut self) {
        info!(
            backend = %self.backend.backend_type(),
            tick_secs = self.settings.tick_interval.as_secs_f32(),
            "Session loop started"
        );

        // Pick up a selection made before the loop started
        self.sync_active_identity();
        let mut identities_open = true;

        loop {
            tokio::select! {
                biased;

                message = self.rx.recv() => match message {
                    Some(Message::Shutdown) | None => break,
                    Some(message) => self.dispatch(message),
                },

                changed = self.identities.changed(), if identities_open => match changed {
                    Ok(()) => self.sync_active_identity(),
                    Err(_) => {
                        debug!("Identity store dropped");
                        identities_open = false;
                    }
                },

                Some(_) = OptionFuture::from(self.ticker.as_mut().map(|t| t.tick())) => {
                    self.dispatch(Message::Tick);
                }
            }
        }

        self.dispatch(Message::Shutdown);
        info!("Session loop stopped");
    }

    /// Forward the active identity to the context when it changes
    fn sync_active_identity(&mut self) {
        let active = self.identities.borrow_and_update().active_identity().cloned();
        let active_id = active.as_ref().map(|i| i.id.clone());
        if active_id != self.active {
            self.active = active_id;
            self.dispatch(Message::ActiveIdentityChanged(active));
        }
    }

    fn dispatch(&mut self, message: Message) {
        let effects = self.ctx.update(message);
        for effect in effects {
            self.execute(effect);
        }
        self.view_tx.send_replace(self.ctx.view());
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::AcquireCapture { attempt } => {
                let backend = Arc::clone(&self.backend);
                let format = self.settings.capture_format;
                let timeout = self.settings.capture_timeout;
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = capture::acquire_session(backend, format, timeout).await;
                    // A send failure drops the session, releasing the device
                    let _ = tx.send(Message::CaptureAcquired { attempt, result });
                });
            }
            Effect::StartTicker => {
                let mut interval = tokio::time::interval(self.settings.tick_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.ticker = Some(interval);
                debug!("Ticker started");
            }
            Effect::StopTicker => {
                if self.ticker.take().is_some() {
                    debug!("Ticker stopped");
                }
            }
            Effect::ResolveTarget(identity) => {
                let codec = self.codec.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = codec.resource_to_transportable(&identity.image_resource).await;
                    let _ = tx.send(Message::TargetResolved {
                        id: identity.id,
                        result,
                    });
                });
            }
            Effect::DispatchSwap(job) => {
                let task = self.swap_task.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let epoch = job.epoch;
                    let outcome = task.run(job).await;
                    if tx.send(Message::SwapFinished { epoch, outcome }).is_err() {
                        warn!(epoch, "Session gone before swap finished");
                    }
                });
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("status", &self.ctx.status)
            .field("settings", &self.settings)
            .field("ticking", &self.ticker.is_some())
            .finish()
    }
}
