// SPDX-License-Identifier: MPL-2.0

//! Identity store
//!
//! Holds the persona identities and the single active selection. The store
//! is a cheap cloneable handle; all clones share one list. Every mutation
//! publishes a fresh [`IdentitySnapshot`] on a watch channel, which is how
//! the session controller and any display layer observe it.
//!
//! Adding an identity schedules its refinement in the background:
//!
//! ```text
//! add ──► Processing ──refine ok──► Ready
//!                    └─refine err─► Error   (still selectable)
//! ```

pub mod types;

pub use types::{EmbeddingStatus, Identity, IdentityId, IdentitySnapshot};

use crate::backends::inference::InferenceService;
use crate::constants::prompts::REFINE_INSTRUCTION;
use crate::errors::AppError;
use crate::media::{ImageCodec, ImageResource, strip_envelope};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Inner {
    identities: Vec<Identity>,
    active: Option<IdentityId>,
}

impl Inner {
    fn snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot {
            identities: self.identities.clone(),
            active: self.active.clone(),
        }
    }

    fn find_mut(&mut self, id: &IdentityId) -> Option<&mut Identity> {
        self.identities.iter_mut().find(|i| &i.id == id)
    }
}

/// Shared identity list with single selection
#[derive(Clone)]
pub struct IdentityStore {
    inner: Arc<Mutex<Inner>>,
    snapshot_tx: Arc<watch::Sender<IdentitySnapshot>>,
    inference: Arc<dyn InferenceService>,
    codec: ImageCodec,
}

impl IdentityStore {
    /// Create an empty store refining new identities through `inference`
    pub fn new(inference: Arc<dyn InferenceService>, codec: ImageCodec) -> Self {
        let (snapshot_tx, _) = watch::channel(IdentitySnapshot::default());
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            snapshot_tx: Arc::new(snapshot_tx),
            inference,
            codec,
        }
    }

    /// Apply a mutation and publish the result while still holding the lock,
    /// so snapshots are observed in mutation order
    fn mutate<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock();
        let result = f(&mut inner);
        self.snapshot_tx.send_replace(inner.snapshot());
        result
    }

    /// Add a persona and schedule its refinement
    ///
    /// Returns immediately with the new identity in `Processing`.
    pub fn add(&self, name: impl Into<String>, resource: ImageResource) -> Identity {
        let identity = Identity::new(name, resource);
        info!(identity = %identity.id, name = %identity.name, "Identity added");

        self.mutate(|inner| inner.identities.push(identity.clone()));

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.clone();
                let id = identity.id.clone();
                let resource = identity.image_resource.clone();
                handle.spawn(async move {
                    match store.refine(&resource).await {
                        Ok(description) => store.mark_ready(&id, description),
                        Err(e) => {
                            warn!(identity = %id, error = %e, "Identity refinement failed");
                            store.mark_error(&id);
                        }
                    }
                });
            }
            Err(_) => {
                warn!(identity = %identity.id, "No async runtime, cannot refine identity");
                self.mark_error(&identity.id);
            }
        }

        identity
    }

    async fn refine(&self, resource: &ImageResource) -> Result<String, AppError> {
        let url = self.codec.resource_to_transportable(resource).await?;
        let payload = strip_envelope(&url);
        Ok(self.inference.refine(&payload, REFINE_INSTRUCTION).await?)
    }

    /// Refinement succeeded
    ///
    /// No-op if the identity was removed meanwhile or already settled.
    pub fn mark_ready(&self, id: &IdentityId, description: String) {
        self.mutate(|inner| match inner.find_mut(id) {
            Some(identity) if !identity.embedding_status.is_terminal() => {
                identity.embedding_status = EmbeddingStatus::Ready;
                identity.description = Some(description);
                info!(identity = %id, "Identity ready");
            }
            Some(_) => debug!(identity = %id, "Identity already settled"),
            None => debug!(identity = %id, "Identity removed before refinement finished"),
        });
    }

    /// Refinement failed
    ///
    /// No-op if the identity was removed meanwhile or already settled.
    pub fn mark_error(&self, id: &IdentityId) {
        self.mutate(|inner| match inner.find_mut(id) {
            Some(identity) if !identity.embedding_status.is_terminal() => {
                identity.embedding_status = EmbeddingStatus::Error;
            }
            Some(_) => debug!(identity = %id, "Identity already settled"),
            None => debug!(identity = %id, "Identity removed before refinement finished"),
        });
    }

    /// Delete an identity, clearing the selection if it was active
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, id: &IdentityId) -> bool {
        self.mutate(|inner| {
            let before = inner.identities.len();
            inner.identities.retain(|i| &i.id != id);
            let removed = inner.identities.len() != before;

            if inner.active.as_ref() == Some(id) {
                inner.active = None;
                info!(identity = %id, "Active identity removed, selection cleared");
            }
            if removed {
                info!(identity = %id, "Identity removed");
            }
            removed
        })
    }

    /// Toggle selection
    ///
    /// Selecting the active identity deselects it. Unknown ids are ignored.
    pub fn select(&self, id: &IdentityId) {
        self.mutate(|inner| {
            if inner.active.as_ref() == Some(id) {
                inner.active = None;
                info!(identity = %id, "Identity deselected");
            } else if inner.identities.iter().any(|i| &i.id == id) {
                inner.active = Some(id.clone());
                info!(identity = %id, "Identity selected");
            } else {
                debug!(identity = %id, "Ignoring selection of unknown identity");
            }
        });
    }

    pub fn deselect(&self) {
        self.mutate(|inner| {
            if let Some(id) = inner.active.take() {
                info!(identity = %id, "Identity deselected");
            }
        });
    }

    pub fn list(&self) -> Vec<Identity> {
        self.inner.lock().identities.clone()
    }

    pub fn get(&self, id: &IdentityId) -> Option<Identity> {
        self.inner
            .lock()
            .identities
            .iter()
            .find(|i| &i.id == id)
            .cloned()
    }

    /// Currently selected identity
    pub fn active(&self) -> Option<Identity> {
        let inner = self.inner.lock();
        let active = inner.active.as_ref()?;
        inner.identities.iter().find(|i| &i.id == active).cloned()
    }

    pub fn snapshot(&self) -> IdentitySnapshot {
        self.inner.lock().snapshot()
    }

    /// Receive a snapshot after every mutation
    pub fn subscribe(&self) -> watch::Receiver<IdentitySnapshot> {
        self.snapshot_tx.subscribe()
    }
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("IdentityStore")
            .field("identities", &inner.identities.len())
            .field("active", &inner.active)
            .finish()
    }
}
