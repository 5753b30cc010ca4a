// SPDX-License-Identifier: MPL-2.0

//! Persona identity types

use crate::media::ImageResource;
use chrono::{DateTime, Utc};
use std::fmt;

/// Opaque identity id (UUID v4 string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityId(String);

impl IdentityId {
    /// Fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for IdentityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Refinement progress of an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingStatus {
    /// Refinement scheduled or running
    #[default]
    Processing,
    /// Refinement produced a description
    Ready,
    /// Refinement failed; the identity can still be used
    Error,
}

impl EmbeddingStatus {
    /// Processing is the only non-terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EmbeddingStatus::Processing)
    }
}

impl fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingStatus::Processing => write!(f, "processing"),
            EmbeddingStatus::Ready => write!(f, "ready"),
            EmbeddingStatus::Error => write!(f, "error"),
        }
    }
}

/// A stored persona
///
/// `image_resource` is fixed at creation. Uploading a new image means adding
/// a new identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: IdentityId,
    pub name: String,
    pub image_resource: ImageResource,
    pub embedding_status: EmbeddingStatus,
    /// Face description produced by refinement
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub(crate) fn new(name: impl Into<String>, image_resource: ImageResource) -> Self {
        Self {
            id: IdentityId::generate(),
            name: name.into(),
            image_resource,
            embedding_status: EmbeddingStatus::Processing,
            description: None,
            created_at: Utc::now(),
        }
    }
}

/// Point-in-time copy of the store, published on every mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySnapshot {
    /// Identities in insertion order
    pub identities: Vec<Identity>,
    pub active: Option<IdentityId>,
}

impl IdentitySnapshot {
    /// The selected identity, if any
    pub fn active_identity(&self) -> Option<&Identity> {
        let active = self.active.as_ref()?;
        self.identities.iter().find(|i| &i.id == active)
    }

    pub fn get(&self, id: &IdentityId) -> Option<&Identity> {
        self.identities.iter().find(|i| &i.id == id)
    }
}
