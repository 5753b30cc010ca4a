// SPDX-License-Identifier: MPL-2.0

//! Persona Feed - live persona swapping for a camera feed
//!
//! Applies a selected persona face onto a live camera feed by periodically
//! sending frames to an image generation service and keeping the latest
//! result on display.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Session state machine, swap loop and its event loop
//! - [`backends`]: Capture device and inference service abstraction
//! - [`identity`]: Persona identities and the active selection
//! - [`media`]: Image encoding and the transport envelope
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let store = IdentityStore::new(inference.clone(), ImageCodec::default());
//! let (controller, handle) =
//!     SessionController::new(backend, inference, &store, SessionSettings::default());
//! tokio::spawn(controller.run());
//!
//! let persona = store.add("Ada", ImageResource::parse("ada.png"));
//! store.select(&persona.id);
//! handle.toggle_power()?;
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod identity;
pub mod media;

// Re-export commonly used types
pub use app::{SessionController, SessionHandle, SessionSettings, SessionStatus, SessionView};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use identity::{Identity, IdentityId, IdentityStore};
pub use media::{DataUrl, ImageCodec, ImageResource};
