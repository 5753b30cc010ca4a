// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer
//!
//! The session talks to two kinds of external collaborator, each behind a
//! trait so the event loop never depends on a concrete device or service:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Session Controller              │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │   Capture   │    │    Inference     │   │
//! │  │ (file/GSt)  │    │    (Gemini)      │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! - [`capture`]: video source acquisition and frame snapshots
//! - [`inference`]: swap and refinement requests

pub mod capture;
pub mod inference;
