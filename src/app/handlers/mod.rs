// SPDX-License-Identifier: GPL-3.0-only

//! Message handler modules
//!
//! Handlers are grouped by the part of the session they drive:
//!
//! - `camera`: power toggle and capture acquisition
//! - `persona`: active identity tracking and the persona toggle
//! - `swap`: ticks, swap completion and leaving `Swapping`

pub mod camera;
pub mod persona;
pub mod swap;
