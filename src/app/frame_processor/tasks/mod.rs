// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing tasks
//!
//! Each task runs detached from the event loop and reports back through a
//! message.

pub mod swap_task;

pub use swap_task::SwapTask;
