// SPDX-License-Identifier: MPL-2.0

//! Frame processor for the swap loop
//!
//! A tick hands the processor one captured frame plus the target and anchor
//! images. The processor encodes the frame, sends the swap request and
//! reports a [`SwapOutcome`]. It never touches session state; the event loop
//! decides on arrival whether the outcome still applies.

pub mod tasks;
pub mod types;

pub use tasks::swap_task;
pub use types::{SwapJob, SwapOutcome};
