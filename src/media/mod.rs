// SPDX-License-Identifier: MPL-2.0

//! Media encoding for the swap loop
//!
//! - [`data_url`]: the transportable image representation and the envelope
//!   stripping used at the inference boundary
//! - [`codec`]: resource resolution and frame encoding

pub mod codec;
pub mod data_url;

// Re-export commonly used types
pub use codec::{ImageCodec, ImageResource, frame_to_transportable};
pub use data_url::{DataUrl, TransportPayload, strip_envelope};
