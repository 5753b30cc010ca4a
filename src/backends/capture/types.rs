// SPDX-License-Identifier: GPL-3.0-only
// Shared types for capture backends

//! Shared types for capture backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Capture backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureBackendType {
    /// Still image file or directory of images served as a live source
    StillImage,
    /// Live camera through GStreamer (requires the `gstreamer` feature)
    Gstreamer,
}

impl Default for CaptureBackendType {
    fn default() -> Self {
        if cfg!(feature = "gstreamer") {
            CaptureBackendType::Gstreamer
        } else {
            CaptureBackendType::StillImage
        }
    }
}

impl std::fmt::Display for CaptureBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureBackendType::StillImage => write!(f, "still-image"),
            CaptureBackendType::Gstreamer => write!(f, "GStreamer"),
        }
    }
}

/// Requested capture format
///
/// Only a hint: backends may deliver any resolution, and every consumer sizes
/// itself from the frames it actually receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format for captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    Rgba,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    Rgb24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Rgb24 => 3,
        }
    }
}

/// A single captured frame
///
/// Pixel data is shared, so cloning a frame for a background task is cheap.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// When the frame was captured
    pub captured_at: Instant,
}

impl CaptureFrame {
    /// Build a tightly packed RGBA frame
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Rgba,
            stride: width * 4,
            captured_at: Instant::now(),
        }
    }

    /// Copy the pixel rows into a packed RGB buffer, dropping stride padding
    /// and alpha
    ///
    /// Returns `None` when the buffer is shorter than the declared geometry.
    pub fn to_packed_rgb(&self) -> Option<Vec<u8>> {
        let width = self.width as usize;
        let height = self.height as usize;
        let stride = self.stride as usize;
        let bpp = self.format.bytes_per_pixel();

        if width == 0 || height == 0 || stride < width * bpp {
            return None;
        }
        if self.data.len() < stride * (height - 1) + width * bpp {
            return None;
        }

        let mut rgb = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            let row = &self.data[y * stride..y * stride + width * bpp];
            match self.format {
                PixelFormat::Rgb24 => rgb.extend_from_slice(row),
                PixelFormat::Rgba => {
                    for px in row.chunks_exact(4) {
                        rgb.extend_from_slice(&px[..3]);
                    }
                }
            }
        }
        Some(rgb)
    }

    /// Build a tightly packed RGB frame
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Rgb24,
            stride: width * 3,
            captured_at: Instant::now(),
        }
    }

    /// Same frame with a fresh capture timestamp
    pub fn restamped(&self) -> Self {
        Self {
            captured_at: Instant::now(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_packed_rgb_strips_stride_and_alpha() {
        let data: Vec<u8> = vec![
            255, 0, 0, 255, // Red pixel
            0, 255, 0, 255, // Green pixel
            0, 0, // stride padding
            0, 0, 255, 255, // Blue pixel
            255, 255, 255, 255, // White pixel
            0, 0, // stride padding
        ];

        let frame = CaptureFrame {
            width: 2,
            height: 2,
            data: Arc::from(data.as_slice()),
            format: PixelFormat::Rgba,
            stride: 10,
            captured_at: Instant::now(),
        };

        let rgb = frame.to_packed_rgb().unwrap();
        assert_eq!(rgb.len(), 12);
        assert_eq!(&rgb[0..3], &[255, 0, 0]);
        assert_eq!(&rgb[3..6], &[0, 255, 0]);
        assert_eq!(&rgb[6..9], &[0, 0, 255]);
        assert_eq!(&rgb[9..12], &[255, 255, 255]);
    }

    #[test]
    fn test_rgb_frame_passes_rows_through() {
        let frame = CaptureFrame::from_rgb(2, 1, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(frame.stride, 6);
        assert_eq!(frame.to_packed_rgb(), Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_to_packed_rgb_rejects_short_buffer() {
        let frame = CaptureFrame {
            width: 4,
            height: 4,
            data: Arc::from(vec![0u8; 20].as_slice()),
            format: PixelFormat::Rgba,
            stride: 16,
            captured_at: Instant::now(),
        };
        assert!(frame.to_packed_rgb().is_none());
    }
}
