// SPDX-License-Identifier: GPL-3.0-only

//! Still image source
//!
//! Serves an image file, or every image in a directory in name order, as a
//! live source. Each snapshot advances to the next image so a directory of
//! stills behaves like a slow slideshow camera.

use super::{CaptureBackend, CaptureBackendType, CaptureFormat, CaptureFrame, CaptureResult, CaptureStream};
use crate::constants::file_formats;
use crate::errors::CaptureError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Backend serving still images from disk
#[derive(Debug, Clone)]
pub struct StillImageBackend {
    path: PathBuf,
}

impl StillImageBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Image files to serve, sorted by name
    fn source_files(&self) -> CaptureResult<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        if !self.path.is_dir() {
            return Err(CaptureError::NoDeviceFound);
        }

        let entries = std::fs::read_dir(&self.path)
            .map_err(|e| CaptureError::Io(format!("{}: {}", self.path.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(file_formats::is_image_extension)
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::NoDeviceFound);
        }
        Ok(files)
    }
}

impl CaptureBackend for StillImageBackend {
    fn acquire(&self, format: &CaptureFormat) -> CaptureResult<Box<dyn CaptureStream>> {
        let files = self.source_files()?;
        let frames = files
            .iter()
            .map(|path| load_image_as_frame(path))
            .collect::<CaptureResult<Vec<_>>>()?;

        if let Some(first) = frames.first()
            && (first.width != format.width || first.height != format.height)
        {
            debug!(
                requested = %format,
                width = first.width,
                height = first.height,
                "Still source differs from requested format"
            );
        }

        Ok(Box::new(StillImageStream {
            description: self.path.display().to_string(),
            frames,
            cursor: AtomicUsize::new(0),
        }))
    }

    fn backend_type(&self) -> CaptureBackendType {
        CaptureBackendType::StillImage
    }

    fn is_available(&self) -> bool {
        self.path.exists()
    }
}

/// Stream cycling through preloaded frames
struct StillImageStream {
    description: String,
    frames: Vec<CaptureFrame>,
    cursor: AtomicUsize,
}

impl CaptureStream for StillImageStream {
    fn snapshot(&self) -> Option<CaptureFrame> {
        if self.frames.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        Some(self.frames[index].restamped())
    }

    fn describe(&self) -> String {
        format!("{} ({} image(s))", self.description, self.frames.len())
    }
}

/// Load an image file and convert it to an RGB frame
///
/// Supports common image formats: PNG, JPEG, GIF, BMP, WebP
pub fn load_image_as_frame(path: &Path) -> CaptureResult<CaptureFrame> {
    info!(path = %path.display(), "Loading image file");

    let img = image::open(path)
        .map_err(|e| CaptureError::Io(format!("Failed to load image '{}': {}", path.display(), e)))?;

    // Alpha is dropped at encode time anyway
    let rgb = img.to_rgb8();
    let width = rgb.width();
    let height = rgb.height();

    debug!(width, height, "Image loaded successfully");

    Ok(CaptureFrame::from_rgb(width, height, rgb.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::capture::PixelFormat;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32, color: [u8; 4]) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(width, height, Rgba(color))
            .save(&path)
            .unwrap();
        path
    }

    const HINT: CaptureFormat = CaptureFormat {
        width: 1280,
        height: 720,
    };

    #[test]
    fn test_single_file_keeps_native_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "face.png", 32, 24, [10, 20, 30, 255]);

        let stream = StillImageBackend::new(&path).acquire(&HINT).unwrap();
        let frame = stream.snapshot().unwrap();
        assert_eq!((frame.width, frame.height), (32, 24));
        assert_eq!(frame.format, PixelFormat::Rgb24);
        assert_eq!(&frame.data[0..3], &[10, 20, 30]);
    }

    #[test]
    fn test_directory_cycles_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 2, 2, [0, 255, 0, 255]);
        write_png(dir.path(), "a.png", 2, 2, [255, 0, 0, 255]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let stream = StillImageBackend::new(dir.path()).acquire(&HINT).unwrap();
        let first = stream.snapshot().unwrap();
        let second = stream.snapshot().unwrap();
        let third = stream.snapshot().unwrap();
        assert_eq!(first.data[0], 255);
        assert_eq!(second.data[1], 255);
        assert_eq!(third.data[0], 255);
    }

    #[test]
    fn test_missing_source_is_no_device() {
        let backend = StillImageBackend::new("/nonexistent/persona-feed/source.png");
        assert!(!backend.is_available());
        assert!(matches!(
            backend.acquire(&HINT),
            Err(CaptureError::NoDeviceFound)
        ));
    }

    #[test]
    fn test_empty_directory_is_no_device() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StillImageBackend::new(dir.path()).acquire(&HINT),
            Err(CaptureError::NoDeviceFound)
        ));
    }
}
