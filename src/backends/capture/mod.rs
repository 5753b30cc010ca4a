// SPDX-License-Identifier: MPL-2.0

//! Capture backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │  SessionController  │  ← owns the CaptureSession while Active/Swapping
//! └──────────┬──────────┘
//!            │ acquire / snapshot / drop
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureBackend Trait│  ← common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴──────┐
//!       ▼           ▼
//!  ┌──────────┐ ┌──────────┐
//!  │StillImage│ │GStreamer │
//!  └──────────┘ └──────────┘
//! ```
//!
//! Acquisition is scoped: a [`CaptureSession`] releases its device when it is
//! dropped, so every exit path (power off, failed transition, panic while
//! unwinding, controller shutdown) gives the device back.

#[cfg(feature = "gstreamer")]
pub mod gst_camera;
pub mod still_image;
pub mod types;

pub use still_image::StillImageBackend;
pub use types::*;

use crate::errors::CaptureError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// A capture backend able to open a video source
pub trait CaptureBackend: Send + Sync {
    /// Open the source and start delivering frames
    ///
    /// May block while the device starts; callers run it off the event loop.
    /// The format is a hint and the stream may deliver another resolution.
    fn acquire(&self, format: &CaptureFormat) -> CaptureResult<Box<dyn CaptureStream>>;

    /// Get the backend type identifier
    fn backend_type(&self) -> CaptureBackendType;

    /// Check if this backend can be used on the current system
    fn is_available(&self) -> bool;
}

/// An open video source
///
/// Implementations release their device in `Drop`.
pub trait CaptureStream: Send + Sync {
    /// Most recent decoded frame
    ///
    /// `None` means nothing has been decoded yet. That is a transient empty
    /// state, not an error.
    fn snapshot(&self) -> Option<CaptureFrame>;

    /// Short human readable description for logs
    fn describe(&self) -> String;
}

/// Scoped ownership of an acquired stream
pub struct CaptureSession {
    stream: Box<dyn CaptureStream>,
    description: String,
}

impl CaptureSession {
    pub fn new(stream: Box<dyn CaptureStream>) -> Self {
        let description = stream.describe();
        info!(source = %description, "Capture acquired");
        Self {
            stream,
            description,
        }
    }

    /// Most recent frame, if any
    pub fn snapshot(&self) -> Option<CaptureFrame> {
        self.stream.snapshot()
    }

    /// Release the device now
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        info!(source = %self.description, "Capture released");
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("source", &self.description)
            .finish()
    }
}

/// Acquire a session off the event loop, bounded by `timeout`
///
/// If the timeout fires first, the blocking acquisition keeps running to
/// completion and its stream is dropped (and thereby released) as soon as it
/// arrives.
pub async fn acquire_session(
    backend: Arc<dyn CaptureBackend>,
    format: CaptureFormat,
    timeout: Duration,
) -> CaptureResult<CaptureSession> {
    debug!(backend = %backend.backend_type(), format = %format, "Acquiring capture");

    let task = tokio::task::spawn_blocking(move || backend.acquire(&format));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result.map(CaptureSession::new),
        Ok(Err(e)) => Err(CaptureError::InitializationFailed(format!(
            "Acquisition task failed: {}",
            e
        ))),
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Capture acquisition timed out");
            Err(CaptureError::Timeout(timeout.as_secs()))
        }
    }
}

/// Create a backend instance for the given type
///
/// `source` is the file or directory served by the still-image backend; the
/// GStreamer backend ignores it.
pub fn get_backend(
    backend_type: CaptureBackendType,
    source: Option<PathBuf>,
) -> CaptureResult<Arc<dyn CaptureBackend>> {
    let backend: Arc<dyn CaptureBackend> = match backend_type {
        CaptureBackendType::StillImage => {
            let path = source.ok_or_else(|| {
                CaptureError::NotAvailable("still-image backend needs a source path".into())
            })?;
            Arc::new(StillImageBackend::new(path))
        }
        #[cfg(feature = "gstreamer")]
        CaptureBackendType::Gstreamer => Arc::new(gst_camera::GstreamerBackend::new()),
        #[cfg(not(feature = "gstreamer"))]
        CaptureBackendType::Gstreamer => {
            return Err(CaptureError::NotAvailable(
                "built without the `gstreamer` feature".into(),
            ));
        }
    };

    if !backend.is_available() {
        return Err(CaptureError::NotAvailable(format!(
            "{} backend cannot be used on this system",
            backend_type
        )));
    }
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStream {
        drops: Arc<AtomicUsize>,
    }

    impl CaptureStream for CountingStream {
        fn snapshot(&self) -> Option<CaptureFrame> {
            None
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    impl Drop for CountingStream {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct SlowBackend {
        drops: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl CaptureBackend for SlowBackend {
        fn acquire(&self, _format: &CaptureFormat) -> CaptureResult<Box<dyn CaptureStream>> {
            std::thread::sleep(self.delay);
            Ok(Box::new(CountingStream {
                drops: Arc::clone(&self.drops),
            }))
        }

        fn backend_type(&self) -> CaptureBackendType {
            CaptureBackendType::StillImage
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    const FORMAT: CaptureFormat = CaptureFormat {
        width: 1280,
        height: 720,
    };

    #[test]
    fn test_session_release_drops_stream() {
        let drops = Arc::new(AtomicUsize::new(0));
        let session = CaptureSession::new(Box::new(CountingStream {
            drops: Arc::clone(&drops),
        }));
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        session.release();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_session_success() {
        let drops = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(SlowBackend {
            drops: Arc::clone(&drops),
            delay: Duration::ZERO,
        });
        let session = acquire_session(backend, FORMAT, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(session.snapshot().is_none());
        drop(session);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_session_timeout_releases_late_stream() {
        let drops = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(SlowBackend {
            drops: Arc::clone(&drops),
            delay: Duration::from_millis(200),
        });
        let result = acquire_session(backend, FORMAT, Duration::from_millis(10)).await;
        assert_eq!(result.unwrap_err(), CaptureError::Timeout(0));

        // The blocking acquisition finishes later and its stream is dropped
        for _ in 0..50 {
            if drops.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_still_image_backend_requires_source() {
        assert!(matches!(
            get_backend(CaptureBackendType::StillImage, None),
            Err(CaptureError::NotAvailable(_))
        ));
    }

    #[test]
    fn test_unavailable_backend_is_rejected() {
        let missing = PathBuf::from("/nonexistent/persona-feed/frames");
        assert!(matches!(
            get_backend(CaptureBackendType::StillImage, Some(missing)),
            Err(CaptureError::NotAvailable(_))
        ));
    }
}
