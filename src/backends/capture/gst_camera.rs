// SPDX-License-Identifier: MPL-2.0

//! GStreamer camera capture
//!
//! Builds `autovideosrc ! videoconvert ! video/x-raw,format=RGBA ! appsink`.
//! The appsink callback keeps only the newest frame; snapshots clone it.
//! The requested resolution is tried first, then the pipeline is rebuilt
//! without a size constraint so cameras that cannot do 1280x720 still work.

use super::{
    CaptureBackend, CaptureBackendType, CaptureFormat, CaptureFrame, CaptureResult, CaptureStream,
    PixelFormat,
};
use crate::constants::capture;
use crate::errors::CaptureError;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Seconds to wait for the pipeline to reach PLAYING
const START_TIMEOUT_SECS: u64 = 5;

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Live camera backend
#[derive(Debug, Clone)]
pub struct GstreamerBackend {
    /// Source element description (e.g. "autovideosrc", "v4l2src device=/dev/video2")
    source: String,
}

impl Default for GstreamerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GstreamerBackend {
    pub fn new() -> Self {
        Self::with_source("autovideosrc")
    }

    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    fn pipeline_description(&self, hint: Option<CaptureFormat>) -> String {
        let caps = match hint {
            Some(format) => format!(
                "video/x-raw,format={},width={},height={}",
                capture::OUTPUT_FORMAT,
                format.width,
                format.height
            ),
            None => format!("video/x-raw,format={}", capture::OUTPUT_FORMAT),
        };
        format!(
            "{} ! videoconvert ! {} ! appsink name=sink max-buffers={} drop=true sync=false",
            self.source,
            caps,
            capture::MAX_BUFFERS
        )
    }

    fn start(&self, hint: Option<CaptureFormat>) -> CaptureResult<GstreamerStream> {
        let description = self.pipeline_description(hint);
        debug!(pipeline = %description, "Creating capture pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| CaptureError::InitializationFailed(e.to_string()))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| CaptureError::InitializationFailed("Failed to downcast to Pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CaptureError::InitializationFailed("Failed to find appsink".into()))?
            .downcast::<AppSink>()
            .map_err(|_| CaptureError::InitializationFailed("Failed to downcast to AppSink".into()))?;

        let latest: Arc<Mutex<Option<CaptureFrame>>> = Arc::new(Mutex::new(None));
        let latest_clone = Arc::clone(&latest);

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
                    let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                    match frame_from_sample(&sample) {
                        Ok(frame) => {
                            if frame_num % 300 == 0 {
                                debug!(
                                    frame = frame_num,
                                    width = frame.width,
                                    height = frame.height,
                                    "Capture frame received"
                                );
                            }
                            *latest_clone.lock() = Some(frame);
                        }
                        Err(e) => {
                            if frame_num % 30 == 0 {
                                warn!(frame = frame_num, error = %e, "Failed to read sample");
                            }
                        }
                    }
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        let stream = GstreamerStream {
            pipeline,
            latest,
            description: description.clone(),
        };

        stream
            .pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CaptureError::InitializationFailed(format!("Failed to start: {:?}", e)))?;

        let (result, current, _pending) = stream
            .pipeline
            .state(gstreamer::ClockTime::from_seconds(START_TIMEOUT_SECS));
        if let Err(e) = result {
            let message = pipeline_error(&stream.pipeline).unwrap_or_else(|| format!("{:?}", e));
            return Err(classify_start_error(message));
        }
        debug!(state = ?current, "Capture pipeline started");

        // Dropping `stream` on the error paths above stops the pipeline
        Ok(stream)
    }
}

impl CaptureBackend for GstreamerBackend {
    fn acquire(&self, format: &CaptureFormat) -> CaptureResult<Box<dyn CaptureStream>> {
        gstreamer::init().map_err(|e| CaptureError::InitializationFailed(e.to_string()))?;

        let mut last_error = None;
        for hint in [Some(*format), None] {
            match self.start(hint) {
                Ok(stream) => {
                    info!(pipeline = %stream.description, "Capture pipeline running");
                    return Ok(Box::new(stream));
                }
                Err(e) => {
                    debug!(hint = ?hint, error = %e, "Capture pipeline failed");
                    last_error = Some(e);
                }
            }
        }

        let err = last_error.unwrap_or(CaptureError::NoDeviceFound);
        error!(error = %err, "All capture pipelines failed");
        Err(err)
    }

    fn backend_type(&self) -> CaptureBackendType {
        CaptureBackendType::Gstreamer
    }

    fn is_available(&self) -> bool {
        gstreamer::init().is_ok()
            && gstreamer::ElementFactory::find("videoconvert").is_some()
            && gstreamer::ElementFactory::find("appsink").is_some()
    }
}

/// A running capture pipeline
struct GstreamerStream {
    pipeline: gstreamer::Pipeline,
    latest: Arc<Mutex<Option<CaptureFrame>>>,
    description: String,
}

impl CaptureStream for GstreamerStream {
    fn snapshot(&self) -> Option<CaptureFrame> {
        self.latest.lock().clone()
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

impl Drop for GstreamerStream {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = ?e, "Failed to stop capture pipeline");
        }
    }
}

/// First error message waiting on the pipeline bus, if any
fn pipeline_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(msg) = bus.pop() {
        if let gstreamer::MessageView::Error(err) = msg.view() {
            return Some(err.error().to_string());
        }
    }
    None
}

fn classify_start_error(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("not authorized") {
        CaptureError::PermissionDenied(message)
    } else if lower.contains("not found") || lower.contains("no such") {
        CaptureError::NoDeviceFound
    } else {
        CaptureError::InitializationFailed(message)
    }
}

/// Copy an RGBA sample into a frame, sized from the negotiated caps
fn frame_from_sample(sample: &gstreamer::Sample) -> Result<CaptureFrame, String> {
    let caps = sample.caps().ok_or("No caps on sample")?;
    let info = gstreamer_video::VideoInfo::from_caps(caps).map_err(|e| e.to_string())?;
    let buffer = sample.buffer().ok_or("No buffer in sample")?;
    let map = buffer.map_readable().map_err(|e| e.to_string())?;

    let stride = info.stride().first().copied().unwrap_or(info.width() as i32 * 4);

    Ok(CaptureFrame {
        width: info.width(),
        height: info.height(),
        data: Arc::from(map.as_slice()),
        format: PixelFormat::Rgba,
        stride: stride.max(0) as u32,
        captured_at: Instant::now(),
    })
}
