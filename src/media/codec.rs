// SPDX-License-Identifier: GPL-3.0-only

//! Image codec
//!
//! Turns persona resources and captured frames into [`DataUrl`]s:
//! - inline resources pass through untouched (no re-encode, no quality loss)
//! - file and http(s) resources are fetched, decoded and re-encoded as JPEG
//! - frames are encoded as JPEG at the configured quality
//!
//! Encoding runs in a blocking task so the event loop never stalls on it.

use super::data_url::DataUrl;
use crate::backends::capture::CaptureFrame;
use crate::constants::encoding;
use crate::errors::EncodeError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Where a persona image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageResource {
    /// Already encoded data URL
    Inline(DataUrl),
    /// File path, `file://` URI or `http(s)://` URL
    Uri(String),
}

impl ImageResource {
    /// Interpret user input: valid data URLs become inline resources,
    /// everything else is a URI
    pub fn parse(input: &str) -> Self {
        if DataUrl::is_data_url(input)
            && let Ok(url) = DataUrl::parse(input)
        {
            return ImageResource::Inline(url);
        }
        ImageResource::Uri(input.to_string())
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ImageResource::Inline(_))
    }
}

impl From<DataUrl> for ImageResource {
    fn from(url: DataUrl) -> Self {
        ImageResource::Inline(url)
    }
}

impl From<PathBuf> for ImageResource {
    fn from(path: PathBuf) -> Self {
        ImageResource::Uri(path.to_string_lossy().into_owned())
    }
}

/// Converts resources and frames into transportable images
#[derive(Debug, Clone)]
pub struct ImageCodec {
    http: reqwest::Client,
    quality: u8,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(encoding::FRAME_JPEG_QUALITY)
    }
}

impl ImageCodec {
    /// Create a codec encoding at the given JPEG quality (clamped to 1-100)
    pub fn new(quality: u8) -> Self {
        Self::with_client(reqwest::Client::new(), quality)
    }

    pub fn with_client(http: reqwest::Client, quality: u8) -> Self {
        Self {
            http,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Resolve a persona resource to its transportable form
    ///
    /// Inline resources are returned unchanged, byte for byte.
    pub async fn resource_to_transportable(
        &self,
        resource: &ImageResource,
    ) -> Result<DataUrl, EncodeError> {
        let uri = match resource {
            ImageResource::Inline(url) => return Ok(url.clone()),
            ImageResource::Uri(uri) => uri,
        };

        let bytes = self.fetch(uri).await?;
        let quality = self.quality;
        let url = run_blocking(move || reencode_as_jpeg(&bytes, quality)).await?;

        info!(uri = %uri, size = url.len(), "Resolved image resource");
        Ok(url)
    }

    /// Encode a frame at this codec's quality
    pub async fn encode_frame(&self, frame: &CaptureFrame) -> Result<DataUrl, EncodeError> {
        frame_to_transportable(frame, self.quality).await
    }

    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, EncodeError> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            debug!(uri, "Fetching remote image");
            let response = self
                .http
                .get(uri)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| EncodeError::FetchFailed(e.to_string()))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| EncodeError::FetchFailed(e.to_string()))?;
            return Ok(bytes.to_vec());
        }

        let path = uri.strip_prefix("file://").unwrap_or(uri);
        tokio::fs::read(path)
            .await
            .map_err(|e| EncodeError::FetchFailed(format!("{}: {}", path, e)))
    }
}

/// Encode a captured frame as a JPEG data URL
///
/// Dimensions come from the frame itself, whatever the device delivered.
pub async fn frame_to_transportable(
    frame: &CaptureFrame,
    quality: u8,
) -> Result<DataUrl, EncodeError> {
    let frame = frame.clone();
    let quality = quality.clamp(1, 100);

    run_blocking(move || {
        let rgb = frame.to_packed_rgb().ok_or_else(|| {
            EncodeError::InvalidFrame(format!(
                "{}x{} stride {} with {} bytes",
                frame.width,
                frame.height,
                frame.stride,
                frame.data.len()
            ))
        })?;
        let jpeg = encode_jpeg(&rgb, frame.width, frame.height, quality)?;
        DataUrl::from_bytes(encoding::JPEG_MIME, &jpeg)
    })
    .await
}

async fn run_blocking<F>(job: F) -> Result<DataUrl, EncodeError>
where
    F: FnOnce() -> Result<DataUrl, EncodeError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| EncodeError::TaskFailed(e.to_string()))?
}

/// Decode any supported image and re-encode it as JPEG
fn reencode_as_jpeg(bytes: &[u8], quality: u8) -> Result<DataUrl, EncodeError> {
    let img = image::load_from_memory(bytes)?;
    let rgb = img.to_rgb8();
    let jpeg = encode_jpeg(rgb.as_raw(), rgb.width(), rgb.height(), quality)?;
    DataUrl::from_bytes(encoding::JPEG_MIME, &jpeg)
}

/// Encode packed RGB as JPEG
fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .encode(rgb, width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

    Ok(buffer)
}
