// SPDX-License-Identifier: MPL-2.0

//! Error types for the persona feed
//!
//! Every failure inside the swap loop is converted into a skipped tick at the
//! tick boundary, so most of these never reach the user as an error. They are
//! still typed so the logs and the session counters can tell them apart.

use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Capture device errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Image encoding/decoding errors
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
    /// Inference service errors
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The session event loop has stopped
    #[error("Session is no longer running")]
    SessionClosed,
}

/// Capture device errors
///
/// Fatal to entering `Active`; the user recovers by powering on again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// No capture device found
    #[error("No capture device found")]
    NoDeviceFound,
    /// Access to the device was denied
    #[error("Access to capture device denied: {0}")]
    PermissionDenied(String),
    /// Device initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
    /// Acquisition did not finish in time
    #[error("Timed out after {0}s acquiring capture device")]
    Timeout(u64),
    /// Backend not compiled in or not usable on this system
    #[error("Backend not available: {0}")]
    NotAvailable(String),
    /// Source file could not be read
    #[error("I/O error: {0}")]
    Io(String),
}

/// Image codec errors
///
/// A failed frame encode is a skipped tick, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Frame buffer does not match its declared dimensions
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    /// The image could not be encoded
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
    /// The image could not be decoded
    #[error("Decoding failed: {0}")]
    DecodingFailed(String),
    /// A data URL was malformed
    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),
    /// A remote or file resource could not be fetched
    #[error("Failed to fetch resource: {0}")]
    FetchFailed(String),
    /// The blocking encode task did not complete
    #[error("Encoding task error: {0}")]
    TaskFailed(String),
}

/// Inference service errors
///
/// Recoverable: the orchestrator retries on its next natural tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// No API key configured
    #[error("API key not set (config api_key, GEMINI_API_KEY or GOOGLE_API_KEY)")]
    MissingApiKey,
    /// Transport-level failure
    #[error("Request failed: {0}")]
    Transport(String),
    /// Request did not finish in time
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    /// Service responded with a non-success status
    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Service responded with an error object
    #[error("Service error: {0}")]
    Api(String),
    /// The prompt was blocked by the service
    #[error("Request blocked: {0}")]
    Blocked(String),
    /// Response could not be parsed
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// Swap response carried no image
    #[error("Response contained no image")]
    NoImage,
    /// Refinement response carried no text
    #[error("Response contained no text")]
    NoText,
    /// Request payload could not be prepared
    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No configuration directory on this platform
    #[error("No configuration directory available")]
    NoConfigDir,
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(String),
    /// The file is not valid JSON for the config schema
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<image::ImageError> for EncodeError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(e) => EncodeError::DecodingFailed(e.to_string()),
            other => EncodeError::EncodingFailed(other.to_string()),
        }
    }
}

impl From<base64::DecodeError> for EncodeError {
    fn from(err: base64::DecodeError) -> Self {
        EncodeError::MalformedDataUrl(err.to_string())
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        InferenceError::Transport(err.to_string())
    }
}

impl From<EncodeError> for InferenceError {
    fn from(err: EncodeError) -> Self {
        InferenceError::InvalidPayload(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_errors_convert_into_app_error() {
        let err: AppError = CaptureError::NoDeviceFound.into();
        assert!(matches!(err, AppError::Capture(CaptureError::NoDeviceFound)));

        let err: AppError = InferenceError::NoImage.into();
        assert_eq!(err.to_string(), "Inference error: Response contained no image");
    }

    #[test]
    fn test_session_closed_display() {
        assert_eq!(AppError::SessionClosed.to_string(), "Session is no longer running");
    }

    #[test]
    fn test_status_error_display() {
        let err = InferenceError::Status {
            status: 429,
            body: "slow down".into(),
        };
        assert_eq!(err.to_string(), "Service returned HTTP 429: slow down");
    }
}
