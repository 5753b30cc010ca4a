// SPDX-License-Identifier: MPL-2.0

//! Transportable image representation
//!
//! Images travel through the application as `data:<mime>;base64,<payload>`
//! URLs. The envelope is kept for local display and storage; the inference
//! service only ever receives the bare payload plus an explicit media type.
//! [`strip_envelope`] and [`DataUrl::envelope`] are the only two crossings
//! between those worlds.

use crate::errors::EncodeError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// A base64 image data URL
///
/// Construction validates the envelope, so accessors never fail.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DataUrl {
    url: String,
    /// Byte offset of the payload within `url`
    payload_start: usize,
}

/// Raw payload and media type as sent to (and received from) the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPayload {
    pub mime_type: String,
    /// Base64 payload without any prefix
    pub data: String,
}

impl DataUrl {
    /// Validate and wrap an existing data URL without touching its bytes
    pub fn parse(url: impl Into<String>) -> Result<Self, EncodeError> {
        let url = url.into();
        let rest = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| EncodeError::MalformedDataUrl("missing data: scheme".into()))?;
        let marker = rest
            .find(BASE64_MARKER)
            .ok_or_else(|| EncodeError::MalformedDataUrl("missing ;base64, marker".into()))?;

        let mime = &rest[..marker];
        if mime.is_empty() || !mime.contains('/') {
            return Err(EncodeError::MalformedDataUrl(format!(
                "invalid media type '{}'",
                mime
            )));
        }

        let payload_start = SCHEME.len() + marker + BASE64_MARKER.len();
        if payload_start == url.len() {
            return Err(EncodeError::MalformedDataUrl("empty payload".into()));
        }

        Ok(Self { url, payload_start })
    }

    /// Check whether a string looks like a data URL (cheap prefix test)
    pub fn is_data_url(candidate: &str) -> bool {
        candidate.starts_with(SCHEME)
    }

    /// Re-envelope a payload received from the service for local display
    pub fn envelope(payload: &TransportPayload) -> Result<Self, EncodeError> {
        Self::parse(format!(
            "{}{}{}{}",
            SCHEME, payload.mime_type, BASE64_MARKER, payload.data
        ))
    }

    /// Encode raw image bytes
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Result<Self, EncodeError> {
        Self::envelope(&TransportPayload {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        })
    }

    /// Full URL including the envelope
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Media type from the envelope (e.g. "image/jpeg")
    pub fn mime_type(&self) -> &str {
        &self.url[SCHEME.len()..self.payload_start - BASE64_MARKER.len()]
    }

    /// Base64 payload without the envelope
    pub fn payload(&self) -> &str {
        &self.url[self.payload_start..]
    }

    /// Decoded image bytes
    pub fn decode_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(STANDARD.decode(self.payload())?)
    }

    /// Length of the full URL in bytes
    pub fn len(&self) -> usize {
        self.url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}

impl std::fmt::Debug for DataUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DataUrl({}, {} payload bytes)",
            self.mime_type(),
            self.payload().len()
        )
    }
}

impl std::fmt::Display for DataUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// Split a data URL into the bare payload and its media type for transport
pub fn strip_envelope(url: &DataUrl) -> TransportPayload {
    TransportPayload {
        mime_type: url.mime_type().to_string(),
        data: url.payload().to_string(),
    }
}
