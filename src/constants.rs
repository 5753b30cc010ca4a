// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Swap loop timing
pub mod timing {
    use super::Duration;

    /// Default period between swap ticks
    ///
    /// The generation service takes several seconds per image and is rate
    /// limited, so the loop never asks more often than this.
    pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(6);

    /// Lower bound accepted for a configured tick interval
    pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(500);

    /// Default upper bound for acquiring a capture device (Loading state)
    pub const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 10;

    /// Default upper bound for a single inference request
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;

    /// Lower bound accepted for a configured acquisition or request timeout
    pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);

    /// Tick counter modulo for periodic logging
    pub const TICK_LOG_INTERVAL: u64 = 10;
}

/// Capture defaults
pub mod capture {
    /// Requested capture width (a hint, devices may return something else)
    pub const TARGET_WIDTH: u32 = 1280;

    /// Requested capture height (a hint, devices may return something else)
    pub const TARGET_HEIGHT: u32 = 720;

    /// Maximum buffers queued in the appsink (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Output pixel format delivered by capture pipelines
    pub const OUTPUT_FORMAT: &str = "RGBA";
}

/// Encoding defaults
pub mod encoding {
    /// JPEG quality for frame snapshots (0-100)
    pub const FRAME_JPEG_QUALITY: u8 = 80;

    /// Media type used for every re-encoded image
    pub const JPEG_MIME: &str = "image/jpeg";
}

/// Inference service defaults
pub mod inference {
    /// Base URL of the generative language API
    pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

    /// Image-capable model used for swaps
    pub const DEFAULT_SWAP_MODEL: &str = "gemini-2.5-flash-image";

    /// Text model used for persona refinement
    pub const DEFAULT_REFINE_MODEL: &str = "gemini-2.5-flash";

    /// Environment variables consulted for the API key, in order
    pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

    /// Maximum response body length kept in error messages
    pub const ERROR_BODY_LIMIT: usize = 500;
}

/// Instruction text sent to the inference service
pub mod prompts {
    /// Instruction used once per new identity
    pub const REFINE_INSTRUCTION: &str = "Describe the face in this image so it can be reproduced \
        faithfully on another person: face shape, eyes, eyebrows, nose, lips, skin tone and \
        texture, and any distinguishing marks. Ignore hair, clothing, background and lighting. \
        Answer with a single dense paragraph.";

    /// Constraints shared by both swap instruction variants
    const SWAP_CONSTRAINTS: &str = "The first image is the SOURCE camera frame. The second image \
        is the TARGET face. Produce exactly one image. Keep the SOURCE background, hair, body, \
        clothing, lighting and head orientation exactly as they are. Change only the internal \
        facial features (eyes, eyebrows, nose, mouth, jawline, skin texture) so the face \
        matches the TARGET identity.";

    /// Swap instruction; the anchor clause is appended only when a previous
    /// result is part of the request
    pub fn swap_instruction(with_anchor: bool) -> String {
        if with_anchor {
            format!(
                "{} The third image is the PREVIOUS RESULT. Match the face in the PREVIOUS \
                 RESULT instead of re-deriving it from the TARGET, so the appearance stays \
                 stable from frame to frame.",
                SWAP_CONSTRAINTS
            )
        } else {
            SWAP_CONSTRAINTS.to_string()
        }
    }
}

/// File format constants
pub mod file_formats {
    /// Supported image file extensions for persona and still sources
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }

    /// File extension for a result image's media type
    pub fn extension_for_mime(mime: &str) -> &'static str {
        match mime {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// Application info
pub mod app_info {
    /// Application directory name under the user config dir
    pub const CONFIG_DIR_NAME: &str = "persona-feed";

    /// Configuration file name
    pub const CONFIG_FILE_NAME: &str = "config.json";

    /// Version string including the git revision
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
