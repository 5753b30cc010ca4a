// SPDX-License-Identifier: MPL-2.0

//! Gemini `generateContent` client
//!
//! Images go out as `inlineData` parts (bare base64 plus `mimeType`), the
//! instruction as a trailing text part. Swap requests ask for image output
//! only; the first `inlineData` part of the first candidate is the result.

use super::{InferenceService, SwapRequest};
use crate::config::Config;
use crate::constants::inference::ERROR_BODY_LIMIT;
use crate::errors::InferenceError;
use crate::media::TransportPayload;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP client for the generative language API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    swap_model: String,
    refine_model: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Create a client from the user configuration
    ///
    /// Fails with `MissingApiKey` when neither the config nor the
    /// environment provides a key.
    pub fn from_config(config: &Config) -> Result<Self, InferenceError> {
        let api_key = config
            .resolve_api_key()
            .ok_or(InferenceError::MissingApiKey)?;
        let timeout = config.request_timeout();

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key,
            swap_model: config.swap_model.clone(),
            refine_model: config.refine_model.clone(),
            timeout,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate(&self, model: &str, body: &Value) -> Result<Value, InferenceError> {
        let endpoint = self.endpoint(model);
        debug!(model, "Sending generateContent request");

        let response = self
            .http
            .post(&endpoint)
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(self.timeout.as_secs())
                } else {
                    InferenceError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Inference request rejected");
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: truncate(&text, ERROR_BODY_LIMIT),
            });
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| {
            InferenceError::MalformedResponse(format!(
                "{} - Body: {}",
                e,
                truncate(&text, ERROR_BODY_LIMIT)
            ))
        })?;

        if let Some(error) = json.get("error") {
            let msg = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown service error");
            return Err(InferenceError::Api(msg.to_string()));
        }

        Ok(json)
    }
}

#[async_trait]
impl InferenceService for GeminiClient {
    async fn refine(
        &self,
        identity: &TransportPayload,
        instruction: &str,
    ) -> Result<String, InferenceError> {
        let body = build_refine_body(identity, instruction);
        let response = self.generate(&self.refine_model, &body).await?;
        let text = parse_text_response(&response)?;
        info!(chars = text.len(), "Persona refinement complete");
        Ok(text)
    }

    async fn swap(&self, request: &SwapRequest) -> Result<TransportPayload, InferenceError> {
        let body = build_swap_body(request);
        let response = self.generate(&self.swap_model, &body).await?;
        let image = parse_image_response(&response)?;
        debug!(
            mime = %image.mime_type,
            size = image.data.len(),
            anchored = request.has_anchor(),
            "Swap image received"
        );
        Ok(image)
    }
}

fn inline_part(payload: &TransportPayload) -> Value {
    json!({
        "inlineData": {
            "mimeType": payload.mime_type,
            "data": payload.data,
        }
    })
}

/// Request body for a swap: source, target, optional anchor, instruction
pub fn build_swap_body(request: &SwapRequest) -> Value {
    let mut parts = vec![inline_part(&request.source), inline_part(&request.target)];
    if let Some(anchor) = &request.anchor {
        parts.push(inline_part(anchor));
    }
    parts.push(json!({ "text": request.instruction() }));

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": { "responseModalities": ["IMAGE"] },
    })
}

/// Request body for a refinement: identity image, instruction
pub fn build_refine_body(identity: &TransportPayload, instruction: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_part(identity), { "text": instruction }],
        }],
    })
}

/// Parts of the first candidate, or the reason there are none
fn candidate_parts(response: &Value) -> Result<&Vec<Value>, InferenceError> {
    if let Some(reason) = response
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(InferenceError::Blocked(reason.to_string()));
    }

    let candidate = response
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| InferenceError::MalformedResponse("No candidates in response".into()))?;

    match candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    {
        Some(parts) => Ok(parts),
        None => {
            let finish = candidate
                .get("finishReason")
                .and_then(|r| r.as_str())
                .unwrap_or("UNKNOWN");
            if finish.contains("SAFETY") || finish.contains("PROHIBITED") || finish == "BLOCKLIST" {
                Err(InferenceError::Blocked(finish.to_string()))
            } else {
                Err(InferenceError::MalformedResponse(format!(
                    "No content.parts in response (finishReason {})",
                    finish
                )))
            }
        }
    }
}

/// Extract the single output image
pub fn parse_image_response(response: &Value) -> Result<TransportPayload, InferenceError> {
    let parts = candidate_parts(response)?;

    parts
        .iter()
        .filter_map(|part| part.get("inlineData").or_else(|| part.get("inline_data")))
        .find_map(|inline| {
            let data = inline.get("data").and_then(|d| d.as_str())?;
            if data.is_empty() {
                return None;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(|m| m.as_str())
                .unwrap_or("image/png");
            Some(TransportPayload {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            })
        })
        .ok_or(InferenceError::NoImage)
}

/// Concatenate the text parts of the first candidate
pub fn parse_text_response(response: &Value) -> Result<String, InferenceError> {
    let parts = candidate_parts(response)?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    let text = text.trim();
    if text.is_empty() {
        Err(InferenceError::NoText)
    } else {
        Ok(text.to_string())
    }
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
