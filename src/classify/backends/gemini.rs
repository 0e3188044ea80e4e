//! Gemini `generateContent` backend.
//!
//! The image is sent inline as base64 alongside the instruction; structured
//! output is requested through `responseMimeType` and `responseSchema`.
//! The API key travels in the `x-goog-api-key` header, never in the body.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use crate::classify::backend::{ModelBackend, ModelRequest};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Clone)]
pub struct GeminiConfig {
    /// API base URL, without the `/models/...` suffix.
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    /// Overall request timeout. `None` leaves only the network stack's defaults.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct GeminiBackend {
    agent: ureq::Agent,
    url: Url,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!("model api key is empty"));
        }
        let url = generate_url(&config.endpoint, &config.model)?;
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            agent: builder.build(),
            url,
            api_key: config.api_key,
        })
    }
}

impl ModelBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn generate(&mut self, request: &ModelRequest<'_>) -> Result<String> {
        let body = request_body(request);
        let response = self
            .agent
            .post(self.url.as_str())
            .set("x-goog-api-key", &self.api_key)
            .send_json(body)
            .map_err(|err| match err {
                ureq::Error::Status(code, response) => {
                    let detail = response.into_string().unwrap_or_default();
                    anyhow!("model returned HTTP {}: {}", code, truncate(&detail, 200))
                }
                other => anyhow!("model request failed: {}", other),
            })?;
        let reply: GenerateContentResponse =
            response.into_json().context("decode model response")?;
        reply_text(reply)
    }
}

fn generate_url(endpoint: &str, model: &str) -> Result<Url> {
    let base = Url::parse(endpoint).with_context(|| format!("parse model endpoint {}", endpoint))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(anyhow!(
            "unsupported model endpoint scheme '{}'; expected http(s)",
            base.scheme()
        ));
    }
    if model.trim().is_empty() || model.contains('/') {
        return Err(anyhow!("invalid model name '{}'", model));
    }
    let url = format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    );
    Url::parse(&url).with_context(|| format!("build model url {}", url))
}

fn request_body(request: &ModelRequest<'_>) -> Value {
    json!({
        "contents": [{
            "parts": [
                {
                    "inlineData": {
                        "mimeType": request.image.mime_type,
                        "data": BASE64_STANDARD.encode(&request.image.bytes),
                    }
                },
                { "text": request.instruction }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.response_schema,
            "temperature": request.temperature,
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn reply_text(reply: GenerateContentResponse) -> Result<String> {
    let text: String = reply
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!("model response contained no text"));
    }
    Ok(text)
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::EncodedImage;

    fn image() -> EncodedImage {
        EncodedImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            mime_type: "image/jpeg",
            width: 320,
            height: 240,
        }
    }

    #[test]
    fn builds_generate_content_url() -> Result<()> {
        let url = generate_url("https://example.test/v1beta/", "gemini-2.5-flash")?;
        assert_eq!(
            url.as_str(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert!(generate_url("ftp://example.test", "m").is_err());
        assert!(generate_url("https://example.test", "a/b").is_err());
        Ok(())
    }

    #[test]
    fn request_body_carries_inline_image_and_schema() {
        let image = image();
        let schema = json!({"type": "OBJECT"});
        let request = ModelRequest {
            image: &image,
            instruction: "count fingers",
            response_schema: &schema,
            temperature: 0.1,
        };
        let body = request_body(&request);

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "/9j/2Q==");
        assert_eq!(parts[1]["text"], "count fingers");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"], schema);
        assert_eq!(body["generationConfig"]["temperature"].to_string(), "0.1");
        assert!(!body.to_string().contains("key"));
    }

    #[test]
    fn reply_text_joins_first_candidate_parts() -> Result<()> {
        let reply: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"detected\":"},{"text":"false}"}]}}]}"#,
        )?;
        assert_eq!(reply_text(reply)?, r#"{"detected":false}"#);
        Ok(())
    }

    #[test]
    fn reply_without_text_is_an_error() -> Result<()> {
        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#)?;
        assert!(reply_text(empty).is_err());
        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#)?;
        assert!(reply_text(blocked).is_err());
        Ok(())
    }

    #[test]
    fn rejects_empty_api_key() {
        let config = GeminiConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: " ".to_string(),
            timeout: None,
        };
        assert!(GeminiBackend::new(config).is_err());
    }
}
