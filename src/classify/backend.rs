use anyhow::Result;
use serde_json::Value;

use crate::frame::EncodedImage;

/// One classification request as sent to a model.
pub struct ModelRequest<'a> {
    pub image: &'a EncodedImage,
    pub instruction: &'a str,
    pub response_schema: &'a Value,
    pub temperature: f64,
}

/// Transport to a hosted multimodal model.
///
/// Implementations perform exactly one request per `generate` call and return
/// the model's text reply. They do not retry, and they do not interpret the
/// reply; mapping it to a result is the client's job.
pub trait ModelBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Send the request and return the reply text.
    fn generate(&mut self, request: &ModelRequest<'_>) -> Result<String>;
}
