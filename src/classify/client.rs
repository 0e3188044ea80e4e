use anyhow::Result;
use serde_json::Value;

use super::backend::{ModelBackend, ModelRequest};
use super::result::DetectionResult;
use super::schema::{parse_reply, response_schema, INSTRUCTION, TEMPERATURE};
use crate::frame::EncodedImage;

/// Result of a call, plus whether it stands in for a failure.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub result: DetectionResult,
    /// True when the call failed and `result` is the canonical error result.
    pub failed: bool,
}

/// Classification client.
///
/// Sends one request per call and never returns an error: transport failures,
/// empty replies, and replies that do not match the schema all become
/// `DetectionResult::error()`. The client does not limit concurrency; callers
/// keep at most one call outstanding.
pub struct ClassificationClient {
    backend: Box<dyn ModelBackend>,
    schema: Value,
    temperature: f64,
}

impl ClassificationClient {
    pub fn new(backend: Box<dyn ModelBackend>) -> Self {
        Self {
            backend,
            schema: response_schema(),
            temperature: TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Classify one encoded frame.
    pub fn classify(&mut self, image: &EncodedImage) -> DetectionResult {
        self.resolve(image).result
    }

    /// Classify one encoded frame and report whether the call failed.
    pub fn resolve(&mut self, image: &EncodedImage) -> Resolution {
        match self.try_classify(image) {
            Ok(result) => Resolution {
                result,
                failed: false,
            },
            Err(err) => {
                log::warn!(
                    "classification via {} failed: {:#}",
                    self.backend.name(),
                    err
                );
                Resolution {
                    result: DetectionResult::error(),
                    failed: true,
                }
            }
        }
    }

    fn try_classify(&mut self, image: &EncodedImage) -> Result<DetectionResult> {
        let request = ModelRequest {
            image,
            instruction: INSTRUCTION,
            response_schema: &self.schema,
            temperature: self.temperature,
        };
        let text = self.backend.generate(&request)?;
        parse_reply(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::backends::{StubBackend, StubReply};
    use crate::classify::result::ERROR_EXPLANATION;

    fn image() -> EncodedImage {
        EncodedImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            mime_type: "image/jpeg",
            width: 320,
            height: 240,
        }
    }

    fn client(reply: StubReply) -> ClassificationClient {
        ClassificationClient::new(Box::new(StubBackend::new(vec![reply])))
    }

    #[test]
    fn transport_failure_becomes_error_result() {
        let resolution = client(StubReply::Fail("connection reset".into())).resolve(&image());
        assert!(resolution.failed);
        assert_eq!(resolution.result, DetectionResult::error());
        assert_eq!(resolution.result.explanation(), Some(ERROR_EXPLANATION));
    }

    #[test]
    fn empty_text_becomes_error_result() {
        let result = client(StubReply::Text(String::new())).classify(&image());
        assert_eq!(result, DetectionResult::error());
    }

    #[test]
    fn schema_mismatch_becomes_error_result() {
        let result = client(StubReply::Text(r#"{"detected":"yes"}"#.into())).classify(&image());
        assert_eq!(result, DetectionResult::error());
    }

    #[test]
    fn genuine_negative_is_not_a_failure() {
        let resolution = client(StubReply::Text(
            r#"{"detected":false,"confidence":0.2,"explanation":"no hand"}"#.into(),
        ))
        .resolve(&image());
        assert!(!resolution.failed);
        assert!(!resolution.result.is_detected());
        assert_eq!(resolution.result.explanation(), Some("no hand"));
    }

    #[test]
    fn boundary_box_values_normalize_exactly() {
        let result = client(StubReply::Text(
            r#"{"detected":true,"number":10,"boundingBox":{"ymin":0,"xmin":0,"ymax":1000,"xmax":1000},"confidence":1}"#.into(),
        ))
        .classify(&image());
        let b = result.bounding_box().copied().expect("box");
        assert_eq!((b.ymin, b.xmin, b.ymax, b.xmax), (0.0, 0.0, 1.0, 1.0));
    }
}
