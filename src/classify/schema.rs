//! Instruction, response schema, and reply mapping for the gesture task.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use super::result::{DetectionResult, NormalizedBox};

/// Fixed instruction sent with every frame.
pub const INSTRUCTION: &str = "Look at the hand or hands in this image and identify the number \
being shown with a finger-count gesture, from 0 through 10 inclusive (a closed fist is 0; two \
open hands can show up to 10). If a gesture is present, set detected to true, report the \
number, and give a tight bounding box around the gesturing hand or hands as ymin, xmin, ymax, \
xmax integers normalized to a 0-1000 scale. Always report a confidence score between 0 and 1. \
If no clear finger-count gesture is visible, set detected to false.";

/// Sampling temperature for the classification request.
pub const TEMPERATURE: f64 = 0.1;

/// Structured-output schema the model's reply must conform to.
pub fn response_schema() -> Value {
    let coordinate = json!({ "type": "INTEGER" });
    json!({
        "type": "OBJECT",
        "properties": {
            "detected": { "type": "BOOLEAN" },
            "number": {
                "type": "INTEGER",
                "nullable": true,
                "description": "Finger count from 0 to 10"
            },
            "boundingBox": {
                "type": "OBJECT",
                "nullable": true,
                "properties": {
                    "ymin": coordinate,
                    "xmin": coordinate,
                    "ymax": coordinate,
                    "xmax": coordinate
                },
                "required": ["ymin", "xmin", "ymax", "xmax"]
            },
            "confidence": { "type": "NUMBER" },
            "explanation": { "type": "STRING" }
        },
        "required": ["detected", "confidence"]
    })
}

/// Reply shape declared by `response_schema`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelReply {
    detected: bool,
    #[serde(default)]
    number: Option<i64>,
    #[serde(default)]
    bounding_box: Option<ModelBox>,
    confidence: f64,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelBox {
    ymin: f64,
    xmin: f64,
    ymax: f64,
    xmax: f64,
}

/// Parse the model's text reply into a result. Any mismatch is an error.
pub fn parse_reply(text: &str) -> Result<DetectionResult> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("model reply is empty"));
    }
    let reply: ModelReply = serde_json::from_str(trimmed).context("parse model reply")?;

    if !reply.detected {
        return Ok(DetectionResult::not_detected(reply.explanation));
    }

    let number = reply
        .number
        .map(|n| u8::try_from(n).map_err(|_| anyhow!("finger count {} out of range", n)))
        .transpose()?;
    let bounding_box = reply
        .bounding_box
        .map(|b| NormalizedBox::from_model_scale(b.ymin, b.xmin, b.ymax, b.xmax))
        .transpose()?;
    DetectionResult::detected(number, bounding_box, reply.confidence, reply.explanation)
}
