use anyhow::{anyhow, Result};
use serde::Serialize;

/// Explanation carried by the negative result that replaces any failed call.
pub const ERROR_EXPLANATION: &str = "Error processing image";

/// Largest finger count the classifier may report.
pub const MAX_NUMBER: u8 = 10;

/// Scale the model reports box coordinates on.
pub const MODEL_BOX_SCALE: f64 = 1000.0;

/// Axis-aligned box in normalized (0..1) coordinates of the unmirrored source frame.
///
/// `y` grows downward, `x` grows to the right.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NormalizedBox {
    pub ymin: f64,
    pub xmin: f64,
    pub ymax: f64,
    pub xmax: f64,
}

impl NormalizedBox {
    pub fn new(ymin: f64, xmin: f64, ymax: f64, xmax: f64) -> Result<Self> {
        for (name, value) in [("ymin", ymin), ("xmin", xmin), ("ymax", ymax), ("xmax", xmax)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("box {} out of range: {}", name, value));
            }
        }
        if ymin > ymax || xmin > xmax {
            return Err(anyhow!(
                "box is inverted: y {}..{}, x {}..{}",
                ymin,
                ymax,
                xmin,
                xmax
            ));
        }
        Ok(Self {
            ymin,
            xmin,
            ymax,
            xmax,
        })
    }

    /// Convert a box on the model's 0..1000 integer scale.
    pub fn from_model_scale(ymin: f64, xmin: f64, ymax: f64, xmax: f64) -> Result<Self> {
        Self::new(
            ymin / MODEL_BOX_SCALE,
            xmin / MODEL_BOX_SCALE,
            ymax / MODEL_BOX_SCALE,
            xmax / MODEL_BOX_SCALE,
        )
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// Outcome of one classification cycle. Immutable once built.
///
/// A result that is not detected never carries a number or a box, and its
/// confidence is zero. The constructors are the only way to build one.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    detected: bool,
    number: Option<u8>,
    bounding_box: Option<NormalizedBox>,
    confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
}

impl DetectionResult {
    /// A detected gesture. `number` must be within 0..=10 and `confidence` within 0..=1.
    pub fn detected(
        number: Option<u8>,
        bounding_box: Option<NormalizedBox>,
        confidence: f64,
        explanation: Option<String>,
    ) -> Result<Self> {
        if let Some(n) = number {
            if n > MAX_NUMBER {
                return Err(anyhow!("finger count {} exceeds {}", n, MAX_NUMBER));
            }
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(anyhow!("confidence out of range: {}", confidence));
        }
        Ok(Self {
            detected: true,
            number,
            bounding_box,
            confidence,
            explanation,
        })
    }

    pub fn not_detected(explanation: Option<String>) -> Self {
        Self {
            detected: false,
            number: None,
            bounding_box: None,
            confidence: 0.0,
            explanation,
        }
    }

    /// Canonical negative result substituted for any failed call.
    pub fn error() -> Self {
        Self::not_detected(Some(ERROR_EXPLANATION.to_string()))
    }

    pub fn is_detected(&self) -> bool {
        self.detected
    }

    pub fn number(&self) -> Option<u8> {
        self.number
    }

    pub fn bounding_box(&self) -> Option<&NormalizedBox> {
        self.bounding_box.as_ref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }
}
