use crate::classify::DetectionResult;
use crate::state::{AppState, Settings};

/// Text shown next to the preview.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusView {
    /// Detected digit, or "-" when nothing is detected.
    pub digit: String,
    /// Confidence such as "87.0%". `None` when hidden or not detected.
    pub confidence: Option<String>,
    pub explanation: Option<String>,
    pub processing: bool,
    /// One line per history entry, newest first. Empty when hidden.
    pub history: Vec<String>,
}

impl StatusView {
    pub fn from_state(state: &AppState, settings: &Settings) -> Self {
        let current = state.current_result.as_ref();
        let detected = current.filter(|r| r.is_detected());

        let digit = detected
            .and_then(|r| r.number())
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let confidence = detected
            .filter(|_| settings.show_confidence)
            .map(|r| format_confidence(r.confidence()));
        let history = if settings.show_history {
            state.history.iter().map(history_line).collect()
        } else {
            Vec::new()
        };

        Self {
            digit,
            confidence,
            explanation: current.and_then(|r| r.explanation()).map(str::to_string),
            processing: state.is_processing,
            history,
        }
    }

    /// Single status line for terminals and logs.
    pub fn summary(&self) -> String {
        let mut line = format!("digit {}", self.digit);
        if let Some(confidence) = &self.confidence {
            line.push_str(&format!(" ({})", confidence));
        }
        if let Some(explanation) = &self.explanation {
            line.push_str(&format!(" - {}", explanation));
        }
        if self.processing {
            line.push_str(" [processing]");
        }
        line
    }
}

pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

fn history_line(result: &DetectionResult) -> String {
    match result.number() {
        Some(n) => format!("{} {}", n, format_confidence(result.confidence())),
        None => format!("? {}", format_confidence(result.confidence())),
    }
}
