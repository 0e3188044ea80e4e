//! Session state container.
//!
//! `AppState` is owned by the session and lent to the renderer and status
//! view. Nothing here is persisted.

use std::collections::VecDeque;

use crate::classify::DetectionResult;

/// Maximum number of accepted results kept in history.
pub const HISTORY_CAPACITY: usize = 10;

/// User-controlled display and loop toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub show_overlay: bool,
    pub show_confidence: bool,
    pub show_history: bool,
    pub continuous: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_overlay: true,
            show_confidence: true,
            show_history: true,
            continuous: true,
        }
    }
}

/// Accepted results, newest first, capped at `HISTORY_CAPACITY`.
#[derive(Clone, Debug, Default)]
pub struct History {
    entries: VecDeque<DetectionResult>,
}

impl History {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Insert a result at the front. Results that are not detected are ignored.
    pub fn push(&mut self, result: DetectionResult) -> bool {
        if !result.is_detected() {
            return false;
        }
        self.entries.push_front(result);
        self.entries.truncate(HISTORY_CAPACITY);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DetectionResult> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&DetectionResult> {
        self.entries.front()
    }
}

#[derive(Debug, Default)]
pub struct AppState {
    pub current_result: Option<DetectionResult>,
    pub history: History,
    pub is_processing: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved cycle: becomes current, and enters history when detected.
    pub fn record(&mut self, result: DetectionResult) {
        self.history.push(result.clone());
        self.current_result = Some(result);
    }
}
