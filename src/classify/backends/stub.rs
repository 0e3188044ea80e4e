use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::classify::backend::{ModelBackend, ModelRequest};

/// Scripted reply for `StubBackend`.
#[derive(Clone, Debug)]
pub enum StubReply {
    /// Model text returned verbatim.
    Text(String),
    /// Transport failure with the given message.
    Fail(String),
}

/// Offline backend replaying scripted replies in a loop.
///
/// Used for demos without credentials and for tests. Counts every call so
/// tests can assert how many requests were issued.
pub struct StubBackend {
    replies: Vec<StubReply>,
    next: usize,
    latency: Duration,
    calls: Arc<AtomicUsize>,
}

impl StubBackend {
    pub fn new(replies: Vec<StubReply>) -> Self {
        Self {
            replies,
            next: 0,
            latency: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counts through 0..=10 with a box that shifts each step.
    pub fn demo() -> Self {
        let replies = (0..=10u32)
            .map(|n| {
                let xmin = 150 + n * 20;
                StubReply::Text(format!(
                    r#"{{"detected":true,"number":{},"boundingBox":{{"ymin":200,"xmin":{},"ymax":750,"xmax":{}}},"confidence":0.9,"explanation":"scripted"}}"#,
                    n,
                    xmin,
                    xmin + 350
                ))
            })
            .chain(std::iter::once(StubReply::Text(
                r#"{"detected":false,"confidence":0.0,"explanation":"no hand"}"#.to_string(),
            )))
            .collect();
        Self::new(replies)
    }

    /// Delay every reply, to keep a request in flight for a while.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Shared call counter.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl ModelBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn generate(&mut self, request: &ModelRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if request.image.bytes.is_empty() {
            return Err(anyhow!("stub backend received an empty image"));
        }
        if self.replies.is_empty() {
            return Err(anyhow!("stub backend has no scripted replies"));
        }
        let reply = self.replies[self.next % self.replies.len()].clone();
        self.next += 1;
        match reply {
            StubReply::Text(text) => Ok(text),
            StubReply::Fail(message) => Err(anyhow!(message)),
        }
    }
}
