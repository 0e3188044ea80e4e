mod backend;
pub mod backends;
mod client;
mod result;
pub mod schema;

pub use backend::{ModelBackend, ModelRequest};
pub use backends::{BackendKind, GeminiBackend, GeminiConfig, StubBackend, StubReply};
pub use client::{ClassificationClient, Resolution};
pub use result::{DetectionResult, NormalizedBox, ERROR_EXPLANATION, MAX_NUMBER};
