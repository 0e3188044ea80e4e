pub mod gemini;
pub mod stub;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::str::FromStr;

pub use gemini::{GeminiBackend, GeminiConfig};
pub use stub::{StubBackend, StubReply};

/// Backend selection from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Gemini,
    Stub,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "stub" => Ok(Self::Stub),
            other => Err(anyhow!(
                "unknown model backend '{}'; expected gemini or stub",
                other
            )),
        }
    }
}
