use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::classify::backends::gemini::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::classify::schema::TEMPERATURE;
use crate::classify::{BackendKind, ClassificationClient, GeminiBackend, GeminiConfig, StubBackend};
use crate::controller::{LoopController, DEFAULT_BUFFER_DELAY, DEFAULT_MAX_BACKOFF};
use crate::frame::{FrameSampler, JPEG_QUALITY, TARGET_WIDTH};
use crate::ingest::camera::{DEFAULT_FACING_MODE, DEFAULT_IDEAL_HEIGHT, DEFAULT_IDEAL_WIDTH};
use crate::ingest::CameraConfig;
use crate::state::Settings;

const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";

/// Environment variables holding the model API key, in lookup order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct GestureConfigFile {
    model: Option<ModelConfigFile>,
    camera: Option<CameraConfigFile>,
    sampler: Option<SamplerConfigFile>,
    #[serde(rename = "loop")]
    loop_: Option<LoopConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    backend: Option<BackendKind>,
    endpoint: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    device: Option<String>,
    facing_mode: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SamplerConfigFile {
    target_width: Option<u32>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LoopConfigFile {
    buffer_delay_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    continuous: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DisplayConfigFile {
    show_overlay: Option<bool>,
    show_confidence: Option<bool>,
    show_history: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct GestureConfig {
    pub model: ModelSettings,
    pub camera: CameraConfig,
    pub sampler: SamplerSettings,
    pub loop_timing: LoopTiming,
    /// Initial display and loop toggles.
    pub settings: Settings,
}

#[derive(Clone)]
pub struct ModelSettings {
    pub backend: BackendKind,
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    /// Extra timeout on the model call. Unset by default.
    pub request_timeout: Option<Duration>,
    /// Read from the environment only.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSettings")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSettings {
    pub target_width: u32,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    pub buffer_delay: Duration,
    pub max_backoff: Duration,
}

impl GestureConfig {
    /// Load from `GESTURE_CONFIG` (JSON, or TOML for `.toml` paths), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("GESTURE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GestureConfigFile) -> Self {
        let model_file = file.model.unwrap_or_default();
        let camera_file = file.camera.unwrap_or_default();
        let sampler_file = file.sampler.unwrap_or_default();
        let loop_file = file.loop_.unwrap_or_default();
        let display_file = file.display.unwrap_or_default();

        let defaults = Settings::default();
        Self {
            model: ModelSettings {
                backend: model_file.backend.unwrap_or_default(),
                endpoint: model_file
                    .endpoint
                    .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                model: model_file.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                temperature: model_file.temperature.unwrap_or(TEMPERATURE),
                request_timeout: model_file.request_timeout_secs.map(Duration::from_secs),
                api_key: None,
            },
            camera: CameraConfig {
                device: camera_file
                    .device
                    .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
                facing_mode: camera_file
                    .facing_mode
                    .unwrap_or_else(|| DEFAULT_FACING_MODE.to_string()),
                ideal_width: camera_file.width.unwrap_or(DEFAULT_IDEAL_WIDTH),
                ideal_height: camera_file.height.unwrap_or(DEFAULT_IDEAL_HEIGHT),
            },
            sampler: SamplerSettings {
                target_width: sampler_file.target_width.unwrap_or(TARGET_WIDTH),
                jpeg_quality: sampler_file.jpeg_quality.unwrap_or(JPEG_QUALITY),
            },
            loop_timing: LoopTiming {
                buffer_delay: loop_file
                    .buffer_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_BUFFER_DELAY),
                max_backoff: loop_file
                    .max_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_MAX_BACKOFF),
            },
            settings: Settings {
                show_overlay: display_file.show_overlay.unwrap_or(defaults.show_overlay),
                show_confidence: display_file
                    .show_confidence
                    .unwrap_or(defaults.show_confidence),
                show_history: display_file.show_history.unwrap_or(defaults.show_history),
                continuous: loop_file.continuous.unwrap_or(defaults.continuous),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(backend) = non_empty_var("GESTURE_MODEL_BACKEND") {
            self.model.backend = backend.parse()?;
        }
        if let Some(endpoint) = non_empty_var("GESTURE_MODEL_ENDPOINT") {
            self.model.endpoint = endpoint;
        }
        if let Some(model) = non_empty_var("GESTURE_MODEL") {
            self.model.model = model;
        }
        if let Some(timeout) = non_empty_var("GESTURE_REQUEST_TIMEOUT_SECS") {
            let seconds: u64 = timeout.parse().map_err(|_| {
                anyhow!("GESTURE_REQUEST_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.model.request_timeout = Some(Duration::from_secs(seconds));
        }
        if let Some(device) = non_empty_var("GESTURE_CAMERA_DEVICE") {
            self.camera.device = device;
        }
        if let Some(delay) = non_empty_var("GESTURE_BUFFER_DELAY_MS") {
            let millis: u64 = delay.parse().map_err(|_| {
                anyhow!("GESTURE_BUFFER_DELAY_MS must be an integer number of milliseconds")
            })?;
            self.loop_timing.buffer_delay = Duration::from_millis(millis);
        }
        self.model.api_key = API_KEY_VARS.iter().find_map(|name| non_empty_var(name));
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.model.endpoint)
            .map_err(|e| anyhow!("invalid model endpoint '{}': {}", self.model.endpoint, e))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "model endpoint must use http or https, got '{}'",
                endpoint.scheme()
            ));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(anyhow!(
                "model temperature must be within 0..=2, got {}",
                self.model.temperature
            ));
        }
        if self.model.request_timeout == Some(Duration::ZERO) {
            return Err(anyhow!("request timeout must be greater than zero"));
        }
        self.camera.validate()?;
        if self.sampler.target_width == 0 {
            return Err(anyhow!("sampler target width must be greater than zero"));
        }
        if self.sampler.jpeg_quality == 0 || self.sampler.jpeg_quality > 100 {
            return Err(anyhow!(
                "jpeg quality must be within 1..=100, got {}",
                self.sampler.jpeg_quality
            ));
        }
        Ok(())
    }

    pub fn sampler(&self) -> Result<FrameSampler> {
        FrameSampler::new(self.sampler.target_width, self.sampler.jpeg_quality)
    }

    pub fn controller(&self) -> LoopController {
        LoopController::new(self.loop_timing.buffer_delay, self.loop_timing.max_backoff)
    }

    /// Build the classification client for the configured backend.
    pub fn client(&self) -> Result<ClassificationClient> {
        let client = match self.model.backend {
            BackendKind::Stub => ClassificationClient::new(Box::new(StubBackend::demo())),
            BackendKind::Gemini => {
                let api_key = self.model.api_key.clone().ok_or_else(|| {
                    anyhow!(
                        "model api key missing; set {} in the environment",
                        API_KEY_VARS.join(" or ")
                    )
                })?;
                let backend = GeminiBackend::new(GeminiConfig {
                    endpoint: self.model.endpoint.clone(),
                    model: self.model.model.clone(),
                    api_key,
                    timeout: self.model.request_timeout,
                })?;
                ClassificationClient::new(Box::new(backend))
            }
        };
        Ok(client.with_temperature(self.model.temperature))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<GestureConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
