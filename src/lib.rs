//! Finger-count gesture overlay.
//!
//! Camera frames are downsampled and JPEG-encoded, sent to a remote multimodal
//! model that classifies a finger-count gesture (0 through 10), and the result
//! is drawn as an overlay aligned with a mirrored video preview.
//!
//! # Module Structure
//!
//! - `ingest`: Frame sources (V4L2 camera, synthetic camera, still images)
//! - `frame`: `Frame`, `EncodedImage`, and the `FrameSampler`
//! - `classify`: Remote classification client and model backends
//! - `state`: Settings, bounded history, and the session state container
//! - `controller`: Idle/Active loop controller with the in-flight guard
//! - `overlay`: Coordinate mirroring and overlay rasterisation
//! - `display`: Status lines derived from state and settings
//! - `session`: Control loop wiring the stages together
//! - `config`: Layered file/env configuration
//! - `ui`: Terminal output for the binaries

pub mod classify;
pub mod config;
pub mod controller;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod session;
pub mod state;
pub mod ui;

pub use classify::{
    BackendKind, ClassificationClient, DetectionResult, GeminiBackend, GeminiConfig,
    ModelBackend, ModelRequest, NormalizedBox, Resolution, StubBackend, StubReply,
    ERROR_EXPLANATION,
};
pub use config::GestureConfig;
pub use controller::{CycleOutcome, Dispatch, LoopController, LoopMode, Trigger};
pub use display::StatusView;
pub use frame::{sampled_dimensions, EncodedImage, Frame, FrameSampler};
pub use ingest::{CameraConfig, CameraSource, StillImageSource};
pub use overlay::{mirror_box, OverlayLayout, OverlaySurface, PixelRect};
pub use session::{CameraFailure, ControlEvent, Session, SessionHandle, SessionView};
pub use state::{AppState, History, Settings, HISTORY_CAPACITY};

/// Fixed user-facing message shown when the camera cannot be opened.
pub const CAMERA_ERROR_MESSAGE: &str = "Camera Error";
