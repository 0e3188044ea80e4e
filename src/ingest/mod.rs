//! Frame ingestion sources.
//!
//! - Camera: V4L2 devices (feature: camera-v4l2) or a synthetic `stub://` camera
//! - Still images: a single decoded image file, for one-shot classification
//!
//! All sources produce RGB8 `Frame` instances that go straight to the sampler.
//! Sources MUST NOT store frames to disk or keep them after handoff.

pub mod camera;
mod normalize;
pub mod still;

pub use camera::{CameraConfig, CameraSource, CameraStats};
pub use still::StillImageSource;
