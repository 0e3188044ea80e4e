//! Camera frame source.
//!
//! `CameraSource` opens a user-facing camera at a preferred resolution and
//! produces RGB8 frames. Device paths are served by V4L2 when the
//! `camera-v4l2` feature is enabled; `stub://` paths use a synthetic camera.
//!
//! Synthetic cameras accept a `warmup` query parameter (`stub://desk?warmup=3`)
//! that makes the first N frames report zero dimensions, the way a real
//! device does before negotiation finishes, and a `fail_after` parameter
//! (`stub://desk?fail_after=5`) that makes every read after the Nth fail.

use anyhow::{anyhow, Context, Result};
#[cfg(feature = "camera-v4l2")]
use std::time::Instant;
use url::Url;

use super::normalize::{normalize_to_rgb, PixelFormat};
use crate::frame::Frame;

pub const DEFAULT_FACING_MODE: &str = "user";
pub const DEFAULT_IDEAL_WIDTH: u32 = 640;
pub const DEFAULT_IDEAL_HEIGHT: u32 = 480;

/// Camera constraints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or `stub://<name>`.
    pub device: String,
    /// "user" (front) or "environment" (rear).
    pub facing_mode: String,
    /// Preferred frame width. The device may choose another.
    pub ideal_width: u32,
    /// Preferred frame height.
    pub ideal_height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            facing_mode: DEFAULT_FACING_MODE.to_string(),
            ideal_width: DEFAULT_IDEAL_WIDTH,
            ideal_height: DEFAULT_IDEAL_HEIGHT,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.facing_mode.as_str(), "user" | "environment") {
            return Err(anyhow!(
                "unsupported facing mode '{}'; expected user or environment",
                self.facing_mode
            ));
        }
        if self.ideal_width == 0 || self.ideal_height == 0 {
            return Err(anyhow!("camera ideal resolution must be non-zero"));
        }
        Ok(())
    }
}

/// Live camera.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        config.validate()?;
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)?),
            });
        }
        #[cfg(feature = "camera-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(DeviceCamera::new(config)),
            })
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Err(anyhow!(
                "camera device '{}' requires the camera-v4l2 feature",
                config.device
            ))
        }
    }

    /// Open the camera. Failure here is fatal for the session.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Read the current frame.
    ///
    /// A frame with zero dimensions means the device has not reported its size yet.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
    pub width: u32,
    pub height: u32,
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

/// Emits YUYV frames like a UVC webcam, then converts them like a device would be.
struct SyntheticCamera {
    config: CameraConfig,
    warmup_frames: u64,
    fail_after: Option<u64>,
    frame_count: u64,
    connected: bool,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Result<Self> {
        let url = Url::parse(&config.device).context("parse stub camera url")?;
        let mut warmup_frames = 0;
        let mut fail_after = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "warmup" => {
                    warmup_frames = value
                        .parse()
                        .map_err(|_| anyhow!("stub camera warmup must be an integer"))?;
                }
                "fail_after" => {
                    fail_after = Some(value.parse().map_err(|_| {
                        anyhow!("stub camera fail_after must be an integer")
                    })?);
                }
                "fail" => return Err(anyhow!("stub camera '{}' is unavailable", config.device)),
                other => log::debug!("ignoring stub camera parameter '{}'", other),
            }
        }
        Ok(Self {
            config,
            warmup_frames,
            fail_after,
            frame_count: 0,
            connected: false,
        })
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "CameraSource: connected to {} (synthetic, facing={})",
            self.config.device,
            self.config.facing_mode
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("camera not connected; call connect() first"));
        }
        if self.fail_after.is_some_and(|limit| self.frame_count >= limit) {
            return Err(anyhow!("camera {} stopped delivering frames", self.config.device));
        }
        self.frame_count += 1;
        if self.frame_count <= self.warmup_frames {
            return Ok(Frame::not_ready());
        }

        // Width must be even for YUYV.
        let width = self.config.ideal_width & !1;
        let height = self.config.ideal_height;
        let yuyv = self.generate_yuyv(width, height);
        let rgb = normalize_to_rgb(&yuyv, width, height, PixelFormat::Yuyv)?;
        Frame::new(rgb, width, height)
    }

    /// Dark background with a bright block drifting left to right.
    fn generate_yuyv(&self, width: u32, height: u32) -> Vec<u8> {
        let mut pixels = vec![0u8; (width * height * 2) as usize];
        let block = (width / 4).max(2);
        let span = width.saturating_sub(block).max(1);
        let left = ((self.frame_count * 8) % span as u64) as u32;
        let top = height / 4;
        let noise: u8 = rand::random::<u8>() % 8;

        for row in 0..height {
            for pair in 0..width / 2 {
                let offset = ((row * width + pair * 2) * 2) as usize;
                let x = pair * 2;
                let inside = x >= left && x < left + block && row >= top && row < top + height / 2;
                let luma = if inside { 200 } else { 40 + noise };
                pixels[offset] = luma;
                pixels[offset + 1] = 128;
                pixels[offset + 2] = luma;
                pixels[offset + 3] = 128;
            }
        }
        pixels
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
            width: self.config.ideal_width & !1,
            height: self.config.ideal_height,
        }
    }
}

// ----------------------------------------------------------------------------
// V4L2 device camera
// ----------------------------------------------------------------------------

#[cfg(feature = "camera-v4l2")]
struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceState>,
    format: PixelFormat,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[cfg(feature = "camera-v4l2")]
#[ouroboros::self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "camera-v4l2")]
impl DeviceCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            active_width: 0,
            active_height: 0,
            config,
            state: None,
            format: PixelFormat::Yuyv,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        // V4L2 has no facing mode; the device path selects the camera.
        log::debug!(
            "CameraSource: facing mode '{}' selected by device path {}",
            self.config.facing_mode,
            self.config.device
        );

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open camera device {}", self.config.device))?;
        let mut format = device.format().context("read camera format")?;
        format.width = self.config.ideal_width;
        format.height = self.config.ideal_height;
        format.fourcc = v4l::FourCC::new(b"YUYV");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read camera format after set failure")?
            }
        };

        self.format = match &format.fourcc.repr {
            b"YUYV" => PixelFormat::Yuyv,
            b"RGB3" => PixelFormat::Rgb24,
            other => {
                return Err(anyhow!(
                    "camera {} delivers unsupported pixel format {}",
                    self.config.device,
                    String::from_utf8_lossy(other)
                ))
            }
        };
        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create camera buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "CameraSource: connected to {} ({}x{}, {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("camera not connected")?;
        let (buf, _meta) = state
            .with_stream_mut(|stream| stream.next())
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture camera frame")
            })?;
        if self.active_width == 0 || self.active_height == 0 {
            return Ok(Frame::not_ready());
        }

        let rgb = normalize_to_rgb(buf, self.active_width, self.active_height, self.format)?;
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Frame::new(rgb, self.active_width, self.active_height)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= std::time::Duration::from_secs(2)
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
            width: self.active_width,
            height: self.active_height,
        }
    }
}
