//! gesture_live - Live finger-count recognition from a camera.
//!
//! This binary:
//! 1. Opens the configured camera (a failure, at start or later, ends detection
//!    and prints "Camera Error")
//! 2. Samples frames and sends them to the classification model, one at a time
//! 3. Keeps the current result, a short history, and the overlay up to date
//! 4. Reads single-key commands from stdin:
//!    c = toggle continuous, t = capture once, o/p/h = toggle overlay,
//!    confidence, history, q = quit

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::{self, BufRead, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gesture_overlay::ui::{Console, UiMode};
use gesture_overlay::{
    BackendKind, CameraFailure, CameraSource, ControlEvent, GestureConfig, Session, SessionHandle, StatusView,
    CAMERA_ERROR_MESSAGE,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Recognise finger-count gestures from a live camera"
)]
struct Args {
    /// Camera device path, or stub://<name> for a synthetic camera.
    #[arg(long, env = "GESTURE_CAMERA_DEVICE")]
    camera: Option<String>,

    /// Use the scripted offline model instead of the remote one.
    #[arg(long)]
    stub_model: bool,

    /// Start idle; capture only on `t`.
    #[arg(long)]
    manual: bool,

    /// Output style: auto, plain, or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = GestureConfig::load()?;
    if let Some(device) = args.camera {
        cfg.camera.device = device;
    }
    if args.stub_model {
        cfg.model.backend = BackendKind::Stub;
    }
    if args.manual {
        cfg.settings.continuous = false;
    }

    let client = cfg.client()?;
    let mut camera = match CameraSource::new(cfg.camera.clone()) {
        Ok(camera) => camera,
        Err(err) => camera_failure(err),
    };
    if let Err(err) = camera.connect() {
        camera_failure(err);
    }

    let mut session = Session::new(
        camera,
        cfg.sampler()?,
        client,
        cfg.controller(),
        cfg.settings,
    )?;
    let handle = session.handle();

    let interrupted = Arc::new(AtomicBool::new(false));
    let ctrlc_handle = handle.clone();
    ctrlc::set_handler(move || {
        // A second Ctrl-C leaves without waiting for the request in flight.
        if interrupted.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        let _ = ctrlc_handle.shutdown();
    })
    .map_err(|e| anyhow!("failed to set Ctrl-C handler: {}", e))?;

    spawn_key_reader(handle);

    log::info!(
        "gesture_live running: camera={} backend={:?} model={}",
        cfg.camera.device,
        cfg.model.backend,
        cfg.model.model
    );

    let console = Console::new(UiMode::parse(Some(&args.ui)), io::stdout().is_terminal());
    let mut last_summary = String::new();
    let outcome = session.run(|view| {
        let status = StatusView::from_state(view.state, view.settings);
        let summary = status.summary();
        if summary != last_summary {
            if let Err(err) = console.redraw(&status, &mut io::stdout().lock()) {
                log::warn!("failed to write status: {}", err);
            }
            last_summary = summary;
        }
    });
    match outcome {
        Err(err) if err.downcast_ref::<CameraFailure>().is_some() => {
            drop(session);
            camera_failure(err)
        }
        other => other,
    }
}

/// Report a camera failure with the fixed message and exit.
fn camera_failure(err: anyhow::Error) -> ! {
    log::error!("camera unavailable: {:#}", err);
    eprintln!("{}", CAMERA_ERROR_MESSAGE);
    std::process::exit(1)
}

fn spawn_key_reader(handle: SessionHandle) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            for key in line.trim().chars() {
                let event = match key {
                    'c' => ControlEvent::ToggleContinuous,
                    't' => ControlEvent::ManualTrigger,
                    'o' => ControlEvent::ToggleOverlay,
                    'p' => ControlEvent::ToggleConfidence,
                    'h' => ControlEvent::ToggleHistory,
                    'q' => ControlEvent::Shutdown,
                    other => {
                        log::warn!("unknown command '{}'", other);
                        continue;
                    }
                };
                if handle.send(event).is_err() {
                    return;
                }
            }
        }
    });
}
