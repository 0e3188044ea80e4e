//! Capture/classify/render session.
//!
//! One control thread owns the camera, sampler, state, settings, controller,
//! and overlay surface. The classification call runs on a dedicated worker
//! thread; its result comes back as a `ControlEvent::Resolved` on the same
//! channel user input arrives on, so every state change is applied in order
//! on the control thread.
//!
//! The session never cancels a request. A shutdown requested while a cycle is
//! in flight waits for that cycle to resolve. A cycle that is only scheduled
//! is released instead, both on shutdown and when continuous capture is
//! turned off.

use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::classify::{ClassificationClient, Resolution};
use crate::controller::{CycleOutcome, LoopController, Trigger};
use crate::frame::{EncodedImage, FrameSampler};
use crate::ingest::CameraSource;
use crate::overlay::OverlaySurface;
use crate::state::{AppState, Settings};

#[derive(Debug)]
pub enum ControlEvent {
    ManualTrigger,
    SetContinuous(bool),
    ToggleContinuous,
    ToggleOverlay,
    ToggleConfidence,
    ToggleHistory,
    /// A classification call finished.
    Resolved(Resolution),
    Shutdown,
}

/// Cloneable sender for user input.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Sender<ControlEvent>,
}

impl SessionHandle {
    pub fn send(&self, event: ControlEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow!("session has stopped"))
    }

    pub fn trigger(&self) -> Result<()> {
        self.send(ControlEvent::ManualTrigger)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(ControlEvent::Shutdown)
    }
}

/// What observers see after every state change.
/// The camera failed after the session started. Detection ends with it.
#[derive(Debug)]
pub struct CameraFailure {
    source: anyhow::Error,
}

impl std::fmt::Display for CameraFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "camera failed during the session: {:#}", self.source)
    }
}

impl std::error::Error for CameraFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

pub struct SessionView<'a> {
    pub state: &'a AppState,
    pub settings: &'a Settings,
    pub overlay: &'a OverlaySurface,
}

pub struct Session {
    camera: CameraSource,
    sampler: FrameSampler,
    controller: LoopController,
    state: AppState,
    settings: Settings,
    overlay: OverlaySurface,
    events_tx: Sender<ControlEvent>,
    events_rx: Receiver<ControlEvent>,
    jobs_tx: Option<Sender<EncodedImage>>,
    worker: Option<JoinHandle<()>>,
    next_cycle_at: Option<Instant>,
    /// The scheduled cycle came from a manual trigger.
    scheduled_manually: bool,
    cycles: u64,
}

impl Session {
    /// Build a session around a connected camera. Spawns the classification worker.
    pub fn new(
        camera: CameraSource,
        sampler: FrameSampler,
        client: ClassificationClient,
        controller: LoopController,
        settings: Settings,
    ) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::channel();
        let (jobs_tx, jobs_rx) = mpsc::channel::<EncodedImage>();

        let results_tx = events_tx.clone();
        let worker = std::thread::Builder::new()
            .name("classifier".to_string())
            .spawn(move || run_worker(client, jobs_rx, results_tx))
            .context("spawn classification worker")?;

        Ok(Self {
            camera,
            sampler,
            controller,
            state: AppState::new(),
            settings,
            overlay: OverlaySurface::new(0, 0),
            events_tx,
            events_rx,
            jobs_tx: Some(jobs_tx),
            worker: Some(worker),
            next_cycle_at: None,
            scheduled_manually: false,
            cycles: 0,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.events_tx.clone(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn overlay(&self) -> &OverlaySurface {
        &self.overlay
    }

    /// Run until shutdown. `observe` is called after every state change.
    pub fn run(&mut self, mut observe: impl FnMut(&SessionView<'_>)) -> Result<()> {
        if self.settings.continuous {
            if let Some(dispatch) = self.controller.set_continuous(true) {
                self.schedule(dispatch.delay);
            }
        }

        let mut shutting_down = false;
        loop {
            if shutting_down && !self.controller.is_in_flight() {
                break;
            }

            let event = match self.next_cycle_at {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match self.events_rx.recv_timeout(wait) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => {
                            self.next_cycle_at = None;
                            self.start_cycle(&mut observe)?;
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.events_rx.recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };

            match event {
                ControlEvent::Shutdown => {
                    log::info!("session shutdown requested");
                    shutting_down = true;
                    self.controller.set_continuous(false);
                    if self.release_scheduled() {
                        self.publish(&mut observe);
                    }
                }
                ControlEvent::Resolved(resolution) => {
                    self.apply_resolution(resolution, &mut observe);
                }
                _ if shutting_down => {}
                ControlEvent::ManualTrigger => {
                    if let Some(dispatch) = self.controller.trigger(Trigger::Manual) {
                        self.schedule(dispatch.delay);
                        self.scheduled_manually = true;
                    } else {
                        log::debug!("manual trigger ignored: cycle in flight");
                    }
                }
                ControlEvent::SetContinuous(on) => self.set_continuous(on, &mut observe),
                ControlEvent::ToggleContinuous => {
                    let on = !self.settings.continuous;
                    self.set_continuous(on, &mut observe);
                }
                ControlEvent::ToggleOverlay => {
                    self.settings.show_overlay = !self.settings.show_overlay;
                    self.publish(&mut observe);
                }
                ControlEvent::ToggleConfidence => {
                    self.settings.show_confidence = !self.settings.show_confidence;
                    self.publish(&mut observe);
                }
                ControlEvent::ToggleHistory => {
                    self.settings.show_history = !self.settings.show_history;
                    self.publish(&mut observe);
                }
            }
        }

        let stats = self.camera.stats();
        log::info!(
            "session stopped after {} cycles ({} frames from {})",
            self.cycles,
            stats.frames_captured,
            stats.device
        );
        Ok(())
    }

    fn set_continuous(&mut self, on: bool, observe: &mut impl FnMut(&SessionView<'_>)) {
        self.settings.continuous = on;
        if let Some(dispatch) = self.controller.set_continuous(on) {
            self.schedule(dispatch.delay);
        }
        if !on && !self.scheduled_manually && self.release_scheduled() {
            log::debug!("scheduled cycle released: continuous capture off");
        }
        log::info!("continuous capture {}", if on { "on" } else { "off" });
        self.publish(observe);
    }

    fn schedule(&mut self, delay: std::time::Duration) {
        self.state.is_processing = true;
        self.next_cycle_at = Some(Instant::now() + delay);
        self.scheduled_manually = false;
    }

    /// Drop a cycle that was dispatched but has not started. Returns true if one was pending.
    fn release_scheduled(&mut self) -> bool {
        if self.next_cycle_at.take().is_none() {
            return false;
        }
        self.state.is_processing = false;
        if let Some(dispatch) = self.controller.resolve(CycleOutcome::Skipped) {
            self.schedule(dispatch.delay);
        }
        true
    }

    /// End a cycle that produced no request.
    fn skip_cycle(&mut self, observe: &mut impl FnMut(&SessionView<'_>)) {
        self.state.is_processing = false;
        if let Some(dispatch) = self.controller.resolve(CycleOutcome::Skipped) {
            self.schedule(dispatch.delay);
        }
        self.publish(observe);
    }

    fn start_cycle(&mut self, observe: &mut impl FnMut(&SessionView<'_>)) -> Result<()> {
        if !self.camera.is_healthy() {
            log::warn!("camera {} reports unhealthy", self.camera.stats().device);
        }
        let frame = match self.camera.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("camera read failed: {:#}", err);
                self.controller.set_continuous(false);
                self.skip_cycle(observe);
                return Err(CameraFailure { source: err }.into());
            }
        };
        if frame.is_ready() {
            self.overlay.resize(frame.width, frame.height);
        }
        let image = match self.sampler.sample(&frame) {
            Ok(Some(image)) => image,
            Ok(None) => {
                self.skip_cycle(observe);
                return Ok(());
            }
            Err(err) => {
                log::warn!("frame dropped: {:#}", err);
                self.skip_cycle(observe);
                return Ok(());
            }
        };
        drop(frame);

        self.cycles += 1;
        log::debug!(
            "cycle {}: sending {}x{} frame ({} bytes)",
            self.cycles,
            image.width,
            image.height,
            image.bytes.len()
        );
        let jobs = self
            .jobs_tx
            .as_ref()
            .ok_or_else(|| anyhow!("classification worker is not running"))?;
        jobs.send(image)
            .map_err(|_| anyhow!("classification worker stopped unexpectedly"))?;
        self.publish(observe);
        Ok(())
    }

    fn apply_resolution(
        &mut self,
        resolution: Resolution,
        observe: &mut impl FnMut(&SessionView<'_>),
    ) {
        let outcome = if resolution.failed {
            CycleOutcome::Failed
        } else {
            CycleOutcome::Completed
        };
        let result = resolution.result;
        match (result.is_detected(), result.number()) {
            (true, Some(n)) => log::info!(
                "detected {} fingers (confidence {:.2})",
                n,
                result.confidence()
            ),
            (true, None) => log::info!("gesture detected without a count"),
            (false, _) => log::debug!(
                "no gesture: {}",
                result.explanation().unwrap_or("no explanation")
            ),
        }

        // Applied even if settings changed while the call was in flight.
        self.state.record(result);
        self.state.is_processing = false;

        if let Some(dispatch) = self.controller.resolve(outcome) {
            if outcome == CycleOutcome::Failed {
                log::debug!(
                    "{} consecutive failures; next cycle in {:?}",
                    self.controller.consecutive_failures(),
                    dispatch.delay
                );
            }
            self.schedule(dispatch.delay);
        }
        self.publish(observe);
    }

    fn publish(&mut self, observe: &mut impl FnMut(&SessionView<'_>)) {
        self.overlay.render(&self.state, &self.settings);
        observe(&SessionView {
            state: &self.state,
            settings: &self.settings,
            overlay: &self.overlay,
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop once any call returns.
        self.jobs_tx.take();
        if let Some(worker) = self.worker.take() {
            if !self.controller.is_in_flight() {
                let _ = worker.join();
            }
        }
    }
}

fn run_worker(
    mut client: ClassificationClient,
    jobs: Receiver<EncodedImage>,
    results: Sender<ControlEvent>,
) {
    log::debug!("classification worker started ({})", client.backend_name());
    for image in jobs {
        let resolution = client.resolve(&image);
        if results.send(ControlEvent::Resolved(resolution)).is_err() {
            break;
        }
    }
    log::debug!("classification worker stopped");
}
