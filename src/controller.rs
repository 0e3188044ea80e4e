//! Loop controller.
//!
//! Two modes: `Idle` (manual single captures) and `Active` (continuous). The
//! in-flight flag guarantees that cycles never overlap: a cycle is dispatched
//! only while nothing is in flight, and the flag clears only when that cycle's
//! result has been recorded.
//!
//! Consecutive failed calls back off exponentially from the buffer delay up to
//! `max_backoff`, so an endpoint that fails instantly cannot make the loop spin.

use std::time::Duration;

/// Delay between a resolution and the next continuous cycle.
pub const DEFAULT_BUFFER_DELAY: Duration = Duration::from_millis(10);

/// Upper bound of the failure backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    Idle,
    Active,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// User-initiated single capture.
    Manual,
    /// Timer-driven continuation.
    Scheduled,
}

/// How a cycle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A result from the model was recorded.
    Completed,
    /// The call failed and the error result was recorded.
    Failed,
    /// The source was not ready; nothing was sent or recorded.
    Skipped,
}

/// Instruction to start a cycle after `delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dispatch {
    pub delay: Duration,
}

#[derive(Debug)]
pub struct LoopController {
    mode: LoopMode,
    in_flight: bool,
    buffer_delay: Duration,
    max_backoff: Duration,
    consecutive_failures: u32,
}

impl Default for LoopController {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_DELAY, DEFAULT_MAX_BACKOFF)
    }
}

impl LoopController {
    pub fn new(buffer_delay: Duration, max_backoff: Duration) -> Self {
        Self {
            mode: LoopMode::Idle,
            in_flight: false,
            buffer_delay,
            max_backoff: max_backoff.max(buffer_delay),
            consecutive_failures: 0,
        }
    }

    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Switch continuous mode on or off.
    ///
    /// Turning it on while nothing is in flight dispatches a cycle right away.
    /// Turning it off never cancels a cycle already in flight.
    pub fn set_continuous(&mut self, on: bool) -> Option<Dispatch> {
        self.mode = if on { LoopMode::Active } else { LoopMode::Idle };
        if on {
            self.try_dispatch(self.next_delay())
        } else {
            None
        }
    }

    /// Request a cycle. Ignored while a cycle is in flight.
    pub fn trigger(&mut self, trigger: Trigger) -> Option<Dispatch> {
        match trigger {
            Trigger::Manual => self.try_dispatch(Duration::ZERO),
            Trigger::Scheduled if self.mode == LoopMode::Active => {
                self.try_dispatch(self.next_delay())
            }
            Trigger::Scheduled => None,
        }
    }

    /// Mark the in-flight cycle as resolved and, when active, dispatch the next one.
    pub fn resolve(&mut self, outcome: CycleOutcome) -> Option<Dispatch> {
        if !self.in_flight {
            log::warn!("loop controller resolved with no cycle in flight");
        }
        self.in_flight = false;
        match outcome {
            CycleOutcome::Completed => self.consecutive_failures = 0,
            CycleOutcome::Failed => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1)
            }
            CycleOutcome::Skipped => {}
        }
        if self.mode == LoopMode::Active {
            self.try_dispatch(self.next_delay())
        } else {
            None
        }
    }

    /// Delay before the next continuous cycle, including failure backoff.
    pub fn next_delay(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.consecutive_failures.min(16));
        self.buffer_delay
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    fn try_dispatch(&mut self, delay: Duration) -> Option<Dispatch> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;
        Some(Dispatch { delay })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_manual_trigger_runs_exactly_one_cycle() {
        let mut controller = LoopController::default();
        assert_eq!(
            controller.trigger(Trigger::Manual),
            Some(Dispatch {
                delay: Duration::ZERO
            })
        );
        assert!(controller.is_in_flight());
        assert_eq!(controller.trigger(Trigger::Manual), None);
        assert_eq!(controller.trigger(Trigger::Scheduled), None);

        assert_eq!(controller.resolve(CycleOutcome::Completed), None);
        assert!(!controller.is_in_flight());
    }

    #[test]
    fn active_mode_reschedules_after_each_resolution() {
        let mut controller = LoopController::default();
        let first = controller.set_continuous(true).expect("dispatch on toggle");
        assert_eq!(first.delay, DEFAULT_BUFFER_DELAY);
        assert_eq!(controller.mode(), LoopMode::Active);

        assert_eq!(controller.trigger(Trigger::Scheduled), None);
        assert_eq!(controller.trigger(Trigger::Manual), None);

        let next = controller.resolve(CycleOutcome::Completed).expect("next cycle");
        assert_eq!(next.delay, DEFAULT_BUFFER_DELAY);
        assert!(controller.is_in_flight());
    }

    #[test]
    fn toggling_off_keeps_in_flight_cycle_and_stops_rescheduling() {
        let mut controller = LoopController::default();
        controller.set_continuous(true);
        assert_eq!(controller.set_continuous(false), None);
        assert!(controller.is_in_flight());
        assert_eq!(controller.resolve(CycleOutcome::Completed), None);
        assert_eq!(controller.mode(), LoopMode::Idle);
    }

    #[test]
    fn toggling_on_while_in_flight_does_not_double_dispatch() {
        let mut controller = LoopController::default();
        controller.trigger(Trigger::Manual);
        assert_eq!(controller.set_continuous(true), None);
        assert!(controller.resolve(CycleOutcome::Completed).is_some());
    }

    #[test]
    fn failures_back_off_and_reset_on_success() {
        let mut controller =
            LoopController::new(Duration::from_millis(10), Duration::from_millis(100));
        controller.set_continuous(true);

        let delays: Vec<_> = (0..5)
            .map(|_| controller.resolve(CycleOutcome::Failed).unwrap().delay)
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(20),
                Duration::from_millis(40),
                Duration::from_millis(80),
                Duration::from_millis(100),
                Duration::from_millis(100),
            ]
        );

        let after_skip = controller.resolve(CycleOutcome::Skipped).unwrap();
        assert_eq!(after_skip.delay, Duration::from_millis(100));

        let after_success = controller.resolve(CycleOutcome::Completed).unwrap();
        assert_eq!(after_success.delay, Duration::from_millis(10));
        assert_eq!(controller.consecutive_failures(), 0);
    }
}
