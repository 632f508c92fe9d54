use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::compositor::FrameTick;

/// Host display-refresh callback.
pub trait RefreshSource {
    /// Asks for one more refresh callback.
    fn request_refresh(&mut self);
    /// Withdraws an outstanding request, if the host supports it.
    fn cancel_refresh(&mut self);
}

#[derive(Debug, Default)]
struct RefreshCounters {
    requested: AtomicU64,
    cancelled: AtomicU64,
    pending: AtomicBool,
}

/// Refresh source driven by hand. Clones share state, so a test can keep one
/// clone while the player owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualRefresh {
    counters: Arc<RefreshCounters>,
}

impl ManualRefresh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.counters.requested.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> u64 {
        self.counters.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.counters.pending.load(Ordering::SeqCst)
    }

    /// Consumes an outstanding request, as a display would when it fires.
    pub fn take_pending(&self) -> bool {
        self.counters.pending.swap(false, Ordering::SeqCst)
    }
}

impl RefreshSource for ManualRefresh {
    fn request_refresh(&mut self) {
        self.counters.requested.fetch_add(1, Ordering::SeqCst);
        self.counters.pending.store(true, Ordering::SeqCst);
    }

    fn cancel_refresh(&mut self) {
        self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
        self.counters.pending.store(false, Ordering::SeqCst);
    }
}

impl<R: RefreshSource + ?Sized> RefreshSource for Box<R> {
    fn request_refresh(&mut self) {
        (**self).request_refresh();
    }

    fn cancel_refresh(&mut self) {
        (**self).cancel_refresh();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Stopped,
    /// Waiting for the next refresh callback.
    Scheduled,
    /// Inside a tick that composites.
    Running,
}

/// Cooperative per-refresh scheduler.
///
/// Every `stop` bumps the generation. Ticks carry the generation they were
/// issued under; [`is_current`](Self::is_current) must be checked before any
/// GPU work so a callback that raced a stop does nothing.
pub struct RenderLoop<R: RefreshSource> {
    refresh: R,
    state: LoopState,
    generation: u64,
    sequence: u64,
}

impl<R: RefreshSource> RenderLoop<R> {
    pub fn new(refresh: R) -> Self {
        Self {
            refresh,
            state: LoopState::Stopped,
            generation: 0,
            sequence: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.state != LoopState::Stopped && self.generation == generation
    }

    /// Stopped to scheduled. No-op otherwise.
    pub fn start(&mut self) {
        if self.state == LoopState::Stopped {
            self.state = LoopState::Scheduled;
            tracing::debug!(generation = self.generation, "render loop started");
            self.refresh.request_refresh();
        }
    }

    /// Asks for another callback while scheduled, e.g. after a command
    /// changed what should be on screen.
    pub fn wake(&mut self) {
        if self.state == LoopState::Scheduled {
            self.refresh.request_refresh();
        }
    }

    /// Enters a tick. Returns `None` when stopped or when there is nothing to
    /// composite, in which case the loop stays scheduled.
    pub fn begin_tick(&mut self, timestamp: Duration, media_time: f64, active: bool) -> Option<FrameTick> {
        if self.state != LoopState::Scheduled || !active {
            return None;
        }
        self.state = LoopState::Running;
        self.sequence += 1;
        Some(FrameTick {
            timestamp,
            media_time,
            sequence: self.sequence,
            generation: self.generation,
        })
    }

    /// Leaves a tick. Re-schedules when `again` and the tick is still current.
    pub fn end_tick(&mut self, tick: &FrameTick, again: bool) {
        if !self.is_current(tick.generation) {
            return;
        }
        self.state = LoopState::Scheduled;
        if again {
            self.refresh.request_refresh();
        }
    }

    /// Cancels pending work. Callbacks of older generations become no-ops.
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.state = LoopState::Stopped;
        self.generation = self.generation.wrapping_add(1);
        self.refresh.cancel_refresh();
        tracing::debug!(generation = self.generation, "render loop stopped");
    }

    /// Invalidates in-flight ticks without stopping, used on context loss.
    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.state == LoopState::Running {
            self.state = LoopState::Scheduled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_requests_a_refresh_once() {
        let refresh = ManualRefresh::new();
        let mut render_loop = RenderLoop::new(refresh.clone());
        render_loop.start();
        render_loop.start();
        assert_eq!(render_loop.state(), LoopState::Scheduled);
        assert_eq!(refresh.requests(), 1);
    }

    #[test]
    fn inactive_ticks_stay_scheduled() {
        let mut render_loop = RenderLoop::new(ManualRefresh::new());
        render_loop.start();
        assert!(render_loop.begin_tick(Duration::ZERO, 0.0, false).is_none());
        assert_eq!(render_loop.state(), LoopState::Scheduled);
    }

    #[test]
    fn ticks_are_sequenced_and_rescheduled() {
        let refresh = ManualRefresh::new();
        let mut render_loop = RenderLoop::new(refresh.clone());
        render_loop.start();
        let first = render_loop.begin_tick(Duration::ZERO, 0.0, true).unwrap();
        assert_eq!(render_loop.state(), LoopState::Running);
        render_loop.end_tick(&first, true);
        let second = render_loop.begin_tick(Duration::ZERO, 0.1, true).unwrap();
        assert!(second.sequence > first.sequence);
        assert_eq!(refresh.requests(), 2);
    }

    #[test]
    fn stop_cancels_and_invalidates_in_flight_ticks() {
        let refresh = ManualRefresh::new();
        let mut render_loop = RenderLoop::new(refresh.clone());
        render_loop.start();
        let tick = render_loop.begin_tick(Duration::ZERO, 0.0, true).unwrap();
        render_loop.stop();
        assert!(!render_loop.is_current(tick.generation));
        render_loop.end_tick(&tick, true);
        assert_eq!(render_loop.state(), LoopState::Stopped);
        assert!(!refresh.is_pending());
        assert_eq!(refresh.cancellations(), 1);
        assert!(render_loop.begin_tick(Duration::ZERO, 0.0, true).is_none());
    }
}
