//! Playback scheduler: decides which frame to show on each tick.
//!
//! The scheduler is polled once per tick. It reads the playback clock once,
//! maps the position to a display slot and compares it with what is stored:
//!
//! - **Priming**: waits for the first frame, then starts the clock
//! - **Playing**: renders, repeats or skips to keep up with the clock
//! - **Draining**: the producer is done and the clock has passed the last
//!   frame, which is rendered one final time
//!
//! Display slot `k` is source frame `k * stride` (see [`Decimation`]).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::PlaybackClock;
use crate::frame::QuantizedFrame;
use crate::producer::Decimation;
use crate::store::FrameStore;

/// Window over which the display rate is estimated.
const FPS_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Priming,
    Playing,
    Draining,
    Finished,
}

/// Why the previous frame is shown again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// The clock has not reached the next slot yet
    ClockBehind,
    /// The clock is ahead of what the producer has stored
    BackPressure,
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone)]
pub enum Tick {
    /// Nothing to show yet
    Waiting,
    /// Show a new frame; `skipped` slots were passed over to catch up
    Render {
        frame: Arc<QuantizedFrame>,
        skipped: u64,
    },
    /// Show the previous frame again
    Repeat {
        frame: Arc<QuantizedFrame>,
        reason: HoldReason,
    },
    /// Show the last stored frame one final time
    Final { frame: Arc<QuantizedFrame> },
    /// Playback is over
    Finished,
}

impl Tick {
    /// The frame to draw for this tick, if any.
    pub fn frame(&self) -> Option<&Arc<QuantizedFrame>> {
        match self {
            Tick::Render { frame, .. } | Tick::Repeat { frame, .. } | Tick::Final { frame } => {
                Some(frame)
            }
            Tick::Waiting | Tick::Finished => None,
        }
    }
}

/// State mutated once per tick.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    /// Last displayed slot
    pub last_slot: Option<u64>,
    /// Wall time of the last tick that drew something
    pub last_tick: Option<Instant>,
    /// Rolling display-rate estimate
    pub fps_estimate: f64,
}

/// Running totals, for the end-of-session summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub rendered: u64,
    pub repeated: u64,
    pub skipped: u64,
    pub back_pressure: u64,
}

/// Display-rate estimate over a sliding one-second window.
#[derive(Debug, Default)]
struct FpsMeter {
    draws: VecDeque<Instant>,
}

impl FpsMeter {
    fn record(&mut self, now: Instant) -> f64 {
        self.draws.push_back(now);
        while let Some(&oldest) = self.draws.front() {
            if now.duration_since(oldest) > FPS_WINDOW {
                self.draws.pop_front();
            } else {
                break;
            }
        }

        match (self.draws.front(), self.draws.len()) {
            (Some(&oldest), n) if n >= 2 => {
                let span = now.duration_since(oldest).as_secs_f64();
                if span > 0.0 {
                    (n - 1) as f64 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

/// Slot the clock says should be on screen.
pub fn ideal_slot(position: Duration, fps: f64) -> u64 {
    // Tolerance keeps exact products like 2.0 * 30.0 from flooring down
    (position.as_secs_f64() * fps + 1e-9).floor().max(0.0) as u64
}

/// Real-time frame selection over a [`FrameStore`].
pub struct Scheduler<S: FrameStore> {
    store: S,
    decimation: Decimation,
    skip_enabled: bool,
    phase: Phase,
    state: SchedulerState,
    meter: FpsMeter,
    stats: SchedulerStats,
}

impl<S: FrameStore> Scheduler<S> {
    pub fn new(store: S, decimation: Decimation, skip_enabled: bool) -> Self {
        Self {
            store,
            decimation,
            skip_enabled,
            phase: Phase::Priming,
            state: SchedulerState::default(),
            meter: FpsMeter::default(),
            stats: SchedulerStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Display rate in slots per second.
    pub fn fps(&self) -> f64 {
        self.decimation.display_fps()
    }

    /// Time between ticks.
    pub fn period(&self) -> Duration {
        let fps = self.fps();
        if fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::from_millis(33)
        }
    }

    /// Advance by one tick. Never blocks on production.
    pub fn tick(&mut self, clock: &mut dyn PlaybackClock, now: Instant) -> Tick {
        let tick = match self.phase {
            Phase::Priming => self.prime(clock),
            Phase::Playing => self.play(clock),
            Phase::Draining => {
                self.phase = Phase::Finished;
                Tick::Finished
            }
            Phase::Finished => Tick::Finished,
        };

        match &tick {
            Tick::Render { skipped, .. } => {
                self.stats.rendered += 1;
                self.stats.skipped += skipped;
            }
            Tick::Repeat { reason, .. } => {
                self.stats.repeated += 1;
                if *reason == HoldReason::BackPressure {
                    self.stats.back_pressure += 1;
                }
            }
            Tick::Final { .. } => self.stats.rendered += 1,
            Tick::Waiting | Tick::Finished => {}
        }
        if tick.frame().is_some() {
            self.state.last_tick = Some(now);
            self.state.fps_estimate = self.meter.record(now);
        }

        tick
    }

    fn prime(&mut self, clock: &mut dyn PlaybackClock) -> Tick {
        // Read completion first: once it is set, `highest` is final
        let complete = self.store.is_complete();
        let Some(highest) = self.highest_slot() else {
            if complete {
                log::warn!("Producer finished without storing any frames");
                self.phase = Phase::Draining;
                return self.tick_draining();
            }
            return Tick::Waiting;
        };

        let Some((slot, frame)) = (0..=highest).find_map(|slot| self.frame_at(slot).map(|f| (slot, f))) else {
            return Tick::Waiting;
        };

        if slot > 0 {
            log::warn!("First stored frame is slot {}, starting there", slot);
        }
        clock.start();
        self.phase = Phase::Playing;
        self.state.last_slot = Some(slot);
        log::info!("Playback started at {:.3} fps", self.fps());
        Tick::Render { frame, skipped: 0 }
    }

    fn tick_draining(&mut self) -> Tick {
        self.phase = Phase::Finished;
        Tick::Finished
    }

    fn play(&mut self, clock: &mut dyn PlaybackClock) -> Tick {
        let last = self.state.last_slot.unwrap_or(0);
        let ideal = ideal_slot(clock.position(), self.fps());
        let complete = self.store.is_complete();
        let highest = self.highest_slot().unwrap_or(last).max(last);

        if ideal <= last {
            return self.repeat(last, HoldReason::ClockBehind);
        }

        if ideal > highest {
            if !complete {
                // Producer is behind the clock: hold rather than run ahead
                return self.repeat(last, HoldReason::BackPressure);
            }
            if self.skip_enabled || last >= highest {
                self.phase = Phase::Draining;
                return match self.frame_at(highest).or_else(|| self.frame_at(last)) {
                    Some(frame) => {
                        log::info!("Reached end of stream at slot {}", highest);
                        self.state.last_slot = Some(highest);
                        Tick::Final { frame }
                    }
                    None => self.tick_draining(),
                };
            }
        }

        let next = if self.skip_enabled {
            // Nearest stored slot at or below the clock, stepping over holes
            (last + 1..=ideal).rev().find(|slot| self.has_slot(*slot))
        } else {
            (last + 1..=highest).find(|slot| self.has_slot(*slot))
        };

        match next.and_then(|slot| self.frame_at(slot).map(|f| (slot, f))) {
            Some((slot, frame)) => {
                self.state.last_slot = Some(slot);
                Tick::Render {
                    frame,
                    skipped: slot - last - 1,
                }
            }
            None => self.repeat(last, HoldReason::BackPressure),
        }
    }

    fn repeat(&mut self, slot: u64, reason: HoldReason) -> Tick {
        match self.frame_at(slot) {
            Some(frame) => Tick::Repeat { frame, reason },
            None => Tick::Waiting,
        }
    }

    fn highest_slot(&self) -> Option<u64> {
        self.store.highest().map(|index| self.decimation.slot_of(index))
    }

    fn has_slot(&self, slot: u64) -> bool {
        self.store.contains(self.decimation.index_of(slot))
    }

    fn frame_at(&self, slot: u64) -> Option<Arc<QuantizedFrame>> {
        self.store.get(self.decimation.index_of(slot)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ManualClock;
    use crate::frame::Cell;
    use crate::store::MemoryStore;

    fn frame(index: u64) -> QuantizedFrame {
        QuantizedFrame::new(index, Duration::ZERO, 1, 1, vec![Cell::default()]).unwrap()
    }

    #[test]
    fn test_ideal_slot() {
        assert_eq!(ideal_slot(Duration::from_secs(2), 30.0), 60);
        assert_eq!(ideal_slot(Duration::ZERO, 30.0), 0);
        assert_eq!(ideal_slot(Duration::from_millis(33), 30.0), 0);
        assert_eq!(ideal_slot(Duration::from_millis(34), 30.0), 1);
    }

    #[test]
    fn test_priming_waits_for_first_frame() {
        let store = Arc::new(MemoryStore::new());
        let mut scheduler = Scheduler::new(store.clone(), Decimation::new(30.0, None), true);
        let mut clock = ManualClock::new();

        assert!(matches!(scheduler.tick(&mut clock, Instant::now()), Tick::Waiting));
        assert!(!clock.is_started());

        store.put(0, frame(0)).unwrap();
        assert!(matches!(
            scheduler.tick(&mut clock, Instant::now()),
            Tick::Render { skipped: 0, .. }
        ));
        assert!(clock.is_started());
        assert_eq!(scheduler.phase(), Phase::Playing);
    }

    #[test]
    fn test_empty_complete_store_finishes_without_rendering() {
        let store = MemoryStore::new();
        store.mark_complete();
        let mut scheduler = Scheduler::new(store, Decimation::new(30.0, None), true);
        let mut clock = ManualClock::new();

        assert!(matches!(scheduler.tick(&mut clock, Instant::now()), Tick::Finished));
        assert_eq!(scheduler.stats().rendered, 0);
    }

    #[test]
    fn test_repeat_when_clock_behind() {
        let store = MemoryStore::new();
        store.put(0, frame(0)).unwrap();
        store.put(1, frame(1)).unwrap();
        let mut scheduler = Scheduler::new(store, Decimation::new(30.0, None), true);
        let mut clock = ManualClock::new();

        scheduler.tick(&mut clock, Instant::now());
        let tick = scheduler.tick(&mut clock, Instant::now());
        assert!(matches!(
            tick,
            Tick::Repeat {
                reason: HoldReason::ClockBehind,
                ..
            }
        ));
        assert_eq!(tick.frame().map(|f| f.index()), Some(0));
    }

    #[test]
    fn test_hold_when_clock_passes_incomplete_store() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.put(i, frame(i)).unwrap();
        }
        let mut scheduler = Scheduler::new(store, Decimation::new(30.0, None), false);
        let mut clock = ManualClock::new();

        scheduler.tick(&mut clock, Instant::now());
        clock.set(Duration::from_secs(1));
        let tick = scheduler.tick(&mut clock, Instant::now());
        assert!(matches!(
            tick,
            Tick::Repeat {
                reason: HoldReason::BackPressure,
                ..
            }
        ));
        assert_eq!(tick.frame().map(|f| f.index()), Some(0));
    }

    #[test]
    fn test_fps_meter_estimates_rate() {
        let mut meter = FpsMeter::default();
        let start = Instant::now();
        let mut estimate = 0.0;
        for i in 0..=10 {
            estimate = meter.record(start + Duration::from_millis(i * 50));
        }
        assert!((estimate - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_period() {
        let scheduler = Scheduler::new(MemoryStore::new(), Decimation::new(30.0, Some(10)), true);
        assert_eq!(scheduler.fps(), 10.0);
        assert_eq!(scheduler.period(), Duration::from_millis(100));
    }
}
