//! The merge point of the location stream, the tick stream and user input.
//!
//! [`TrackingController`] is a plain single-owner state holder: every handler
//! takes `&mut self`, so callers serialize events by construction. The
//! [`tracker`](crate::tracker) actor is the async wrapper that feeds it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TrackerConfig;
use crate::clock::SessionClock;
use crate::geo::{CalorieModel, pace_min_per_km};
use crate::path::PathAccumulator;
use crate::session::{Session, SessionTotals};
use crate::state::{Phase, SessionState, SessionStateMachine, StartOutcome, StopOutcome};
use crate::types::{Fix, LocationStatus};

/// Current, not-yet-finalized totals for display.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub phase: Phase,
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    pub calories: f64,
    pub pace_min_per_km: f64,
    pub fix_count: usize,
}

impl LiveSnapshot {
    pub const fn totals(&self) -> SessionTotals {
        SessionTotals {
            distance_meters: self.distance_meters,
            elapsed_seconds: self.elapsed_seconds,
            calories: self.calories,
        }
    }
}

/// Display collaborator.
///
/// Calls happen inside the controller's handlers and must not block.
pub trait SnapshotSink {
    /// The totals changed.
    fn publish(&mut self, snapshot: &LiveSnapshot);

    /// A fix was added to the running path.
    fn path_extended(&mut self, _fix: &Fix) {}

    /// The path was cleared for a new session.
    fn path_cleared(&mut self) {}

    /// The location provider's status changed.
    fn location_status(&mut self, _status: &LocationStatus) {}
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn publish(&mut self, _snapshot: &LiveSnapshot) {}
}

/// What the controller did with a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartResult {
    Started { started_at: DateTime<Utc> },
    AlreadyRunning,
}

/// Owns all mutable tracking state and enforces the session rules.
#[derive(Debug)]
pub struct TrackingController<D> {
    machine: SessionStateMachine,
    path: PathAccumulator,
    clock: SessionClock,
    calorie_model: CalorieModel,
    calories: f64,
    location_status: LocationStatus,
    sink: D,
}

impl<D: SnapshotSink> TrackingController<D> {
    pub fn new(config: &TrackerConfig, sink: D) -> Self {
        Self {
            machine: SessionStateMachine::new(),
            path: PathAccumulator::new(),
            clock: SessionClock::new(config.tick_period),
            calorie_model: config.calorie_model,
            calories: 0.0,
            location_status: LocationStatus::default(),
            sink,
        }
    }

    /// Handles a fix from the location provider.
    ///
    /// Fixes are discarded unless a session is running. Returns the distance
    /// the fix added, or `None` if it was discarded.
    pub fn on_position_update(&mut self, fix: Fix) -> Option<f64> {
        if self.location_status != LocationStatus::Available {
            self.set_location_status(LocationStatus::Available);
        }
        if !self.machine.is_running() {
            tracing::debug!(phase = %self.machine.phase(), "discarding fix outside running session");
            return None;
        }

        let added = self.path.append(fix);
        self.calories = self.calorie_model.calories(self.path.total_distance());
        self.sink.path_extended(&fix);
        self.publish();
        Some(added)
    }

    /// Handles a tick. Returns whether elapsed time advanced.
    pub fn on_tick(&mut self) -> bool {
        if !self.machine.is_running() {
            return false;
        }
        let advanced = self.clock.tick();
        if advanced {
            self.publish();
        }
        advanced
    }

    /// Starts a fresh session unless one is already running.
    pub fn on_start_requested(&mut self, now: DateTime<Utc>) -> StartResult {
        match self.machine.start(now) {
            StartOutcome::AlreadyRunning => {
                tracing::debug!("start ignored: session already running");
                StartResult::AlreadyRunning
            }
            StartOutcome::Started {
                started_at,
                replaced_stopped,
            } => {
                self.path.reset();
                self.clock.reset();
                self.calories = 0.0;
                self.clock.start();
                tracing::info!(%started_at, replaced_stopped, "walk session started");
                self.sink.path_cleared();
                self.publish();
                StartResult::Started { started_at }
            }
        }
    }

    /// Stops the running session and returns it, frozen, for finalization.
    ///
    /// Returns `None` when nothing was running, which makes repeated stop
    /// signals harmless: only the first one yields a session.
    pub fn on_stop_requested(&mut self, now: DateTime<Utc>) -> Option<Session> {
        let StopOutcome::Stopped {
            started_at,
            ended_at,
        } = self.machine.stop(now)
        else {
            tracing::debug!("stop ignored: no running session");
            return None;
        };
        self.clock.stop();

        let session = Session {
            started_at,
            ended_at: Some(ended_at),
            totals: self.totals(),
            path: self.path.fixes().to_vec(),
        };
        tracing::info!(
            %started_at,
            %ended_at,
            elapsed_s = session.totals.elapsed_seconds,
            distance_m = session.totals.distance_meters,
            fixes = session.path.len(),
            "walk session stopped"
        );
        self.publish();
        Some(session)
    }

    /// Records a status report from the location provider.
    ///
    /// Degraded statuses are not fatal: start, stop and ticks keep working.
    pub fn on_location_status(&mut self, status: LocationStatus) {
        if status.is_degraded() {
            tracing::warn!(%status, "location provider degraded");
        }
        self.set_location_status(status);
    }

    fn set_location_status(&mut self, status: LocationStatus) {
        self.location_status = status;
        self.sink.location_status(&self.location_status);
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.sink.publish(&snapshot);
    }

    pub fn totals(&self) -> SessionTotals {
        SessionTotals {
            distance_meters: self.path.total_distance(),
            elapsed_seconds: self.clock.elapsed_seconds(),
            calories: self.calories,
        }
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        let totals = self.totals();
        LiveSnapshot {
            phase: self.machine.phase(),
            elapsed_seconds: totals.elapsed_seconds,
            distance_meters: totals.distance_meters,
            calories: totals.calories,
            pace_min_per_km: pace_min_per_km(totals.distance_meters, totals.elapsed_seconds),
            fix_count: self.path.len(),
        }
    }

    pub const fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub const fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn path(&self) -> &[Fix] {
        self.path.fixes()
    }

    pub const fn location_status(&self) -> &LocationStatus {
        &self.location_status
    }

    pub const fn sink(&self) -> &D {
        &self.sink
    }
}
