//! Core walk-session tracking.
//!
//! This crate turns a stream of position fixes and clock ticks into
//! session totals, and finished sessions into persisted records:
//! - Geo math: haversine distance, calorie model, pace
//! - Path accumulation with an O(1) running distance total
//! - Session lifecycle: Idle -> Running -> Stopped, with idempotent start/stop
//! - Tracking controller and the actor that serializes its inputs
//! - Finalization: record building and hand-off to storage collaborators

pub mod clock;
pub mod controller;
pub mod finalize;
pub mod geo;
pub mod path;
pub mod session;
pub mod state;
pub mod tracker;
pub mod types;

use std::time::Duration;

pub use clock::{SessionClock, format_elapsed};
pub use controller::{LiveSnapshot, NullSink, SnapshotSink, StartResult, TrackingController};
pub use finalize::{
    ArtifactStore, FinalizeError, FinalizeReport, NoArtifacts, SessionFinalizer, SessionStore,
};
pub use geo::{CalorieModel, MapRegion, haversine_distance, pace_min_per_km};
pub use path::PathAccumulator;
pub use session::{Session, SessionRecord, SessionTotals, WalkingPayload};
pub use state::{Phase, SessionState, SessionStateMachine};
pub use tracker::{
    ChannelSink, DisplayFeed, PathUpdate, Tracker, TrackerError, TrackerHandle, TrackerSummary,
    TrackerView, spawn_ticker, spawn_tracker,
};
pub use types::{Fix, GeoPoint, LocationStatus, UserId, ValidationError};

/// Settings shared by the controller and the tick source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Time added to the session clock per tick.
    pub tick_period: Duration,
    pub calorie_model: CalorieModel,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_period: clock::DEFAULT_TICK_PERIOD,
            calorie_model: CalorieModel::default(),
        }
    }
}
