//! Session lifecycle.
//!
//! ```text
//! Idle ──start──▶ Running ──stop──▶ Stopped
//!                    ▲                 │
//!                    └──────start──────┘   (fresh session, no resume)
//! ```
//!
//! A start while running and a stop while not running are no-ops, reported
//! as outcomes rather than errors.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current lifecycle state, with the timestamps each state owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running {
        started_at: DateTime<Utc>,
    },
    Stopped {
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    },
}

impl SessionState {
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Running { .. } => Phase::Running,
            Self::Stopped { .. } => Phase::Stopped,
        }
    }

    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Timestamp-free view of [`SessionState`] for display and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Stopped,
}

impl Phase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session began. `replaced_stopped` is true when it displaced a
    /// previously stopped session.
    Started {
        started_at: DateTime<Utc>,
        replaced_stopped: bool,
    },
    /// A session is already running; nothing changed.
    AlreadyRunning,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The running session ended.
    Stopped {
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    },
    /// No session was running; nothing changed.
    NotRunning,
}

/// Owns the lifecycle state and enforces the legal transitions.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub const fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Idle/Stopped -> Running. No-op while running.
    pub fn start(&mut self, now: DateTime<Utc>) -> StartOutcome {
        let replaced_stopped = match self.state {
            SessionState::Running { .. } => return StartOutcome::AlreadyRunning,
            SessionState::Idle => false,
            SessionState::Stopped { .. } => true,
        };
        self.state = SessionState::Running { started_at: now };
        StartOutcome::Started {
            started_at: now,
            replaced_stopped,
        }
    }

    /// Running -> Stopped. No-op otherwise.
    ///
    /// A clock that went backwards never yields `ended_at < started_at`.
    pub fn stop(&mut self, now: DateTime<Utc>) -> StopOutcome {
        let SessionState::Running { started_at } = self.state else {
            return StopOutcome::NotRunning;
        };
        let ended_at = now.max(started_at);
        self.state = SessionState::Stopped {
            started_at,
            ended_at,
        };
        StopOutcome::Stopped {
            started_at,
            ended_at,
        }
    }
}
