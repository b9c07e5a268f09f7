//! Actor wrapper around [`TrackingController`].
//!
//! Location updates, ticks and user commands all travel through one
//! unbounded queue consumed by a single task, so handlers never overlap.
//! Finalization of a stopped session runs on a background task: it owns a
//! copy of the frozen session, which lets the next session reset the
//! controller without waiting for the previous submission.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::TrackerConfig;
use crate::controller::{LiveSnapshot, SnapshotSink, TrackingController};
use crate::finalize::{ArtifactStore, FinalizeReport, SessionFinalizer, SessionStore};
use crate::types::{Fix, LocationStatus};

/// Tracker errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TrackerError {
    /// The tracker task has exited; the command was not delivered.
    #[error("tracker has shut down")]
    Closed,
}

/// Point-in-time view of the tracker, as returned by
/// [`TrackerHandle::view`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerView {
    pub snapshot: LiveSnapshot,
    pub location_status: LocationStatus,
}

/// Totals reported when the tracker task exits.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSummary {
    /// Sessions handed to the finalizer.
    pub sessions_finalized: usize,
    /// State at exit. A session still running at shutdown is not finalized.
    pub last: LiveSnapshot,
}

#[derive(Debug)]
enum Command {
    Position(Fix),
    LocationStatus(LocationStatus),
    Tick,
    Start { at: DateTime<Utc> },
    Stop { at: DateTime<Utc> },
    View(oneshot::Sender<TrackerView>),
    Shutdown,
}

/// Cloneable sender side of the tracker queue.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl TrackerHandle {
    fn send(&self, command: Command) -> Result<(), TrackerError> {
        self.tx.send(command).map_err(|_| TrackerError::Closed)
    }

    /// Delivers a fix from the location provider.
    pub fn position(&self, fix: Fix) -> Result<(), TrackerError> {
        self.send(Command::Position(fix))
    }

    /// Delivers a location provider status change.
    pub fn location_status(&self, status: LocationStatus) -> Result<(), TrackerError> {
        self.send(Command::LocationStatus(status))
    }

    /// Delivers one clock tick.
    pub fn tick(&self) -> Result<(), TrackerError> {
        self.send(Command::Tick)
    }

    /// Requests a session start, stamped with the current time.
    pub fn start(&self) -> Result<(), TrackerError> {
        self.start_at(Utc::now())
    }

    pub fn start_at(&self, at: DateTime<Utc>) -> Result<(), TrackerError> {
        self.send(Command::Start { at })
    }

    /// Requests a session stop, stamped with the current time.
    pub fn stop(&self) -> Result<(), TrackerError> {
        self.stop_at(Utc::now())
    }

    pub fn stop_at(&self, at: DateTime<Utc>) -> Result<(), TrackerError> {
        self.send(Command::Stop { at })
    }

    /// Asks the tracker for its current state. The answer reflects every
    /// command sent before this one.
    pub async fn view(&self) -> Result<TrackerView, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::View(reply))?;
        rx.await.map_err(|_| TrackerError::Closed)
    }

    /// Asks the tracker to exit once in-flight finalizations complete.
    pub fn shutdown(&self) -> Result<(), TrackerError> {
        self.send(Command::Shutdown)
    }
}

/// A running tracker: its handle, finalize reports, and task.
#[derive(Debug)]
pub struct Tracker {
    pub handle: TrackerHandle,
    pub reports: mpsc::UnboundedReceiver<FinalizeReport>,
    pub task: JoinHandle<TrackerSummary>,
}

/// Spawns the tracker task on the current tokio runtime.
///
/// The task exits on [`TrackerHandle::shutdown`] or once every handle is
/// dropped, after waiting for pending finalizations.
pub fn spawn_tracker<D, S, A>(
    config: &TrackerConfig,
    sink: D,
    finalizer: SessionFinalizer<S, A>,
) -> Tracker
where
    D: SnapshotSink + Send + 'static,
    S: SessionStore,
    A: ArtifactStore,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let (reports_tx, reports) = mpsc::unbounded_channel();
    let actor = Actor {
        controller: TrackingController::new(config, sink),
        finalizer: Arc::new(finalizer),
        reports: reports_tx,
        finalizing: JoinSet::new(),
        sessions_finalized: 0,
    };
    let task = tokio::spawn(actor.run(rx));
    Tracker {
        handle: TrackerHandle { tx },
        reports,
        task,
    }
}

/// Spawns a task that ticks the tracker every `period`.
///
/// The first tick fires one period after spawning. Late ticks are delayed
/// rather than bursted. The task ends when the tracker closes.
pub fn spawn_ticker(handle: TrackerHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            interval.tick().await;
            if handle.tick().is_err() {
                break;
            }
        }
    })
}

struct Actor<D, S, A> {
    controller: TrackingController<D>,
    finalizer: Arc<SessionFinalizer<S, A>>,
    reports: mpsc::UnboundedSender<FinalizeReport>,
    finalizing: JoinSet<()>,
    sessions_finalized: usize,
}

impl<D, S, A> Actor<D, S, A>
where
    D: SnapshotSink + Send + 'static,
    S: SessionStore,
    A: ArtifactStore,
{
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) -> TrackerSummary {
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle(command),
                },
                Some(joined) = self.finalizing.join_next(), if !self.finalizing.is_empty() => {
                    log_join(joined);
                }
            }
        }

        tracing::debug!(pending = self.finalizing.len(), "tracker draining finalizations");
        while let Some(joined) = self.finalizing.join_next().await {
            log_join(joined);
        }

        TrackerSummary {
            sessions_finalized: self.sessions_finalized,
            last: self.controller.snapshot(),
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Position(fix) => {
                self.controller.on_position_update(fix);
            }
            Command::LocationStatus(status) => self.controller.on_location_status(status),
            Command::Tick => {
                self.controller.on_tick();
            }
            Command::Start { at } => {
                self.controller.on_start_requested(at);
            }
            Command::Stop { at } => {
                if let Some(session) = self.controller.on_stop_requested(at) {
                    let record = self.finalizer.finalize(&session);
                    let finalizer = Arc::clone(&self.finalizer);
                    let reports = self.reports.clone();
                    self.sessions_finalized += 1;
                    self.finalizing.spawn(async move {
                        let report = finalizer.submit(&session, record).await;
                        // Nobody listening for reports is fine.
                        let _ = reports.send(report);
                    });
                }
            }
            Command::View(reply) => {
                let _ = reply.send(TrackerView {
                    snapshot: self.controller.snapshot(),
                    location_status: self.controller.location_status().clone(),
                });
            }
            Command::Shutdown => {}
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        tracing::warn!(error = %err, "finalize task failed");
    }
}

/// Change to the running path, as seen by a display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathUpdate {
    Extended(Fix),
    Cleared,
}

/// [`SnapshotSink`] backed by channels, for displays living on other tasks.
///
/// Snapshots and status are `watch` channels (latest value wins); path
/// updates are an unbounded queue so no point is lost. None of the sends
/// block.
#[derive(Debug)]
pub struct ChannelSink {
    snapshots: watch::Sender<LiveSnapshot>,
    status: watch::Sender<LocationStatus>,
    path: mpsc::UnboundedSender<PathUpdate>,
}

/// Receiving side of a [`ChannelSink`].
#[derive(Debug)]
pub struct DisplayFeed {
    pub snapshots: watch::Receiver<LiveSnapshot>,
    pub status: watch::Receiver<LocationStatus>,
    pub path: mpsc::UnboundedReceiver<PathUpdate>,
}

impl ChannelSink {
    pub fn channel() -> (Self, DisplayFeed) {
        let (snapshots, snapshots_rx) = watch::channel(LiveSnapshot::default());
        let (status, status_rx) = watch::channel(LocationStatus::default());
        let (path, path_rx) = mpsc::unbounded_channel();
        (
            Self {
                snapshots,
                status,
                path,
            },
            DisplayFeed {
                snapshots: snapshots_rx,
                status: status_rx,
                path: path_rx,
            },
        )
    }
}

impl SnapshotSink for ChannelSink {
    fn publish(&mut self, snapshot: &LiveSnapshot) {
        self.snapshots.send_replace(*snapshot);
    }

    fn path_extended(&mut self, fix: &Fix) {
        let _ = self.path.send(PathUpdate::Extended(*fix));
    }

    fn path_cleared(&mut self) {
        let _ = self.path.send(PathUpdate::Cleared);
    }

    fn location_status(&mut self, status: &LocationStatus) {
        self.status.send_replace(status.clone());
    }
}
