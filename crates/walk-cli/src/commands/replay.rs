//! Replay command: runs a recorded feed through the tracking controller.
//!
//! Replay is deterministic. The session clock is driven by ticks synthesized
//! from the feed's own timestamps: once a session starts at `t`, ticks are
//! due at `t + period`, `t + 2 * period`, ... and every tick due at or before
//! an entry's time is delivered before that entry. Entries without a
//! timestamp happen at the time of the entry before them.
//!
//! A feed without any `start` entry starts a session at its first fix. A
//! session still running at the end of the feed is stopped at the time of
//! the last entry.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use walk_core::{
    ArtifactStore, Phase, Session, SessionFinalizer, SessionStore, SnapshotSink, StartResult,
    TrackerConfig, TrackingController,
};

use crate::feed::FeedEntry;
use crate::summary::{SessionSummary, write_summaries};

/// Runs the feed and returns every session it stopped, in order.
///
/// `origin` is the time of entries before the feed's first timestamp; it
/// only matters for feeds with no timestamps at all.
pub fn replay_sessions<D: SnapshotSink>(
    entries: &[FeedEntry],
    config: &TrackerConfig,
    sink: D,
    origin: DateTime<Utc>,
) -> Result<Vec<Session>> {
    let period = chrono::Duration::from_std(config.tick_period).context("tick period too large")?;
    let auto_start = !entries.iter().any(|e| matches!(e, FeedEntry::Start { .. }));

    let mut controller = TrackingController::new(config, sink);
    let mut now = entries.iter().find_map(FeedEntry::timestamp).unwrap_or(origin);
    let mut next_tick: Option<DateTime<Utc>> = None;
    let mut sessions = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        // Time never runs backwards.
        if let Some(at) = entry.timestamp() {
            now = now.max(at);
        }
        deliver_ticks(&mut controller, &mut next_tick, period, now);

        match entry {
            FeedEntry::Fix { .. } => {
                let Some(fix) = entry.to_fix(now) else {
                    continue;
                };
                let fix = fix.with_context(|| format!("entry {}", index + 1))?;
                if auto_start && controller.phase() == Phase::Idle {
                    start(&mut controller, &mut next_tick, period, now);
                }
                controller.on_position_update(fix);
            }
            FeedEntry::PermissionDenied | FeedEntry::Unavailable { .. } => {
                if let Some(status) = entry.to_status() {
                    controller.on_location_status(status);
                }
            }
            FeedEntry::Start { .. } => start(&mut controller, &mut next_tick, period, now),
            FeedEntry::Stop { .. } => {
                if let Some(session) = controller.on_stop_requested(now) {
                    next_tick = None;
                    sessions.push(session);
                }
            }
        }
    }

    if controller.phase() == Phase::Running {
        deliver_ticks(&mut controller, &mut next_tick, period, now);
        if let Some(session) = controller.on_stop_requested(now) {
            sessions.push(session);
        }
    }

    Ok(sessions)
}

fn start<D: SnapshotSink>(
    controller: &mut TrackingController<D>,
    next_tick: &mut Option<DateTime<Utc>>,
    period: chrono::Duration,
    now: DateTime<Utc>,
) {
    if let StartResult::Started { started_at } = controller.on_start_requested(now) {
        *next_tick = Some(started_at + period);
    }
}

/// Delivers every tick due at or before `now`.
fn deliver_ticks<D: SnapshotSink>(
    controller: &mut TrackingController<D>,
    next_tick: &mut Option<DateTime<Utc>>,
    period: chrono::Duration,
    now: DateTime<Utc>,
) {
    while let Some(due) = *next_tick {
        if due > now {
            break;
        }
        controller.on_tick();
        *next_tick = Some(due + period);
    }
}

/// Replays the feed, finalizes each session in order, and prints them.
pub async fn run<W, D, S, A>(
    writer: &mut W,
    entries: &[FeedEntry],
    config: &TrackerConfig,
    sink: D,
    finalizer: &SessionFinalizer<S, A>,
    origin: DateTime<Utc>,
    json: bool,
) -> Result<Vec<SessionSummary>>
where
    W: Write,
    D: SnapshotSink,
    S: SessionStore,
    A: ArtifactStore,
{
    let sessions = replay_sessions(entries, config, sink, origin)?;
    tracing::info!(sessions = sessions.len(), "replay finished");

    let mut summaries = Vec::with_capacity(sessions.len());
    for session in &sessions {
        let report = finalizer.finalize_and_submit(session).await;
        summaries.push(SessionSummary::from_report(&report));
    }

    write_summaries(writer, &summaries, json)?;
    Ok(summaries)
}
