//! Track command: live tracking from a location feed.
//!
//! Feed lines are forwarded to the tracker actor as they arrive, a ticker
//! drives the session clock in real time, and a display task prints live
//! totals to stderr. End of input stops the running session; the command
//! returns once every finished walk has been submitted.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use walk_core::{
    ArtifactStore, ChannelSink, DisplayFeed, PathUpdate, SessionFinalizer, SessionStore, Tracker,
    TrackerConfig, TrackerHandle, spawn_ticker, spawn_tracker,
};

use crate::feed::{self, FeedEntry};
use crate::summary::{SessionSummary, live_line, write_summaries};

/// Runs a live tracking session over `input`.
///
/// Unless `wait` is set, a session starts as soon as the tracker is up.
/// Live lines go to `display`; finished walks go to `writer`.
pub async fn run<W, R, S, A>(
    writer: &mut W,
    input: R,
    display: impl Write + Send + 'static,
    config: &TrackerConfig,
    finalizer: SessionFinalizer<S, A>,
    wait: bool,
    json: bool,
) -> Result<Vec<SessionSummary>>
where
    W: Write,
    R: AsyncBufRead + Unpin,
    S: SessionStore,
    A: ArtifactStore,
{
    let (sink, display_feed) = ChannelSink::channel();
    let Tracker {
        handle,
        mut reports,
        task,
    } = spawn_tracker(config, sink, finalizer);
    let ticker = spawn_ticker(handle.clone(), config.tick_period);
    let display = tokio::spawn(show(display_feed, display));

    if !wait {
        handle.start()?;
    }

    let mut lines = input.lines();
    let mut line_number = 0_usize;
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read location feed")?
    {
        line_number += 1;
        match feed::parse_line(&line) {
            Ok(Some(entry)) => forward(&handle, &entry, line_number)?,
            Ok(None) => {}
            Err(err) => tracing::warn!(line = line_number, error = %format!("{err:#}"), "skipping feed line"),
        }
    }

    tracing::debug!("location feed ended");
    handle.stop()?;
    handle.shutdown()?;
    let summary = task.await.context("tracker task failed")?;
    ticker.abort();
    if let Err(err) = display.await {
        tracing::warn!(error = %err, "display task failed");
    }
    tracing::info!(
        sessions = summary.sessions_finalized,
        "tracking finished"
    );

    let mut summaries = Vec::new();
    while let Some(report) = reports.recv().await {
        summaries.push(SessionSummary::from_report(&report));
    }
    summaries.sort_by_key(|summary| summary.started_at);

    write_summaries(writer, &summaries, json)?;
    Ok(summaries)
}

fn forward(handle: &TrackerHandle, entry: &FeedEntry, line: usize) -> Result<()> {
    if let Some(fix) = entry.to_fix(Utc::now()) {
        match fix {
            Ok(fix) => handle.position(fix)?,
            Err(err) => tracing::warn!(line, error = %err, "skipping invalid fix"),
        }
        return Ok(());
    }
    if let Some(status) = entry.to_status() {
        handle.location_status(status)?;
        return Ok(());
    }
    match entry {
        FeedEntry::Start { at: Some(at) } => handle.start_at(*at)?,
        FeedEntry::Start { at: None } => handle.start()?,
        FeedEntry::Stop { at: Some(at) } => handle.stop_at(*at)?,
        FeedEntry::Stop { at: None } => handle.stop()?,
        FeedEntry::Fix { .. } | FeedEntry::PermissionDenied | FeedEntry::Unavailable { .. } => {}
    }
    Ok(())
}

/// Prints live updates until the tracker drops its sink.
async fn show<W: Write>(mut feed: DisplayFeed, mut out: W) {
    loop {
        tokio::select! {
            changed = feed.snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *feed.snapshots.borrow_and_update();
                let _ = writeln!(out, "{}", live_line(&snapshot));
            }
            changed = feed.status.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = feed.status.borrow_and_update().clone();
                let _ = writeln!(out, "{status}");
            }
            Some(update) = feed.path.recv() => {
                if let PathUpdate::Extended(fix) = update {
                    tracing::trace!(
                        latitude = fix.point.latitude(),
                        longitude = fix.point.longitude(),
                        "path extended"
                    );
                }
            }
        }
    }
}
