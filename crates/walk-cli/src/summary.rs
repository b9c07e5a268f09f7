//! Rendering of finished walks and live totals.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use walk_core::{FinalizeReport, LiveSnapshot, format_elapsed, pace_min_per_km};

/// A finalized walk as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    pub calories: f64,
    pub average_speed: f64,
    pub pace_min_per_km: f64,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

impl SessionSummary {
    pub fn from_report(report: &FinalizeReport) -> Self {
        let record = &report.record;
        Self {
            user_id: record.user_id.as_str().to_string(),
            started_at: record.started_at,
            ended_at: record.ended_at,
            elapsed_seconds: record.elapsed_seconds,
            distance_meters: record.distance_meters,
            calories: record.calories,
            average_speed: record.average_speed,
            pace_min_per_km: pace_min_per_km(record.distance_meters, record.elapsed_seconds),
            persisted: report.is_persisted(),
            error: report.persisted.as_ref().err().map(ToString::to_string),
            snapshot: report.artifact_ref().map(ToString::to_string),
        }
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{meters:.2} m")
    }
}

pub fn format_calories(kcal: f64) -> String {
    format!("{kcal:.2} kcal")
}

/// Writes finished walks as text blocks or a JSON array.
pub fn write_summaries<W: Write>(
    writer: &mut W,
    summaries: &[SessionSummary],
    json: bool,
) -> Result<()> {
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(summaries)?)?;
        return Ok(());
    }

    if summaries.is_empty() {
        writeln!(writer, "No walks recorded.")?;
        return Ok(());
    }

    for (index, summary) in summaries.iter().enumerate() {
        if index > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "Walk {}", index + 1)?;
        writeln!(writer, "  Started:  {}", format_timestamp(summary.started_at))?;
        writeln!(writer, "  Ended:    {}", format_timestamp(summary.ended_at))?;
        writeln!(writer, "  Time:     {}", format_elapsed(summary.elapsed_seconds))?;
        writeln!(writer, "  Distance: {}", format_distance(summary.distance_meters))?;
        writeln!(writer, "  Calories: {}", format_calories(summary.calories))?;
        writeln!(writer, "  Pace:     {:.2} min/km", summary.pace_min_per_km)?;
        writeln!(writer, "  Speed:    {:.2} m/s", summary.average_speed)?;
        match &summary.error {
            None => writeln!(writer, "  Saved:    yes")?,
            Some(error) => writeln!(writer, "  Saved:    no ({error})")?,
        }
        if let Some(snapshot) = &summary.snapshot {
            writeln!(writer, "  Snapshot: {snapshot}")?;
        }
    }
    Ok(())
}

/// One status line for a live display.
pub fn live_line(snapshot: &LiveSnapshot) -> String {
    format!(
        "[{}] {}  {}  {}  {:.2} min/km",
        snapshot.phase,
        format_elapsed(snapshot.elapsed_seconds),
        format_distance(snapshot.distance_meters),
        format_calories(snapshot.calories),
        snapshot.pace_min_per_km,
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use insta::assert_snapshot;
    use walk_core::Phase;

    use super::*;

    fn summary(error: Option<&str>, snapshot: Option<&str>) -> SessionSummary {
        SessionSummary {
            user_id: "walker".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            ended_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 25, 0).unwrap(),
            elapsed_seconds: 1500,
            distance_meters: 2_000.0,
            calories: 120.0,
            average_speed: 2_000.0 / 1500.0,
            pace_min_per_km: 12.5,
            persisted: error.is_none(),
            error: error.map(ToString::to_string),
            snapshot: snapshot.map(ToString::to_string),
        }
    }

    #[test]
    fn test_text_output_lists_each_walk() {
        let mut output = Vec::new();
        write_summaries(
            &mut output,
            &[
                summary(None, Some("/snaps/walk.geojson")),
                summary(Some("local store: database lock poisoned"), None),
            ],
            false,
        )
        .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Walk 1
          Started:  2024-05-01 09:00:00 UTC
          Ended:    2024-05-01 09:25:00 UTC
          Time:     00:25:00
          Distance: 2.00 km
          Calories: 120.00 kcal
          Pace:     12.50 min/km
          Speed:    1.33 m/s
          Saved:    yes
          Snapshot: /snaps/walk.geojson

        Walk 2
          Started:  2024-05-01 09:00:00 UTC
          Ended:    2024-05-01 09:25:00 UTC
          Time:     00:25:00
          Distance: 2.00 km
          Calories: 120.00 kcal
          Pace:     12.50 min/km
          Speed:    1.33 m/s
          Saved:    no (local store: database lock poisoned)
        ");
    }

    #[test]
    fn test_empty_text_output() {
        let mut output = Vec::new();
        write_summaries(&mut output, &[], false).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No walks recorded.\n");
    }

    #[test]
    fn test_json_output_omits_absent_fields() {
        let mut output = Vec::new();
        write_summaries(&mut output, &[summary(None, None)], true).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed[0]["persisted"], true);
        assert_eq!(parsed[0]["elapsed_seconds"], 1500);
        assert!(parsed[0].get("error").is_none());
        assert!(parsed[0].get("snapshot").is_none());
    }

    #[test]
    fn test_live_line_shows_phase_and_totals() {
        let snapshot = LiveSnapshot {
            phase: Phase::Running,
            elapsed_seconds: 3,
            distance_meters: 22.239,
            calories: 1.334,
            pace_min_per_km: 2.248,
            fix_count: 3,
        };
        assert_snapshot!(live_line(&snapshot), @"[running] 00:00:03  22.24 m  1.33 kcal  2.25 min/km");
    }
}
