//! History command: recorded walks, newest first.

use std::io::Write;

use anyhow::Result;
use walk_core::format_elapsed;
use walk_db::Database;

use crate::summary::{format_calories, format_distance};

pub fn run<W: Write>(writer: &mut W, db: &Database, limit: usize, json: bool) -> Result<()> {
    let walks = db.list_walks(limit)?;

    if json {
        let records: Vec<_> = walks
            .iter()
            .map(|walk| {
                serde_json::json!({
                    "id": walk.id,
                    "record": walk.record,
                    "payload": walk.record.to_payload(),
                })
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&records)?)?;
        return Ok(());
    }

    if walks.is_empty() {
        writeln!(writer, "No walks recorded.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<5} {:<20} {:>9} {:>11} {:>12} {:>9}",
        "ID", "Started (UTC)", "Time", "Distance", "Calories", "Speed"
    )?;
    for walk in &walks {
        let record = &walk.record;
        writeln!(
            writer,
            "{:<5} {:<20} {:>9} {:>11} {:>12} {:>9}",
            walk.id,
            record.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            format_elapsed(record.elapsed_seconds),
            format_distance(record.distance_meters),
            format_calories(record.calories),
            format!("{:.2} m/s", record.average_speed),
        )?;
    }
    Ok(())
}
