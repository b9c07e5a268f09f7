//! Status command for showing configuration and lifetime totals.

use std::io::Write;

use anyhow::Result;
use walk_core::format_elapsed;
use walk_db::Database;

use crate::Config;
use crate::summary::{format_calories, format_distance, format_timestamp};

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    let totals = db.walk_totals()?;

    writeln!(writer, "Walk tracker status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "User: {}", config.user_id)?;
    writeln!(
        writer,
        "Backend: {}",
        config.api_base_url.as_deref().unwrap_or("not configured")
    )?;
    match &config.snapshot_dir {
        Some(dir) => writeln!(writer, "Snapshots: {}", dir.display())?,
        None => writeln!(writer, "Snapshots: not configured")?,
    }

    if totals.walks == 0 {
        writeln!(writer, "No walks recorded.")?;
        return Ok(());
    }

    writeln!(writer, "Walks: {}", totals.walks)?;
    writeln!(writer, "Total time: {}", format_elapsed(totals.elapsed_seconds))?;
    writeln!(writer, "Total distance: {}", format_distance(totals.distance_meters))?;
    writeln!(writer, "Total calories: {}", format_calories(totals.calories))?;
    if let Some(last) = totals.last_ended_at {
        writeln!(writer, "Last walk ended: {}", format_timestamp(last))?;
    }

    Ok(())
}
