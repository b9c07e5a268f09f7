//! JSON-lines location feed.
//!
//! One entry per line, tagged by `type`:
//!
//! ```text
//! {"type":"start","at":"2024-05-01T09:00:00Z"}
//! {"type":"fix","latitude":37.5665,"longitude":126.978,"timestamp":"2024-05-01T09:00:01Z"}
//! {"type":"permission_denied"}
//! {"type":"unavailable","reason":"gps lost"}
//! {"type":"stop"}
//! ```
//!
//! Timestamps are optional everywhere. Blank lines are ignored.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walk_core::{Fix, GeoPoint, LocationStatus};

/// One line of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEntry {
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    PermissionDenied,
    Unavailable {
        reason: String,
    },
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at: Option<DateTime<Utc>>,
    },
    Stop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at: Option<DateTime<Utc>>,
    },
}

impl FeedEntry {
    /// When the entry happened, if the feed says so.
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Fix { timestamp, .. } => *timestamp,
            Self::Start { at } | Self::Stop { at } => *at,
            Self::PermissionDenied | Self::Unavailable { .. } => None,
        }
    }

    /// Converts a `fix` entry, stamping it with `fallback` when it carries
    /// no timestamp. Coordinates are validated.
    pub fn to_fix(&self, fallback: DateTime<Utc>) -> Option<Result<Fix>> {
        let Self::Fix {
            latitude,
            longitude,
            timestamp,
        } = self
        else {
            return None;
        };
        Some(
            GeoPoint::new(*latitude, *longitude)
                .map(|point| Fix::new(point, timestamp.unwrap_or(fallback)))
                .map_err(Into::into),
        )
    }

    /// The provider status carried by this entry, if any.
    pub fn to_status(&self) -> Option<LocationStatus> {
        match self {
            Self::PermissionDenied => Some(LocationStatus::PermissionDenied),
            Self::Unavailable { reason } => Some(LocationStatus::Unavailable {
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

/// Parses one line. Returns `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<FeedEntry>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let entry = serde_json::from_str(line).context("invalid feed entry")?;
    Ok(Some(entry))
}

/// Parses a whole feed, failing on the first bad line.
pub fn parse_feed(content: &str) -> Result<Vec<FeedEntry>> {
    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if let Some(entry) = parse_line(line).with_context(|| format!("line {}", index + 1))? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Reads and parses a feed file.
pub fn read_feed(path: &Path) -> Result<Vec<FeedEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_feed(&content).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, secs).unwrap()
    }

    #[test]
    fn test_parses_every_entry_type() {
        let feed = r#"
{"type":"start","at":"2024-05-01T09:00:00Z"}
{"type":"fix","latitude":0.0,"longitude":0.0001,"timestamp":"2024-05-01T09:00:01Z"}
{"type":"fix","latitude":1.5,"longitude":2.5}

{"type":"permission_denied"}
{"type":"unavailable","reason":"gps lost"}
{"type":"stop"}
"#;
        let entries = parse_feed(feed).unwrap();
        assert_eq!(
            entries,
            vec![
                FeedEntry::Start { at: Some(t(0)) },
                FeedEntry::Fix {
                    latitude: 0.0,
                    longitude: 0.0001,
                    timestamp: Some(t(1)),
                },
                FeedEntry::Fix {
                    latitude: 1.5,
                    longitude: 2.5,
                    timestamp: None,
                },
                FeedEntry::PermissionDenied,
                FeedEntry::Unavailable {
                    reason: "gps lost".to_string(),
                },
                FeedEntry::Stop { at: None },
            ]
        );
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let feed = "{\"type\":\"stop\"}\n{\"type\":\"teleport\"}\n";
        let err = parse_feed(feed).unwrap_err();
        assert_eq!(err.to_string(), "line 2");
        assert!(format!("{err:#}").contains("invalid feed entry"));
    }

    #[test]
    fn test_fix_uses_fallback_timestamp() {
        let entry = parse_line(r#"{"type":"fix","latitude":10,"longitude":20}"#)
            .unwrap()
            .unwrap();
        let fix = entry.to_fix(t(30)).unwrap().unwrap();
        assert_eq!(fix.captured_at, t(30));
        assert_eq!(fix.point, GeoPoint::new(10.0, 20.0).unwrap());
    }

    #[test]
    fn test_out_of_range_fix_is_rejected() {
        let entry = FeedEntry::Fix {
            latitude: 91.0,
            longitude: 0.0,
            timestamp: None,
        };
        assert!(entry.to_fix(t(0)).unwrap().is_err());
    }

    #[test]
    fn test_status_entries_map_to_location_status() {
        assert_eq!(
            FeedEntry::PermissionDenied.to_status(),
            Some(LocationStatus::PermissionDenied)
        );
        assert_eq!(FeedEntry::Stop { at: None }.to_status(), None);
        assert!(FeedEntry::PermissionDenied.to_fix(t(0)).is_none());
    }

    #[test]
    fn test_read_feed_names_the_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("missing.jsonl");
        let err = read_feed(&path).unwrap_err();
        assert!(err.to_string().contains("missing.jsonl"));
    }
}
