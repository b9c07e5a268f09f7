//! Session data: live totals, the frozen session, and its persisted forms.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::average_speed;
use crate::types::{Fix, UserId};

/// Running totals for a session.
///
/// Non-decreasing while the session runs, frozen once it stops.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionTotals {
    pub distance_meters: f64,
    pub elapsed_seconds: u64,
    pub calories: f64,
}

/// A completed session as handed to the finalizer.
///
/// Owns its own copy of the path, so the tracker may reset for the next
/// walk while this one is still being submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub totals: SessionTotals,
    pub path: Vec<Fix>,
}

/// The persisted representation of a finished walk. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    pub calories: f64,
    /// Meters per second over the clock's elapsed time.
    pub average_speed: f64,
}

impl SessionRecord {
    /// Builds a record from a stopped session.
    ///
    /// A session without `ended_at` (not stopped) is closed at its start
    /// time, which keeps the record well-formed.
    pub fn from_session(user_id: UserId, session: &Session) -> Self {
        let totals = session.totals;
        Self {
            user_id,
            started_at: session.started_at,
            ended_at: session.ended_at.unwrap_or(session.started_at),
            elapsed_seconds: totals.elapsed_seconds,
            distance_meters: totals.distance_meters,
            calories: totals.calories,
            average_speed: average_speed(totals.distance_meters, totals.elapsed_seconds),
        }
    }

    /// Wire payload with timestamps rendered in the machine's local zone.
    pub fn to_payload(&self) -> WalkingPayload {
        self.to_payload_in(&Local)
    }

    /// Wire payload with timestamps rendered in `tz`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "calorie totals are far below i64::MAX"
    )]
    pub fn to_payload_in<Tz: TimeZone>(&self, tz: &Tz) -> WalkingPayload {
        WalkingPayload {
            walking_start: self.started_at.with_timezone(tz).naive_local(),
            walking_end: self.ended_at.with_timezone(tz).naive_local(),
            walking_distance: round_to_hundredths(self.distance_meters),
            walking_calorie: self.calories.round() as i64,
            walking_speed: self.average_speed,
        }
    }
}

/// The body accepted by the walking REST endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkingPayload {
    /// Local wall time, no zone suffix.
    #[serde(with = "local_datetime")]
    pub walking_start: NaiveDateTime,
    #[serde(with = "local_datetime")]
    pub walking_end: NaiveDateTime,
    /// Meters, rounded to two decimals.
    pub walking_distance: f64,
    /// Whole kilocalories.
    pub walking_calorie: i64,
    /// Meters per second.
    pub walking_speed: f64,
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `YYYY-MM-DDTHH:MM:SS` without fractional seconds or offset.
mod local_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn session(distance_meters: f64, elapsed_seconds: u64, calories: f64) -> Session {
        Session {
            started_at: t0(),
            ended_at: Some(t0() + Duration::seconds(10)),
            totals: SessionTotals {
                distance_meters,
                elapsed_seconds,
                calories,
            },
            path: Vec::new(),
        }
    }

    fn user() -> UserId {
        UserId::new("walker").unwrap()
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "exact division is expected")]
    fn test_average_speed_over_ten_seconds_is_exact() {
        let record = SessionRecord::from_session(user(), &session(100.0, 10, 6.0));
        assert_eq!(record.average_speed, 10.0);
        assert_eq!(record.ended_at, t0() + Duration::seconds(10));
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "zero guard returns literal zero")]
    fn test_zero_elapsed_has_zero_speed() {
        let record = SessionRecord::from_session(user(), &session(0.0, 0, 0.0));
        assert_eq!(record.average_speed, 0.0);
        assert_eq!(record.distance_meters, 0.0);
        assert_eq!(record.calories, 0.0);
    }

    #[test]
    fn test_unstopped_session_closes_at_start() {
        let mut open = session(5.0, 1, 0.3);
        open.ended_at = None;
        let record = SessionRecord::from_session(user(), &open);
        assert_eq!(record.ended_at, record.started_at);
    }

    #[test]
    fn test_payload_has_exact_wire_shape() {
        let record = SessionRecord::from_session(user(), &session(1234.5678, 600, 74.07));
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let payload = record.to_payload_in(&kst);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "walking_start": "2024-05-01T18:00:00",
                "walking_end": "2024-05-01T18:00:10",
                "walking_distance": 1234.57,
                "walking_calorie": 74,
                "walking_speed": 1234.5678 / 600.0,
            })
        );
    }

    #[test]
    fn test_payload_drops_subsecond_precision() {
        let mut walk = session(10.0, 5, 0.6);
        walk.started_at = t0() + Duration::milliseconds(250);
        let payload = SessionRecord::from_session(user(), &walk).to_payload_in(&Utc);
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""walking_start":"2024-05-01T09:00:00""#), "{json}");
    }

    #[test]
    fn test_payload_parses_back() {
        let payload = SessionRecord::from_session(user(), &session(22.24, 3, 1.33)).to_payload_in(&Utc);
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: WalkingPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
        assert_eq!(parsed.walking_calorie, 1);
    }
}
