//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Latitude outside of [-90, 90] or not finite.
    #[error("latitude must be between -90 and 90, got {value}")]
    LatitudeOutOfRange { value: f64 },

    /// Longitude outside of [-180, 180] or not finite.
    #[error("longitude must be between -180 and 180, got {value}")]
    LongitudeOutOfRange { value: f64 },
}

/// A validated user identifier.
///
/// User IDs must be non-empty strings. They key persisted walk records to
/// the account that recorded them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Creates a new ID after validation.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Empty { field: "user ID" });
        }
        Ok(Self(id))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A position on the WGS84 sphere in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = ValidationError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl GeoPoint {
    /// Creates a point, rejecting out-of-range or non-finite coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        // NaN fails the range check as well.
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::LatitudeOutOfRange { value: latitude });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::LongitudeOutOfRange { value: longitude });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// A single timestamped position sample from the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub point: GeoPoint,
    pub captured_at: DateTime<Utc>,
}

impl Fix {
    pub const fn new(point: GeoPoint, captured_at: DateTime<Utc>) -> Self {
        Self { point, captured_at }
    }
}

/// Availability of the location provider, as last reported.
///
/// None of these states stop the tracker; they are surfaced to the display
/// so the user knows why the distance is not moving.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationStatus {
    /// No fix and no error reported yet.
    #[default]
    Waiting,
    /// Fixes are arriving.
    Available,
    /// The user refused location access.
    PermissionDenied,
    /// The provider could not produce a fix.
    Unavailable { reason: String },
}

impl LocationStatus {
    /// Whether this status should be shown to the user as a problem.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::Unavailable { .. })
    }
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => f.write_str("Waiting..."),
            Self::Available => f.write_str("Location available"),
            Self::PermissionDenied => f.write_str("Permission to access location was denied"),
            Self::Unavailable { reason } => write!(f, "Location unavailable: {reason}"),
        }
    }
}
