//! Distance, energy and pace math.
//!
//! Everything here is pure: no state, no failure modes for validated inputs.

use serde::{Deserialize, Serialize};

use crate::types::{Fix, GeoPoint};

/// Mean earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default energy burn rate in kilocalories per meter walked.
pub const DEFAULT_KCAL_PER_METER: f64 = 0.06;

/// Smallest span (degrees) a map region is allowed to have on either axis.
pub const MIN_REGION_DELTA_DEG: f64 = 0.01;

/// Great-circle distance between two points in meters.
///
/// Symmetric in its arguments and zero for identical points.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let d_lat = (b.latitude() - a.latitude()).to_radians();
    let d_lon = (b.longitude() - a.longitude()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Linear energy model: a fixed burn rate per meter.
///
/// This is an approximation, not a physiological model. Swap the rate (or
/// the whole value) without touching callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalorieModel {
    kcal_per_meter: f64,
}

impl Default for CalorieModel {
    fn default() -> Self {
        Self {
            kcal_per_meter: DEFAULT_KCAL_PER_METER,
        }
    }
}

impl CalorieModel {
    /// Creates a model with the given rate.
    ///
    /// Returns `None` for negative or non-finite rates.
    pub fn new(kcal_per_meter: f64) -> Option<Self> {
        (kcal_per_meter.is_finite() && kcal_per_meter >= 0.0).then_some(Self { kcal_per_meter })
    }

    #[must_use]
    pub const fn kcal_per_meter(&self) -> f64 {
        self.kcal_per_meter
    }

    /// Kilocalories burned over `distance_meters`.
    #[must_use]
    pub fn calories(&self, distance_meters: f64) -> f64 {
        distance_meters * self.kcal_per_meter
    }
}

/// Pace in minutes per kilometer. Zero until both distance and time exist.
#[expect(
    clippy::cast_precision_loss,
    reason = "elapsed seconds stay far below 2^52"
)]
pub fn pace_min_per_km(distance_meters: f64, elapsed_seconds: u64) -> f64 {
    if distance_meters <= 0.0 || elapsed_seconds == 0 {
        return 0.0;
    }
    (elapsed_seconds as f64 / 60.0) / (distance_meters / 1000.0)
}

/// Average speed in meters per second. Zero when no time has elapsed.
#[expect(
    clippy::cast_precision_loss,
    reason = "elapsed seconds stay far below 2^52"
)]
pub fn average_speed(distance_meters: f64, elapsed_seconds: u64) -> f64 {
    if elapsed_seconds == 0 {
        return 0.0;
    }
    distance_meters / elapsed_seconds as f64
}

/// Latitude/longitude bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// The map viewport that frames a finished walk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRegion {
    pub center: GeoPoint,
    pub bounds: Bounds,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    /// Frames the given path, or `None` if it is empty.
    ///
    /// Deltas never drop below [`MIN_REGION_DELTA_DEG`] so a walk that
    /// barely moved still produces a usable viewport. Paths crossing the
    /// antimeridian are framed naively.
    pub fn enclosing(path: &[Fix]) -> Option<Self> {
        let first = path.first()?.point;
        let mut bounds = Bounds {
            south: first.latitude(),
            west: first.longitude(),
            north: first.latitude(),
            east: first.longitude(),
        };
        for fix in &path[1..] {
            bounds.south = bounds.south.min(fix.point.latitude());
            bounds.north = bounds.north.max(fix.point.latitude());
            bounds.west = bounds.west.min(fix.point.longitude());
            bounds.east = bounds.east.max(fix.point.longitude());
        }

        // Midpoints of in-range bounds are themselves in range.
        let center = GeoPoint::new(
            (bounds.south + bounds.north) / 2.0,
            (bounds.west + bounds.east) / 2.0,
        )
        .ok()?;

        Some(Self {
            center,
            bounds,
            latitude_delta: (bounds.north - bounds.south).max(MIN_REGION_DELTA_DEG),
            longitude_delta: (bounds.east - bounds.west).max(MIN_REGION_DELTA_DEG),
        })
    }
}
