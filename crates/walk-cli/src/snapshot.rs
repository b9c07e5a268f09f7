//! File-based map snapshots.
//!
//! Each finished walk with at least one fix is written as a GeoJSON
//! `FeatureCollection`: the route as a `LineString` (a `Point` for a single
//! fix), with the display region as its `bbox` and the walk totals as
//! properties. The returned reference is the file path.
//!
//! Files are never overwritten: sessions that share a start time get a
//! numeric suffix (`walk-...-1.geojson`, `walk-...-2.geojson`, ...).

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use walk_core::{ArtifactStore, Fix, MapRegion, SessionRecord};

#[derive(Debug, Clone)]
pub struct GeoJsonSnapshots {
    dir: PathBuf,
}

impl GeoJsonSnapshots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_stem(record: &SessionRecord) -> String {
        format!(
            "walk-{}-{}",
            record.user_id.as_str(),
            record.started_at.format("%Y%m%dT%H%M%S%3fZ")
        )
        .replace(['/', '\\'], "_")
    }
}

impl ArtifactStore for GeoJsonSnapshots {
    type Error = io::Error;

    async fn capture(
        &self,
        record: &SessionRecord,
        region: &MapRegion,
        path: &[Fix],
    ) -> Result<String, io::Error> {
        let document = to_geojson(record, region, path);
        let dir = self.dir.clone();
        let stem = Self::file_stem(record);
        // File I/O runs on the blocking pool, off the runtime's workers.
        let target = tokio::task::spawn_blocking(move || write_new(&dir, &stem, &document))
            .await
            .map_err(io::Error::other)??;
        tracing::debug!(path = %target.display(), "map snapshot written");
        Ok(target.display().to_string())
    }
}

/// Writes `document` to the first free `{stem}[-N].geojson` in `dir`.
fn write_new(dir: &Path, stem: &str, document: &Value) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let bytes = serde_json::to_vec_pretty(document).map_err(io::Error::other)?;
    for attempt in 0_u32.. {
        let name = if attempt == 0 {
            format!("{stem}.geojson")
        } else {
            format!("{stem}-{attempt}.geojson")
        };
        let target = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(mut file) => {
                file.write_all(&bytes)?;
                return Ok(target);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }
    }
    Err(io::Error::other("no free snapshot file name"))
}

/// GeoJSON positions are `[longitude, latitude]`.
fn position(fix: &Fix) -> Value {
    json!([fix.point.longitude(), fix.point.latitude()])
}

pub fn to_geojson(record: &SessionRecord, region: &MapRegion, path: &[Fix]) -> Value {
    let geometry = if let [only] = path {
        json!({ "type": "Point", "coordinates": position(only) })
    } else {
        json!({
            "type": "LineString",
            "coordinates": path.iter().map(position).collect::<Vec<_>>(),
        })
    };
    let bounds = region.bounds;
    json!({
        "type": "FeatureCollection",
        "bbox": [bounds.west, bounds.south, bounds.east, bounds.north],
        "features": [{
            "type": "Feature",
            "geometry": geometry,
            "properties": {
                "user_id": record.user_id.as_str(),
                "started_at": record.started_at.to_rfc3339(),
                "ended_at": record.ended_at.to_rfc3339(),
                "elapsed_seconds": record.elapsed_seconds,
                "distance_meters": record.distance_meters,
                "calories": record.calories,
                "average_speed": record.average_speed,
                "center": [region.center.longitude(), region.center.latitude()],
                "latitude_delta": region.latitude_delta,
                "longitude_delta": region.longitude_delta,
            },
        }],
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use walk_core::{GeoPoint, UserId};

    use super::*;

    fn record() -> SessionRecord {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        SessionRecord {
            user_id: UserId::new("walker").unwrap(),
            started_at: start,
            ended_at: start,
            elapsed_seconds: 3,
            distance_meters: 22.24,
            calories: 1.33,
            average_speed: 7.41,
        }
    }

    fn path(coords: &[(f64, f64)]) -> Vec<Fix> {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        coords
            .iter()
            .map(|&(lat, lon)| Fix::new(GeoPoint::new(lat, lon).unwrap(), at))
            .collect()
    }

    #[test]
    fn test_route_is_a_line_string_in_lon_lat_order() {
        let path = path(&[(37.50, 127.00), (37.52, 127.02)]);
        let region = MapRegion::enclosing(&path).unwrap();

        let doc = to_geojson(&record(), &region, &path);

        let geometry = &doc["features"][0]["geometry"];
        assert_eq!(geometry["type"], "LineString");
        assert_eq!(geometry["coordinates"], json!([[127.00, 37.50], [127.02, 37.52]]));
        assert_eq!(doc["bbox"], json!([127.00, 37.50, 127.02, 37.52]));
        assert_eq!(doc["features"][0]["properties"]["user_id"], "walker");
    }

    #[test]
    fn test_single_fix_is_a_point() {
        let path = path(&[(1.0, 2.0)]);
        let region = MapRegion::enclosing(&path).unwrap();

        let doc = to_geojson(&record(), &region, &path);

        assert_eq!(doc["features"][0]["geometry"]["type"], "Point");
        assert_eq!(
            doc["features"][0]["properties"]["latitude_delta"],
            json!(0.01)
        );
    }

    #[tokio::test]
    async fn test_capture_writes_file_and_returns_its_path() {
        let temp = tempfile::tempdir().unwrap();
        let store = GeoJsonSnapshots::new(temp.path().join("snaps"));
        let path = path(&[(37.50, 127.00), (37.52, 127.02)]);
        let region = MapRegion::enclosing(&path).unwrap();

        let reference = store.capture(&record(), &region, &path).await.unwrap();

        assert!(reference.ends_with("walk-walker-20240501T090000000Z.geojson"));
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&reference).unwrap()).unwrap();
        assert_eq!(written["type"], "FeatureCollection");
    }

    #[tokio::test]
    async fn test_same_start_time_gets_distinct_files() {
        let temp = tempfile::tempdir().unwrap();
        let store = GeoJsonSnapshots::new(temp.path());
        let path = path(&[(37.50, 127.00), (37.52, 127.02)]);
        let region = MapRegion::enclosing(&path).unwrap();

        let first = store.capture(&record(), &region, &path).await.unwrap();
        let second = store.capture(&record(), &region, &path).await.unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("walk-walker-20240501T090000000Z-1.geojson"));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 2);
    }
}
