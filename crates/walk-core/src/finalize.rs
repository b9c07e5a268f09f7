//! Turning a stopped session into a record and handing it off.
//!
//! Building the record is synchronous and pure. Submitting it to the
//! persistence collaborator (and optionally asking the artifact
//! collaborator for a map snapshot) is async and fire-and-forget from the
//! tracker's point of view: failures come back in a [`FinalizeReport`] and
//! nothing here retries.

use std::error::Error as StdError;
use std::future::Future;

use thiserror::Error;

use crate::geo::MapRegion;
use crate::session::{Session, SessionRecord};
use crate::types::{Fix, UserId};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors reported by a finalize attempt.
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// The persistence collaborator rejected or failed to store the record.
    #[error("failed to persist walk record: {0}")]
    Persist(#[source] BoxError),
    /// The artifact collaborator failed to capture a snapshot.
    #[error("failed to capture map snapshot: {0}")]
    Artifact(#[source] BoxError),
}

/// Stores finalized walk records.
pub trait SessionStore: Send + Sync + 'static {
    type Error: StdError + Send + Sync + 'static;

    fn save(&self, record: &SessionRecord) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Captures a map image for a finished walk and returns a reference to it.
///
/// The reference is opaque to the tracker and only passed through.
pub trait ArtifactStore: Send + Sync + 'static {
    type Error: StdError + Send + Sync + 'static;

    fn capture(
        &self,
        record: &SessionRecord,
        region: &MapRegion,
        path: &[Fix],
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// Placeholder artifact collaborator for finalizers without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtifacts;

/// Returned only if a finalizer without artifacts is asked to capture.
#[derive(Debug, Error)]
#[error("no artifact store configured")]
pub struct NoArtifactStore;

impl ArtifactStore for NoArtifacts {
    type Error = NoArtifactStore;

    async fn capture(
        &self,
        _record: &SessionRecord,
        _region: &MapRegion,
        _path: &[Fix],
    ) -> Result<String, Self::Error> {
        Err(NoArtifactStore)
    }
}

/// Outcome of one finalize attempt.
#[derive(Debug)]
pub struct FinalizeReport {
    pub record: SessionRecord,
    pub persisted: Result<(), FinalizeError>,
    /// `None` when no snapshot was requested (no artifact store, or an
    /// empty path).
    pub artifact: Option<Result<String, FinalizeError>>,
}

impl FinalizeReport {
    /// Whether the record reached the persistence collaborator.
    pub const fn is_persisted(&self) -> bool {
        self.persisted.is_ok()
    }

    /// The snapshot reference, if one was captured.
    pub fn artifact_ref(&self) -> Option<&str> {
        match &self.artifact {
            Some(Ok(reference)) => Some(reference),
            _ => None,
        }
    }
}

/// Builds walk records and submits them to the collaborators.
#[derive(Debug, Clone)]
pub struct SessionFinalizer<S, A = NoArtifacts> {
    user_id: UserId,
    store: S,
    artifacts: Option<A>,
}

impl<S: SessionStore> SessionFinalizer<S, NoArtifacts> {
    /// Creates a finalizer without an artifact collaborator.
    pub const fn new(user_id: UserId, store: S) -> Self {
        Self {
            user_id,
            store,
            artifacts: None,
        }
    }

    /// Adds an artifact collaborator for map snapshots.
    pub fn with_artifacts<A: ArtifactStore>(self, artifacts: A) -> SessionFinalizer<S, A> {
        SessionFinalizer {
            user_id: self.user_id,
            store: self.store,
            artifacts: Some(artifacts),
        }
    }
}

impl<S: SessionStore, A: ArtifactStore> SessionFinalizer<S, A> {
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Builds the record for a stopped session.
    pub fn finalize(&self, session: &Session) -> SessionRecord {
        SessionRecord::from_session(self.user_id.clone(), session)
    }

    /// Offers the record to the store and, if configured, requests a map
    /// snapshot. Both run concurrently; neither is retried.
    pub async fn submit(&self, session: &Session, record: SessionRecord) -> FinalizeReport {
        let persist = async {
            self.store
                .save(&record)
                .await
                .map_err(|err| FinalizeError::Persist(Box::new(err)))
        };
        let capture = async {
            let artifacts = self.artifacts.as_ref()?;
            let region = MapRegion::enclosing(&session.path)?;
            Some(
                artifacts
                    .capture(&record, &region, &session.path)
                    .await
                    .map_err(|err| FinalizeError::Artifact(Box::new(err))),
            )
        };
        let (persisted, artifact) = tokio::join!(persist, capture);

        match &persisted {
            Ok(()) => tracing::info!(
                started_at = %record.started_at,
                distance_m = record.distance_meters,
                "walk record persisted"
            ),
            Err(err) => tracing::warn!(error = %err, "walk record not persisted"),
        }
        if let Some(Err(err)) = &artifact {
            tracing::warn!(error = %err, "map snapshot not captured");
        }

        FinalizeReport {
            record,
            persisted,
            artifact,
        }
    }

    /// [`finalize`](Self::finalize) followed by [`submit`](Self::submit).
    pub async fn finalize_and_submit(&self, session: &Session) -> FinalizeReport {
        let record = self.finalize(session);
        self.submit(session, record).await
    }
}


#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::testing::{MemoryArtifacts, MemoryStore};
    use super::*;
    use crate::session::SessionTotals;
    use crate::types::GeoPoint;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn session_with_path(coords: &[(f64, f64)]) -> Session {
        Session {
            started_at: t(0),
            ended_at: Some(t(10)),
            totals: SessionTotals {
                distance_meters: 100.0,
                elapsed_seconds: 10,
                calories: 6.0,
            },
            path: coords
                .iter()
                .map(|&(lat, lon)| Fix::new(GeoPoint::new(lat, lon).unwrap(), t(0)))
                .collect(),
        }
    }

    fn user() -> UserId {
        UserId::new("walker").unwrap()
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "exact division is expected")]
    fn test_finalize_builds_record() {
        let finalizer = SessionFinalizer::new(user(), MemoryStore::default());
        let record = finalizer.finalize(&session_with_path(&[]));
        assert_eq!(record.user_id, user());
        assert_eq!(record.started_at, t(0));
        assert_eq!(record.ended_at, t(10));
        assert_eq!(record.average_speed, 10.0);
    }

    #[tokio::test]
    async fn test_submit_persists_without_artifacts() {
        let store = MemoryStore::default();
        let finalizer = SessionFinalizer::new(user(), store.clone());

        let report = finalizer
            .finalize_and_submit(&session_with_path(&[(0.0, 0.0)]))
            .await;

        assert!(report.is_persisted());
        assert!(report.artifact.is_none());
        assert_eq!(store.saved(), vec![report.record]);
    }

    #[tokio::test]
    async fn test_submit_requests_snapshot_for_path_region() {
        let artifacts = MemoryArtifacts::default();
        let finalizer =
            SessionFinalizer::new(user(), MemoryStore::default()).with_artifacts(artifacts.clone());

        let report = finalizer
            .finalize_and_submit(&session_with_path(&[(37.50, 127.00), (37.52, 127.02)]))
            .await;

        assert_eq!(report.artifact_ref(), Some("snapshot-1"));
        let regions = artifacts.regions.lock().unwrap();
        assert_eq!(regions.len(), 1);
        let (region, points) = regions[0];
        assert_eq!(points, 2);
        assert!((region.center.latitude() - 37.51).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_path_skips_snapshot() {
        let artifacts = MemoryArtifacts::default();
        let finalizer =
            SessionFinalizer::new(user(), MemoryStore::default()).with_artifacts(artifacts.clone());

        let report = finalizer.finalize_and_submit(&session_with_path(&[])).await;

        assert!(report.artifact.is_none());
        assert!(artifacts.regions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_reported_not_raised() {
        let finalizer = SessionFinalizer::new(user(), MemoryStore::failing())
            .with_artifacts(MemoryArtifacts::default());

        let report = finalizer
            .finalize_and_submit(&session_with_path(&[(1.0, 1.0)]))
            .await;

        let err = report.persisted.as_ref().unwrap_err();
        assert!(matches!(err, FinalizeError::Persist(_)));
        assert_eq!(
            err.to_string(),
            "failed to persist walk record: storage offline"
        );
        // The snapshot is independent of persistence.
        assert_eq!(report.artifact_ref(), Some("snapshot-1"));
    }

    #[tokio::test]
    async fn test_no_artifacts_refuses_capture() {
        let session = session_with_path(&[(1.0, 1.0)]);
        let region = MapRegion::enclosing(&session.path).unwrap();
        let record = SessionFinalizer::new(user(), MemoryStore::default()).finalize(&session);

        let err = NoArtifacts
            .capture(&record, &region, &session.path)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "no artifact store configured");
    }
}
