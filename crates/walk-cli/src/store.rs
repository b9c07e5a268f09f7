//! The persistence collaborator used by the binary: the local database,
//! plus the REST backend when one is configured.

use thiserror::Error;
use walk_api::ApiError;
use walk_core::{SessionRecord, SessionStore};
use walk_db::{DbError, SharedDatabase};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local store: {0}")]
    Local(#[from] DbError),
    #[error("backend: {0}")]
    Remote(#[from] ApiError),
}

/// Saves every record locally and, if configured, to the backend.
///
/// Both destinations are attempted even when the other fails. The local
/// failure is reported first.
#[derive(Debug, Clone)]
pub struct WalkStore {
    local: SharedDatabase,
    remote: Option<walk_api::Client>,
}

impl WalkStore {
    pub const fn new(local: SharedDatabase, remote: Option<walk_api::Client>) -> Self {
        Self { local, remote }
    }

    pub const fn local(&self) -> &SharedDatabase {
        &self.local
    }
}

impl SessionStore for WalkStore {
    type Error = StoreError;

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let local = self.local.save(record).await;
        let remote = match &self.remote {
            Some(client) => client.save(record).await,
            None => Ok(()),
        };
        match (local, remote) {
            (Err(local), Err(remote)) => {
                tracing::warn!(error = %remote, "backend submission also failed");
                Err(local.into())
            }
            (Err(local), Ok(())) => Err(local.into()),
            (Ok(()), Err(remote)) => Err(remote.into()),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}
