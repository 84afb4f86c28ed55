//! Access to the remote document service.
//!
//! The service is reached through two calls: fetch a file, and submit a
//! change list against a known revision. [`DocumentService`] abstracts the
//! transport so the same edit logic runs against the HTTP API
//! ([`PenpotClient`]) or an in-process store ([`MemoryDocumentService`]).
//!
//! [`DocumentStore::apply_changes`] is the only mutation entry point. Every
//! call re-reads the current revision and mints a fresh session ID, so an
//! operation that needs several change lists observes them serialise
//! against the revision counter. Such an operation is not atomic as a whole:
//! if a later call fails the earlier ones stay applied.

mod client;
mod error;
mod memory;

pub use client::PenpotClient;
pub use error::RemoteError;
pub use memory::MemoryDocumentService;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::document::{Change, Document};

/// Body of an `update-file` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    /// File ID.
    pub id: String,
    /// Fresh per call.
    pub session_id: String,
    /// Revision the changes were computed against.
    pub revn: i64,
    /// Always zero for new changes.
    pub vern: i64,
    /// Primitives applied in order, all or nothing.
    pub changes: Vec<Change>,
}

/// A revision-tracked document backend.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Fetches the current state of a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be fetched or parsed.
    async fn get_file(&self, file_id: &str) -> Result<Document, RemoteError>;

    /// Submits a change list. The service arbitrates revision conflicts.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the request.
    async fn update_file(&self, request: &UpdateFileRequest) -> Result<Value, RemoteError>;
}

/// Shared handle used by tool handlers.
#[derive(Clone)]
pub struct DocumentStore {
    service: Arc<dyn DocumentService>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

impl DocumentStore {
    #[must_use]
    pub fn new(service: Arc<dyn DocumentService>) -> Self {
        Self { service }
    }

    /// Fetches a file.
    ///
    /// # Errors
    ///
    /// Propagates service failures.
    pub async fn get_document(&self, file_id: &str) -> Result<Document, RemoteError> {
        debug!(file_id, "Fetching document");
        self.service.get_file(file_id).await
    }

    /// Submits `changes` against the file's current revision.
    ///
    /// An empty change list is not submitted.
    ///
    /// # Errors
    ///
    /// Propagates fetch and submission failures.
    pub async fn apply_changes(
        &self,
        file_id: &str,
        changes: Vec<Change>,
    ) -> Result<Value, RemoteError> {
        if changes.is_empty() {
            debug!(file_id, "Skipping empty change list");
            return Ok(Value::Null);
        }

        let document = self.service.get_file(file_id).await?;
        let request = UpdateFileRequest {
            id: file_id.to_string(),
            session_id: Uuid::new_v4().to_string(),
            revn: document.revision,
            vern: 0,
            changes,
        };

        debug!(
            file_id,
            revision = request.revn,
            session_id = %request.session_id,
            kinds = ?request.changes.iter().map(Change::kind).collect::<Vec<_>>(),
            "Submitting change list"
        );

        let response = self.service.update_file(&request).await?;

        info!(
            file_id,
            revision = request.revn,
            changes = request.changes.len(),
            "Applied change list"
        );

        Ok(response)
    }
}
