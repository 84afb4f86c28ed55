//! Sequential multi-item operations with per-item isolation.
//!
//! A batch tool walks its items in order, asking [`BatchRunner`] whether to
//! skip each one and recording the outcome. With `continueOnError` off, the
//! first failure marks every later item as skipped. Items may share pages,
//! so fetched pages are kept in a [`PageCache`] and updated locally as items
//! succeed. Files that items only read, such as a component library, are
//! kept in a [`DocumentCache`].

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::document::{Document, Page};
use crate::error::ToolError;
use crate::remote::DocumentStore;

/// Error recorded on items that were never attempted.
pub const SKIPPED_MESSAGE: &str =
    "Skipped because continueOnError=false and a previous item failed";

/// Fails on an empty item list.
///
/// # Errors
///
/// `ValidationFailed` when `items` is empty.
pub fn require_items<T>(items: &[T]) -> Result<(), ToolError> {
    if items.is_empty() {
        Err(ToolError::validation("items must be a non-empty array"))
    } else {
        Ok(())
    }
}

/// Outcome of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Error,
    Skipped,
}

/// Result row for one item.
///
/// `target` carries the identifying fields echoed from the request
/// (`fileId`, `pageId`, `shapeId` or `componentId`), `null` when the item
/// omitted them.
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub index: usize,
    pub status: ItemStatus,
    #[serde(flatten)]
    pub target: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub output: Map<String, Value>,
}

/// Aggregate result of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    pub continue_on_error: bool,
    pub results: Vec<ItemResult>,
}

impl BatchReport {
    /// One-line summary naming the single-item tool the batch wraps.
    #[must_use]
    pub fn summary(&self, tool: &str) -> String {
        format!(
            "Batch {tool} completed: {} succeeded, {} failed, {} skipped ({} total)",
            self.success_count, self.failure_count, self.skipped_count, self.total
        )
    }
}

/// Builds the `target` map of an item result.
#[must_use]
pub fn item_target(fields: &[(&str, Option<&str>)]) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| {
            let value = value
                .filter(|v| !v.is_empty())
                .map_or(Value::Null, |v| Value::String(v.to_string()));
            ((*key).to_string(), value)
        })
        .collect()
}

/// Tracks item outcomes and the fail-fast state of a batch.
#[derive(Debug)]
pub struct BatchRunner {
    continue_on_error: bool,
    aborted: bool,
    results: Vec<ItemResult>,
}

impl BatchRunner {
    /// `continue_on_error` defaults to true.
    #[must_use]
    pub fn new(continue_on_error: Option<bool>) -> Self {
        Self {
            continue_on_error: continue_on_error != Some(false),
            aborted: false,
            results: Vec::new(),
        }
    }

    /// Whether remaining items must be skipped.
    #[must_use]
    pub const fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn skip(&mut self, index: usize, target: Map<String, Value>) {
        self.results.push(ItemResult {
            index,
            status: ItemStatus::Skipped,
            target,
            error: Some(SKIPPED_MESSAGE.to_string()),
            output: Map::new(),
        });
    }

    /// Records an attempted item.
    pub fn record(
        &mut self,
        index: usize,
        target: Map<String, Value>,
        outcome: Result<Map<String, Value>, ToolError>,
    ) {
        let result = match outcome {
            Ok(output) => ItemResult {
                index,
                status: ItemStatus::Success,
                target,
                error: None,
                output,
            },
            Err(err) => {
                warn!(index, error = %err, "Batch item failed");
                if !self.continue_on_error {
                    self.aborted = true;
                }
                ItemResult {
                    index,
                    status: ItemStatus::Error,
                    target,
                    error: Some(err.to_string()),
                    output: Map::new(),
                }
            }
        };
        self.results.push(result);
    }

    #[must_use]
    pub fn finish(self) -> BatchReport {
        let count = |status: ItemStatus| self.results.iter().filter(|r| r.status == status).count();
        BatchReport {
            total: self.results.len(),
            success_count: count(ItemStatus::Success),
            failure_count: count(ItemStatus::Error),
            skipped_count: count(ItemStatus::Skipped),
            continue_on_error: self.continue_on_error,
            results: self.results,
        }
    }
}

/// Pages fetched during one batch, keyed by `fileId:pageId`.
#[derive(Debug, Default)]
pub struct PageCache {
    pages: HashMap<String, Page>,
}

impl PageCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(file_id: &str, page_id: &str) -> String {
        format!("{file_id}:{page_id}")
    }

    /// The cached page, fetching the file on first use.
    ///
    /// # Errors
    ///
    /// Remote failures, or `NotFound` when the file has no such page.
    pub async fn page(
        &mut self,
        store: &DocumentStore,
        file_id: &str,
        page_id: &str,
    ) -> Result<&mut Page, ToolError> {
        let key = Self::key(file_id, page_id);
        if !self.pages.contains_key(&key) {
            let mut document = store.get_document(file_id).await?;
            let page = document
                .pages_index
                .swap_remove(page_id)
                .ok_or_else(|| ToolError::not_found("Page", page_id))?;
            debug!(file_id, page_id, shapes = page.objects.len(), "Cached page");
            self.pages.insert(key.clone(), page);
        }
        self.pages
            .get_mut(&key)
            .ok_or_else(|| ToolError::not_found("Page", page_id))
    }

    /// Inserts a page directly.
    pub fn insert(&mut self, file_id: &str, page: Page) {
        self.pages.insert(Self::key(file_id, &page.id), page);
    }
}

/// Read-only documents fetched during one batch, keyed by file ID.
#[derive(Debug, Default)]
pub struct DocumentCache {
    documents: HashMap<String, Document>,
}

impl DocumentCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached document, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Remote failures from the first fetch.
    pub async fn document(
        &mut self,
        store: &DocumentStore,
        file_id: &str,
    ) -> Result<&Document, ToolError> {
        if !self.documents.contains_key(file_id) {
            let document = store.get_document(file_id).await?;
            debug!(file_id, revision = document.revision, "Cached document");
            self.documents.insert(file_id.to_string(), document);
        }
        self.documents
            .get(file_id)
            .ok_or_else(|| ToolError::not_found("File", file_id))
    }
}
