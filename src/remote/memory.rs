//! In-process document service.
//!
//! Applies change lists to documents held in memory with the same revision
//! rule as the remote service: a change list must be computed against the
//! current revision, and each accepted list bumps the revision by one. A
//! rejected list leaves the document untouched.
//!
//! Every accepted request is recorded so callers can inspect exactly what
//! an operation submitted.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::{DocumentService, RemoteError, UpdateFileRequest};
use crate::document::{Change, Component, Document, Operation, Page, Shape};

/// Documents and submission log held in memory.
#[derive(Default)]
pub struct MemoryDocumentService {
    files: Mutex<HashMap<String, Document>>,
    submissions: Mutex<Vec<UpdateFileRequest>>,
}

impl MemoryDocumentService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores (or replaces) a document under its own ID.
    pub async fn insert(&self, document: Document) {
        self.files.lock().await.insert(document.id.clone(), document);
    }

    /// A snapshot of a stored document.
    pub async fn document(&self, file_id: &str) -> Option<Document> {
        self.files.lock().await.get(file_id).cloned()
    }

    /// Every accepted request, oldest first.
    pub async fn submissions(&self) -> Vec<UpdateFileRequest> {
        self.submissions.lock().await.clone()
    }
}

#[async_trait]
impl DocumentService for MemoryDocumentService {
    async fn get_file(&self, file_id: &str) -> Result<Document, RemoteError> {
        self.files
            .lock()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| RemoteError::FileNotFound {
                file_id: file_id.to_string(),
            })
    }

    async fn update_file(&self, request: &UpdateFileRequest) -> Result<Value, RemoteError> {
        let mut files = self.files.lock().await;
        let document = files
            .get_mut(&request.id)
            .ok_or_else(|| RemoteError::FileNotFound {
                file_id: request.id.clone(),
            })?;

        if request.revn != document.revision {
            return Err(RemoteError::Conflict {
                expected: document.revision,
                actual: request.revn,
            });
        }

        let mut next = document.clone();
        for change in &request.changes {
            apply_change(&mut next, change)?;
        }
        next.revision += 1;
        let revision = next.revision;
        *document = next;
        drop(files);

        self.submissions.lock().await.push(request.clone());
        Ok(json!({ "revn": revision }))
    }
}

fn rejected(message: String) -> RemoteError {
    RemoteError::Rejected { message }
}

fn page_mut<'a>(document: &'a mut Document, page_id: &str) -> Result<&'a mut Page, RemoteError> {
    document
        .page_mut(page_id)
        .ok_or_else(|| rejected(format!("page {page_id} does not exist")))
}

/// Inserts or removes `child` in the `shapes` list of `parent`.
fn relink_child(page: &mut Page, parent_id: &str, child_id: &str, insert_at: Option<Option<usize>>) {
    let Some(parent) = page.objects.get_mut(parent_id) else {
        return;
    };
    let mut children: Vec<String> = parent
        .listed_children()
        .into_iter()
        .filter(|id| *id != child_id)
        .map(str::to_string)
        .collect();
    if let Some(index) = insert_at {
        let at = index.unwrap_or(children.len()).min(children.len());
        children.insert(at, child_id.to_string());
    }
    parent.set("shapes", json!(children));
}

fn apply_change(document: &mut Document, change: &Change) -> Result<(), RemoteError> {
    match change {
        Change::AddObj {
            id,
            page_id,
            frame_id,
            parent_id,
            index,
            obj,
        } => {
            let page = page_mut(document, page_id)?;
            let mut shape = Shape::from_raw(id.clone(), obj.clone());
            if shape.frame_id().is_none() {
                shape.set("frameId", json!(frame_id));
            }
            if let Some(parent_id) = parent_id {
                if shape.parent_id().is_none() {
                    shape.set("parentId", json!(parent_id));
                }
            }
            let parent = shape.parent_id().map(str::to_string);
            page.objects.insert(id.clone(), shape);
            if let Some(parent) = parent.filter(|p| p != id) {
                relink_child(page, &parent, id, Some(*index));
            }
        }
        Change::ModObj {
            id,
            page_id,
            operations,
        } => {
            let page = page_mut(document, page_id)?;
            let shape = page
                .objects
                .get_mut(id)
                .ok_or_else(|| rejected(format!("shape {id} does not exist on page {page_id}")))?;
            for Operation::Set { attr, val } in operations {
                shape.set(attr, val.clone());
            }
        }
        Change::DelObj { id, page_id } => {
            let page = page_mut(document, page_id)?;
            if let Some(shape) = page.objects.shift_remove(id) {
                if let Some(parent) = shape.parent_id().filter(|p| p != id) {
                    relink_child(page, parent, id, None);
                }
            }
        }
        Change::AddPage { id, name } => {
            if document.pages_index.contains_key(id) {
                return Err(rejected(format!("page {id} already exists")));
            }
            document.pages.push(id.clone());
            document.pages_index.insert(id.clone(), Page::new(id.clone(), name.clone()));
        }
        Change::ModPage { id, name } => {
            page_mut(document, id)?.name.clone_from(name);
        }
        Change::DelPage { id } => {
            document.pages.retain(|page| page != id);
            document.pages_index.shift_remove(id);
        }
        Change::AddComponent {
            id,
            name,
            path,
            main_instance_id,
            main_instance_page,
        } => {
            document.components.insert(
                id.clone(),
                Component {
                    id: id.clone(),
                    name: name.clone(),
                    path: Some(path.clone()),
                    main_instance_id: Some(main_instance_id.clone()),
                    main_instance_page: Some(main_instance_page.clone()),
                    deleted: false,
                },
            );
        }
        Change::ModComponent { id, name, path } => {
            let component = document
                .components
                .get_mut(id)
                .ok_or_else(|| rejected(format!("component {id} does not exist")))?;
            if let Some(name) = name {
                component.name.clone_from(name);
            }
            if let Some(path) = path {
                component.path = Some(path.clone());
            }
        }
        Change::DelComponent { id } => {
            let component = document
                .components
                .get_mut(id)
                .ok_or_else(|| rejected(format!("component {id} does not exist")))?;
            component.deleted = true;
        }
    }
    Ok(())
}
