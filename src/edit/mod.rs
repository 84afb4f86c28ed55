//! Change-set builders and structural checks.
//!
//! Every builder here is pure: it reads a fetched [`Document`] or [`Page`]
//! and returns change primitives (or a plan holding several change lists).
//! Submission happens in the tool layer through
//! [`crate::remote::DocumentStore`].

pub mod batch;
pub mod create;
pub mod group;
pub mod instance;
pub mod integrity;
pub mod layout;
pub mod reparent;
pub mod tokens;
pub mod update;

use std::collections::HashSet;

use crate::document::{Document, Page, Shape, ShapeTree};
use crate::error::ToolError;

/// Drops duplicate and empty IDs, keeping first-seen order.
#[must_use]
pub fn unique_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Fails with every ID in `ids` that is absent from the page.
///
/// # Errors
///
/// `ShapesNotFound` listing the missing IDs.
pub fn require_shapes(tree: &ShapeTree<'_>, ids: &[String]) -> Result<(), ToolError> {
    let missing: Vec<String> = ids.iter().filter(|id| !tree.contains(id)).cloned().collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ToolError::ShapesNotFound { ids: missing })
    }
}

/// Looks up a page of `document`.
///
/// # Errors
///
/// `NotFound` when the page does not exist.
pub fn require_page<'a>(document: &'a Document, page_id: &str) -> Result<&'a Page, ToolError> {
    document
        .page(page_id)
        .ok_or_else(|| ToolError::not_found("Page", page_id))
}

/// Looks up a shape on `page`.
///
/// # Errors
///
/// `NotFound` when the shape does not exist.
pub fn require_shape<'a>(page: &'a Page, shape_id: &str) -> Result<&'a Shape, ToolError> {
    page.objects
        .get(shape_id)
        .ok_or_else(|| ToolError::not_found("Shape", shape_id))
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::Value;

    use super::*;

    /// A page with ID `page` holding the given raw shapes.
    pub fn page(shapes: &[Value]) -> Page {
        let mut page = Page::new("page", "Page 1");
        for raw in shapes {
            if let (Some(id), Some(attrs)) = (raw["id"].as_str(), raw.as_object()) {
                page.objects
                    .insert(id.to_string(), Shape::from_raw(id, attrs.clone()));
            }
        }
        page
    }

    #[test]
    fn unique_ids_keep_order() {
        let ids: Vec<String> = ["b", "a", "b", "", "c", "a"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        assert_eq!(unique_ids(&ids), vec!["b", "a", "c"]);
    }

    #[test]
    fn missing_shapes_listed() {
        let page = page(&[serde_json::json!({"id": "a", "type": "rect"})]);
        let tree = page.tree();
        let ids = vec!["a".to_string(), "x".to_string(), "y".to_string()];
        match require_shapes(&tree, &ids) {
            Err(ToolError::ShapesNotFound { ids }) => assert_eq!(ids, vec!["x", "y"]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(require_shape(&page, "a").is_ok());
        assert!(require_shape(&page, "x").is_err());
    }
}
