//! The design document model.
//!
//! A [`Document`] is the parsed form of the remote `get-file` payload:
//!
//! ```text
//! File
//! ├── revn                      # revision counter
//! └── data
//!     ├── pages: [pageId, ...]  # page order
//!     ├── pagesIndex            # pageId -> Page
//!     │   └── objects           # shapeId -> Shape (unordered)
//!     ├── components            # componentId -> Component
//!     └── media
//! ```
//!
//! Payloads are accepted with either camelCase or kebab-case keys.

pub mod change;
pub mod keys;
pub mod shape;
pub mod text;
pub mod tree;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub use change::{Change, Operation};
pub use shape::{Bounds, Shape, ShapeKind};
pub use tree::ShapeTree;

use keys::{lookup, lookup_str};

/// A page's shape map, keyed by shape ID.
pub type Objects = IndexMap<String, Shape>;

/// Errors raised while parsing a document payload.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The payload is not shaped like a file.
    #[error("malformed document payload: {message}")]
    Malformed {
        /// What was wrong with the payload.
        message: String,
    },
}

/// A component definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_instance_page: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl Component {
    fn from_raw(id: &str, raw: &Map<String, Value>) -> Self {
        Self {
            id: lookup_str(raw, "id").unwrap_or(id).to_string(),
            name: lookup_str(raw, "name").unwrap_or_default().to_string(),
            path: lookup_str(raw, "path").map(str::to_string),
            main_instance_id: lookup_str(raw, "mainInstanceId").map(str::to_string),
            main_instance_page: lookup_str(raw, "mainInstancePage").map(str::to_string),
            deleted: lookup(raw, "deleted")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

/// A page and its shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: String,
    pub name: String,
    pub objects: Objects,
}

impl Page {
    /// Creates an empty page.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            objects: Objects::new(),
        }
    }

    fn from_raw(id: &str, raw: &Map<String, Value>) -> Self {
        let objects = raw
            .get("objects")
            .and_then(Value::as_object)
            .map(|objects| {
                objects
                    .iter()
                    .filter_map(|(shape_id, obj)| {
                        obj.as_object()
                            .map(|attrs| (shape_id.clone(), Shape::from_raw(shape_id, attrs.clone())))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: lookup_str(raw, "id").unwrap_or(id).to_string(),
            name: lookup_str(raw, "name").unwrap_or_default().to_string(),
            objects,
        }
    }

    /// A read-only tree view over this page's shapes.
    #[must_use]
    pub fn tree(&self) -> ShapeTree<'_> {
        ShapeTree::new(&self.objects)
    }
}

/// A design file as returned by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub revision: i64,
    /// Page IDs in display order.
    pub pages: Vec<String>,
    pub pages_index: IndexMap<String, Page>,
    pub components: IndexMap<String, Component>,
    pub media: Value,
}

impl Document {
    /// Creates an empty document at revision zero.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            revision: 0,
            pages: Vec::new(),
            pages_index: IndexMap::new(),
            components: IndexMap::new(),
            media: Value::Object(Map::new()),
        }
    }

    /// Parses a `get-file` response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON object or its `data`
    /// section is missing.
    pub fn from_value(value: &Value) -> Result<Self, DocumentError> {
        let file = value.as_object().ok_or_else(|| DocumentError::Malformed {
            message: "file payload is not an object".to_string(),
        })?;
        let data = file
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| DocumentError::Malformed {
                message: "file payload has no data section".to_string(),
            })?;

        let revision = lookup(file, "revn").and_then(Value::as_i64).unwrap_or(0);

        let pages_index: IndexMap<String, Page> = lookup(data, "pagesIndex")
            .and_then(Value::as_object)
            .map(|index| {
                index
                    .iter()
                    .filter_map(|(id, page)| {
                        page.as_object().map(|raw| (id.clone(), Page::from_raw(id, raw)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let pages = data
            .get("pages")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| pages_index.keys().cloned().collect());

        let components = data
            .get("components")
            .and_then(Value::as_object)
            .map(|components| {
                components
                    .iter()
                    .filter_map(|(id, raw)| {
                        raw.as_object().map(|raw| (id.clone(), Component::from_raw(id, raw)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id: lookup_str(file, "id").unwrap_or_default().to_string(),
            name: lookup_str(file, "name").unwrap_or_default().to_string(),
            revision,
            pages,
            pages_index,
            components,
            media: data.get("media").cloned().unwrap_or(Value::Object(Map::new())),
        })
    }

    #[must_use]
    pub fn page(&self, page_id: &str) -> Option<&Page> {
        self.pages_index.get(page_id)
    }

    pub fn page_mut(&mut self, page_id: &str) -> Option<&mut Page> {
        self.pages_index.get_mut(page_id)
    }

    /// Looks up a live (non-deleted) component.
    #[must_use]
    pub fn component(&self, component_id: &str) -> Option<&Component> {
        self.components
            .get(component_id)
            .filter(|component| !component.deleted)
    }

    /// Live components in document order.
    pub fn live_components(&self) -> impl Iterator<Item = &Component> {
        self.components.values().filter(|c| !c.deleted)
    }

    /// Pages in display order, skipping IDs missing from the index.
    pub fn ordered_pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter().filter_map(|id| self.pages_index.get(id))
    }
}
