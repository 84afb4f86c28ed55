//! Change primitives submitted to the remote document service.
//!
//! Each primitive is one atomic edit. A change list is applied in order by
//! the service; nothing here cascades implicitly (deleting a container does
//! not delete its descendants, deleting a component does not delete its
//! main-instance shape).

use serde::Serialize;
use serde_json::{Map, Value};

/// One attribute edit inside a `mod-obj` change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    /// Replace the attribute `attr` with `val`.
    Set {
        /// Attribute name (camelCase).
        attr: String,
        /// New value.
        val: Value,
    },
}

impl Operation {
    /// Shorthand for a `set` operation.
    #[must_use]
    pub fn set(attr: impl Into<String>, val: impl Into<Value>) -> Self {
        Self::Set {
            attr: attr.into(),
            val: val.into(),
        }
    }
}

/// A single change primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Change {
    /// Insert a shape (or replace one with the same ID).
    #[serde(rename_all = "camelCase")]
    AddObj {
        /// ID of the inserted shape.
        id: String,
        /// Page holding the shape.
        page_id: String,
        /// Enclosing frame.
        frame_id: String,
        /// Owning container; the service falls back to `frame_id`.
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
        /// Position among the parent's children; appended when absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        /// The complete shape object.
        obj: Map<String, Value>,
    },
    /// Apply attribute operations to an existing shape, in order.
    #[serde(rename_all = "camelCase")]
    ModObj {
        /// Target shape.
        id: String,
        /// Page holding the shape.
        page_id: String,
        operations: Vec<Operation>,
    },
    /// Remove a single shape.
    #[serde(rename_all = "camelCase")]
    DelObj { id: String, page_id: String },
    /// Append a new page.
    AddPage { id: String, name: String },
    /// Rename a page.
    ModPage { id: String, name: String },
    /// Remove a page.
    DelPage { id: String },
    /// Register a component over an existing shape.
    #[serde(rename_all = "camelCase")]
    AddComponent {
        /// New component ID.
        id: String,
        name: String,
        /// Slash-separated group path; empty for the top level.
        path: String,
        /// Shape acting as the main instance.
        main_instance_id: String,
        /// Page holding the main instance.
        main_instance_page: String,
    },
    /// Rename or re-path a component.
    ModComponent {
        id: String,
        /// New name, left unchanged when absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// New group path, left unchanged when absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// Remove a component definition.
    DelComponent { id: String },
}

impl Change {
    /// `add-obj` for a shape whose relational fields are already set in `obj`.
    #[must_use]
    pub fn add_obj(
        page_id: &str,
        parent_id: &str,
        frame_id: &str,
        obj: Map<String, Value>,
    ) -> Self {
        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self::AddObj {
            id,
            page_id: page_id.to_string(),
            frame_id: frame_id.to_string(),
            parent_id: Some(parent_id.to_string()),
            index: None,
            obj,
        }
    }

    #[must_use]
    pub fn del_obj(page_id: &str, id: &str) -> Self {
        Self::DelObj {
            id: id.to_string(),
            page_id: page_id.to_string(),
        }
    }

    #[must_use]
    pub fn mod_obj(page_id: &str, id: &str, operations: Vec<Operation>) -> Self {
        Self::ModObj {
            id: id.to_string(),
            page_id: page_id.to_string(),
            operations,
        }
    }

    /// The wire name of this primitive.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AddObj { .. } => "add-obj",
            Self::ModObj { .. } => "mod-obj",
            Self::DelObj { .. } => "del-obj",
            Self::AddPage { .. } => "add-page",
            Self::ModPage { .. } => "mod-page",
            Self::DelPage { .. } => "del-page",
            Self::AddComponent { .. } => "add-component",
            Self::ModComponent { .. } => "mod-component",
            Self::DelComponent { .. } => "del-component",
        }
    }

    /// The ID of the entity this primitive targets.
    #[must_use]
    pub fn target_id(&self) -> &str {
        match self {
            Self::AddObj { id, .. }
            | Self::ModObj { id, .. }
            | Self::DelObj { id, .. }
            | Self::AddPage { id, .. }
            | Self::ModPage { id, .. }
            | Self::DelPage { id }
            | Self::AddComponent { id, .. }
            | Self::ModComponent { id, .. }
            | Self::DelComponent { id } => id,
        }
    }
}
