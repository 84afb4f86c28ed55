//! Error types for penpot-mcp.
//!
//! Configuration failures stop the process at startup. Tool failures are
//! reported back to the MCP client, classified into one of four
//! [`ErrorCategory`] values so callers can tell a missing ID from a
//! structural refusal or a remote outage.
//!
//! # Security Note
//!
//! Error messages never include the access token. Remote errors carry the
//! command name and response body only.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::remote::RemoteError;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Coarse classification of a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A referenced page, shape, component or file does not exist.
    NotFound,
    /// The document is not in a state that allows the operation.
    PreconditionFailed,
    /// The request itself is malformed.
    ValidationFailed,
    /// The remote document service failed or rejected the change.
    RemoteFailure,
}

impl ErrorCategory {
    /// Returns the wire name of this category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PreconditionFailed => "precondition_failed",
            Self::ValidationFailed => "validation_failed",
            Self::RemoteFailure => "remote_failure",
        }
    }
}

/// A component instance found outside the main instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRef {
    pub file_id: String,
    pub page_id: String,
    pub shape_id: String,
}

/// Errors raised by tool handlers.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A single entity is missing from the fetched document.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind ("Page", "Shape", "Component", "File").
        kind: &'static str,
        /// The ID that was looked up.
        id: String,
    },

    /// Several requested shapes are missing from a page.
    #[error("Shapes not found on page: {}", ids.join(", "))]
    ShapesNotFound {
        /// Every missing shape ID.
        ids: Vec<String>,
    },

    /// Malformed input, caught before any remote call.
    #[error("{message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// A structural rule refuses the operation.
    #[error("{message}")]
    Precondition {
        /// Which rule refused it.
        message: String,
    },

    /// The component's main instance is not usable as a template.
    #[error(
        "InvalidSourceState: component {component_id} in file {file_id} has a {state} main instance; \
         repair it with repair_component_structure before instantiating"
    )]
    InvalidSourceState {
        component_id: String,
        file_id: String,
        /// Integrity classification of the main instance.
        state: String,
    },

    /// The chosen component root is an empty container.
    #[error(
        "EmptySourceRoot: shape {shape_id} is a container with no children; \
         set allowEmptyRoot to create the component anyway"
    )]
    EmptySourceRoot { shape_id: String },

    /// Instances of the component still exist.
    #[error(
        "ComponentInUse: component {component_id} is still referenced by {} instance(s): {}",
        instances.len(),
        describe_instances(instances)
    )]
    ComponentInUse {
        component_id: String,
        instances: Vec<InstanceRef>,
    },

    /// A file must keep at least one page.
    #[error("Cannot delete the last remaining page of a file")]
    LastPage,

    /// The page holds component main instances.
    #[error(
        "Page {page_id} hosts the main instance of components: {}",
        component_ids.join(", ")
    )]
    PageHostsComponents {
        page_id: String,
        component_ids: Vec<String>,
    },

    /// The remote document service failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ToolError {
    /// Shorthand for a [`ToolError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for a [`ToolError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`ToolError::Precondition`].
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// The category reported to the client.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } | Self::ShapesNotFound { .. } => ErrorCategory::NotFound,
            Self::Validation { .. } => ErrorCategory::ValidationFailed,
            Self::Precondition { .. }
            | Self::InvalidSourceState { .. }
            | Self::EmptySourceRoot { .. }
            | Self::ComponentInUse { .. }
            | Self::LastPage
            | Self::PageHostsComponents { .. } => ErrorCategory::PreconditionFailed,
            Self::Remote(RemoteError::FileNotFound { .. }) => ErrorCategory::NotFound,
            Self::Remote(_) => ErrorCategory::RemoteFailure,
        }
    }

    /// Structured error data for the protocol layer.
    ///
    /// Always carries the category; remediation data (blocking instances or
    /// components, missing IDs) is added where the variant has it.
    #[must_use]
    pub fn data(&self) -> Value {
        let mut data = json!({ "category": self.category() });
        match self {
            Self::ComponentInUse { instances, .. } => {
                data["instances"] = json!(instances);
            }
            Self::PageHostsComponents { component_ids, .. } => {
                data["componentIds"] = json!(component_ids);
            }
            Self::ShapesNotFound { ids } => {
                data["missingIds"] = json!(ids);
            }
            _ => {}
        }
        data
    }
}

fn describe_instances(instances: &[InstanceRef]) -> String {
    let mut out = String::new();
    for (i, instance) in instances.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(
            out,
            "file {} page {} shape {}",
            instance.file_id, instance.page_id, instance.shape_id
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn validation_error_display() {
        let error = ConfigError::ValidationError {
            message: "invalid setting".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("invalid setting"));
    }

    #[test]
    fn tool_error_categories() {
        assert_eq!(
            ToolError::not_found("Page", "p1").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            ToolError::validation("bad").category(),
            ErrorCategory::ValidationFailed
        );
        assert_eq!(ToolError::LastPage.category(), ErrorCategory::PreconditionFailed);
        assert_eq!(
            ToolError::Remote(RemoteError::Conflict {
                expected: 2,
                actual: 1
            })
            .category(),
            ErrorCategory::RemoteFailure
        );
        assert_eq!(ErrorCategory::PreconditionFailed.as_str(), "precondition_failed");
    }

    #[test]
    fn component_in_use_lists_instances() {
        let error = ToolError::ComponentInUse {
            component_id: "c1".into(),
            instances: vec![InstanceRef {
                file_id: "f1".into(),
                page_id: "p2".into(),
                shape_id: "s9".into(),
            }],
        };
        let msg = error.to_string();
        assert!(msg.starts_with("ComponentInUse"));
        assert!(msg.contains("file f1 page p2 shape s9"));

        let data = error.data();
        assert_eq!(data["category"], "precondition_failed");
        assert_eq!(data["instances"][0]["shapeId"], "s9");
    }

    #[test]
    fn not_found_message() {
        assert_eq!(
            ToolError::not_found("Shape", "abc").to_string(),
            "Shape not found: abc"
        );
    }
}
