//! The tool surface exposed over MCP.
//!
//! Each submodule owns a group of tools: their definitions (name,
//! description, input schema) and async handlers. Handlers parse their
//! arguments into typed structs, fetch what they need through the
//! [`DocumentStore`], run a builder from [`crate::edit`] and submit the
//! resulting change lists.
//!
//! | Module | Tools |
//! |--------|-------|
//! | `pages` | file summary, page listing and page mutation |
//! | `shapes` | shape reads, creation, update and deletion |
//! | `structure` | move, group, align, distribute |
//! | `tokens` | design-token bindings |
//! | `components` | component listing, integrity, lifecycle |
//! | `queries` | filtered shape search |

mod components;
mod pages;
mod queries;
mod shapes;
mod structure;
mod tokens;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::remote::DocumentStore;

/// A tool definition for the `tools/list` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

impl ToolDefinition {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema,
        }
    }
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a successful tool call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
}

impl ToolCallResult {
    /// A single text item.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
        }
    }

    /// A summary line followed by a pretty-printed JSON payload.
    #[must_use]
    pub fn with_json(summary: impl Into<String>, payload: &Value) -> Self {
        let pretty = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
        Self {
            content: vec![
                ToolContent::Text {
                    text: summary.into(),
                },
                ToolContent::Text { text: pretty },
            ],
        }
    }

    /// Adds another text item.
    #[must_use]
    pub fn and_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(ToolContent::Text { text: text.into() });
        self
    }
}

/// Arguments naming a file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileArgs {
    pub file_id: String,
}

/// Arguments naming a page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageArgs {
    pub file_id: String,
    pub page_id: String,
}

/// Arguments naming a shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ShapeArgs {
    pub file_id: String,
    pub page_id: String,
    pub shape_id: String,
}

/// Deserialises tool arguments.
///
/// # Errors
///
/// `ValidationFailed` describing the first missing or mistyped field.
pub(crate) fn parse_args<T: DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args)
        .map_err(|e| ToolError::validation(format!("Invalid arguments: {e}")))
}

/// `fileId`/`pageId` properties shared by most schemas.
fn page_properties() -> serde_json::Map<String, Value> {
    let mut props = serde_json::Map::new();
    props.insert("fileId".into(), json!({"type": "string", "description": "File ID"}));
    props.insert("pageId".into(), json!({"type": "string", "description": "Page ID"}));
    props
}

/// Object schema from `properties` with `required` keys.
fn object_schema(properties: serde_json::Map<String, Value>, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Every tool this server offers.
#[must_use]
pub fn definitions() -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    tools.extend(pages::definitions());
    tools.extend(shapes::definitions());
    tools.extend(queries::definitions());
    tools.extend(structure::definitions());
    tools.extend(tokens::definitions());
    tools.extend(components::definitions());
    tools
}

/// Runs the tool called `name`. Returns `None` for unknown tools.
pub async fn call(
    store: &DocumentStore,
    name: &str,
    args: &Value,
) -> Option<Result<ToolCallResult, ToolError>> {
    let result = match name {
        "get_file" => pages::get_file(store, args).await,
        "list_pages" => pages::list_pages(store, args).await,
        "add_page" => pages::add_page(store, args).await,
        "rename_page" => pages::rename_page(store, args).await,
        "delete_page" => pages::delete_page(store, args).await,

        "get_page_shapes" => shapes::get_page_shapes(store, args).await,
        "get_shape_tree" => shapes::get_shape_tree(store, args).await,
        "get_shape_properties" => shapes::get_shape_properties(store, args).await,
        "create_rectangle" => shapes::create_rectangle(store, args).await,
        "create_ellipse" => shapes::create_ellipse(store, args).await,
        "create_text" => shapes::create_text(store, args).await,
        "create_frame" => shapes::create_frame(store, args).await,
        "update_shape" => shapes::update_shape(store, args).await,
        "delete_shape" => shapes::delete_shape(store, args).await,
        "batch_delete_shape" => shapes::batch_delete_shape(store, args).await,

        "query_shapes" => queries::query_shapes(store, args).await,

        "move_shapes" => structure::move_shapes(store, args).await,
        "group_shapes" => structure::group_shapes(store, args).await,
        "align_shapes" => structure::align_shapes(store, args).await,
        "distribute_shapes" => structure::distribute_shapes(store, args).await,

        "get_shape_token_bindings" => tokens::get_shape_token_bindings(store, args).await,
        "set_shape_token_bindings" => tokens::set_shape_token_bindings(store, args).await,
        "batch_set_shape_token_bindings" => {
            tokens::batch_set_shape_token_bindings(store, args).await
        }

        "list_components" => components::list_components(store, args).await,
        "get_component_integrity" => components::get_component_integrity(store, args).await,
        "create_component" => components::create_component(store, args).await,
        "rename_component" => components::rename_component(store, args).await,
        "instantiate_component" => components::instantiate_component(store, args).await,
        "batch_instantiate_component" => {
            components::batch_instantiate_component(store, args).await
        }
        "repair_component_structure" => {
            components::repair_component_structure(store, args).await
        }
        "delete_component" => components::delete_component(store, args).await,

        _ => return None,
    };
    Some(result)
}
