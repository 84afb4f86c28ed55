//! Token binding tools.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::edit::batch::{require_items, BatchRunner, PageCache};
use crate::edit::tokens::{build_token_binding, token_bindings, TokenBindingRequest};
use crate::edit::update::apply_operations;
use crate::edit::{require_page, require_shape};
use crate::error::ToolError;
use crate::remote::DocumentStore;

use super::shapes::ShapeItem;
use super::{parse_args, ShapeArgs, ToolCallResult, ToolDefinition};

/// Binding fields shared by the single and batch schemas.
fn binding_properties() -> Value {
    json!({
        "fileId": { "type": "string", "description": "File ID" },
        "pageId": { "type": "string", "description": "Page ID" },
        "shapeId": { "type": "string", "description": "Shape ID" },
        "appliedTokens": {
            "type": "object",
            "description": "Attribute to token name map, e.g. {\"r1\": \"radius.sm\", \"fill\": \"color.primary\"}",
            "additionalProperties": { "type": "string" }
        },
        "mergeAppliedTokens": {
            "type": "boolean",
            "description": "Merge with the existing appliedTokens (default true)"
        },
        "fillIndex": { "type": "integer", "description": "Fill index to update (default 0)" },
        "fillColorRefId": { "type": "string", "description": "Colour reference ID for the fill" },
        "fillColorRefFile": { "type": "string", "description": "File defining fillColorRefId" },
        "clearFillColorRef": { "type": "boolean", "description": "Remove the fill colour reference" },
        "strokeIndex": { "type": "integer", "description": "Stroke index to update (default 0)" },
        "strokeColorRefId": { "type": "string", "description": "Colour reference ID for the stroke" },
        "strokeColorRefFile": { "type": "string", "description": "File defining strokeColorRefId" },
        "clearStrokeColorRef": { "type": "boolean", "description": "Remove the stroke colour reference" },
        "paragraphIndex": {
            "type": "integer",
            "description": "Text paragraph for typography refs (default: every paragraph)"
        },
        "typographyRefId": { "type": "string", "description": "Typography reference ID" },
        "typographyRefFile": { "type": "string", "description": "File defining typographyRefId" },
        "clearTypographyRef": { "type": "boolean", "description": "Remove the typography reference" }
    })
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "get_shape_token_bindings",
            "Inspect the token bindings of a shape: applied tokens and fill, stroke and typography references.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" },
                    "pageId": { "type": "string", "description": "Page ID" },
                    "shapeId": { "type": "string", "description": "Shape ID" }
                },
                "required": ["fileId", "pageId", "shapeId"]
            }),
        ),
        ToolDefinition::new(
            "set_shape_token_bindings",
            "Set token bindings on a shape: applied tokens and fill, stroke or typography references.",
            json!({
                "type": "object",
                "properties": binding_properties(),
                "required": ["fileId", "pageId", "shapeId"]
            }),
        ),
        ToolDefinition::new(
            "batch_set_shape_token_bindings",
            "Set token bindings on several shapes with per-item results. Items on \
             the same page see each other's earlier updates.",
            json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": binding_properties(),
                            "required": ["fileId", "pageId", "shapeId"]
                        }
                    },
                    "continueOnError": { "type": "boolean", "description": "Default true" }
                },
                "required": ["items"]
            }),
        ),
    ]
}

pub(super) async fn get_shape_token_bindings(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: ShapeArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;
    let shape = require_shape(page, &args.shape_id)?;

    let (bindings, has_bindings) = token_bindings(shape);
    let summary = if has_bindings {
        format!("Found token bindings for shape {}", args.shape_id)
    } else {
        format!("No token bindings found for shape {}", args.shape_id)
    };
    Ok(ToolCallResult::with_json(summary, &bindings))
}

pub(super) async fn set_shape_token_bindings(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let ids: ShapeArgs = parse_args(args)?;
    let request: TokenBindingRequest = parse_args(args)?;
    let document = store.get_document(&ids.file_id).await?;
    let page = require_page(&document, &ids.page_id)?;
    let shape = require_shape(page, &ids.shape_id)?;

    let binding = build_token_binding(shape, &page.id, &request)?;
    store.apply_changes(&ids.file_id, vec![binding.change]).await?;

    Ok(ToolCallResult::text(format!(
        "Updated token bindings for shape {}: {}",
        ids.shape_id,
        binding.updated_parts.join(", ")
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchBindingArgs {
    items: Vec<Value>,
    continue_on_error: Option<bool>,
}

async fn bind_item(
    store: &DocumentStore,
    cache: &mut PageCache,
    item: &ShapeItem,
    raw: &Value,
) -> Result<Map<String, Value>, ToolError> {
    let (file_id, page_id, shape_id) = item.ids()?;
    let request: TokenBindingRequest = parse_args(raw)?;

    let page = cache.page(store, file_id, page_id).await?;
    let shape = require_shape(page, shape_id)?;
    let binding = build_token_binding(shape, page_id, &request)?;
    let updated = apply_operations(shape, binding.operations());

    store.apply_changes(file_id, vec![binding.change]).await?;

    page.objects.insert(shape_id.to_string(), updated);
    let mut output = Map::new();
    output.insert("updatedParts".into(), json!(binding.updated_parts));
    Ok(output)
}

pub(super) async fn batch_set_shape_token_bindings(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: BatchBindingArgs = parse_args(args)?;
    require_items(&args.items)?;

    let mut runner = BatchRunner::new(args.continue_on_error);
    let mut cache = PageCache::new();

    for (index, raw) in args.items.iter().enumerate() {
        let item: ShapeItem = serde_json::from_value(raw.clone()).unwrap_or_default();
        if runner.aborted() {
            runner.skip(index, item.target());
            continue;
        }
        let outcome = bind_item(store, &mut cache, &item, raw).await;
        runner.record(index, item.target(), outcome);
    }

    let report = runner.finish();
    Ok(ToolCallResult::with_json(
        report.summary("set_shape_token_bindings"),
        &json!(report),
    ))
}
