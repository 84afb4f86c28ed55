//! Structural tools: moving, grouping and arranging shapes.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::edit::group::{plan_group, GroupRequest};
use crate::edit::layout::{plan_align, plan_distribute, Alignment, Direction};
use crate::edit::reparent::plan_move;
use crate::edit::{require_page, unique_ids};
use crate::error::ToolError;
use crate::remote::DocumentStore;

use super::{parse_args, ToolCallResult, ToolDefinition};

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "move_shapes",
            "Move shapes (with their descendants) under another container. Frames \
             are reassigned for the whole moved subtree.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" },
                    "pageId": { "type": "string", "description": "Page ID" },
                    "parentId": {
                        "type": "string",
                        "description": "Target container. The page ID targets the page root frame."
                    },
                    "shapeIds": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Shapes to move"
                    },
                    "index": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Insertion index in the target's children"
                    },
                    "afterShape": {
                        "type": "string",
                        "description": "Insert right after this child of the target"
                    }
                },
                "required": ["fileId", "pageId", "parentId", "shapeIds"]
            }),
        ),
        ToolDefinition::new(
            "group_shapes",
            "Group two or more shapes of the same frame into a new group sized to their bounds.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" },
                    "pageId": { "type": "string", "description": "Page ID" },
                    "shapeIds": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 2,
                        "description": "Shapes to group"
                    },
                    "name": { "type": "string", "description": "Group name (default: Group)" },
                    "parentId": {
                        "type": "string",
                        "description": "Container for the group (default: the shapes' common parent)"
                    },
                    "index": { "type": "integer", "minimum": 0, "description": "Insertion index" }
                },
                "required": ["fileId", "pageId", "shapeIds"]
            }),
        ),
        ToolDefinition::new(
            "align_shapes",
            "Align shapes to the shared edge or centre line of their bounding box.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" },
                    "pageId": { "type": "string", "description": "Page ID" },
                    "shapeIds": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 2
                    },
                    "alignment": {
                        "type": "string",
                        "enum": ["left", "center", "right", "top", "middle", "bottom"]
                    }
                },
                "required": ["fileId", "pageId", "shapeIds", "alignment"]
            }),
        ),
        ToolDefinition::new(
            "distribute_shapes",
            "Space shapes evenly between the outermost two along an axis.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" },
                    "pageId": { "type": "string", "description": "Page ID" },
                    "shapeIds": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 3
                    },
                    "direction": { "type": "string", "enum": ["horizontal", "vertical"] }
                },
                "required": ["fileId", "pageId", "shapeIds", "direction"]
            }),
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveArgs {
    file_id: String,
    page_id: String,
    parent_id: String,
    shape_ids: Vec<String>,
    index: Option<usize>,
    after_shape: Option<String>,
}

pub(super) async fn move_shapes(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: MoveArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;

    let index = match (args.index, args.after_shape.as_deref()) {
        (Some(index), _) => Some(index),
        (None, Some(after)) => {
            let tree = page.tree();
            let parent = tree.resolve_parent(&args.parent_id, &page.id);
            let position = tree
                .children(parent)
                .iter()
                .position(|child| *child == after)
                .ok_or_else(|| {
                    ToolError::validation(format!("afterShape {after} is not a child of {parent}"))
                })?;
            Some(position + 1)
        }
        (None, None) => None,
    };

    let plan = plan_move(page, &args.shape_ids, &args.parent_id, index)?;
    store.apply_changes(&args.file_id, plan.reparent.changes()).await?;

    info!(
        file_id = %args.file_id,
        parent_id = %plan.target_parent_id,
        moved = plan.reparent.subtree.len(),
        "Moved shapes"
    );
    Ok(ToolCallResult::with_json(
        format!(
            "Moved {} root shape(s) ({} shape(s) including descendants) to parent {}",
            plan.reparent.roots.len(),
            plan.reparent.subtree.len(),
            plan.target_parent_id
        ),
        &plan.summary(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupArgs {
    file_id: String,
    page_id: String,
    shape_ids: Vec<String>,
    name: Option<String>,
    parent_id: Option<String>,
    index: Option<usize>,
}

pub(super) async fn group_shapes(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: GroupArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;

    let request = GroupRequest {
        shape_ids: &args.shape_ids,
        name: args.name.as_deref(),
        parent_id: args.parent_id.as_deref(),
        index: args.index,
    };
    let plan = plan_group(page, &request, Uuid::new_v4().to_string())?;

    for step in plan.steps() {
        store.apply_changes(&args.file_id, step).await?;
    }

    info!(file_id = %args.file_id, group_id = %plan.group_id, "Grouped shapes");
    Ok(ToolCallResult::with_json(
        format!("Created group: {} (ID: {})", plan.name, plan.group_id),
        &plan.summary(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlignArgs {
    file_id: String,
    page_id: String,
    shape_ids: Vec<String>,
    alignment: String,
}

pub(super) async fn align_shapes(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: AlignArgs = parse_args(args)?;
    let alignment: Alignment = args.alignment.parse()?;
    let ids = unique_ids(&args.shape_ids);

    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;
    let changes = plan_align(page, &ids, alignment)?;
    let moved = changes.len();

    store.apply_changes(&args.file_id, changes).await?;

    Ok(ToolCallResult::text(format!(
        "Aligned {} shapes to {} ({moved} moved)",
        ids.len(),
        args.alignment
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DistributeArgs {
    file_id: String,
    page_id: String,
    shape_ids: Vec<String>,
    direction: String,
}

pub(super) async fn distribute_shapes(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: DistributeArgs = parse_args(args)?;
    let direction: Direction = args.direction.parse()?;
    let ids = unique_ids(&args.shape_ids);

    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;
    let changes = plan_distribute(page, &ids, direction)?;
    let moved = changes.len();

    store.apply_changes(&args.file_id, changes).await?;

    Ok(ToolCallResult::text(format!(
        "Distributed {} shapes {} ({moved} moved)",
        ids.len(),
        args.direction
    )))
}
