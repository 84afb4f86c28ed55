//! Shape reads, creation, update and deletion.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::document::{Change, Operation, ShapeKind, ShapeTree};
use crate::edit::batch::{item_target, require_items, BatchRunner, PageCache};
use crate::edit::create::{build_create, NewShape};
use crate::edit::integrity::plan_delete_shape;
use crate::edit::update::{build_update, ShapeUpdate};
use crate::edit::{require_page, require_shape};
use crate::error::ToolError;
use crate::remote::DocumentStore;

use super::queries::{describe, is_page_root, Fields};
use super::{object_schema, page_properties, parse_args, PageArgs, ShapeArgs, ToolCallResult, ToolDefinition};

/// Styling properties accepted by creation and update tools.
fn style_properties() -> Map<String, Value> {
    let mut props = Map::new();
    let number = |description: &str| json!({"type": "number", "description": description});
    let string = |description: &str| json!({"type": "string", "description": description});

    props.insert("fillColor".into(), string("Fill colour (hex)"));
    props.insert("fillOpacity".into(), number("Fill opacity (0-1)"));
    props.insert("gradientType".into(), json!({"type": "string", "enum": ["linear", "radial"]}));
    props.insert("gradientStartX".into(), number("Gradient start X (0-1)"));
    props.insert("gradientStartY".into(), number("Gradient start Y (0-1)"));
    props.insert("gradientEndX".into(), number("Gradient end X (0-1)"));
    props.insert("gradientEndY".into(), number("Gradient end Y (0-1)"));
    props.insert(
        "gradientStops".into(),
        json!({"description": "Gradient stops [{color, offset, opacity}], as an array or JSON string"}),
    );
    props.insert("fillImageId".into(), string("Uploaded media ID used as an image fill"));
    props.insert("fillImageWidth".into(), number("Image width"));
    props.insert("fillImageHeight".into(), number("Image height"));
    props.insert("fillImageMtype".into(), string("Image MIME type"));
    props.insert("strokeColor".into(), string("Stroke colour (hex)"));
    props.insert("strokeWidth".into(), number("Stroke width"));
    props.insert("strokeOpacity".into(), number("Stroke opacity (0-1)"));
    props.insert("borderRadius".into(), number("Radius for all four corners"));
    for corner in ["r1", "r2", "r3", "r4"] {
        props.insert(corner.into(), number("Corner radius"));
    }
    props.insert("opacity".into(), number("Layer opacity (0-1)"));
    props.insert("shadowColor".into(), string("Shadow colour (hex)"));
    props.insert("shadowOffsetX".into(), number("Shadow X offset"));
    props.insert("shadowOffsetY".into(), number("Shadow Y offset"));
    props.insert("shadowBlur".into(), number("Shadow blur"));
    props.insert("shadowSpread".into(), number("Shadow spread"));
    props.insert("shadowOpacity".into(), number("Shadow opacity (0-1)"));
    props.insert(
        "shadowStyle".into(),
        json!({"type": "string", "enum": ["drop-shadow", "inner-shadow"]}),
    );
    props.insert("blurValue".into(), number("Layer blur"));
    props.insert("blendMode".into(), string("Blend mode"));
    props.insert("fontSize".into(), number("Font size (text only)"));
    props.insert("fontFamily".into(), string("Font family (text only)"));
    props.insert("fontWeight".into(), string("Font weight, e.g. 400 or 700 (text only)"));
    props.insert("fontStyle".into(), string("normal or italic (text only)"));
    props.insert("textDecoration".into(), string("underline or line-through (text only)"));
    props.insert("letterSpacing".into(), number("Letter spacing (text only)"));
    props.insert("lineHeight".into(), number("Line height (text only)"));
    props.insert(
        "textAlign".into(),
        json!({"type": "string", "enum": ["left", "center", "right", "justify"]}),
    );
    props.insert(
        "verticalAlign".into(),
        json!({"type": "string", "enum": ["top", "center", "bottom"]}),
    );
    props
}

fn create_definition(name: &str, description: &str, extra: &[(&str, Value)], required: &[&str]) -> ToolDefinition {
    let mut props = page_properties();
    props.insert("x".into(), json!({"type": "number", "description": "X position"}));
    props.insert("y".into(), json!({"type": "number", "description": "Y position"}));
    props.insert("width".into(), json!({"type": "number", "description": "Width"}));
    props.insert("height".into(), json!({"type": "number", "description": "Height"}));
    props.insert("name".into(), json!({"type": "string", "description": "Layer name"}));
    props.insert(
        "parentId".into(),
        json!({"type": "string", "description": "Container to insert into (default: page root frame)"}),
    );
    for (key, schema) in extra {
        props.insert((*key).to_string(), schema.clone());
    }
    props.extend(style_properties());
    ToolDefinition::new(name, description, object_schema(props, required))
}

fn shape_properties() -> Map<String, Value> {
    let mut props = page_properties();
    props.insert("shapeId".into(), json!({"type": "string", "description": "Shape ID"}));
    props
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    let mut update = shape_properties();
    for (key, description) in [
        ("x", "X position"),
        ("y", "Y position"),
        ("width", "Width"),
        ("height", "Height"),
    ] {
        update.insert(key.into(), json!({"type": "number", "description": description}));
    }
    update.insert("name".into(), json!({"type": "string", "description": "Layer name"}));
    update.insert(
        "text".into(),
        json!({"type": "string", "description": "Replacement text content (text only); paragraph styling is preserved"}),
    );
    update.extend(style_properties());

    let mut tree = page_properties();
    tree.insert(
        "shapeId".into(),
        json!({"type": "string", "description": "Subtree root (default: page root frame)"}),
    );
    tree.insert(
        "maxDepth".into(),
        json!({"type": "integer", "minimum": 0, "description": "Levels below the root to include"}),
    );

    vec![
        ToolDefinition::new(
            "get_page_shapes",
            "List every shape on a page with its position and size.",
            object_schema(page_properties(), &["fileId", "pageId"]),
        ),
        ToolDefinition::new(
            "get_shape_tree",
            "Get the nested container hierarchy of a page or of one shape's subtree.",
            object_schema(tree, &["fileId", "pageId"]),
        ),
        ToolDefinition::new(
            "get_shape_properties",
            "Get detailed properties of a shape: geometry, fills, strokes, radii, effects and text styling.",
            object_schema(shape_properties(), &["fileId", "pageId", "shapeId"]),
        ),
        create_definition(
            "create_rectangle",
            "Create a rectangle.",
            &[],
            &["fileId", "pageId", "width", "height"],
        ),
        create_definition(
            "create_ellipse",
            "Create an ellipse. Give either width/height or radius.",
            &[("radius", json!({"type": "number", "description": "Radius of a circle"}))],
            &["fileId", "pageId"],
        ),
        create_definition(
            "create_text",
            "Create a text layer. Size is estimated from the text when omitted.",
            &[("text", json!({"type": "string", "description": "Text content"}))],
            &["fileId", "pageId", "text"],
        ),
        create_definition(
            "create_frame",
            "Create a frame (board) that can contain other shapes.",
            &[],
            &["fileId", "pageId", "width", "height"],
        ),
        ToolDefinition::new(
            "update_shape",
            "Update geometry, styling or text of a shape. Only the given properties change.",
            object_schema(update, &["fileId", "pageId", "shapeId"]),
        ),
        ToolDefinition::new(
            "delete_shape",
            "Delete a shape and everything below it.",
            object_schema(shape_properties(), &["fileId", "pageId", "shapeId"]),
        ),
        ToolDefinition::new(
            "batch_delete_shape",
            "Delete several shapes. Each item is isolated: a failure is reported \
             per item and the rest still run unless continueOnError is false.",
            json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "fileId": { "type": "string" },
                                "pageId": { "type": "string" },
                                "shapeId": { "type": "string" }
                            },
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

pub(super) async fn get_page_shapes(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: PageArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;

    let shapes: Vec<Value> = page
        .objects
        .values()
        .filter(|shape| !is_page_root(shape))
        .map(|shape| {
            json!({
                "id": shape.id(),
                "name": shape.name(),
                "type": shape.type_name(),
                "x": shape.get("x"),
                "y": shape.get("y"),
                "width": shape.get("width"),
                "height": shape.get("height"),
            })
        })
        .collect();

    Ok(ToolCallResult::with_json(
        format!("Found {} shapes on page", shapes.len()),
        &Value::Array(shapes),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeArgs {
    file_id: String,
    page_id: String,
    shape_id: Option<String>,
    max_depth: Option<usize>,
}

/// Nested `{id, name, type, children}` view of the subtree at `id`.
fn tree_node(tree: &ShapeTree<'_>, id: &str, depth: usize, max_depth: Option<usize>, seen: &mut HashSet<String>) -> Option<Value> {
    let shape = tree.get(id)?;
    if !seen.insert(id.to_string()) {
        return None;
    }
    let mut node = json!({
        "id": shape.id(),
        "name": shape.name(),
        "type": shape.type_name(),
    });
    let children = tree.children(id);
    if max_depth.is_some_and(|max| depth >= max) {
        node["childCount"] = json!(children.len());
    } else {
        let nested: Vec<Value> = children
            .into_iter()
            .filter_map(|child| tree_node(tree, child, depth + 1, max_depth, seen))
            .collect();
        node["children"] = Value::Array(nested);
    }
    Some(node)
}

pub(super) async fn get_shape_tree(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: TreeArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;
    let tree = page.tree();

    let root_id = match args.shape_id.as_deref() {
        Some(id) => require_shape(page, id)?.id(),
        None => tree
            .root_frame_id()
            .ok_or_else(|| ToolError::not_found("Root frame of page", &page.id))?,
    };

    let mut seen = HashSet::new();
    let root = tree_node(&tree, root_id, 0, args.max_depth, &mut seen).unwrap_or(Value::Null);

    Ok(ToolCallResult::with_json(
        format!("Shape tree of {} ({} shapes)", page.name, seen.len()),
        &root,
    ))
}

pub(super) async fn get_shape_properties(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: ShapeArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;
    let shape = require_shape(page, &args.shape_id)?;

    let mut properties = describe(shape, Fields::all());
    for key in ["parentId", "frameId", "componentId", "componentFile", "shapeRef"] {
        if let Some(value) = shape.get(key) {
            properties.insert(key.to_string(), value.clone());
        }
    }

    Ok(ToolCallResult::with_json(
        format!(
            "Shape properties for: {} ({})",
            shape.name().unwrap_or_default(),
            shape.type_name()
        ),
        &Value::Object(properties),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateArgs {
    file_id: String,
    page_id: String,
    #[serde(flatten)]
    shape: NewShape,
}

async fn create(store: &DocumentStore, args: &Value, kind: ShapeKind, label: &str) -> Result<ToolCallResult, ToolError> {
    let args: CreateArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;

    let shape_id = Uuid::new_v4().to_string();
    let change = build_create(page, kind, &args.shape, &shape_id)?;
    let name = match &change {
        Change::AddObj { obj, .. } => obj.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        _ => String::new(),
    };

    store.apply_changes(&args.file_id, vec![change]).await?;

    info!(file_id = %args.file_id, shape_id = %shape_id, kind = label, "Created shape");
    Ok(ToolCallResult::text(format!("Created {label}: {name} (ID: {shape_id})")))
}

pub(super) async fn create_rectangle(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    create(store, args, ShapeKind::Rect, "rectangle").await
}

pub(super) async fn create_ellipse(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    create(store, args, ShapeKind::Circle, "ellipse").await
}

pub(super) async fn create_text(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    create(store, args, ShapeKind::Text, "text").await
}

pub(super) async fn create_frame(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    create(store, args, ShapeKind::Frame, "frame").await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateArgs {
    file_id: String,
    page_id: String,
    shape_id: String,
    #[serde(flatten)]
    update: ShapeUpdate,
}

pub(super) async fn update_shape(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: UpdateArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;
    let shape = require_shape(page, &args.shape_id)?;

    let Some(change) = build_update(shape, &page.id, &args.update)? else {
        return Err(ToolError::validation("No properties to update were provided"));
    };
    let attrs: Vec<String> = match &change {
        Change::ModObj { operations, .. } => operations
            .iter()
            .map(|Operation::Set { attr, .. }| attr.clone())
            .collect(),
        _ => Vec::new(),
    };

    store.apply_changes(&args.file_id, vec![change]).await?;

    Ok(ToolCallResult::text(format!("Updated shape: {}", args.shape_id))
        .and_text(format!("Changed attributes: {}", attrs.join(", "))))
}

pub(super) async fn delete_shape(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: ShapeArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;
    let changes = plan_delete_shape(page, &args.shape_id)?;

    store.apply_changes(&args.file_id, changes).await?;

    info!(file_id = %args.file_id, shape_id = %args.shape_id, "Deleted shape");
    Ok(ToolCallResult::text(format!("Deleted shape: {}", args.shape_id)))
}

/// One item of a shape-targeting batch, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ShapeItem {
    pub file_id: Option<String>,
    pub page_id: Option<String>,
    pub shape_id: Option<String>,
}

impl ShapeItem {
    pub(super) fn target(&self) -> Map<String, Value> {
        item_target(&[
            ("fileId", self.file_id.as_deref()),
            ("pageId", self.page_id.as_deref()),
            ("shapeId", self.shape_id.as_deref()),
        ])
    }

    /// The three IDs, all non-empty.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` when any is missing.
    pub(super) fn ids(&self) -> Result<(&str, &str, &str), ToolError> {
        fn non_empty(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }

        match (non_empty(&self.file_id), non_empty(&self.page_id), non_empty(&self.shape_id)) {
            (Some(file), Some(page), Some(shape)) => Ok((file, page, shape)),
            _ => Err(ToolError::validation(
                "Each item must include fileId, pageId, and shapeId",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchDeleteArgs {
    items: Vec<Value>,
    continue_on_error: Option<bool>,
}

async fn delete_item(
    store: &DocumentStore,
    cache: &mut PageCache,
    item: &ShapeItem,
) -> Result<Map<String, Value>, ToolError> {
    let (file_id, page_id, shape_id) = item.ids()?;
    let page = cache.page(store, file_id, page_id).await?;
    let changes = plan_delete_shape(page, shape_id)?;
    let removed: Vec<String> = changes.iter().map(|c| c.target_id().to_string()).collect();

    store.apply_changes(file_id, changes).await?;

    for id in &removed {
        page.objects.shift_remove(id);
    }
    let mut output = Map::new();
    output.insert("deletedCount".into(), json!(removed.len()));
    Ok(output)
}

pub(super) async fn batch_delete_shape(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: BatchDeleteArgs = parse_args(args)?;
    require_items(&args.items)?;

    let mut runner = BatchRunner::new(args.continue_on_error);
    let mut cache = PageCache::new();

    for (index, raw) in args.items.iter().enumerate() {
        let item: ShapeItem = serde_json::from_value(raw.clone()).unwrap_or_default();
        if runner.aborted() {
            runner.skip(index, item.target());
            continue;
        }
        let outcome = delete_item(store, &mut cache, &item).await;
        runner.record(index, item.target(), outcome);
    }

    let report = runner.finish();
    Ok(ToolCallResult::with_json(report.summary("delete_shape"), &json!(report)))
}
