//! Component tools: listing, integrity, creation, instantiation, repair
//! and deletion.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::document::{Change, Operation};
use crate::edit::batch::{item_target, require_items, BatchRunner, DocumentCache};
use crate::edit::instance::{plan_instance, InstanceRequest};
use crate::edit::integrity::{
    check_component_root, integrity_report, plan_delete_component, plan_repair,
    require_instantiable,
};
use crate::edit::{require_page, require_shape};
use crate::error::ToolError;
use crate::remote::DocumentStore;

use super::{parse_args, FileArgs, ToolCallResult, ToolDefinition};

pub(super) fn definitions() -> Vec<ToolDefinition> {
    let instantiate_properties = json!({
        "fileId": { "type": "string", "description": "File receiving the instance" },
        "pageId": { "type": "string", "description": "Page receiving the instance" },
        "componentId": { "type": "string", "description": "Component to instantiate" },
        "componentFileId": {
            "type": "string",
            "description": "File defining the component (default: fileId)"
        },
        "x": { "type": "number", "description": "X of the instance's top-left corner" },
        "y": { "type": "number", "description": "Y of the instance's top-left corner" },
        "parentId": {
            "type": "string",
            "description": "Container for the instance (default: page root frame)"
        },
        "name": { "type": "string", "description": "Name of the instance root" }
    });

    vec![
        ToolDefinition::new(
            "list_components",
            "List the components defined in a file.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" }
                },
                "required": ["fileId"]
            }),
        ),
        ToolDefinition::new(
            "get_component_integrity",
            "Classify a component's main instance: container_with_children, \
             shell_container (empty, cannot be instantiated) or primitive_root.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File defining the component" },
                    "componentId": { "type": "string", "description": "Component ID" }
                },
                "required": ["fileId", "componentId"]
            }),
        ),
        ToolDefinition::new(
            "create_component",
            "Register a shape as the main instance of a new component. Empty \
             containers are refused unless allowEmptyRoot is set.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" },
                    "pageId": { "type": "string", "description": "Page ID" },
                    "shapeId": { "type": "string", "description": "Shape to use as the main instance" },
                    "name": { "type": "string", "description": "Component name (default: shape name)" },
                    "path": { "type": "string", "description": "Library path (default: name)" },
                    "allowEmptyRoot": {
                        "type": "boolean",
                        "description": "Accept a container with no children as the root"
                    }
                },
                "required": ["fileId", "pageId", "shapeId"]
            }),
        ),
        ToolDefinition::new(
            "rename_component",
            "Change a component's name and/or library path.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" },
                    "componentId": { "type": "string", "description": "Component ID" },
                    "name": { "type": "string", "description": "New name" },
                    "path": { "type": "string", "description": "New library path" }
                },
                "required": ["fileId", "componentId"]
            }),
        ),
        ToolDefinition::new(
            "instantiate_component",
            "Place a copy of a component's main instance. Components whose main \
             instance is an empty container are refused with InvalidSourceState.",
            json!({
                "type": "object",
                "properties": instantiate_properties.clone(),
                "required": ["fileId", "pageId", "componentId"]
            }),
        ),
        ToolDefinition::new(
            "batch_instantiate_component",
            "Place several component instances with per-item results.",
            json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": instantiate_properties,
                            "required": ["fileId", "pageId", "componentId"]
                        }
                    },
                    "continueOnError": { "type": "boolean", "description": "Default true" }
                },
                "required": ["items"]
            }),
        ),
        ToolDefinition::new(
            "repair_component_structure",
            "Attach existing shapes under a component's main instance, fixing a \
             shell container. Existing descendants are replaced only with overwrite.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File defining the component" },
                    "componentId": { "type": "string", "description": "Component ID" },
                    "childShapeIds": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "description": "Shapes on the main instance's page to move under the root"
                    },
                    "overwrite": {
                        "type": "boolean",
                        "description": "Remove the root's current descendants first"
                    }
                },
                "required": ["fileId", "componentId", "childShapeIds"]
            }),
        ),
        ToolDefinition::new(
            "delete_component",
            "Delete a component definition. Refused while instances exist in the \
             file or in any of the given consumer files.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File defining the component" },
                    "componentId": { "type": "string", "description": "Component ID" },
                    "consumerFileIds": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Other files that link this library"
                    }
                },
                "required": ["fileId", "componentId"]
            }),
        ),
    ]
}

pub(super) async fn list_components(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: FileArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;

    let components: Vec<Value> = document
        .live_components()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "path": c.path,
                "mainInstanceId": c.main_instance_id,
                "mainInstancePage": c.main_instance_page,
            })
        })
        .collect();

    Ok(ToolCallResult::with_json(
        format!("Found {} components", components.len()),
        &Value::Array(components),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentArgs {
    file_id: String,
    component_id: String,
}

pub(super) async fn get_component_integrity(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: ComponentArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let report = integrity_report(&document, &args.component_id)?;

    let summary = format!(
        "Component {}: {}",
        report["name"].as_str().unwrap_or(&args.component_id),
        report["state"].as_str().unwrap_or_default()
    );
    Ok(ToolCallResult::with_json(summary, &report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateComponentArgs {
    file_id: String,
    page_id: String,
    shape_id: String,
    name: Option<String>,
    path: Option<String>,
    #[serde(default)]
    allow_empty_root: bool,
}

pub(super) async fn create_component(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: CreateComponentArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;
    let shape = require_shape(page, &args.shape_id)?;

    if let Some(existing) = shape.component_id().filter(|_| shape.main_instance_flag()) {
        return Err(ToolError::precondition(format!(
            "Shape {} is already the main instance of component {existing}",
            args.shape_id
        )));
    }
    let state = check_component_root(page, shape, args.allow_empty_root)?;

    let component_id = Uuid::new_v4().to_string();
    let name = args
        .name
        .or_else(|| shape.name().map(str::to_string))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Component".to_string());
    let path = args.path.unwrap_or_else(|| name.clone());

    let changes = vec![
        Change::AddComponent {
            id: component_id.clone(),
            name: name.clone(),
            path,
            main_instance_id: args.shape_id.clone(),
            main_instance_page: page.id.clone(),
        },
        Change::mod_obj(
            &page.id,
            &args.shape_id,
            vec![
                Operation::set("componentId", component_id.as_str()),
                Operation::set("componentFile", args.file_id.as_str()),
                Operation::set("componentRoot", true),
                Operation::set("mainInstance", true),
            ],
        ),
    ];
    store.apply_changes(&args.file_id, changes).await?;

    info!(file_id = %args.file_id, component_id = %component_id, state = state.as_str(), "Created component");
    Ok(ToolCallResult::text(format!("Created component: {name} (ID: {component_id})")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameComponentArgs {
    file_id: String,
    component_id: String,
    name: Option<String>,
    path: Option<String>,
}

pub(super) async fn rename_component(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: RenameComponentArgs = parse_args(args)?;
    if args.name.is_none() && args.path.is_none() {
        return Err(ToolError::validation("Provide name or path to rename a component"));
    }
    let document = store.get_document(&args.file_id).await?;
    let component = document
        .component(&args.component_id)
        .ok_or_else(|| ToolError::not_found("Component", &args.component_id))?;
    let shown = args.name.clone().unwrap_or_else(|| component.name.clone());

    store
        .apply_changes(
            &args.file_id,
            vec![Change::ModComponent {
                id: args.component_id.clone(),
                name: args.name,
                path: args.path,
            }],
        )
        .await?;

    Ok(ToolCallResult::text(format!(
        "Renamed component: {shown} (ID: {})",
        args.component_id
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstantiateArgs {
    file_id: String,
    page_id: String,
    component_id: String,
    component_file_id: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    parent_id: Option<String>,
    name: Option<String>,
}

/// Places one instance and returns its summary.
///
/// The target file is always fetched fresh. A separate component file is
/// read through `libraries`.
async fn instantiate(
    store: &DocumentStore,
    args: &InstantiateArgs,
    libraries: &mut DocumentCache,
) -> Result<Map<String, Value>, ToolError> {
    let source_file = args
        .component_file_id
        .as_deref()
        .filter(|f| !f.is_empty())
        .unwrap_or(&args.file_id);
    let target = store.get_document(&args.file_id).await?;
    let source = if source_file == args.file_id {
        &target
    } else {
        libraries.document(store, source_file).await?
    };

    let main = require_instantiable(source, source_file, &args.component_id)?;
    let page = require_page(&target, &args.page_id)?;
    let request = InstanceRequest {
        component_file: source_file,
        x: args.x,
        y: args.y,
        parent_id: args.parent_id.as_deref(),
        name: args.name.as_deref(),
    };
    let plan = plan_instance(&main, page, &request, || Uuid::new_v4().to_string())?;
    let summary = plan.summary(&args.component_id);

    store.apply_changes(&args.file_id, plan.adds).await?;

    info!(
        file_id = %args.file_id,
        component_id = %args.component_id,
        instance_id = %plan.instance_id,
        "Instantiated component"
    );
    Ok(summary)
}

pub(super) async fn instantiate_component(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: InstantiateArgs = parse_args(args)?;
    let summary = instantiate(store, &args, &mut DocumentCache::new()).await?;
    let instance_id = summary
        .get("instanceId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(ToolCallResult::with_json(
        format!("Instantiated component {} (instance ID: {instance_id})", args.component_id),
        &Value::Object(summary),
    ))
}

/// Identifying fields of a batch instantiation item, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceItem {
    file_id: Option<String>,
    page_id: Option<String>,
    component_id: Option<String>,
}

impl InstanceItem {
    fn target(&self) -> Map<String, Value> {
        item_target(&[
            ("fileId", self.file_id.as_deref()),
            ("pageId", self.page_id.as_deref()),
            ("componentId", self.component_id.as_deref()),
        ])
    }

    fn complete(&self) -> bool {
        [&self.file_id, &self.page_id, &self.component_id]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchInstantiateArgs {
    items: Vec<Value>,
    continue_on_error: Option<bool>,
}

async fn instantiate_item(
    store: &DocumentStore,
    item: &InstanceItem,
    raw: &Value,
    libraries: &mut DocumentCache,
) -> Result<Map<String, Value>, ToolError> {
    if !item.complete() {
        return Err(ToolError::validation(
            "Each item must include fileId, pageId, and componentId",
        ));
    }
    let args: InstantiateArgs = parse_args(raw)?;
    instantiate(store, &args, libraries).await
}

pub(super) async fn batch_instantiate_component(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: BatchInstantiateArgs = parse_args(args)?;
    require_items(&args.items)?;

    let mut runner = BatchRunner::new(args.continue_on_error);
    let mut libraries = DocumentCache::new();
    for (index, raw) in args.items.iter().enumerate() {
        let item: InstanceItem = serde_json::from_value(raw.clone()).unwrap_or_default();
        if runner.aborted() {
            runner.skip(index, item.target());
            continue;
        }
        let outcome = instantiate_item(store, &item, raw, &mut libraries).await;
        runner.record(index, item.target(), outcome);
    }

    let report = runner.finish();
    Ok(ToolCallResult::with_json(
        report.summary("instantiate_component"),
        &json!(report),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepairArgs {
    file_id: String,
    component_id: String,
    child_shape_ids: Vec<String>,
    #[serde(default)]
    overwrite: bool,
}

pub(super) async fn repair_component_structure(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: RepairArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let plan = plan_repair(&document, &args.component_id, &args.child_shape_ids, args.overwrite)?;

    for (step, changes) in plan.steps.iter().enumerate() {
        if let Err(err) = store.apply_changes(&args.file_id, changes.clone()).await {
            warn!(
                component_id = %args.component_id,
                step,
                error = %err,
                "Repair stopped part way; earlier steps remain applied"
            );
            return Err(err.into());
        }
    }

    info!(
        file_id = %args.file_id,
        component_id = %args.component_id,
        moved = plan.reparent.subtree.len(),
        "Repaired component structure"
    );
    Ok(ToolCallResult::with_json(
        format!(
            "Repaired component {}: attached {} root shape(s) under {}",
            args.component_id,
            plan.reparent.roots.len(),
            plan.root_id
        ),
        &plan.summary(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteComponentArgs {
    file_id: String,
    component_id: String,
    #[serde(default)]
    consumer_file_ids: Vec<String>,
}

pub(super) async fn delete_component(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: DeleteComponentArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;

    let mut consumers = Vec::new();
    for consumer in args.consumer_file_ids.iter().filter(|id| **id != args.file_id) {
        consumers.push(store.get_document(consumer).await?);
    }
    let change = plan_delete_component(&document, &args.component_id, &consumers)?;

    store.apply_changes(&args.file_id, vec![change]).await?;

    info!(file_id = %args.file_id, component_id = %args.component_id, "Deleted component");
    Ok(ToolCallResult::text(format!("Deleted component: {}", args.component_id)))
}
