//! File and page tools.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::document::Change;
use crate::edit::integrity::plan_delete_page;
use crate::edit::require_page;
use crate::error::ToolError;
use crate::remote::DocumentStore;

use super::{parse_args, FileArgs, PageArgs, ToolCallResult, ToolDefinition};

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "get_file",
            "Get a summary of a design file: its name, revision, pages and component count.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" }
                },
                "required": ["fileId"]
            }),
        ),
        ToolDefinition::new(
            "list_pages",
            "List the pages of a file in display order.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" }
                },
                "required": ["fileId"]
            }),
        ),
        ToolDefinition::new(
            "add_page",
            "Append a new page to a file.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" },
                    "name": { "type": "string", "description": "Page name (default: New Page)" }
                },
                "required": ["fileId"]
            }),
        ),
        ToolDefinition::new(
            "rename_page",
            "Rename an existing page.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" },
                    "pageId": { "type": "string", "description": "Page ID" },
                    "name": { "type": "string", "description": "New page name" }
                },
                "required": ["fileId", "pageId", "name"]
            }),
        ),
        ToolDefinition::new(
            "delete_page",
            "Delete a page. Refused for the last remaining page and for pages that \
             host the main instance of a component.",
            json!({
                "type": "object",
                "properties": {
                    "fileId": { "type": "string", "description": "File ID" },
                    "pageId": { "type": "string", "description": "Page ID" }
                },
                "required": ["fileId", "pageId"]
            }),
        ),
    ]
}

pub(super) async fn get_file(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: FileArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;

    let pages: Vec<Value> = document
        .ordered_pages()
        .map(|page| json!({ "id": page.id, "name": page.name, "shapeCount": page.objects.len() }))
        .collect();
    let payload = json!({
        "id": document.id,
        "name": document.name,
        "revision": document.revision,
        "pages": pages,
        "componentCount": document.live_components().count(),
    });

    Ok(ToolCallResult::with_json(format!("File: {}", document.name), &payload))
}

pub(super) async fn list_pages(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: FileArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;

    let pages: Vec<Value> = document
        .ordered_pages()
        .map(|page| json!({ "id": page.id, "name": page.name }))
        .collect();

    Ok(ToolCallResult::with_json(
        format!("Found {} pages", pages.len()),
        &Value::Array(pages),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPageArgs {
    file_id: String,
    name: Option<String>,
}

pub(super) async fn add_page(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: AddPageArgs = parse_args(args)?;
    let name = args
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "New Page".to_string());
    let page_id = Uuid::new_v4().to_string();

    store
        .apply_changes(
            &args.file_id,
            vec![Change::AddPage {
                id: page_id.clone(),
                name: name.clone(),
            }],
        )
        .await?;

    info!(file_id = %args.file_id, page_id = %page_id, "Added page");
    Ok(ToolCallResult::text(format!("Added page: {name} (ID: {page_id})")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenamePageArgs {
    file_id: String,
    page_id: String,
    name: String,
}

pub(super) async fn rename_page(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: RenamePageArgs = parse_args(args)?;
    if args.name.trim().is_empty() {
        return Err(ToolError::validation("name must not be empty"));
    }
    let document = store.get_document(&args.file_id).await?;
    require_page(&document, &args.page_id)?;

    store
        .apply_changes(
            &args.file_id,
            vec![Change::ModPage {
                id: args.page_id.clone(),
                name: args.name.clone(),
            }],
        )
        .await?;

    Ok(ToolCallResult::text(format!(
        "Renamed page: {} (ID: {})",
        args.name, args.page_id
    )))
}

pub(super) async fn delete_page(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: PageArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let change = plan_delete_page(&document, &args.page_id)?;

    store.apply_changes(&args.file_id, vec![change]).await?;

    info!(file_id = %args.file_id, page_id = %args.page_id, "Deleted page");
    Ok(ToolCallResult::text(format!("Deleted page: {}", args.page_id)))
}
