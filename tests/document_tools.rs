//! End-to-end tool scenarios against the in-memory document service.
//!
//! Each test seeds a store, runs tools through the public dispatcher and
//! inspects the resulting document and the change lists that were submitted.

#![recursion_limit = "256"]

mod common;

use std::collections::HashSet;

use common::{call, design_file, empty_file, payload, store_with, FILE, LIBRARY, ROOT};
use penpot_mcp::edit::batch::SKIPPED_MESSAGE;
use penpot_mcp::error::{ErrorCategory, ToolError};
use serde_json::json;

// =============================================================================
// Reparenting
// =============================================================================

#[tokio::test]
async fn move_to_root_and_back() {
    let original = design_file().page("page-1").unwrap().objects["card"].clone();
    let (service, store) = store_with(vec![design_file()]).await;

    let content = call(
        &store,
        "move_shapes",
        json!({"fileId": FILE, "pageId": "page-1", "parentId": "page-1", "shapeIds": ["card"]}),
    )
    .await
    .unwrap();
    assert!(content[0].starts_with("Moved 1 root shape(s)"));
    assert_eq!(payload(&content)["parentId"], ROOT);

    let doc = service.document(FILE).await.unwrap();
    let page = doc.page("page-1").unwrap();
    assert_eq!(page.objects["card"].parent_id(), Some(ROOT));
    assert_eq!(page.objects["card"].frame_id(), Some(ROOT));
    assert!(page.objects["board"].listed_children().is_empty());
    assert!(page.objects[ROOT].listed_children().contains(&"card"));

    call(
        &store,
        "move_shapes",
        json!({"fileId": FILE, "pageId": "page-1", "parentId": "board", "shapeIds": ["card"], "index": 0}),
    )
    .await
    .unwrap();

    let doc = service.document(FILE).await.unwrap();
    let page = doc.page("page-1").unwrap();
    assert_eq!(page.objects["card"].parent_id(), Some("board"));
    assert_eq!(page.objects["card"].frame_id(), Some("board"));
    assert_eq!(page.objects["board"].listed_children(), vec!["card"]);
    assert!(!page.objects[ROOT].listed_children().contains(&"card"));
    assert_eq!(page.objects["card"], original);
    assert_eq!(doc.revision, 6);
}

#[tokio::test]
async fn move_into_own_subtree_is_refused() {
    let (service, store) = store_with(vec![design_file()]).await;

    let err = call(
        &store,
        "move_shapes",
        json!({"fileId": FILE, "pageId": "page-1", "parentId": "card", "shapeIds": ["board"]}),
    )
    .await
    .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::PreconditionFailed);
    assert!(service.submissions().await.is_empty());
}

#[tokio::test]
async fn missing_shapes_are_all_reported() {
    let (_, store) = store_with(vec![design_file()]).await;

    let err = call(
        &store,
        "move_shapes",
        json!({"fileId": FILE, "pageId": "page-1", "parentId": "board", "shapeIds": ["nope", "card", "gone"]}),
    )
    .await
    .unwrap_err();

    match err {
        ToolError::ShapesNotFound { ids } => assert_eq!(ids, vec!["nope", "gone"]),
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// Sessions and revisions
// =============================================================================

#[tokio::test]
async fn group_submits_three_change_lists_with_fresh_sessions() {
    let (service, store) = store_with(vec![design_file()]).await;

    let content = call(
        &store,
        "group_shapes",
        json!({"fileId": FILE, "pageId": "page-1", "shapeIds": ["loose", "label"], "name": "Pair"}),
    )
    .await
    .unwrap();
    assert!(content[0].starts_with("Created group: Pair"));
    let group_id = payload(&content)["groupId"].as_str().unwrap().to_string();

    let submissions = service.submissions().await;
    assert_eq!(submissions.len(), 3);
    assert_eq!(
        submissions.iter().map(|s| s.revn).collect::<Vec<_>>(),
        vec![4, 5, 6]
    );
    let sessions: HashSet<&str> = submissions.iter().map(|s| s.session_id.as_str()).collect();
    assert_eq!(sessions.len(), 3);

    let doc = service.document(FILE).await.unwrap();
    assert_eq!(doc.revision, 7);
    let page = doc.page("page-1").unwrap();
    let group = &page.objects[group_id.as_str()];
    assert_eq!(group.parent_id(), Some(ROOT));
    let mut children = group.listed_children();
    children.sort_unstable();
    assert_eq!(children, vec!["label", "loose"]);
    assert_eq!(page.objects["loose"].parent_id(), Some(group_id.as_str()));
}

#[tokio::test]
async fn empty_update_is_not_submitted() {
    let (service, store) = store_with(vec![design_file()]).await;

    let err = call(
        &store,
        "update_shape",
        json!({"fileId": FILE, "pageId": "page-1", "shapeId": "card"}),
    )
    .await
    .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::ValidationFailed);
    assert!(service.submissions().await.is_empty());
}

// =============================================================================
// Component integrity
// =============================================================================

#[tokio::test]
async fn shell_component_is_detected_and_repaired() {
    let (service, store) = store_with(vec![design_file()]).await;

    let content = call(
        &store,
        "get_component_integrity",
        json!({"fileId": FILE, "componentId": "cmp-shell"}),
    )
    .await
    .unwrap();
    let report = payload(&content);
    assert_eq!(report["state"], "shell_container");
    assert_eq!(report["childCount"], 0);

    let err = call(
        &store,
        "instantiate_component",
        json!({"fileId": FILE, "pageId": "page-2", "componentId": "cmp-shell"}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ToolError::InvalidSourceState { .. }));
    assert!(err.to_string().contains("repair_component_structure"));
    assert!(service.submissions().await.is_empty());

    call(
        &store,
        "repair_component_structure",
        json!({"fileId": FILE, "componentId": "cmp-shell", "childShapeIds": ["loose"]}),
    )
    .await
    .unwrap();
    assert_eq!(service.submissions().await.len(), 4);

    let doc = service.document(FILE).await.unwrap();
    let page = doc.page("page-1").unwrap();
    assert_eq!(page.objects["shell-main"].listed_children(), vec!["loose"]);
    assert_eq!(page.objects["shell-main"].parent_id(), Some(ROOT));
    assert_eq!(page.objects["loose"].parent_id(), Some("shell-main"));
    assert_eq!(page.objects["loose"].frame_id(), Some("shell-main"));
    assert_eq!(
        page.objects[ROOT].listed_children(),
        vec!["board", "button-main", "shell-main", "label"]
    );

    let report = payload(
        &call(
            &store,
            "get_component_integrity",
            json!({"fileId": FILE, "componentId": "cmp-shell"}),
        )
        .await
        .unwrap(),
    );
    assert_eq!(report["state"], "container_with_children");

    let content = call(
        &store,
        "instantiate_component",
        json!({"fileId": FILE, "pageId": "page-2", "componentId": "cmp-shell", "x": 0, "y": 0}),
    )
    .await
    .unwrap();
    assert_eq!(payload(&content)["shapeCount"], 2);
}

#[tokio::test]
async fn repair_keeps_main_instance_in_place() {
    let (service, store) = store_with(vec![design_file()]).await;

    call(
        &store,
        "repair_component_structure",
        json!({"fileId": FILE, "componentId": "cmp-shell", "childShapeIds": ["board"]}),
    )
    .await
    .unwrap();

    let doc = service.document(FILE).await.unwrap();
    let page = doc.page("page-1").unwrap();
    assert_eq!(
        page.objects[ROOT].listed_children(),
        vec!["button-main", "shell-main", "loose", "label"]
    );
    assert_eq!(page.objects["shell-main"].listed_children(), vec!["board"]);
    assert_eq!(page.objects["card"].parent_id(), Some("board"));
}

#[tokio::test]
async fn repair_refuses_populated_root_without_overwrite() {
    let (_, store) = store_with(vec![design_file()]).await;

    let err = call(
        &store,
        "repair_component_structure",
        json!({"fileId": FILE, "componentId": "cmp-button", "childShapeIds": ["loose"]}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::PreconditionFailed);
}

#[tokio::test]
async fn empty_root_needs_explicit_opt_in() {
    let (service, store) = store_with(vec![design_file()]).await;

    let err = call(
        &store,
        "create_component",
        json!({"fileId": FILE, "pageId": "page-2", "shapeId": ROOT, "name": "Nothing"}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ToolError::EmptySourceRoot { .. }));

    let content = call(
        &store,
        "create_component",
        json!({"fileId": FILE, "pageId": "page-1", "shapeId": "board", "name": "Card Board"}),
    )
    .await
    .unwrap();
    assert!(content[0].starts_with("Created component: Card Board"));

    let doc = service.document(FILE).await.unwrap();
    let board = &doc.page("page-1").unwrap().objects["board"];
    assert!(board.main_instance_flag());
    let component_id = board.component_id().unwrap();
    assert_eq!(doc.component(component_id).unwrap().name, "Card Board");
}

// =============================================================================
// Deletion gating
// =============================================================================

#[tokio::test]
async fn component_in_use_blocks_deletion() {
    let (_, store) = store_with(vec![design_file()]).await;

    call(
        &store,
        "instantiate_component",
        json!({"fileId": FILE, "pageId": "page-2", "componentId": "cmp-button", "x": 40, "y": 40}),
    )
    .await
    .unwrap();

    let err = call(
        &store,
        "delete_component",
        json!({"fileId": FILE, "componentId": "cmp-button"}),
    )
    .await
    .unwrap_err();

    match &err {
        ToolError::ComponentInUse { instances, .. } => {
            assert_eq!(instances.len(), 1);
            assert_eq!(instances[0].page_id, "page-2");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.data()["instances"][0]["fileId"], FILE);
}

#[tokio::test]
async fn consumer_files_are_checked_for_instances() {
    let (service, store) = store_with(vec![design_file(), empty_file(LIBRARY)]).await;

    call(
        &store,
        "instantiate_component",
        json!({"fileId": LIBRARY, "pageId": "lib-page", "componentId": "cmp-button", "componentFileId": FILE}),
    )
    .await
    .unwrap();

    let consumer = service.document(LIBRARY).await.unwrap();
    let instance = consumer
        .page("lib-page")
        .unwrap()
        .objects
        .values()
        .find(|shape| shape.component_id() == Some("cmp-button"))
        .unwrap();
    assert_eq!(instance.component_file(), Some(FILE));

    let err = call(
        &store,
        "delete_component",
        json!({"fileId": FILE, "componentId": "cmp-button", "consumerFileIds": [LIBRARY]}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ToolError::ComponentInUse { ref instances, .. } if instances[0].file_id == LIBRARY));

    call(
        &store,
        "delete_component",
        json!({"fileId": FILE, "componentId": "cmp-shell"}),
    )
    .await
    .unwrap();
    let listed = payload(&call(&store, "list_components", json!({"fileId": FILE})).await.unwrap());
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn page_deletion_rules() {
    let (service, store) = store_with(vec![design_file(), empty_file(LIBRARY)]).await;

    let err = call(&store, "delete_page", json!({"fileId": FILE, "pageId": "page-1"}))
        .await
        .unwrap_err();
    match &err {
        ToolError::PageHostsComponents { component_ids, .. } => {
            assert_eq!(component_ids, &vec!["cmp-button".to_string(), "cmp-shell".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = call(&store, "delete_page", json!({"fileId": LIBRARY, "pageId": "lib-page"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::LastPage));

    call(&store, "delete_page", json!({"fileId": FILE, "pageId": "page-2"}))
        .await
        .unwrap();
    assert_eq!(service.document(FILE).await.unwrap().pages, vec!["page-1"]);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn batch_delete_isolates_failures() {
    let (service, store) = store_with(vec![design_file()]).await;

    let content = call(
        &store,
        "batch_delete_shape",
        json!({"items": [
            {"fileId": FILE, "pageId": "page-1", "shapeId": "card"},
            {"fileId": FILE, "pageId": "page-1", "shapeId": "missing"},
            {"fileId": FILE, "pageId": "page-1", "shapeId": "loose"}
        ]}),
    )
    .await
    .unwrap();

    let report = payload(&content);
    assert_eq!(report["successCount"], 2);
    assert_eq!(report["failureCount"], 1);
    assert_eq!(report["skippedCount"], 0);
    assert_eq!(report["results"][1]["status"], "error");
    assert_eq!(report["results"][1]["shapeId"], "missing");

    let doc = service.document(FILE).await.unwrap();
    let page = doc.page("page-1").unwrap();
    assert!(!page.objects.contains_key("card"));
    assert!(!page.objects.contains_key("loose"));
}

#[tokio::test]
async fn batch_stops_after_first_failure_when_asked() {
    let (service, store) = store_with(vec![design_file()]).await;

    let content = call(
        &store,
        "batch_delete_shape",
        json!({
            "continueOnError": false,
            "items": [
                {"fileId": FILE, "pageId": "page-1", "shapeId": "label"},
                {"fileId": FILE, "pageId": "page-1"},
                {"fileId": FILE, "pageId": "page-1", "shapeId": "button-bg"}
            ]
        }),
    )
    .await
    .unwrap();

    let report = payload(&content);
    assert_eq!(report["successCount"], 1);
    assert_eq!(report["failureCount"], 1);
    assert_eq!(report["skippedCount"], 1);
    assert_eq!(
        report["results"][1]["error"],
        "Each item must include fileId, pageId, and shapeId"
    );
    assert_eq!(report["results"][2]["status"], "skipped");
    assert_eq!(report["results"][2]["error"], SKIPPED_MESSAGE);

    let doc = service.document(FILE).await.unwrap();
    assert!(doc.page("page-1").unwrap().objects.contains_key("button-bg"));
}

fn instantiate_items() -> serde_json::Value {
    json!([
        {"fileId": FILE, "pageId": "page-2", "componentId": "cmp-button", "x": 0, "y": 0},
        {"fileId": FILE, "pageId": "page-2", "componentId": "cmp-shell", "x": 0, "y": 100},
        {"fileId": FILE, "pageId": "page-2", "componentId": "cmp-button", "x": 0, "y": 200}
    ])
}

#[tokio::test]
async fn batch_instantiate_isolates_shell_component() {
    let (service, store) = store_with(vec![design_file()]).await;

    let content = call(
        &store,
        "batch_instantiate_component",
        json!({"items": instantiate_items()}),
    )
    .await
    .unwrap();

    let report = payload(&content);
    assert_eq!(report["successCount"], 2);
    assert_eq!(report["failureCount"], 1);
    assert_eq!(report["skippedCount"], 0);
    assert_eq!(report["results"][0]["status"], "success");
    assert_eq!(report["results"][1]["status"], "error");
    assert_eq!(report["results"][1]["componentId"], "cmp-shell");
    assert_eq!(report["results"][2]["status"], "success");
    assert_eq!(service.submissions().await.len(), 2);

    let doc = service.document(FILE).await.unwrap();
    let screens = doc.page("page-2").unwrap();
    let instances = screens
        .objects
        .values()
        .filter(|shape| shape.component_id() == Some("cmp-button") && shape.parent_id() == Some(ROOT))
        .count();
    assert_eq!(instances, 2);
}

#[tokio::test]
async fn batch_instantiate_stops_at_shell_component_when_asked() {
    let (service, store) = store_with(vec![design_file()]).await;

    let content = call(
        &store,
        "batch_instantiate_component",
        json!({"continueOnError": false, "items": instantiate_items()}),
    )
    .await
    .unwrap();

    let report = payload(&content);
    assert_eq!(report["successCount"], 1);
    assert_eq!(report["failureCount"], 1);
    assert_eq!(report["skippedCount"], 1);
    assert_eq!(report["results"][2]["status"], "skipped");
    assert_eq!(report["results"][2]["error"], SKIPPED_MESSAGE);
    assert_eq!(service.submissions().await.len(), 1);
}

#[tokio::test]
async fn batch_token_bindings_share_page_state() {
    let (service, store) = store_with(vec![design_file()]).await;

    let content = call(
        &store,
        "batch_set_shape_token_bindings",
        json!({"items": [
            {"fileId": FILE, "pageId": "page-1", "shapeId": "card", "appliedTokens": {"r1": "radius.sm"}},
            {"fileId": FILE, "pageId": "page-1", "shapeId": "card", "appliedTokens": {"fill": "color.primary"}}
        ]}),
    )
    .await
    .unwrap();
    assert_eq!(payload(&content)["successCount"], 2);

    let doc = service.document(FILE).await.unwrap();
    assert_eq!(
        doc.page("page-1").unwrap().objects["card"].get("appliedTokens"),
        Some(&json!({"r1": "radius.sm", "fill": "color.primary"}))
    );

    let content = call(
        &store,
        "get_shape_token_bindings",
        json!({"fileId": FILE, "pageId": "page-1", "shapeId": "card"}),
    )
    .await
    .unwrap();
    assert_eq!(content[0], "Found token bindings for shape card");
}

// =============================================================================
// Shapes and text
// =============================================================================

#[tokio::test]
async fn font_size_update_keeps_text_and_run_styles() {
    let (service, store) = store_with(vec![design_file()]).await;

    call(
        &store,
        "update_shape",
        json!({"fileId": FILE, "pageId": "page-1", "shapeId": "label", "fontSize": 20}),
    )
    .await
    .unwrap();

    let doc = service.document(FILE).await.unwrap();
    let label = &doc.page("page-1").unwrap().objects["label"];
    let run = &label.get("content").unwrap()["children"][0]["children"][0]["children"][0];
    assert_eq!(run["text"], "Hello");
    assert_eq!(run["fontWeight"], "700");
    assert_eq!(run["fontSize"], "20");
}

#[tokio::test]
async fn created_shape_is_queryable() {
    let (_, store) = store_with(vec![design_file()]).await;

    let content = call(
        &store,
        "create_rectangle",
        json!({
            "fileId": FILE, "pageId": "page-2", "name": "Hero",
            "x": 10, "y": 20, "width": 30, "height": 40, "fillColor": "#ff0000"
        }),
    )
    .await
    .unwrap();
    assert!(content[0].starts_with("Created rectangle: Hero (ID: "));

    let content = call(
        &store,
        "query_shapes",
        json!({"fileId": FILE, "pageId": "page-2", "namePattern": "^hero$", "fields": ["colors"]}),
    )
    .await
    .unwrap();
    assert_eq!(content[0], "Found 1 shapes matching criteria");
    let shapes = payload(&content);
    assert_eq!(shapes[0]["name"], "Hero");
}
