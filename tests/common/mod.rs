//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use penpot_mcp::document::Document;
use penpot_mcp::remote::{DocumentStore, MemoryDocumentService};
use penpot_mcp::tools::{self, ToolContent};
use serde_json::{json, Value};

/// Penpot's fixed page root frame ID.
pub const ROOT: &str = "00000000-0000-0000-0000-000000000000";

pub const FILE: &str = "file-1";
pub const LIBRARY: &str = "library-1";

/// A two-page file with a working component, a shell component, a board
/// with a card and a styled text layer.
pub fn design_file() -> Document {
    let document = Document::from_value(&json!({
        "id": FILE,
        "name": "Design System",
        "revn": 4,
        "data": {
            "pages": ["page-1", "page-2"],
            "pagesIndex": {
                "page-1": {
                    "id": "page-1",
                    "name": "Components",
                    "objects": {
                        ROOT: {
                            "id": ROOT, "type": "frame", "name": "Root",
                            "parentId": ROOT, "frameId": ROOT,
                            "shapes": ["board", "button-main", "shell-main", "loose", "label"]
                        },
                        "board": {
                            "id": "board", "type": "frame", "name": "Board",
                            "parentId": ROOT, "frameId": ROOT,
                            "x": 0, "y": 0, "width": 400, "height": 300,
                            "shapes": ["card"]
                        },
                        "card": {
                            "id": "card", "type": "rect", "name": "Card",
                            "parentId": "board", "frameId": "board",
                            "x": 10, "y": 10, "width": 50, "height": 50
                        },
                        "button-main": {
                            "id": "button-main", "type": "frame", "name": "Button",
                            "parentId": ROOT, "frameId": ROOT,
                            "componentId": "cmp-button", "componentFile": FILE,
                            "componentRoot": true, "mainInstance": true,
                            "x": 500, "y": 0, "width": 120, "height": 40,
                            "shapes": ["button-bg"]
                        },
                        "button-bg": {
                            "id": "button-bg", "type": "rect", "name": "Background",
                            "parentId": "button-main", "frameId": "button-main",
                            "x": 500, "y": 0, "width": 120, "height": 40,
                            "fills": [{"fillColor": "#3366ff", "fillOpacity": 1}]
                        },
                        "shell-main": {
                            "id": "shell-main", "type": "frame", "name": "Shell",
                            "parentId": ROOT, "frameId": ROOT,
                            "componentId": "cmp-shell", "componentFile": FILE,
                            "componentRoot": true, "mainInstance": true,
                            "x": 700, "y": 0, "width": 100, "height": 100,
                            "shapes": []
                        },
                        "loose": {
                            "id": "loose", "type": "rect", "name": "Loose",
                            "parentId": ROOT, "frameId": ROOT,
                            "x": 700, "y": 10, "width": 20, "height": 20
                        },
                        "label": {
                            "id": "label", "type": "text", "name": "Label",
                            "parentId": ROOT, "frameId": ROOT,
                            "x": 0, "y": 400, "width": 100, "height": 20,
                            "content": {
                                "type": "root",
                                "children": [{"type": "paragraph-set", "children": [
                                    {"type": "paragraph", "children": [
                                        {"text": "Hello", "fontWeight": "700", "fontFamily": "Work Sans", "fontSize": "14"}
                                    ]}
                                ]}]
                            }
                        }
                    }
                },
                "page-2": {
                    "id": "page-2",
                    "name": "Screens",
                    "objects": {
                        ROOT: {
                            "id": ROOT, "type": "frame", "name": "Root",
                            "parentId": ROOT, "frameId": ROOT, "shapes": []
                        }
                    }
                }
            },
            "components": {
                "cmp-button": {
                    "id": "cmp-button", "name": "Button", "path": "Controls",
                    "mainInstanceId": "button-main", "mainInstancePage": "page-1"
                },
                "cmp-shell": {
                    "id": "cmp-shell", "name": "Shell", "path": "",
                    "mainInstanceId": "shell-main", "mainInstancePage": "page-1"
                }
            }
        }
    }));
    document.unwrap()
}

/// A single-page file with nothing but its root frame.
pub fn empty_file(id: &str) -> Document {
    Document::from_value(&json!({
        "id": id,
        "name": id,
        "revn": 0,
        "data": {
            "pages": ["lib-page"],
            "pagesIndex": {
                "lib-page": {
                    "id": "lib-page",
                    "name": "Page 1",
                    "objects": {
                        ROOT: {
                            "id": ROOT, "type": "frame", "name": "Root",
                            "parentId": ROOT, "frameId": ROOT, "shapes": []
                        }
                    }
                }
            }
        }
    }))
    .unwrap()
}

/// A store over an in-memory service seeded with `documents`.
pub async fn store_with(documents: Vec<Document>) -> (Arc<MemoryDocumentService>, DocumentStore) {
    let service = Arc::new(MemoryDocumentService::new());
    for document in documents {
        service.insert(document).await;
    }
    let store = DocumentStore::new(service.clone());
    (service, store)
}

/// Calls a tool that must exist.
pub async fn call(store: &DocumentStore, name: &str, args: Value) -> Result<Vec<String>, penpot_mcp::error::ToolError> {
    let result = tools::call(store, name, &args)
        .await
        .unwrap_or_else(|| panic!("tool {name} is not registered"))?;
    Ok(result
        .content
        .into_iter()
        .map(|ToolContent::Text { text }| text)
        .collect())
}

/// The JSON payload of a successful tool result.
pub fn payload(content: &[String]) -> Value {
    serde_json::from_str(&content[1]).unwrap()
}
