//! Design-token bindings on shapes.
//!
//! A shape references tokens in three places: the `appliedTokens` map
//! (attribute name to token name), colour references on individual fills
//! and strokes, and typography references on text paragraphs.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::document::keys::lookup;
use crate::document::text::paragraphs_mut;
use crate::document::{Change, Operation, Shape, ShapeKind};
use crate::error::ToolError;

/// Requested binding changes for one shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBindingRequest {
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub page_id: String,
    #[serde(default)]
    pub shape_id: String,

    /// Must be a JSON object when present.
    pub applied_tokens: Option<Value>,
    pub merge_applied_tokens: Option<bool>,

    pub fill_index: Option<i64>,
    pub fill_color_ref_id: Option<String>,
    pub fill_color_ref_file: Option<String>,
    pub clear_fill_color_ref: Option<bool>,

    pub stroke_index: Option<i64>,
    pub stroke_color_ref_id: Option<String>,
    pub stroke_color_ref_file: Option<String>,
    pub clear_stroke_color_ref: Option<bool>,

    pub paragraph_index: Option<i64>,
    pub typography_ref_id: Option<String>,
    pub typography_ref_file: Option<String>,
    pub clear_typography_ref: Option<bool>,
}

/// A single colour reference slot (fill or stroke).
struct RefSlot<'a> {
    attr: &'static str,
    id_key: &'static str,
    file_key: &'static str,
    index_name: &'static str,
    index: Option<i64>,
    ref_id: Option<&'a str>,
    ref_file: Option<&'a str>,
    clear: bool,
}

impl RefSlot<'_> {
    fn requested(&self) -> bool {
        self.ref_id.is_some() || self.ref_file.is_some() || self.clear
    }

    /// The rewritten list. An index one past the end appends an empty entry.
    fn apply(&self, shape: &Shape) -> Result<Value, ToolError> {
        let index = usize::try_from(self.index.unwrap_or(0)).map_err(|_| {
            ToolError::validation(format!("{} must be 0 or greater", self.index_name))
        })?;

        let mut items: Vec<Value> = shape
            .get(self.attr)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if index > items.len() {
            return Err(ToolError::validation(format!(
                "{} {index} is out of range; {} has {} entries",
                self.index_name,
                self.attr,
                items.len()
            )));
        }
        if index == items.len() {
            items.push(Value::Object(Map::new()));
        }

        if let Some(item) = items[index].as_object_mut() {
            if self.clear {
                item.remove(self.id_key);
                item.remove(self.file_key);
            }
            if let Some(id) = self.ref_id {
                item.insert(self.id_key.into(), json!(id));
            }
            if let Some(file) = self.ref_file {
                item.insert(self.file_key.into(), json!(file));
            }
        }

        Ok(Value::Array(items))
    }
}

/// A built binding change and the parts it touches.
#[derive(Debug, Clone)]
pub struct TokenBindingChange {
    pub change: Change,
    pub updated_parts: Vec<&'static str>,
}

impl TokenBindingChange {
    /// The `set` operations of the change.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        match &self.change {
            Change::ModObj { operations, .. } => operations,
            _ => &[],
        }
    }
}

/// Builds the `mod-obj` change applying `request` to `shape`.
///
/// # Errors
///
/// `ValidationFailed` when `appliedTokens` is not an object, an index is
/// negative or out of range, typography refs target a non-text shape, or
/// nothing was requested.
pub fn build_token_binding(
    shape: &Shape,
    page_id: &str,
    request: &TokenBindingRequest,
) -> Result<TokenBindingChange, ToolError> {
    let mut operations = Vec::new();
    let mut updated_parts = Vec::new();

    if let Some(tokens) = &request.applied_tokens {
        let tokens = tokens
            .as_object()
            .ok_or_else(|| ToolError::validation("appliedTokens must be an object map"))?;

        let merged = if request.merge_applied_tokens == Some(false) {
            tokens.clone()
        } else {
            let mut merged = shape
                .get("appliedTokens")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            merged.extend(tokens.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged
        };

        operations.push(Operation::set("appliedTokens", Value::Object(merged)));
        updated_parts.push("appliedTokens");
    }

    let fill = RefSlot {
        attr: "fills",
        id_key: "fillColorRefId",
        file_key: "fillColorRefFile",
        index_name: "fillIndex",
        index: request.fill_index,
        ref_id: request.fill_color_ref_id.as_deref(),
        ref_file: request.fill_color_ref_file.as_deref(),
        clear: request.clear_fill_color_ref == Some(true),
    };
    if fill.requested() {
        operations.push(Operation::set("fills", fill.apply(shape)?));
        updated_parts.push("fill refs");
    }

    let stroke = RefSlot {
        attr: "strokes",
        id_key: "strokeColorRefId",
        file_key: "strokeColorRefFile",
        index_name: "strokeIndex",
        index: request.stroke_index,
        ref_id: request.stroke_color_ref_id.as_deref(),
        ref_file: request.stroke_color_ref_file.as_deref(),
        clear: request.clear_stroke_color_ref == Some(true),
    };
    if stroke.requested() {
        operations.push(Operation::set("strokes", stroke.apply(shape)?));
        updated_parts.push("stroke refs");
    }

    let clear_typography = request.clear_typography_ref == Some(true);
    if request.typography_ref_id.is_some() || request.typography_ref_file.is_some() || clear_typography {
        if !shape.is_kind(ShapeKind::Text) {
            return Err(ToolError::validation(
                "Typography refs can only be updated for text shapes",
            ));
        }

        let mut content = shape.get("content").cloned().unwrap_or(Value::Null);
        let paragraphs = paragraphs_mut(&mut content)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ToolError::validation("Text shape has no paragraph structure to update"))?;

        let targets: Vec<usize> = match request.paragraph_index {
            Some(index) => {
                let in_range = usize::try_from(index).ok().filter(|i| *i < paragraphs.len());
                vec![in_range.ok_or_else(|| {
                    ToolError::validation(format!("paragraphIndex out of range: {index}"))
                })?]
            }
            None => (0..paragraphs.len()).collect(),
        };

        for index in targets {
            if let Some(paragraph) = paragraphs[index].as_object_mut() {
                if clear_typography {
                    paragraph.remove("typographyRefId");
                    paragraph.remove("typographyRefFile");
                }
                if let Some(id) = &request.typography_ref_id {
                    paragraph.insert("typographyRefId".into(), json!(id));
                }
                if let Some(file) = &request.typography_ref_file {
                    paragraph.insert("typographyRefFile".into(), json!(file));
                }
            }
        }

        operations.push(Operation::set("content", content));
        updated_parts.push("typography refs");
    }

    if operations.is_empty() {
        return Err(ToolError::validation(
            "No token binding updates provided. Set appliedTokens and/or fill/stroke/typography ref fields.",
        ));
    }

    Ok(TokenBindingChange {
        change: Change::mod_obj(page_id, shape.id(), operations),
        updated_parts,
    })
}

fn ref_entries(items: Option<&Value>, id_key: &str, file_key: &str) -> Vec<Value> {
    items
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let item = item.as_object();
                    let read = |key: &str| item.and_then(|m| lookup(m, key)).cloned().unwrap_or(Value::Null);
                    json!({ "index": index, id_key: read(id_key), file_key: read(file_key) })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Current token bindings of `shape`, and whether it has any.
#[must_use]
pub fn token_bindings(shape: &Shape) -> (Value, bool) {
    let applied = shape.get("appliedTokens").cloned().unwrap_or(Value::Null);
    let fills = ref_entries(shape.get("fills"), "fillColorRefId", "fillColorRefFile");
    let strokes = ref_entries(shape.get("strokes"), "strokeColorRefId", "strokeColorRefFile");
    let typography = if shape.is_kind(ShapeKind::Text) {
        shape
            .paragraphs()
            .map(|p| ref_entries(Some(&Value::Array(p.clone())), "typographyRefId", "typographyRefFile"))
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let any_ref = |entries: &[Value]| {
        entries.iter().any(|entry| {
            entry
                .as_object()
                .is_some_and(|m| m.iter().any(|(k, v)| k != "index" && !v.is_null()))
        })
    };
    let has_bindings = applied.as_object().is_some_and(|m| !m.is_empty())
        || any_ref(&fills)
        || any_ref(&strokes)
        || any_ref(&typography);

    let bindings = json!({
        "shapeId": shape.id(),
        "name": shape.name(),
        "type": shape.type_name(),
        "appliedTokens": applied,
        "fills": fills,
        "strokes": strokes,
        "typographyRefs": typography,
    });
    (bindings, has_bindings)
}
