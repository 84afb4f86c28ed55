//! Shape search and property extraction.

use bitflags::bitflags;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::document::text::plain_text;
use crate::document::{Shape, ShapeKind};
use crate::edit::require_page;
use crate::error::ToolError;
use crate::remote::DocumentStore;

use super::{parse_args, ToolCallResult, ToolDefinition};

bitflags! {
    /// Property groups included in a shape description.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) struct Fields: u8 {
        const POSITION = 1;
        const COLORS = 1 << 1;
        const TEXT = 1 << 2;
        const EFFECTS = 1 << 3;
    }
}

impl Fields {
    /// Parses field names; unknown names are ignored.
    fn parse(names: &[String]) -> Self {
        names.iter().fold(Self::empty(), |acc, name| {
            acc | match name.as_str() {
                "position" => Self::POSITION,
                "colors" => Self::COLORS,
                "text" => Self::TEXT,
                "effects" => Self::EFFECTS,
                "all" => Self::all(),
                _ => Self::empty(),
            }
        })
    }
}

/// The frame Penpot creates for every page.
pub(super) fn is_page_root(shape: &Shape) -> bool {
    shape.is_kind(ShapeKind::Frame) && shape.name() == Some("Root")
}

fn copy(out: &mut Map<String, Value>, shape: &Shape, key: &str) {
    if let Some(value) = shape.get(key) {
        out.insert(key.to_string(), value.clone());
    }
}

fn first_entry<'a>(shape: &'a Shape, list: &str) -> Option<&'a Value> {
    shape.get(list).and_then(Value::as_array).and_then(|l| l.first())
}

/// First text run of a text shape's content.
fn first_run(shape: &Shape) -> Option<&Map<String, Value>> {
    shape
        .paragraphs()?
        .iter()
        .filter_map(|p| p.get("children").and_then(Value::as_array))
        .flatten()
        .find_map(Value::as_object)
}

/// A text style attribute, read from the shape or else its first run.
fn text_attr(shape: &Shape, key: &str) -> Value {
    shape
        .get(key)
        .or_else(|| first_run(shape).and_then(|run| run.get(key)))
        .cloned()
        .unwrap_or(Value::Null)
}

fn text_properties(shape: &Shape) -> Value {
    let mut text = Map::new();
    for key in [
        "fontSize",
        "fontFamily",
        "fontWeight",
        "fontStyle",
        "verticalAlign",
        "textDecoration",
        "letterSpacing",
        "lineHeight",
    ] {
        text.insert(key.to_string(), text_attr(shape, key));
    }
    if let Some(content) = shape.get("content") {
        text.insert("content".into(), json!(plain_text(content).replace('\n', "")));
        let align = shape
            .paragraphs()
            .and_then(|p| p.iter().find_map(|p| p.get("textAlign")))
            .cloned();
        if let Some(align) = align {
            text.insert("textAlign".into(), align);
        }
    }
    Value::Object(text)
}

/// Describes `shape` with the requested property groups.
///
/// Identity (`id`, `name`, `type`) is always present.
pub(super) fn describe(shape: &Shape, fields: Fields) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("id".into(), json!(shape.id()));
    out.insert("name".into(), json!(shape.name()));
    out.insert("type".into(), json!(shape.type_name()));

    if fields.contains(Fields::POSITION) {
        for key in ["x", "y", "width", "height", "rotation", "flipX", "flipY"] {
            copy(&mut out, shape, key);
        }
    }

    if fields.contains(Fields::COLORS) {
        if let Some(fill) = first_entry(shape, "fills") {
            out.insert("fillColor".into(), fill.get("fillColor").cloned().unwrap_or(Value::Null));
            out.insert("fillOpacity".into(), fill.get("fillOpacity").cloned().unwrap_or(Value::Null));
            if let Some(gradient) = fill.get("fillColorGradient") {
                out.insert("gradient".into(), gradient.clone());
            }
            if let Some(image) = fill.get("fillImage") {
                out.insert("fillImage".into(), image.clone());
            }
        }
        if let Some(stroke) = first_entry(shape, "strokes") {
            out.insert(
                "stroke".into(),
                json!({
                    "color": stroke.get("strokeColor"),
                    "width": stroke.get("strokeWidth"),
                    "opacity": stroke.get("strokeOpacity"),
                    "style": stroke.get("strokeStyle"),
                    "alignment": stroke.get("strokeAlignment"),
                }),
            );
        }
    }

    if fields.contains(Fields::EFFECTS) {
        for key in ["r1", "r2", "r3", "r4", "opacity", "blendMode", "blur"] {
            copy(&mut out, shape, key);
        }
        if let Some(shadows) = shape.get("shadow").and_then(Value::as_array) {
            let shadows: Vec<Value> = shadows
                .iter()
                .map(|s| {
                    json!({
                        "style": s.get("style"),
                        "offsetX": s.get("offsetX"),
                        "offsetY": s.get("offsetY"),
                        "blur": s.get("blur"),
                        "spread": s.get("spread"),
                        "color": s.get("color").and_then(|c| c.get("color")),
                        "opacity": s.get("color").and_then(|c| c.get("opacity")),
                        "hidden": s.get("hidden"),
                    })
                })
                .collect();
            if !shadows.is_empty() {
                out.insert("shadows".into(), Value::Array(shadows));
            }
        }
    }

    if fields.contains(Fields::TEXT) {
        if shape.is_kind(ShapeKind::Text) {
            out.insert("text".into(), text_properties(shape));
        } else if shape.is_kind(ShapeKind::Path) {
            copy(&mut out, shape, "content");
        }
    }

    out
}

/// Filters for [`query_shapes`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryArgs {
    file_id: String,
    page_id: String,
    #[serde(default)]
    types: Vec<String>,
    name_pattern: Option<String>,
    min_x: Option<f64>,
    max_x: Option<f64>,
    min_y: Option<f64>,
    max_y: Option<f64>,
    fill_color: Option<String>,
    stroke_color: Option<String>,
    font_family: Option<String>,
    text_content: Option<String>,
    fields: Option<Vec<String>>,
}

struct ShapeFilter {
    types: Vec<String>,
    name: Option<Regex>,
    min_x: Option<f64>,
    max_x: Option<f64>,
    min_y: Option<f64>,
    max_y: Option<f64>,
    fill_color: Option<String>,
    stroke_color: Option<String>,
    font_family: Option<String>,
    text_content: Option<String>,
}

impl ShapeFilter {
    fn new(args: &QueryArgs) -> Self {
        let name = args.name_pattern.as_deref().and_then(|pattern| {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern, error = %e, "Ignoring invalid namePattern");
                    None
                }
            }
        });
        let lower = |s: &Option<String>| s.as_deref().map(str::to_lowercase);
        Self {
            types: args.types.clone(),
            name,
            min_x: args.min_x,
            max_x: args.max_x,
            min_y: args.min_y,
            max_y: args.max_y,
            fill_color: lower(&args.fill_color),
            stroke_color: lower(&args.stroke_color),
            font_family: lower(&args.font_family),
            text_content: lower(&args.text_content),
        }
    }

    fn first_color(shape: &Shape, list: &str, key: &str) -> Option<String> {
        first_entry(shape, list)
            .and_then(|entry| entry.get(key))
            .and_then(Value::as_str)
            .map(str::to_lowercase)
    }

    fn matches(&self, shape: &Shape) -> bool {
        if is_page_root(shape) {
            return false;
        }
        if !self.types.is_empty() && !self.types.iter().any(|t| t == shape.type_name()) {
            return false;
        }
        if let Some(regex) = &self.name {
            if !regex.is_match(shape.name().unwrap_or_default()) {
                return false;
            }
        }

        let (x, y) = (shape.number("x"), shape.number("y"));
        if self.min_x.is_some_and(|min| x < min)
            || self.max_x.is_some_and(|max| x > max)
            || self.min_y.is_some_and(|min| y < min)
            || self.max_y.is_some_and(|max| y > max)
        {
            return false;
        }

        if let Some(wanted) = &self.fill_color {
            if Self::first_color(shape, "fills", "fillColor").as_ref() != Some(wanted) {
                return false;
            }
        }
        if let Some(wanted) = &self.stroke_color {
            if Self::first_color(shape, "strokes", "strokeColor").as_ref() != Some(wanted) {
                return false;
            }
        }

        let is_text = shape.is_kind(ShapeKind::Text);
        if let Some(wanted) = &self.font_family {
            let family = text_attr(shape, "fontFamily");
            let family = family.as_str().map(str::to_lowercase);
            if !is_text || family.as_ref() != Some(wanted) {
                return false;
            }
        }
        if let Some(wanted) = &self.text_content {
            let Some(content) = shape.get("content").filter(|_| is_text) else {
                return false;
            };
            if !plain_text(content).to_lowercase().contains(wanted.as_str()) {
                return false;
            }
        }

        true
    }
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition::new(
        "query_shapes",
        "Search the shapes of a page by type, name, position, colour, font or text \
         content, returning the requested property groups for each match.",
        json!({
            "type": "object",
            "properties": {
                "fileId": { "type": "string", "description": "File ID" },
                "pageId": { "type": "string", "description": "Page ID" },
                "types": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Shape types to include (rect, circle, text, frame, group, path, ...)"
                },
                "namePattern": { "type": "string", "description": "Case-insensitive regular expression matched against shape names" },
                "minX": { "type": "number" },
                "maxX": { "type": "number" },
                "minY": { "type": "number" },
                "maxY": { "type": "number" },
                "fillColor": { "type": "string", "description": "Exact first fill colour (hex, case-insensitive)" },
                "strokeColor": { "type": "string", "description": "Exact first stroke colour (hex, case-insensitive)" },
                "fontFamily": { "type": "string", "description": "Text shapes using this font family" },
                "textContent": { "type": "string", "description": "Text shapes whose content contains this substring" },
                "fields": {
                    "type": "array",
                    "items": { "type": "string", "enum": ["position", "colors", "text", "effects", "all"] },
                    "description": "Property groups to return (default: position)"
                }
            },
            "required": ["fileId", "pageId"]
        }),
    )]
}

pub(super) async fn query_shapes(store: &DocumentStore, args: &Value) -> Result<ToolCallResult, ToolError> {
    let args: QueryArgs = parse_args(args)?;
    let document = store.get_document(&args.file_id).await?;
    let page = require_page(&document, &args.page_id)?;

    let fields = args
        .fields
        .as_deref()
        .map_or(Fields::POSITION, Fields::parse);
    let filter = ShapeFilter::new(&args);

    let results: Vec<Value> = page
        .objects
        .values()
        .filter(|shape| filter.matches(shape))
        .map(|shape| Value::Object(describe(shape, fields)))
        .collect();

    Ok(ToolCallResult::with_json(
        format!("Found {} shapes matching criteria", results.len()),
        &Value::Array(results),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(value: Value) -> Shape {
        let id = value["id"].as_str().unwrap_or("s").to_string();
        Shape::from_raw(id, value.as_object().cloned().unwrap())
    }

    fn filter(value: Value) -> ShapeFilter {
        let args: QueryArgs = serde_json::from_value(value).unwrap();
        ShapeFilter::new(&args)
    }

    fn heading() -> Shape {
        shape(json!({
            "id": "t", "type": "text", "name": "Heading", "x": 50, "y": 10,
            "fills": [{"fillColor": "#FF0000"}],
            "content": {"children": [{"children": [
                {"textAlign": "center", "children": [{"text": "Hello ", "fontFamily": "Inter", "fontSize": "24"}]},
                {"children": [{"text": "World"}]}
            ]}]}
        }))
    }

    #[test]
    fn fields_parse() {
        assert_eq!(Fields::parse(&["all".into()]), Fields::all());
        assert_eq!(
            Fields::parse(&["colors".into(), "text".into(), "bogus".into()]),
            Fields::COLORS | Fields::TEXT
        );
    }

    #[test]
    fn filters_combine() {
        let text = heading();
        assert!(filter(json!({"fileId": "f", "pageId": "p", "types": ["text"], "namePattern": "^head"})).matches(&text));
        assert!(filter(json!({"fileId": "f", "pageId": "p", "fillColor": "#ff0000", "minX": 40})).matches(&text));
        assert!(!filter(json!({"fileId": "f", "pageId": "p", "maxX": 40})).matches(&text));
        assert!(filter(json!({"fileId": "f", "pageId": "p", "fontFamily": "inter", "textContent": "WORLD"})).matches(&text));
        assert!(!filter(json!({"fileId": "f", "pageId": "p", "strokeColor": "#000000"})).matches(&text));
    }

    #[test]
    fn invalid_pattern_is_ignored() {
        assert!(filter(json!({"fileId": "f", "pageId": "p", "namePattern": "(["})).matches(&heading()));
    }

    #[test]
    fn page_root_excluded() {
        let root = shape(json!({"id": "r", "type": "frame", "name": "Root"}));
        assert!(!filter(json!({"fileId": "f", "pageId": "p"})).matches(&root));
    }

    #[test]
    fn describe_groups() {
        let text = heading();
        let position = describe(&text, Fields::POSITION);
        assert_eq!(position["x"], 50);
        assert!(position.get("fillColor").is_none());

        let all = describe(&text, Fields::all());
        assert_eq!(all["fillColor"], "#FF0000");
        assert_eq!(all["text"]["content"], "Hello World");
        assert_eq!(all["text"]["textAlign"], "center");
        assert_eq!(all["text"]["fontFamily"], "Inter");
    }
}
