//! Property updates on a single shape.
//!
//! Every requested property becomes one or more `set` operations in a
//! single `mod-obj` change. Text styling is written twice: on the shape
//! itself and on every run of its content, since renderers read the run
//! styles first.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::document::text::{self, format_font_size, paragraphs_mut};
use crate::document::{Change, Operation, Shape, ShapeKind};
use crate::error::ToolError;

/// Requested property changes. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub name: Option<String>,

    pub fill_color: Option<String>,
    pub fill_opacity: Option<f64>,

    pub gradient_type: Option<String>,
    pub gradient_start_x: Option<f64>,
    pub gradient_start_y: Option<f64>,
    pub gradient_end_x: Option<f64>,
    pub gradient_end_y: Option<f64>,
    /// Stop list, either as an array or as a JSON-encoded string.
    pub gradient_stops: Option<Value>,

    pub fill_image_id: Option<String>,
    pub fill_image_name: Option<String>,
    pub fill_image_width: Option<f64>,
    pub fill_image_height: Option<f64>,
    pub fill_image_mtype: Option<String>,
    pub fill_image_keep_aspect_ratio: Option<bool>,

    pub stroke_color: Option<String>,
    pub stroke_width: Option<f64>,
    pub stroke_opacity: Option<f64>,

    pub r1: Option<f64>,
    pub r2: Option<f64>,
    pub r3: Option<f64>,
    pub r4: Option<f64>,
    pub border_radius: Option<f64>,

    pub opacity: Option<f64>,

    pub shadow_color: Option<String>,
    pub shadow_offset_x: Option<f64>,
    pub shadow_offset_y: Option<f64>,
    pub shadow_blur: Option<f64>,
    pub shadow_spread: Option<f64>,
    pub shadow_opacity: Option<f64>,
    pub shadow_style: Option<String>,

    pub blur_value: Option<f64>,
    pub blend_mode: Option<String>,

    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub font_weight: Option<String>,
    pub font_style: Option<String>,
    pub text_decoration: Option<String>,
    pub letter_spacing: Option<f64>,
    pub line_height: Option<f64>,
    pub text_align: Option<String>,
    pub vertical_align: Option<String>,
}

impl ShapeUpdate {
    fn has_text_style(&self) -> bool {
        self.font_size.is_some()
            || self.text_align.is_some()
            || self.font_family.is_some()
            || self.font_weight.is_some()
            || self.font_style.is_some()
            || self.text_decoration.is_some()
            || self.letter_spacing.is_some()
            || self.line_height.is_some()
    }

    fn has_shadow(&self) -> bool {
        self.shadow_offset_x.is_some()
            || self.shadow_offset_y.is_some()
            || self.shadow_blur.is_some()
            || self.shadow_spread.is_some()
            || self.shadow_color.is_some()
            || self.shadow_opacity.is_some()
            || self.shadow_style.is_some()
    }

    fn gradient_stops(&self) -> Result<Option<Value>, ToolError> {
        match &self.gradient_stops {
            None => Ok(None),
            Some(Value::String(encoded)) => serde_json::from_str(encoded)
                .map(Some)
                .map_err(|e| ToolError::validation(format!("gradientStops is not valid JSON: {e}"))),
            Some(stops @ Value::Array(_)) => Ok(Some(stops.clone())),
            Some(_) => Err(ToolError::validation("gradientStops must be an array")),
        }
    }

    /// The new fill list, choosing gradient over image over solid colour.
    ///
    /// The flag is set for a solid fill, which text runs also receive.
    fn fills(&self, shape: &Shape) -> Result<Option<(Value, bool)>, ToolError> {
        if let (Some(kind), Some(stops)) = (&self.gradient_type, self.gradient_stops()?) {
            let fills = json!([{
                "fillColorGradient": {
                    "type": kind,
                    "startX": self.gradient_start_x.unwrap_or(0.0),
                    "startY": self.gradient_start_y.unwrap_or(0.0),
                    "endX": self.gradient_end_x.unwrap_or(1.0),
                    "endY": self.gradient_end_y.unwrap_or(1.0),
                    "width": 1,
                    "stops": stops,
                }
            }]);
            return Ok(Some((fills, false)));
        }

        if let Some(image_id) = &self.fill_image_id {
            let fills = json!([{
                "fillImage": {
                    "width": self.fill_image_width,
                    "height": self.fill_image_height,
                    "mtype": self.fill_image_mtype.as_deref().unwrap_or("image/png"),
                    "id": image_id,
                    "name": self.fill_image_name.as_deref().unwrap_or("image"),
                    "keepAspectRatio": self.fill_image_keep_aspect_ratio.unwrap_or(true),
                }
            }]);
            return Ok(Some((fills, false)));
        }

        if self.fill_color.is_some() || self.fill_opacity.is_some() {
            let existing = shape.get("fills").and_then(|f| f.get(0));
            let color = self
                .fill_color
                .clone()
                .map(Value::String)
                .or_else(|| existing.and_then(|f| f.get("fillColor")).cloned())
                .unwrap_or(Value::Null);
            let opacity = self
                .fill_opacity
                .map(Value::from)
                .or_else(|| existing.and_then(|f| f.get("fillOpacity")).cloned())
                .unwrap_or_else(|| json!(1));
            let fills = json!([{ "fillColor": color, "fillOpacity": opacity }]);
            return Ok(Some((fills, true)));
        }

        Ok(None)
    }

    /// Rewrites the text content tree for content, style and solid fill.
    fn updated_content(&self, shape: &Shape, solid_fill: Option<&Value>) -> Result<Value, ToolError> {
        let mut content = shape
            .get("content")
            .cloned()
            .ok_or_else(|| ToolError::validation("Text shape has no content structure to update"))?;
        let paragraphs = paragraphs_mut(&mut content)
            .ok_or_else(|| ToolError::validation("Text shape has no content structure to update"))?;

        if let Some(text) = &self.text {
            text::set_text_content(paragraphs, text)?;
        }

        if let Some(align) = &self.text_align {
            for paragraph in paragraphs.iter_mut().filter_map(Value::as_object_mut) {
                paragraph.insert("textAlign".into(), json!(align));
            }
        }

        text::for_each_run(paragraphs, |run| self.style_run(run, solid_fill));

        Ok(content)
    }

    fn style_run(&self, run: &mut Map<String, Value>, solid_fill: Option<&Value>) {
        if let Some(fill) = solid_fill {
            let mut merged = run
                .get("fills")
                .and_then(|f| f.get(0))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            for key in ["fillColor", "fillOpacity"] {
                if let Some(value) = fill.get(key).filter(|v| !v.is_null()) {
                    merged.insert(key.into(), value.clone());
                }
            }
            run.insert("fills".into(), json!([merged]));
        }
        if let Some(size) = self.font_size {
            run.insert("fontSize".into(), json!(format_font_size(size)));
        }
        if let Some(family) = &self.font_family {
            run.insert("fontFamily".into(), json!(family));
        }
        if let Some(weight) = &self.font_weight {
            run.insert("fontWeight".into(), json!(weight));
        }
        if let Some(style) = &self.font_style {
            run.insert("fontStyle".into(), json!(style));
        }
        if let Some(decoration) = &self.text_decoration {
            run.insert("textDecoration".into(), json!(decoration));
        }
        if let Some(spacing) = self.letter_spacing {
            run.insert("letterSpacing".into(), json!(spacing.to_string()));
        }
        if let Some(line_height) = self.line_height {
            run.insert("lineHeight".into(), json!(line_height));
        }
    }
}

/// Builds the `mod-obj` change for `update` applied to `shape`.
///
/// Returns `None` when the update requests nothing.
///
/// # Errors
///
/// Fails when `text` is set on a non-text shape, when a text shape has no
/// content to rewrite, or when gradient stops are malformed.
pub fn build_update(
    shape: &Shape,
    page_id: &str,
    update: &ShapeUpdate,
) -> Result<Option<Change>, ToolError> {
    let mut ops = Vec::new();

    let set_num = |ops: &mut Vec<Operation>, attr: &str, value: Option<f64>| {
        if let Some(value) = value {
            ops.push(Operation::set(attr, value));
        }
    };
    set_num(&mut ops, "x", update.x);
    set_num(&mut ops, "y", update.y);
    set_num(&mut ops, "width", update.width);
    set_num(&mut ops, "height", update.height);
    if let Some(name) = &update.name {
        ops.push(Operation::set("name", name.as_str()));
    }

    let mut solid_fill = None;
    if let Some((fills, solid)) = update.fills(shape)? {
        if solid {
            solid_fill = fills.get(0).cloned();
        }
        ops.push(Operation::set("fills", fills));
    }

    if shape.is_kind(ShapeKind::Text) {
        if let Some(size) = update.font_size {
            ops.push(Operation::set("fontSize", format_font_size(size)));
        }
        for (attr, value) in [
            ("verticalAlign", &update.vertical_align),
            ("fontFamily", &update.font_family),
            ("fontWeight", &update.font_weight),
            ("fontStyle", &update.font_style),
        ] {
            if let Some(value) = value {
                ops.push(Operation::set(attr, value.as_str()));
            }
        }

        if solid_fill.is_some() || update.has_text_style() || update.text.is_some() {
            let content = update.updated_content(shape, solid_fill.as_ref())?;
            ops.push(Operation::set("content", content));
        }
    } else if update.text.is_some() {
        return Err(ToolError::validation("text can only be updated for text shapes"));
    }

    if update.stroke_color.is_some() || update.stroke_width.is_some() || update.stroke_opacity.is_some() {
        ops.push(Operation::set(
            "strokes",
            json!([{
                "strokeColor": update.stroke_color,
                "strokeWidth": update.stroke_width.unwrap_or(1.0),
                "strokeOpacity": update.stroke_opacity.unwrap_or(1.0),
                "strokeStyle": "solid",
                "strokeAlignment": "center",
            }]),
        ));
    }

    if let Some(radius) = update.border_radius {
        for corner in ["r1", "r2", "r3", "r4"] {
            ops.push(Operation::set(corner, radius));
        }
    } else {
        set_num(&mut ops, "r1", update.r1);
        set_num(&mut ops, "r2", update.r2);
        set_num(&mut ops, "r3", update.r3);
        set_num(&mut ops, "r4", update.r4);
    }

    set_num(&mut ops, "opacity", update.opacity);

    if update.has_shadow() {
        ops.push(Operation::set(
            "shadow",
            json!([{
                "id": Uuid::new_v4().to_string(),
                "style": update.shadow_style.as_deref().unwrap_or("drop-shadow"),
                "offsetX": update.shadow_offset_x.unwrap_or(0.0),
                "offsetY": update.shadow_offset_y.unwrap_or(4.0),
                "blur": update.shadow_blur.unwrap_or(10.0),
                "spread": update.shadow_spread.unwrap_or(0.0),
                "hidden": false,
                "color": {
                    "color": update.shadow_color.as_deref().unwrap_or("#000000"),
                    "opacity": update.shadow_opacity.unwrap_or(0.25),
                },
            }]),
        ));
    }

    if let Some(value) = update.blur_value {
        ops.push(Operation::set(
            "blur",
            json!({
                "id": Uuid::new_v4().to_string(),
                "type": "layer-blur",
                "value": value,
                "hidden": false,
            }),
        ));
    }

    if let Some(mode) = &update.blend_mode {
        ops.push(Operation::set("blendMode", mode.as_str()));
    }

    if ops.is_empty() {
        return Ok(None);
    }
    Ok(Some(Change::mod_obj(page_id, shape.id(), ops)))
}

/// Applies `set` operations to a copy of `shape`.
///
/// Mirrors what the remote service does with a `mod-obj`, so a cached page
/// can reflect an accepted change without being refetched.
#[must_use]
pub fn apply_operations(shape: &Shape, operations: &[Operation]) -> Shape {
    let mut next = shape.clone();
    for Operation::Set { attr, val } in operations {
        next.set(attr, val.clone());
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_shape() -> Shape {
        let value = json!({
            "id": "t", "type": "text", "fills": [{"fillColor": "#111111", "fillOpacity": 0.5}],
            "content": {
                "type": "root",
                "children": [{"type": "paragraph-set", "children": [
                    {"type": "paragraph", "children": [
                        {"text": "Bold", "fontWeight": "700", "fontStyle": "italic",
                         "fills": [{"fillColor": "#111111", "fillOpacity": 1, "fillColorRefId": "ref"}]},
                        {"text": " tail", "fontWeight": "700", "fontStyle": "italic"}
                    ]}
                ]}]
            }
        });
        Shape::from_raw("t", value.as_object().cloned().unwrap())
    }

    fn rect() -> Shape {
        let value = json!({"id": "r", "type": "rect", "fills": [{"fillColor": "#000000", "fillOpacity": 0.4}]});
        Shape::from_raw("r", value.as_object().cloned().unwrap())
    }

    fn ops(change: &Change) -> &[Operation] {
        match change {
            Change::ModObj { operations, .. } => operations,
            other => panic!("expected mod-obj, got {}", other.kind()),
        }
    }

    fn op<'a>(change: &'a Change, attr: &str) -> Option<&'a Value> {
        ops(change).iter().find_map(|Operation::Set { attr: a, val }| (a == attr).then_some(val))
    }

    #[test]
    fn text_update_preserves_run_styles() {
        let update = ShapeUpdate {
            text: Some("Hello\nWorld".into()),
            ..ShapeUpdate::default()
        };
        let change = build_update(&text_shape(), "p", &update).unwrap().unwrap();
        let content = op(&change, "content").unwrap();
        let runs = &content["children"][0]["children"][0]["children"];
        assert_eq!(runs[0]["text"], "Hello\nWorld");
        assert_eq!(runs[1]["text"], "");
        for run in runs.as_array().unwrap() {
            assert_eq!(run["fontWeight"], "700");
            assert_eq!(run["fontStyle"], "italic");
        }
    }

    #[test]
    fn text_fill_propagates_to_runs() {
        let update = ShapeUpdate {
            fill_color: Some("#ff0000".into()),
            ..ShapeUpdate::default()
        };
        let change = build_update(&text_shape(), "p", &update).unwrap().unwrap();
        assert_eq!(op(&change, "fills").unwrap()[0]["fillColor"], "#ff0000");
        // Opacity kept from the existing shape fill
        assert_eq!(op(&change, "fills").unwrap()[0]["fillOpacity"], 0.5);

        let content = op(&change, "content").unwrap();
        let runs = content["children"][0]["children"][0]["children"].as_array().unwrap();
        for run in runs {
            assert_eq!(run["fills"][0]["fillColor"], "#ff0000");
        }
        assert_eq!(runs[0]["fills"][0]["fillColorRefId"], "ref");
    }

    #[test]
    fn text_style_on_shape_and_runs() {
        let update = ShapeUpdate {
            font_size: Some(24.0),
            text_align: Some("center".into()),
            ..ShapeUpdate::default()
        };
        let change = build_update(&text_shape(), "p", &update).unwrap().unwrap();
        assert_eq!(op(&change, "fontSize"), Some(&json!("24")));
        let content = op(&change, "content").unwrap();
        let paragraph = &content["children"][0]["children"][0];
        assert_eq!(paragraph["textAlign"], "center");
        assert_eq!(paragraph["children"][1]["fontSize"], "24");
    }

    #[test]
    fn text_on_non_text_shape_rejected() {
        let update = ShapeUpdate {
            text: Some("x".into()),
            ..ShapeUpdate::default()
        };
        let err = build_update(&rect(), "p", &update).unwrap_err();
        assert_eq!(err.to_string(), "text can only be updated for text shapes");
    }

    #[test]
    fn gradient_wins_over_solid() {
        let update = ShapeUpdate {
            fill_color: Some("#ffffff".into()),
            gradient_type: Some("linear".into()),
            gradient_stops: Some(json!("[{\"color\":\"#000\",\"offset\":0}]")),
            ..ShapeUpdate::default()
        };
        let change = build_update(&rect(), "p", &update).unwrap().unwrap();
        let fills = op(&change, "fills").unwrap();
        assert_eq!(fills[0]["fillColorGradient"]["type"], "linear");
        assert_eq!(fills[0]["fillColorGradient"]["endX"], 1.0);
        assert!(fills[0].get("fillColor").is_none());
    }

    #[test]
    fn border_radius_overrides_corners() {
        let update = ShapeUpdate {
            border_radius: Some(8.0),
            r1: Some(2.0),
            ..ShapeUpdate::default()
        };
        let change = build_update(&rect(), "p", &update).unwrap().unwrap();
        let corners: Vec<_> = ops(&change)
            .iter()
            .map(|Operation::Set { attr, val }| (attr.as_str(), val.clone()))
            .collect();
        assert_eq!(
            corners,
            vec![
                ("r1", json!(8.0)),
                ("r2", json!(8.0)),
                ("r3", json!(8.0)),
                ("r4", json!(8.0)),
            ]
        );
    }

    #[test]
    fn shadow_defaults() {
        let update = ShapeUpdate {
            shadow_color: Some("#333333".into()),
            ..ShapeUpdate::default()
        };
        let change = build_update(&rect(), "p", &update).unwrap().unwrap();
        let shadow = &op(&change, "shadow").unwrap()[0];
        assert_eq!(shadow["style"], "drop-shadow");
        assert_eq!(shadow["offsetY"], 4.0);
        assert_eq!(shadow["blur"], 10.0);
        assert_eq!(shadow["color"]["opacity"], 0.25);
    }

    #[test]
    fn empty_update_is_none() {
        assert!(build_update(&rect(), "p", &ShapeUpdate::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn local_replay() {
        let shape = rect();
        let next = apply_operations(&shape, &[Operation::set("x", 42.0)]);
        assert!((next.number("x") - 42.0).abs() < f64::EPSILON);
        assert_eq!(next.type_name(), "rect");
    }
}
