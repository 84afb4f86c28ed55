//! New shapes.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::document::shape::rect_geometry;
use crate::document::text::new_content;
use crate::document::{Change, Page, Shape, ShapeKind};
use crate::error::ToolError;

use super::update::{apply_operations, build_update, ShapeUpdate};

const DEFAULT_SHAPE_FILL: &str = "#B1B2B5";
const DEFAULT_FRAME_FILL: &str = "#FFFFFF";
const DEFAULT_FONT_FAMILY: &str = "Work Sans";
const DEFAULT_FONT_SIZE: f64 = 16.0;
const DEFAULT_TEXT_COLOR: &str = "#000000";

/// A shape creation request.
///
/// Styling fields (fills, strokes, radii, shadow, text style) are the same
/// as for an update and are applied on top of the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShape {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// Ellipses only: sets both dimensions to twice the radius.
    pub radius: Option<f64>,
    pub name: Option<String>,
    /// Container to insert into. The page ID or absence means the page
    /// root frame.
    pub parent_id: Option<String>,
    /// Text shapes only.
    pub text: Option<String>,
    #[serde(flatten)]
    pub style: ShapeUpdate,
}

impl NewShape {
    fn size(&self, kind: ShapeKind) -> (f64, f64) {
        match kind {
            ShapeKind::Circle => {
                let diameter = self.radius.map_or(100.0, |r| r * 2.0);
                (
                    self.width.unwrap_or(diameter),
                    self.height.unwrap_or(diameter),
                )
            }
            ShapeKind::Text => {
                let font_size = self.style.font_size.unwrap_or(DEFAULT_FONT_SIZE);
                #[allow(clippy::cast_precision_loss)]
                let chars = self.text().chars().count() as f64;
                (
                    self.width.unwrap_or(chars * font_size * 0.6),
                    self.height.unwrap_or(font_size * 1.5),
                )
            }
            _ => (self.width.unwrap_or(100.0), self.height.unwrap_or(100.0)),
        }
    }

    fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("Text")
    }

    fn default_name(&self, kind: ShapeKind) -> String {
        match kind {
            ShapeKind::Circle => "Ellipse".to_string(),
            ShapeKind::Text => self.text().to_string(),
            ShapeKind::Frame => "Board".to_string(),
            _ => "Rectangle".to_string(),
        }
    }

    fn has_fill(&self) -> bool {
        self.style.fill_color.is_some()
            || self.style.gradient_type.is_some()
            || self.style.fill_image_id.is_some()
    }
}

/// The `add-obj` change creating a `kind` shape with ID `shape_id`.
///
/// Supported kinds are rectangles, ellipses, text and frames.
///
/// # Errors
///
/// `NotFound` for an unknown parent, `ValidationFailed` for unsupported
/// kinds, non-positive sizes or malformed styling.
pub fn build_create(
    page: &Page,
    kind: ShapeKind,
    request: &NewShape,
    shape_id: &str,
) -> Result<Change, ToolError> {
    if !matches!(
        kind,
        ShapeKind::Rect | ShapeKind::Circle | ShapeKind::Text | ShapeKind::Frame
    ) {
        return Err(ToolError::validation(format!(
            "Cannot create shapes of type {kind}"
        )));
    }

    let tree = page.tree();
    let parent_id = match request.parent_id.as_deref() {
        Some(parent) => tree.resolve_parent(parent, &page.id),
        None => tree.root_frame_id().unwrap_or(&page.id),
    };
    if parent_id != page.id && !tree.contains(parent_id) {
        return Err(ToolError::not_found("Parent shape", parent_id));
    }
    let frame_id = tree.frame_context_for(parent_id, &page.id);

    let (width, height) = request.size(kind);
    if !(width > 0.0 && height > 0.0) {
        return Err(ToolError::validation("width and height must be positive"));
    }

    let mut obj = rect_geometry(request.x, request.y, width, height);
    obj.insert("id".into(), json!(shape_id));
    obj.insert("type".into(), json!(kind.as_str()));
    obj.insert(
        "name".into(),
        json!(request.name.clone().unwrap_or_else(|| request.default_name(kind))),
    );
    obj.insert("parentId".into(), json!(parent_id));
    obj.insert("frameId".into(), json!(frame_id));

    match kind {
        ShapeKind::Text => {
            let color = request.style.fill_color.as_deref().unwrap_or(DEFAULT_TEXT_COLOR);
            obj.insert(
                "content".into(),
                new_content(
                    request.text(),
                    request.style.font_size.unwrap_or(DEFAULT_FONT_SIZE),
                    request.style.font_family.as_deref().unwrap_or(DEFAULT_FONT_FAMILY),
                    color,
                ),
            );
            obj.insert("growType".into(), json!("auto-width"));
            obj.insert("fills".into(), json!([{"fillColor": color, "fillOpacity": 1}]));
        }
        ShapeKind::Frame => {
            obj.insert("shapes".into(), json!([]));
            if !request.has_fill() {
                obj.insert("fills".into(), json!([{"fillColor": DEFAULT_FRAME_FILL, "fillOpacity": 1}]));
            }
        }
        _ => {
            if !request.has_fill() {
                obj.insert("fills".into(), json!([{"fillColor": DEFAULT_SHAPE_FILL, "fillOpacity": 1}]));
            }
        }
    }

    let obj = styled(Shape::from_raw(shape_id, obj), &page.id, &request.style)?;
    Ok(Change::add_obj(&page.id, parent_id, frame_id, obj))
}

/// Applies styling fields to a freshly built shape.
fn styled(shape: Shape, page_id: &str, style: &ShapeUpdate) -> Result<Map<String, Value>, ToolError> {
    let shape = match build_update(&shape, page_id, style)? {
        Some(Change::ModObj { operations, .. }) => apply_operations(&shape, &operations),
        _ => shape,
    };
    Ok(shape.attrs().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::tests::page;

    fn board() -> Page {
        page(&[
            json!({"id": "root", "type": "frame", "parentId": "root", "frameId": "root", "shapes": ["card"]}),
            json!({"id": "card", "type": "frame", "parentId": "root", "frameId": "root", "shapes": ["grp"]}),
            json!({"id": "grp", "type": "group", "parentId": "card", "frameId": "card", "shapes": []}),
        ])
    }

    fn request(value: Value) -> NewShape {
        serde_json::from_value(value).unwrap()
    }

    fn parts(change: &Change) -> (&Map<String, Value>, &str, &str) {
        match change {
            Change::AddObj { obj, parent_id, frame_id, .. } => {
                (obj, parent_id.as_deref().unwrap_or(""), frame_id)
            }
            other => panic!("expected add-obj, got {}", other.kind()),
        }
    }

    #[test]
    fn rectangle_defaults_to_root_frame() {
        let change = build_create(&board(), ShapeKind::Rect, &request(json!({"x": 10, "y": 20})), "r").unwrap();
        let (obj, parent, frame) = parts(&change);
        assert_eq!((parent, frame), ("root", "root"));
        assert_eq!(obj["type"], "rect");
        assert_eq!(obj["name"], "Rectangle");
        assert_eq!(obj["selrect"]["x2"], 110.0);
        assert_eq!(obj["transform"]["a"], 1);
        assert_eq!(obj["fills"][0]["fillColor"], DEFAULT_SHAPE_FILL);
    }

    #[test]
    fn ellipse_uses_radius_and_style() {
        let change = build_create(
            &board(),
            ShapeKind::Circle,
            &request(json!({"radius": 25, "fillColor": "#ff0000", "strokeColor": "#000000", "parentId": "grp"})),
            "c",
        )
        .unwrap();
        let (obj, parent, frame) = parts(&change);
        assert_eq!((parent, frame), ("grp", "card"));
        assert_eq!(obj["type"], "circle");
        assert_eq!(obj["width"], 50.0);
        assert_eq!(obj["fills"][0]["fillColor"], "#ff0000");
        assert_eq!(obj["strokes"][0]["strokeColor"], "#000000");
    }

    #[test]
    fn text_carries_content() {
        let change = build_create(
            &board(),
            ShapeKind::Text,
            &request(json!({"text": "Hello", "fontSize": 20, "fontWeight": "700"})),
            "t",
        )
        .unwrap();
        let (obj, _, _) = parts(&change);
        assert_eq!(obj["name"], "Hello");
        let run = &obj["content"]["children"][0]["children"][0]["children"][0];
        assert_eq!(run["text"], "Hello");
        assert_eq!(run["fontSize"], "20");
        assert_eq!(run["fontWeight"], "700");
        assert_eq!(obj["height"], 30.0);
    }

    #[test]
    fn frame_inside_frame_is_its_own_context() {
        let change = build_create(&board(), ShapeKind::Frame, &request(json!({"parentId": "card"})), "f").unwrap();
        let (obj, parent, frame) = parts(&change);
        assert_eq!((parent, frame), ("card", "card"));
        assert_eq!(obj["shapes"], json!([]));
    }

    #[test]
    fn unknown_parent_and_kind_rejected() {
        let missing = build_create(&board(), ShapeKind::Rect, &request(json!({"parentId": "nope"})), "r");
        assert!(matches!(missing, Err(ToolError::NotFound { .. })));
        let path = build_create(&board(), ShapeKind::Path, &NewShape::default(), "p");
        assert!(matches!(path, Err(ToolError::Validation { .. })));
    }
}
