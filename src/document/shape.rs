//! Shapes: the nodes of a page's design tree.
//!
//! A shape is kept as the JSON object the remote service returned so that
//! attributes this crate does not model survive a delete/re-add cycle
//! unchanged. The variant tag is parsed once into [`ShapeKind`]; everything
//! else is read through accessor methods that understand both key
//! spellings.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::document::keys::{self, lookup, lookup_str};

/// The shape variants a page can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    /// Top-level container establishing a clip/render context.
    Frame,
    /// Rectangle.
    Rect,
    /// Ellipse.
    Circle,
    /// Vector path.
    Path,
    /// Rich text.
    Text,
    /// Bitmap image.
    Image,
    /// Plain grouping container.
    Group,
    /// Boolean operation container.
    Bool,
    /// Imported raw SVG.
    SvgRaw,
}

impl ShapeKind {
    /// Parses the wire name of a shape type.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "frame" => Some(Self::Frame),
            "rect" => Some(Self::Rect),
            "circle" => Some(Self::Circle),
            "path" => Some(Self::Path),
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "group" => Some(Self::Group),
            "bool" => Some(Self::Bool),
            "svg-raw" => Some(Self::SvgRaw),
            _ => None,
        }
    }

    /// Returns the wire name of this shape type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Rect => "rect",
            Self::Circle => "circle",
            Self::Path => "path",
            Self::Text => "text",
            Self::Image => "image",
            Self::Group => "group",
            Self::Bool => "bool",
            Self::SvgRaw => "svg-raw",
        }
    }

    /// Whether shapes of this kind own an ordered child list.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Frame | Self::Group | Self::Bool)
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned bounds in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Bounds {
    /// Bounds of a rectangle given by origin and size.
    #[must_use]
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + width,
            y2: y + height,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Smallest bounds enclosing both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Smallest bounds enclosing every item, or `None` for an empty input.
    pub fn enclosing(mut items: impl Iterator<Item = Self>) -> Option<Self> {
        let first = items.next()?;
        Some(items.fold(first, Self::union))
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

/// A single shape on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    id: String,
    kind: Option<ShapeKind>,
    attrs: Map<String, Value>,
}

impl Shape {
    /// Wraps a raw shape object stored under `id`.
    ///
    /// The `id` attribute is filled in when the payload omitted it.
    #[must_use]
    pub fn from_raw(id: impl Into<String>, mut attrs: Map<String, Value>) -> Self {
        let id = id.into();
        attrs
            .entry("id")
            .or_insert_with(|| Value::String(id.clone()));
        let kind = attrs
            .get("type")
            .and_then(Value::as_str)
            .and_then(ShapeKind::parse);
        Self { id, kind, attrs }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The parsed shape type, `None` for types this crate does not know.
    #[must_use]
    pub const fn kind(&self) -> Option<ShapeKind> {
        self.kind
    }

    /// The raw `type` string as stored.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.attrs.get("type").and_then(Value::as_str).unwrap_or("")
    }

    #[must_use]
    pub fn is_container(&self) -> bool {
        self.kind.is_some_and(ShapeKind::is_container)
    }

    #[must_use]
    pub fn is_kind(&self, kind: ShapeKind) -> bool {
        self.kind == Some(kind)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attrs.get("name").and_then(Value::as_str)
    }

    /// The owning container, reading `parentId` or `parent-id`.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        lookup_str(&self.attrs, "parentId")
    }

    /// The enclosing frame, reading `frameId` or `frame-id`.
    #[must_use]
    pub fn frame_id(&self) -> Option<&str> {
        lookup_str(&self.attrs, "frameId")
    }

    /// Child IDs listed in the `shapes` array (non-string entries skipped).
    #[must_use]
    pub fn listed_children(&self) -> Vec<&str> {
        self.attrs
            .get("shapes")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_shapes_array(&self) -> bool {
        self.attrs.get("shapes").is_some_and(Value::is_array)
    }

    #[must_use]
    pub fn component_id(&self) -> Option<&str> {
        lookup_str(&self.attrs, "componentId")
    }

    #[must_use]
    pub fn component_file(&self) -> Option<&str> {
        lookup_str(&self.attrs, "componentFile")
    }

    /// Whether the shape carries an explicit main-instance flag.
    #[must_use]
    pub fn main_instance_flag(&self) -> bool {
        lookup(&self.attrs, "mainInstance")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Reads any attribute under either key spelling.
    #[must_use]
    pub fn get(&self, camel: &str) -> Option<&Value> {
        lookup(&self.attrs, camel)
    }

    /// Reads a numeric attribute, defaulting to zero.
    #[must_use]
    pub fn number(&self, camel: &str) -> f64 {
        self.get(camel).and_then(Value::as_f64).unwrap_or(0.0)
    }

    /// The raw attribute map.
    #[must_use]
    pub const fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    /// Sets an attribute, replacing any legacy spelling of the same key.
    pub fn set(&mut self, camel: &str, value: Value) {
        keys::remove_both(&mut self.attrs, camel);
        if camel == "type" {
            self.kind = value.as_str().and_then(ShapeKind::parse);
        }
        self.attrs.insert(camel.to_string(), value);
    }

    /// Geometric bounds: `selrect` when present, else `x,y,width,height`.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        if let Some(selrect) = self.attrs.get("selrect").and_then(Value::as_object) {
            let num = |k: &str| selrect.get(k).and_then(Value::as_f64);
            let x1 = num("x1").or_else(|| num("x")).unwrap_or(0.0);
            let y1 = num("y1").or_else(|| num("y")).unwrap_or(0.0);
            let x2 = num("x2").unwrap_or_else(|| x1 + num("width").unwrap_or(0.0));
            let y2 = num("y2").unwrap_or_else(|| y1 + num("height").unwrap_or(0.0));
            return Bounds { x1, y1, x2, y2 };
        }

        Bounds::from_rect(
            self.number("x"),
            self.number("y"),
            self.number("width"),
            self.number("height"),
        )
    }

    /// Deep copy of the attribute map with the relational fields rewritten.
    ///
    /// Legacy `parent-id`/`frame-id` are dropped and canonical
    /// `parentId`/`frameId` set, which is what a re-inserted shape carries.
    #[must_use]
    pub fn relinked(&self, parent_id: &str, frame_id: &str) -> Map<String, Value> {
        let mut obj = self.attrs.clone();
        keys::remove_both(&mut obj, "parentId");
        keys::remove_both(&mut obj, "frameId");
        obj.insert("parentId".into(), Value::String(parent_id.to_string()));
        obj.insert("frameId".into(), Value::String(frame_id.to_string()));
        obj
    }

    /// Text paragraphs of a text shape (`content.children[0].children`).
    #[must_use]
    pub fn paragraphs(&self) -> Option<&Vec<Value>> {
        self.attrs
            .get("content")?
            .get("children")?
            .get(0)?
            .get("children")?
            .as_array()
    }
}

/// Geometry attributes for an unrotated rectangle: `selrect`, `points` and
/// an identity `transform`/`transformInverse` pair.
#[must_use]
pub fn rect_geometry(x: f64, y: f64, width: f64, height: f64) -> Map<String, Value> {
    let identity = json!({"a": 1, "b": 0, "c": 0, "d": 1, "e": 0, "f": 0});
    let geometry = json!({
        "x": x,
        "y": y,
        "width": width,
        "height": height,
        "selrect": {
            "x": x,
            "y": y,
            "width": width,
            "height": height,
            "x1": x,
            "y1": y,
            "x2": x + width,
            "y2": y + height,
        },
        "points": [
            {"x": x, "y": y},
            {"x": x + width, "y": y},
            {"x": x + width, "y": y + height},
            {"x": x, "y": y + height},
        ],
        "transform": identity.clone(),
        "transformInverse": identity,
    });

    match geometry {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(value: Value) -> Shape {
        let id = value["id"].as_str().unwrap_or("s").to_string();
        Shape::from_raw(id, value.as_object().unwrap().clone())
    }

    #[test]
    fn kind_round_trip() {
        for name in ["frame", "rect", "circle", "path", "text", "image", "group", "bool", "svg-raw"] {
            let kind = ShapeKind::parse(name).unwrap();
            assert_eq!(kind.as_str(), name);
        }
        assert!(ShapeKind::parse("spline").is_none());
    }

    #[test]
    fn containers() {
        assert!(ShapeKind::Frame.is_container());
        assert!(ShapeKind::Group.is_container());
        assert!(ShapeKind::Bool.is_container());
        assert!(!ShapeKind::Rect.is_container());
        assert!(!ShapeKind::Text.is_container());
    }

    #[test]
    fn legacy_relational_keys() {
        let s = shape(json!({"id": "a", "type": "rect", "parent-id": "p", "frame-id": "f"}));
        assert_eq!(s.parent_id(), Some("p"));
        assert_eq!(s.frame_id(), Some("f"));
    }

    #[test]
    fn bounds_prefers_selrect() {
        let s = shape(json!({
            "id": "a", "type": "rect", "x": 100, "y": 100, "width": 1, "height": 1,
            "selrect": {"x": 0, "y": 0, "width": 10, "height": 20}
        }));
        assert_eq!(s.bounds(), Bounds::from_rect(0.0, 0.0, 10.0, 20.0));
    }

    #[test]
    fn bounds_from_rect_fields() {
        let s = shape(json!({"id": "a", "type": "rect", "x": 5, "y": 6, "width": 7, "height": 8}));
        assert_eq!(s.bounds(), Bounds { x1: 5.0, y1: 6.0, x2: 12.0, y2: 14.0 });
    }

    #[test]
    fn relinked_strips_legacy_keys() {
        let s = shape(json!({"id": "a", "type": "rect", "parent-id": "old", "frame-id": "oldf", "fills": []}));
        let obj = s.relinked("new", "newf");
        assert!(!obj.contains_key("parent-id"));
        assert!(!obj.contains_key("frame-id"));
        assert_eq!(obj["parentId"], "new");
        assert_eq!(obj["frameId"], "newf");
        assert_eq!(obj["fills"], json!([]));
    }

    #[test]
    fn enclosing_bounds() {
        let b = Bounds::enclosing(
            [
                Bounds::from_rect(0.0, 0.0, 10.0, 10.0),
                Bounds::from_rect(20.0, 20.0, 10.0, 10.0),
            ]
            .into_iter(),
        )
        .unwrap();
        assert!((b.width() - 30.0).abs() < f64::EPSILON);
        assert!((b.height() - 30.0).abs() < f64::EPSILON);
        assert!(Bounds::enclosing(std::iter::empty()).is_none());
    }
}
