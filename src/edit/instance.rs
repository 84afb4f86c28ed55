//! Component instantiation.
//!
//! An instance is a copy of the main-instance subtree with fresh IDs. Each
//! copy keeps a `shapeRef` to the shape it was cloned from, and the copied
//! root is tagged with the component it instantiates.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Map, Value};

use crate::document::keys::remove_both;
use crate::document::{Change, Page, ShapeKind};
use crate::error::ToolError;

use super::integrity::MainInstance;

/// Placement of a new instance.
#[derive(Debug, Clone, Default)]
pub struct InstanceRequest<'a> {
    /// File that defines the component.
    pub component_file: &'a str,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub parent_id: Option<&'a str>,
    pub name: Option<&'a str>,
}

/// `add-obj` changes creating one instance.
#[derive(Debug, Clone)]
pub struct InstancePlan {
    pub instance_id: String,
    pub parent_id: String,
    pub frame_id: String,
    pub adds: Vec<Change>,
}

impl InstancePlan {
    #[must_use]
    pub fn summary(&self, component_id: &str) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("componentId".into(), json!(component_id));
        out.insert("instanceId".into(), json!(self.instance_id));
        out.insert("parentId".into(), json!(self.parent_id));
        out.insert("frameId".into(), json!(self.frame_id));
        out.insert("shapeCount".into(), json!(self.adds.len()));
        out
    }
}

fn shift(value: &mut Value, key_x: &str, key_y: &str, dx: f64, dy: f64) {
    if let Some(obj) = value.as_object_mut() {
        for (key, delta) in [(key_x, dx), (key_y, dy)] {
            if let Some(n) = obj.get(key).and_then(Value::as_f64) {
                obj.insert(key.to_string(), json!(n + delta));
            }
        }
    }
}

/// Moves every positional attribute of a cloned shape by `(dx, dy)`.
fn translate(obj: &mut Map<String, Value>, dx: f64, dy: f64) {
    #[allow(clippy::float_cmp)]
    let unchanged = dx == 0.0 && dy == 0.0;
    if unchanged {
        return;
    }
    for (key, delta) in [("x", dx), ("y", dy)] {
        if let Some(n) = obj.get(key).and_then(Value::as_f64) {
            obj.insert(key.to_string(), json!(n + delta));
        }
    }
    if let Some(selrect) = obj.get_mut("selrect") {
        shift(selrect, "x", "y", dx, dy);
        shift(selrect, "x1", "y1", dx, dy);
        shift(selrect, "x2", "y2", dx, dy);
    }
    if let Some(points) = obj.get_mut("points").and_then(Value::as_array_mut) {
        for point in points {
            shift(point, "x", "y", dx, dy);
        }
    }
}

/// Plans an instance of `main` on `target`.
///
/// `fresh_id` supplies the ID of each cloned shape, root first.
///
/// # Errors
///
/// `NotFound` when the requested parent is not on the target page.
pub fn plan_instance(
    main: &MainInstance<'_>,
    target: &Page,
    request: &InstanceRequest<'_>,
    mut fresh_id: impl FnMut() -> String,
) -> Result<InstancePlan, ToolError> {
    let target_tree = target.tree();
    let parent_id = match request.parent_id {
        Some(parent) => target_tree.resolve_parent(parent, &target.id),
        None => target_tree.root_frame_id().unwrap_or(&target.id),
    };
    if parent_id != target.id && !target_tree.contains(parent_id) {
        return Err(ToolError::not_found("Parent shape", parent_id));
    }
    let frame_id = target_tree.frame_context_for(parent_id, &target.id);

    let source_tree = main.page.tree();
    let root = main.shape;
    let subtree = source_tree.subtree(&[root.id()]);
    let ids: HashMap<&str, String> = subtree
        .ordered
        .iter()
        .map(|id| (id.as_str(), fresh_id()))
        .collect();

    let origin = root.bounds();
    let dx = request.x.map_or(0.0, |x| x - origin.x1);
    let dy = request.y.map_or(0.0, |y| y - origin.y1);

    let mut adds = Vec::with_capacity(subtree.len());
    let mut visited = HashSet::new();
    let mut stack = vec![(root.id(), parent_id.to_string(), frame_id.to_string())];

    while let Some((source_id, new_parent, new_frame)) = stack.pop() {
        let (Some(shape), Some(new_id)) = (source_tree.get(source_id), ids.get(source_id)) else {
            continue;
        };
        if !visited.insert(source_id) {
            continue;
        }

        let children: Vec<&str> = source_tree
            .children(source_id)
            .into_iter()
            .filter(|child| ids.contains_key(child))
            .collect();

        let mut obj = shape.relinked(&new_parent, &new_frame);
        obj.insert("id".into(), json!(new_id));
        obj.insert("shapeRef".into(), json!(source_id));
        remove_both(&mut obj, "mainInstance");
        translate(&mut obj, dx, dy);
        if shape.has_shapes_array() || shape.is_container() {
            let mapped: Vec<&String> = children.iter().filter_map(|c| ids.get(c)).collect();
            obj.insert("shapes".into(), json!(mapped));
        }

        if source_id == root.id() {
            remove_both(&mut obj, "componentId");
            remove_both(&mut obj, "componentFile");
            obj.insert("componentId".into(), json!(main.component.id));
            obj.insert("componentFile".into(), json!(request.component_file));
            obj.insert("componentRoot".into(), json!(true));
            if let Some(name) = request.name {
                obj.insert("name".into(), json!(name));
            }
        }

        adds.push(Change::add_obj(&target.id, &new_parent, &new_frame, obj));

        let child_frame = if shape.is_kind(ShapeKind::Frame) {
            new_id.clone()
        } else {
            new_frame.clone()
        };
        for child in children.into_iter().rev() {
            stack.push((child, new_id.clone(), child_frame.clone()));
        }
    }

    Ok(InstancePlan {
        instance_id: ids.get(root.id()).cloned().unwrap_or_default(),
        parent_id: parent_id.to_string(),
        frame_id: frame_id.to_string(),
        adds,
    })
}
