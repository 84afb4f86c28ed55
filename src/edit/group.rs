//! Grouping shapes under a new group container.

use serde_json::{json, Value};

use crate::document::shape::rect_geometry;
use crate::document::{Bounds, Change, Page, ShapeKind};
use crate::error::ToolError;

use super::reparent::{build_reparent, ReparentPlan};
use super::unique_ids;

/// A validated grouping request.
///
/// Submitted as three sequential change lists: [`Self::reparent`]'s
/// deletes, the group's own `add-obj`, then the re-added members. The group
/// has to exist before its children name it as their parent.
#[derive(Debug, Clone)]
pub struct GroupPlan {
    /// Freshly minted ID of the group shape.
    pub group_id: String,

    pub name: String,

    /// Container the group is inserted into; the members' common parent.
    pub parent_id: String,

    /// Frame shared by every member.
    pub frame_id: String,

    /// Union of the members' bounding boxes.
    pub bounds: Bounds,

    /// The `add-obj` creating the empty group.
    pub add_group: Change,

    /// Moves the members under the new group.
    pub reparent: ReparentPlan,
}

impl GroupPlan {
    /// The change lists, in submission order.
    #[must_use]
    pub fn steps(&self) -> Vec<Vec<Change>> {
        vec![
            self.reparent.deletes.clone(),
            vec![self.add_group.clone()],
            self.reparent.adds.clone(),
        ]
    }

    #[must_use]
    pub fn summary(&self) -> Value {
        json!({
            "groupId": self.group_id,
            "parentId": self.parent_id,
            "frameId": self.frame_id,
            "shapeIds": self.reparent.roots,
        })
    }
}

/// Parameters of a grouping request.
#[derive(Debug, Clone, Default)]
pub struct GroupRequest<'a> {
    pub shape_ids: &'a [String],
    pub name: Option<&'a str>,
    pub parent_id: Option<&'a str>,
    pub index: Option<usize>,
}

/// Plans grouping the selection into a new group with ID `group_id`.
///
/// The group's geometry is the bounding box of every selected shape. When
/// no parent is given, the selection's common parent is used if it has one,
/// otherwise the page root frame.
///
/// # Errors
///
/// - `ValidationFailed` for fewer than two distinct IDs
/// - `NotFound` for missing shapes or parent
/// - `PreconditionFailed` when the selection spans several frames or the
///   parent is part of the grouped subtree
pub fn plan_group(
    page: &Page,
    request: &GroupRequest<'_>,
    group_id: String,
) -> Result<GroupPlan, ToolError> {
    let ids = unique_ids(request.shape_ids);
    if ids.len() < 2 {
        return Err(ToolError::validation(
            "shapeIds must contain at least 2 shape IDs to create a group",
        ));
    }

    let tree = page.tree();
    super::require_shapes(&tree, &ids)?;

    let selected: Vec<_> = ids.iter().filter_map(|id| tree.get(id)).collect();

    let mut frames: Vec<&str> = selected.iter().filter_map(|s| s.frame_id()).collect();
    frames.sort_unstable();
    frames.dedup();
    if frames.len() > 1 {
        return Err(ToolError::precondition(
            "All shapes must belong to the same frame to be grouped",
        ));
    }

    let root_frame = tree.root_frame_id().unwrap_or(&page.id);
    let parent_id = match request.parent_id {
        Some(parent) => parent,
        None => {
            let mut parents: Vec<&str> = selected.iter().filter_map(|s| s.parent_id()).collect();
            parents.sort_unstable();
            parents.dedup();
            match parents.as_slice() {
                [only] => *only,
                _ => root_frame,
            }
        }
    };
    let parent_id = tree.resolve_parent(parent_id, &page.id).to_string();

    let Some(parent) = tree.get(&parent_id) else {
        return Err(ToolError::not_found("Parent shape", parent_id));
    };
    if ids.contains(&parent_id) {
        return Err(ToolError::precondition(
            "parentId cannot be one of the shapeIds being grouped",
        ));
    }

    let frame_id = frames
        .first()
        .copied()
        .or_else(|| parent.frame_id())
        .or_else(|| parent.is_kind(ShapeKind::Frame).then_some(parent_id.as_str()))
        .unwrap_or(root_frame)
        .to_string();

    let bounds = Bounds::enclosing(selected.iter().map(|s| s.bounds()))
        .filter(Bounds::is_finite)
        .ok_or_else(|| ToolError::validation("Failed to compute shape bounds for grouping"))?;
    let width = bounds.width().max(0.0);
    let height = bounds.height().max(0.0);

    let reparent = build_reparent(&tree, &page.id, &ids, &group_id, &frame_id, None);
    if reparent.roots.is_empty() {
        return Err(ToolError::precondition(
            "No groupable root shapes resolved from shapeIds",
        ));
    }
    if reparent.subtree.contains(&parent_id) {
        return Err(ToolError::precondition(
            "parentId cannot be inside the grouped shape subtree",
        ));
    }

    let name = request.name.unwrap_or("Group").to_string();
    let mut obj = rect_geometry(bounds.x1, bounds.y1, width, height);
    obj.insert("id".into(), json!(group_id));
    obj.insert("type".into(), json!("group"));
    obj.insert("name".into(), json!(name));
    obj.insert("parentId".into(), json!(parent_id));
    obj.insert("frameId".into(), json!(frame_id));
    obj.insert("shapes".into(), json!(reparent.roots));

    let add_group = Change::AddObj {
        id: group_id.clone(),
        page_id: page.id.clone(),
        frame_id: frame_id.clone(),
        parent_id: Some(parent_id.clone()),
        index: request.index,
        obj,
    };

    Ok(GroupPlan {
        group_id,
        name,
        parent_id,
        frame_id,
        bounds,
        add_group,
        reparent,
    })
}
