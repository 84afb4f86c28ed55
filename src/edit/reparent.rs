//! Moving subtrees between containers.
//!
//! A move is expressed as delete-then-recreate: one `del-obj` per moved
//! root, followed by pre-order `add-obj` entries that re-insert every
//! subtree member with rewritten `parentId`/`frameId`. The remote move
//! primitive does not reliably reassign frames across containers, so the
//! frame of every re-added shape is computed here explicitly.

use serde_json::{json, Value};

use crate::document::tree::Subtree;
use crate::document::{Change, Page, ShapeKind, ShapeTree};
use crate::error::ToolError;

use super::unique_ids;

/// Change lists for re-inserting a set of subtrees under a new parent.
#[derive(Debug, Clone)]
pub struct ReparentPlan {
    /// Input IDs with nested selections removed, in input order.
    pub roots: Vec<String>,
    /// Every shape that moves.
    pub subtree: Subtree,
    /// One `del-obj` per root.
    pub deletes: Vec<Change>,
    /// Pre-order `add-obj` entries for the whole subtree.
    pub adds: Vec<Change>,
}

impl ReparentPlan {
    /// Deletes followed by adds, as a single list.
    #[must_use]
    pub fn changes(&self) -> Vec<Change> {
        self.deletes.iter().chain(&self.adds).cloned().collect()
    }
}

/// Builds the delete/add sequence that moves `shape_ids` under
/// `target_parent_id` in frame `target_frame_id`.
///
/// Moved roots get the target parent and frame. Below them, a shape that is
/// itself a frame becomes the frame of its own children; every other shape
/// passes its frame down unchanged. Containers have their `shapes` list
/// rewritten to the children that move with them.
///
/// When `index` is set, roots are inserted at consecutive positions
/// starting there.
#[must_use]
pub fn build_reparent<S: AsRef<str>>(
    tree: &ShapeTree<'_>,
    page_id: &str,
    shape_ids: &[S],
    target_parent_id: &str,
    target_frame_id: &str,
    index: Option<usize>,
) -> ReparentPlan {
    let roots = tree.normalize_roots(shape_ids);
    let subtree = tree.subtree(&roots);

    let deletes = roots
        .iter()
        .filter(|id| tree.contains(id))
        .map(|id| Change::del_obj(page_id, id))
        .collect();

    let mut adds = Vec::with_capacity(subtree.len());
    let mut stack: Vec<(String, String, String, Option<usize>)> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(i, id)| {
            (
                id.clone(),
                target_parent_id.to_string(),
                target_frame_id.to_string(),
                index.map(|at| at + i),
            )
        })
        .collect();
    let mut added = std::collections::HashSet::new();

    while let Some((id, parent_id, frame_id, insert_at)) = stack.pop() {
        let Some(shape) = tree.get(&id) else {
            continue;
        };
        if !added.insert(id.clone()) {
            continue;
        }

        let children: Vec<String> = tree
            .children(&id)
            .into_iter()
            .filter(|child| subtree.contains(child))
            .map(str::to_string)
            .collect();

        let mut obj = shape.relinked(&parent_id, &frame_id);
        if shape.has_shapes_array()
            || shape.is_kind(ShapeKind::Group)
            || shape.is_kind(ShapeKind::Frame)
        {
            obj.insert("shapes".into(), json!(children));
        }

        let mut change = Change::add_obj(page_id, &parent_id, &frame_id, obj);
        if let Change::AddObj { index, .. } = &mut change {
            *index = insert_at;
        }
        adds.push(change);

        let child_frame = if shape.is_kind(ShapeKind::Frame) {
            id.clone()
        } else {
            frame_id.clone()
        };
        for child in children.into_iter().rev() {
            stack.push((child, id.clone(), child_frame.clone(), None));
        }
    }

    ReparentPlan {
        roots,
        subtree,
        deletes,
        adds,
    }
}

/// A validated move request.
#[derive(Debug, Clone)]
pub struct MovePlan {
    /// Resolved destination container.
    pub target_parent_id: String,
    /// Frame context of the destination.
    pub target_frame_id: String,
    pub reparent: ReparentPlan,
}

impl MovePlan {
    /// Result payload reported to the caller.
    #[must_use]
    pub fn summary(&self) -> Value {
        json!({
            "parentId": self.target_parent_id,
            "frameId": self.target_frame_id,
            "rootShapeIds": self.reparent.roots,
            "movedShapeCount": self.reparent.subtree.len(),
        })
    }
}

/// Validates and plans moving `shape_ids` under `parent_id`.
///
/// Passing the page ID as `parent_id` targets the page root frame.
///
/// # Errors
///
/// - `ValidationFailed` for an empty selection
/// - `NotFound` for a missing parent or shapes
/// - `PreconditionFailed` when the parent is one of the moved shapes or
///   lies inside the moved subtree
pub fn plan_move(
    page: &Page,
    shape_ids: &[String],
    parent_id: &str,
    index: Option<usize>,
) -> Result<MovePlan, ToolError> {
    let ids = unique_ids(shape_ids);
    if ids.is_empty() {
        return Err(ToolError::validation(
            "shapeIds must contain at least one shape ID",
        ));
    }

    let tree = page.tree();
    let target_parent_id = tree.resolve_parent(parent_id, &page.id).to_string();
    if !tree.contains(&target_parent_id) {
        return Err(ToolError::not_found("Parent shape", target_parent_id));
    }
    super::require_shapes(&tree, &ids)?;

    if ids.contains(&target_parent_id) {
        return Err(ToolError::precondition(
            "parentId cannot be one of the shapeIds being moved",
        ));
    }

    let target_frame_id = tree.frame_context_for(&target_parent_id, &page.id).to_string();
    let reparent = build_reparent(
        &tree,
        &page.id,
        &ids,
        &target_parent_id,
        &target_frame_id,
        index,
    );

    if reparent.roots.is_empty() {
        return Err(ToolError::precondition(
            "No movable root shapes resolved from shapeIds",
        ));
    }
    if reparent.subtree.contains(&target_parent_id) {
        return Err(ToolError::precondition(
            "parentId cannot be inside the moved shape subtree",
        ));
    }

    Ok(MovePlan {
        target_parent_id,
        target_frame_id,
        reparent,
    })
}
