//! Read-only tree view over a page's flat shape map.
//!
//! A container's children can be recorded two ways: in its ordered
//! `shapes` array, or by each child pointing back at it with `parentId`.
//! Real documents sometimes populate only one of the two. The union is
//! treated as authoritative, with the `shapes` order first and
//! back-referenced stragglers appended in map order. This is the only place
//! that reconciliation happens.

use std::collections::{HashMap, HashSet};

use crate::document::shape::{Bounds, Shape, ShapeKind};
use crate::document::Objects;

/// The closure of one or more subtrees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subtree {
    /// Pre-order: every parent precedes its children.
    pub ordered: Vec<String>,
    /// The same IDs, for membership checks.
    pub ids: HashSet<String>,
}

impl Subtree {
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Parent/child/frame relationships over a page's objects.
pub struct ShapeTree<'a> {
    objects: &'a Objects,
    back_refs: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> ShapeTree<'a> {
    /// Indexes the `parentId` back-references of `objects`.
    #[must_use]
    pub fn new(objects: &'a Objects) -> Self {
        let mut back_refs: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for (id, shape) in objects {
            if let Some(parent) = shape.parent_id() {
                // The page root frame points at itself
                if parent != id.as_str() {
                    back_refs.entry(parent).or_default().push(id.as_str());
                }
            }
        }
        Self { objects, back_refs }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&'a Shape> {
        self.objects.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    #[must_use]
    pub const fn objects(&self) -> &'a Objects {
        self.objects
    }

    /// Children of `id`: the `shapes` list unioned with back-references.
    ///
    /// Returns an empty list for unknown IDs. Child IDs are not checked for
    /// existence here; traversals skip dangling ones.
    #[must_use]
    pub fn children(&self, id: &str) -> Vec<&'a str> {
        let Some(shape) = self.objects.get(id) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut children = Vec::new();

        for child in shape.listed_children() {
            if child != id && seen.insert(child) {
                children.push(child);
            }
        }
        if let Some(refs) = self.back_refs.get(id) {
            for &child in refs {
                if seen.insert(child) {
                    children.push(child);
                }
            }
        }

        children
    }

    /// Pre-order closure of the subtrees rooted at `roots`.
    ///
    /// Missing IDs are skipped and a visited set guards against cycles in
    /// malformed documents.
    #[must_use]
    pub fn subtree<S: AsRef<str>>(&self, roots: &[S]) -> Subtree {
        let mut out = Subtree::default();
        let mut stack: Vec<&str> = roots.iter().rev().map(AsRef::as_ref).collect();

        while let Some(id) = stack.pop() {
            if out.ids.contains(id) {
                continue;
            }
            let Some((key, _)) = self.objects.get_key_value(id) else {
                tracing::debug!(shape_id = id, "Skipping dangling shape reference");
                continue;
            };
            out.ids.insert(key.clone());
            out.ordered.push(key.clone());

            for child in self.children(key).into_iter().rev() {
                if !out.ids.contains(child) {
                    stack.push(child);
                }
            }
        }

        out
    }

    /// Number of shapes strictly below `id`.
    #[must_use]
    pub fn descendant_count(&self, id: &str) -> usize {
        self.subtree(&[id]).len().saturating_sub(1)
    }

    /// Parent chain of `id`, nearest first. Stops at cycles or missing shapes.
    #[must_use]
    pub fn ancestors(&self, id: &str) -> Vec<&'a str> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(id);

        let mut current = self.objects.get(id).and_then(Shape::parent_id);
        while let Some(parent) = current {
            if !visited.insert(parent) {
                break;
            }
            let Some(parent_shape) = self.objects.get(parent) else {
                break;
            };
            chain.push(parent_shape.id());
            current = parent_shape.parent_id();
        }

        chain
    }

    /// Whether `ancestor` appears in the parent chain of `id`.
    #[must_use]
    pub fn is_ancestor_of(&self, ancestor: &str, id: &str) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Drops every ID that has a transitive parent also in the input.
    ///
    /// Input order is kept and duplicates are removed, so naming a container
    /// together with one of its descendants yields just the container.
    #[must_use]
    pub fn normalize_roots<S: AsRef<str>>(&self, ids: &[S]) -> Vec<String> {
        let selected: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let mut emitted = HashSet::new();

        ids.iter()
            .map(AsRef::as_ref)
            .filter(|id| {
                !self
                    .ancestors(id)
                    .iter()
                    .any(|ancestor| selected.contains(ancestor))
            })
            .filter(|id| emitted.insert(*id))
            .map(str::to_string)
            .collect()
    }

    /// The page root frame: a frame with no parent, or parented to itself.
    #[must_use]
    pub fn root_frame_id(&self) -> Option<&'a str> {
        self.objects
            .iter()
            .find(|(id, shape)| {
                shape.is_kind(ShapeKind::Frame)
                    && shape.parent_id().map_or(true, |parent| parent == id.as_str())
            })
            .map(|(id, _)| id.as_str())
    }

    /// The frame that children of `parent_id` belong to.
    ///
    /// A frame is its own children's frame; any other container passes on
    /// its own `frameId`. Falls back to the page root frame, then to
    /// `page_id`.
    #[must_use]
    pub fn frame_context_for(&self, parent_id: &str, page_id: &'a str) -> &'a str {
        match self.objects.get_key_value(parent_id) {
            Some((id, shape)) if shape.is_kind(ShapeKind::Frame) => id.as_str(),
            Some((_, shape)) => shape
                .frame_id()
                .or_else(|| self.root_frame_id())
                .unwrap_or(page_id),
            None => self.root_frame_id().unwrap_or(page_id),
        }
    }

    /// Resolves a caller-supplied parent: the page ID means the root frame.
    #[must_use]
    pub fn resolve_parent<'b>(&self, parent_id: &'b str, page_id: &str) -> &'b str
    where
        'a: 'b,
    {
        if parent_id == page_id {
            self.root_frame_id().unwrap_or(parent_id)
        } else {
            parent_id
        }
    }

    /// Bounds of `id`, if the shape exists.
    #[must_use]
    pub fn bounds(&self, id: &str) -> Option<Bounds> {
        self.objects.get(id).map(Shape::bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    pub(crate) fn objects(shapes: &[Value]) -> Objects {
        shapes
            .iter()
            .map(|v| {
                let id = v["id"].as_str().unwrap().to_string();
                (id.clone(), Shape::from_raw(id, v.as_object().unwrap().clone()))
            })
            .collect()
    }

    fn sample() -> Objects {
        objects(&[
            json!({"id": "root", "type": "frame", "parentId": "root", "frameId": "root", "shapes": ["board"]}),
            json!({"id": "board", "type": "frame", "parentId": "root", "frameId": "root", "shapes": ["g"]}),
            json!({"id": "g", "type": "group", "parentId": "board", "frameId": "board", "shapes": ["a"]}),
            json!({"id": "a", "type": "rect", "parentId": "g", "frameId": "board"}),
            // Only linked by back-reference
            json!({"id": "b", "type": "rect", "parent-id": "g", "frame-id": "board"}),
        ])
    }

    #[test]
    fn children_union_of_both_linkages() {
        let objs = sample();
        let tree = ShapeTree::new(&objs);
        assert_eq!(tree.children("g"), vec!["a", "b"]);
    }

    #[test]
    fn children_same_with_either_linkage() {
        let shapes_only = objects(&[
            json!({"id": "g", "type": "group", "shapes": ["a", "b"]}),
            json!({"id": "a", "type": "rect"}),
            json!({"id": "b", "type": "rect"}),
        ]);
        let refs_only = objects(&[
            json!({"id": "g", "type": "group"}),
            json!({"id": "a", "type": "rect", "parentId": "g"}),
            json!({"id": "b", "type": "rect", "parentId": "g"}),
        ]);
        let both = objects(&[
            json!({"id": "g", "type": "group", "shapes": ["a", "b"]}),
            json!({"id": "a", "type": "rect", "parentId": "g"}),
            json!({"id": "b", "type": "rect", "parentId": "g"}),
        ]);

        let expected: HashSet<&str> = ["a", "b"].into_iter().collect();
        for objs in [&shapes_only, &refs_only, &both] {
            let tree = ShapeTree::new(objs);
            let got: HashSet<&str> = tree.children("g").into_iter().collect();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn subtree_is_preorder() {
        let objs = sample();
        let tree = ShapeTree::new(&objs);
        let sub = tree.subtree(&["board"]);
        assert_eq!(sub.ordered, vec!["board", "g", "a", "b"]);
        assert!(sub.contains("b"));
        assert_eq!(tree.descendant_count("board"), 3);
    }

    #[test]
    fn subtree_survives_cycles_and_dangling_ids() {
        let objs = objects(&[
            json!({"id": "x", "type": "group", "shapes": ["y", "ghost"]}),
            json!({"id": "y", "type": "group", "shapes": ["x"]}),
        ]);
        let tree = ShapeTree::new(&objs);
        let sub = tree.subtree(&["x"]);
        assert_eq!(sub.ordered, vec!["x", "y"]);
    }

    #[test]
    fn normalize_drops_descendants() {
        let objs = sample();
        let tree = ShapeTree::new(&objs);
        assert_eq!(tree.normalize_roots(&["a", "g"]), vec!["g"]);
        assert_eq!(tree.normalize_roots(&["g", "a", "b"]), vec!["g"]);
        assert_eq!(tree.normalize_roots(&["a", "b", "a"]), vec!["a", "b"]);
    }

    #[test]
    fn ancestors_stop_at_self_parented_root() {
        let objs = sample();
        let tree = ShapeTree::new(&objs);
        assert_eq!(tree.ancestors("a"), vec!["g", "board", "root"]);
        assert!(tree.is_ancestor_of("board", "b"));
        assert!(!tree.is_ancestor_of("a", "board"));
    }

    #[test]
    fn root_frame_and_frame_context() {
        let objs = sample();
        let tree = ShapeTree::new(&objs);
        assert_eq!(tree.root_frame_id(), Some("root"));
        assert_eq!(tree.frame_context_for("board", "page"), "board");
        assert_eq!(tree.frame_context_for("g", "page"), "board");
        assert_eq!(tree.frame_context_for("missing", "page"), "root");
        assert_eq!(tree.resolve_parent("page", "page"), "root");
    }

    #[test]
    fn frame_context_without_root_frame_uses_page() {
        let objs = objects(&[json!({"id": "a", "type": "rect"})]);
        let tree = ShapeTree::new(&objs);
        assert_eq!(tree.root_frame_id(), None);
        assert_eq!(tree.frame_context_for("a", "page"), "page");
    }
}
