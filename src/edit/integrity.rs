//! Structural checks for components, pages and deletions.
//!
//! A component's health is derived from its main instance every time it is
//! asked for; nothing is stored. The classification gates instantiation and
//! component creation, and [`plan_repair`] is the way out of the broken
//! state.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::document::{Change, Component, Document, Page, Shape, ShapeTree};
use crate::error::{InstanceRef, ToolError};

use super::reparent::{build_reparent, ReparentPlan};
use super::unique_ids;

/// Health of a component root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootState {
    /// A container with no children under either linkage.
    ShellContainer,
    ContainerWithChildren,
    /// Not a container at all.
    PrimitiveRoot,
}

impl RootState {
    #[must_use]
    pub fn classify(tree: &ShapeTree<'_>, root: &Shape) -> Self {
        if !root.is_container() {
            Self::PrimitiveRoot
        } else if tree.children(root.id()).is_empty() {
            Self::ShellContainer
        } else {
            Self::ContainerWithChildren
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShellContainer => "shell_container",
            Self::ContainerWithChildren => "container_with_children",
            Self::PrimitiveRoot => "primitive_root",
        }
    }
}

/// A component's resolved main instance.
#[derive(Debug, Clone)]
pub struct MainInstance<'a> {
    pub component: &'a Component,
    pub page: &'a Page,
    pub shape: &'a Shape,
    pub state: RootState,
    /// No live parent or frame links to this shape.
    pub orphaned: bool,
}

fn is_orphaned(tree: &ShapeTree<'_>, shape: &Shape) -> bool {
    let linked = |id: Option<&str>| id.is_some_and(|id| tree.contains(id));
    !(linked(shape.parent_id()) && linked(shape.frame_id()))
}

/// Resolves the main instance of a live component.
///
/// An orphaned main instance is reported, not rejected.
///
/// # Errors
///
/// `NotFound` when the component, its page or its main-instance shape is
/// missing.
pub fn locate_main_instance<'a>(
    document: &'a Document,
    component_id: &str,
) -> Result<MainInstance<'a>, ToolError> {
    let component = document
        .component(component_id)
        .ok_or_else(|| ToolError::not_found("Component", component_id))?;

    let page_id = component.main_instance_page.as_deref().unwrap_or_default();
    let page = document
        .page(page_id)
        .ok_or_else(|| ToolError::not_found("Main instance page", page_id))?;

    let shape_id = component.main_instance_id.as_deref().unwrap_or_default();
    let shape = page
        .objects
        .get(shape_id)
        .ok_or_else(|| ToolError::not_found("Main instance shape", shape_id))?;

    let tree = page.tree();
    let state = RootState::classify(&tree, shape);
    let orphaned = is_orphaned(&tree, shape);
    if orphaned {
        warn!(
            component_id,
            page_id,
            shape_id,
            "Main instance is not attached to any frame"
        );
    }

    Ok(MainInstance {
        component,
        page,
        shape,
        state,
        orphaned,
    })
}

/// Resolves a main instance and refuses shell containers.
///
/// # Errors
///
/// `NotFound` as for [`locate_main_instance`]; `InvalidSourceState` when
/// the main instance is a shell container.
pub fn require_instantiable<'a>(
    document: &'a Document,
    file_id: &str,
    component_id: &str,
) -> Result<MainInstance<'a>, ToolError> {
    let main = locate_main_instance(document, component_id)?;
    if main.state == RootState::ShellContainer {
        return Err(ToolError::InvalidSourceState {
            component_id: component_id.to_string(),
            file_id: file_id.to_string(),
            state: main.state.as_str().to_string(),
        });
    }
    Ok(main)
}

/// Read-only integrity summary of a component.
///
/// # Errors
///
/// As for [`locate_main_instance`].
pub fn integrity_report(document: &Document, component_id: &str) -> Result<Value, ToolError> {
    let main = locate_main_instance(document, component_id)?;
    let tree = main.page.tree();
    Ok(json!({
        "componentId": main.component.id,
        "name": main.component.name,
        "fileId": document.id,
        "mainInstanceId": main.shape.id(),
        "mainInstancePage": main.page.id,
        "rootType": main.shape.type_name(),
        "state": main.state,
        "childCount": tree.children(main.shape.id()).len(),
        "descendantCount": tree.descendant_count(main.shape.id()),
        "orphaned": main.orphaned,
    }))
}

/// Refuses an empty container as a new component's root.
///
/// # Errors
///
/// `EmptySourceRoot` unless `allow_empty_root` is set.
pub fn check_component_root(
    page: &Page,
    shape: &Shape,
    allow_empty_root: bool,
) -> Result<RootState, ToolError> {
    let state = RootState::classify(&page.tree(), shape);
    if state == RootState::ShellContainer && !allow_empty_root {
        return Err(ToolError::EmptySourceRoot {
            shape_id: shape.id().to_string(),
        });
    }
    Ok(state)
}

/// Change lists that attach children to a component's main instance.
///
/// Submitted in order: removal of the moving children (and, when
/// overwriting, of the root's previous descendants), removal of the root,
/// the re-added root with its new `shapes` list, then the children.
#[derive(Debug, Clone)]
pub struct RepairPlan {
    pub component_id: String,
    pub root_id: String,
    pub stale: Vec<String>,
    pub reparent: ReparentPlan,
    pub steps: Vec<Vec<Change>>,
}

impl RepairPlan {
    #[must_use]
    pub fn summary(&self) -> Value {
        json!({
            "componentId": self.component_id,
            "mainInstanceId": self.root_id,
            "childShapeIds": self.reparent.roots,
            "movedShapeCount": self.reparent.subtree.len(),
            "removedShapeCount": self.stale.len(),
        })
    }
}

/// Plans attaching `child_ids` under the main instance of `component_id`.
///
/// # Errors
///
/// - `ValidationFailed` for an empty child list
/// - `NotFound` for a missing component, main instance or child
/// - `PreconditionFailed` when the root is not a container, already has
///   descendants and `overwrite` is off, or a child is the root or one of
///   its ancestors
pub fn plan_repair(
    document: &Document,
    component_id: &str,
    child_ids: &[String],
    overwrite: bool,
) -> Result<RepairPlan, ToolError> {
    let ids = unique_ids(child_ids);
    if ids.is_empty() {
        return Err(ToolError::validation(
            "childShapeIds must contain at least one shape ID",
        ));
    }

    let main = locate_main_instance(document, component_id)?;
    let page = main.page;
    let root = main.shape;
    let root_id = root.id().to_string();
    let tree = page.tree();

    if !root.is_container() {
        return Err(ToolError::precondition(format!(
            "Component root {root_id} is a {} shape, not a container",
            root.type_name()
        )));
    }

    let existing = tree.subtree(&[root_id.as_str()]);
    let existing_count = existing.len().saturating_sub(1);
    if existing_count > 0 && !overwrite {
        return Err(ToolError::precondition(format!(
            "Component root {root_id} already has {existing_count} descendant(s); set overwrite to replace them"
        )));
    }

    super::require_shapes(&tree, &ids)?;
    if let Some(bad) = ids
        .iter()
        .find(|id| **id == root_id || tree.is_ancestor_of(id, &root_id))
    {
        return Err(ToolError::precondition(format!(
            "Shape {bad} is the component root or one of its ancestors"
        )));
    }

    let frame_id = tree.frame_context_for(&root_id, &page.id).to_string();
    let reparent = build_reparent(&tree, &page.id, &ids, &root_id, &frame_id, None);

    let stale: Vec<String> = existing
        .ordered
        .iter()
        .skip(1)
        .filter(|id| !reparent.subtree.contains(id))
        .rev()
        .cloned()
        .collect();

    let parent_id = root
        .parent_id()
        .filter(|p| tree.contains(p))
        .or_else(|| tree.root_frame_id())
        .unwrap_or(&page.id);
    let root_frame = root
        .frame_id()
        .filter(|f| tree.contains(f))
        .unwrap_or_else(|| tree.frame_context_for(parent_id, &page.id));
    // Position among the siblings that remain once step one has run.
    let position = tree
        .children(parent_id)
        .into_iter()
        .filter(|id| {
            *id == root_id || !(reparent.subtree.contains(id) || stale.iter().any(|s| s == id))
        })
        .position(|id| id == root_id);

    let mut obj = root.relinked(parent_id, root_frame);
    obj.insert("shapes".into(), json!(reparent.roots));
    let mut add_root = Change::add_obj(&page.id, parent_id, root_frame, obj);
    if let Change::AddObj { index, .. } = &mut add_root {
        *index = position;
    }

    let mut first = reparent.deletes.clone();
    first.extend(stale.iter().map(|id| Change::del_obj(&page.id, id)));

    let steps = vec![
        first,
        vec![Change::del_obj(&page.id, &root_id)],
        vec![add_root],
        reparent.adds.clone(),
    ];

    Ok(RepairPlan {
        component_id: component_id.to_string(),
        root_id,
        stale,
        reparent,
        steps,
    })
}

/// Instances of a component outside its main instance.
///
/// `defining` is the file that owns the component; `consumers` are other
/// files that may use it through a library link.
#[must_use]
pub fn find_instances(
    defining: &Document,
    component: &Component,
    consumers: &[Document],
) -> Vec<InstanceRef> {
    let mut found = Vec::new();
    for document in std::iter::once(defining).chain(consumers) {
        let local = document.id == defining.id;
        for page in document.ordered_pages() {
            for shape in page.objects.values() {
                if shape.component_id() != Some(component.id.as_str()) {
                    continue;
                }
                let same_file = match shape.component_file() {
                    Some(file) => file == defining.id,
                    None => local,
                };
                if !same_file {
                    continue;
                }
                let is_main = local
                    && (shape.main_instance_flag()
                        || (component.main_instance_id.as_deref() == Some(shape.id())
                            && component.main_instance_page.as_deref() == Some(page.id.as_str())));
                if !is_main {
                    found.push(InstanceRef {
                        file_id: document.id.clone(),
                        page_id: page.id.clone(),
                        shape_id: shape.id().to_string(),
                    });
                }
            }
        }
    }
    found
}

/// The `del-component` change, if nothing still uses the component.
///
/// # Errors
///
/// `NotFound` for an unknown component; `ComponentInUse` listing every
/// remaining instance.
pub fn plan_delete_component(
    defining: &Document,
    component_id: &str,
    consumers: &[Document],
) -> Result<Change, ToolError> {
    let component = defining
        .component(component_id)
        .ok_or_else(|| ToolError::not_found("Component", component_id))?;

    let instances = find_instances(defining, component, consumers);
    if !instances.is_empty() {
        return Err(ToolError::ComponentInUse {
            component_id: component_id.to_string(),
            instances,
        });
    }
    Ok(Change::DelComponent {
        id: component_id.to_string(),
    })
}

/// The `del-page` change, if the page may go.
///
/// # Errors
///
/// `NotFound` for an unknown page, `LastPage` for the only page, and
/// `PageHostsComponents` when main instances live on it.
pub fn plan_delete_page(document: &Document, page_id: &str) -> Result<Change, ToolError> {
    if !document.pages_index.contains_key(page_id) && !document.pages.iter().any(|p| p == page_id) {
        return Err(ToolError::not_found("Page", page_id));
    }
    if document.pages.len() <= 1 {
        return Err(ToolError::LastPage);
    }

    let component_ids: Vec<String> = document
        .live_components()
        .filter(|c| c.main_instance_page.as_deref() == Some(page_id))
        .map(|c| c.id.clone())
        .collect();
    if !component_ids.is_empty() {
        return Err(ToolError::PageHostsComponents {
            page_id: page_id.to_string(),
            component_ids,
        });
    }

    Ok(Change::DelPage {
        id: page_id.to_string(),
    })
}

/// One `del-obj` per member of the shape's subtree, children before their
/// parents.
///
/// # Errors
///
/// `NotFound` when the shape does not exist.
pub fn plan_delete_shape(page: &Page, shape_id: &str) -> Result<Vec<Change>, ToolError> {
    super::require_shape(page, shape_id)?;
    let subtree = page.tree().subtree(&[shape_id]);
    Ok(subtree
        .ordered
        .iter()
        .rev()
        .map(|id| Change::del_obj(&page.id, id))
        .collect())
}
