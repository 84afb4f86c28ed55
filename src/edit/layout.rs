//! Alignment and distribution of a selection.

use std::str::FromStr;

use crate::document::shape::rect_geometry;
use crate::document::{Bounds, Change, Operation, Page, Shape};
use crate::error::ToolError;

/// Edge or centre line to align to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
}

impl FromStr for Alignment {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            "top" => Ok(Self::Top),
            "middle" => Ok(Self::Middle),
            "bottom" => Ok(Self::Bottom),
            other => Err(ToolError::validation(format!(
                "Invalid alignment type: {other}"
            ))),
        }
    }
}

/// Axis for distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Horizontal,
    Vertical,
}

impl FromStr for Direction {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "horizontal" => Ok(Self::Horizontal),
            "vertical" => Ok(Self::Vertical),
            other => Err(ToolError::validation(format!(
                "Invalid distribution direction: {other}"
            ))),
        }
    }
}

/// `set` operations moving `shape` so its top-left corner is at `(x, y)`.
///
/// The derived geometry (`selrect`, `points`) moves with it.
#[must_use]
pub fn move_to_ops(shape: &Shape, x: f64, y: f64) -> Vec<Operation> {
    let bounds = shape.bounds();
    let geometry = rect_geometry(x, y, bounds.width(), bounds.height());
    ["x", "y", "selrect", "points"]
        .into_iter()
        .filter_map(|attr| geometry.get(attr).map(|val| Operation::set(attr, val.clone())))
        .collect()
}

fn selection<'a>(page: &'a Page, shape_ids: &[String]) -> Result<Vec<(&'a Shape, Bounds)>, ToolError> {
    let missing: Vec<String> = shape_ids
        .iter()
        .filter(|id| !page.objects.contains_key(id.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ToolError::ShapesNotFound { ids: missing });
    }
    Ok(shape_ids
        .iter()
        .filter_map(|id| page.objects.get(id))
        .map(|shape| (shape, shape.bounds()))
        .collect())
}

fn moved(page_id: &str, shape: &Shape, bounds: Bounds, x: f64, y: f64) -> Option<Change> {
    #[allow(clippy::float_cmp)]
    let unchanged = bounds.x1 == x && bounds.y1 == y;
    (!unchanged).then(|| Change::mod_obj(page_id, shape.id(), move_to_ops(shape, x, y)))
}

/// `mod-obj` changes aligning the selection; shapes already in place are
/// skipped.
///
/// # Errors
///
/// Fails for fewer than two shapes or missing shapes.
pub fn plan_align(
    page: &Page,
    shape_ids: &[String],
    alignment: Alignment,
) -> Result<Vec<Change>, ToolError> {
    if shape_ids.len() < 2 {
        return Err(ToolError::validation(
            "At least 2 shapes are required for alignment",
        ));
    }
    let shapes = selection(page, shape_ids)?;
    let Some(outer) = Bounds::enclosing(shapes.iter().map(|(_, b)| *b)) else {
        return Ok(Vec::new());
    };

    Ok(shapes
        .iter()
        .filter_map(|&(shape, b)| {
            let (x, y) = match alignment {
                Alignment::Left => (outer.x1, b.y1),
                Alignment::Center => ((outer.x1 + outer.x2) / 2.0 - b.width() / 2.0, b.y1),
                Alignment::Right => (outer.x2 - b.width(), b.y1),
                Alignment::Top => (b.x1, outer.y1),
                Alignment::Middle => (b.x1, (outer.y1 + outer.y2) / 2.0 - b.height() / 2.0),
                Alignment::Bottom => (b.x1, outer.y2 - b.height()),
            };
            moved(&page.id, shape, b, x, y)
        })
        .collect())
}

/// `mod-obj` changes spacing the selection evenly along `direction`.
///
/// The outermost shapes stay fixed; the ones between them are placed with
/// equal gaps.
///
/// # Errors
///
/// Fails for fewer than three shapes or missing shapes.
pub fn plan_distribute(
    page: &Page,
    shape_ids: &[String],
    direction: Direction,
) -> Result<Vec<Change>, ToolError> {
    if shape_ids.len() < 3 {
        return Err(ToolError::validation(
            "At least 3 shapes are required for distribution",
        ));
    }
    let mut shapes = selection(page, shape_ids)?;

    let (start, extent): (fn(&Bounds) -> f64, fn(&Bounds) -> f64) = match direction {
        Direction::Horizontal => (|b: &Bounds| b.x1, Bounds::width),
        Direction::Vertical => (|b: &Bounds| b.y1, Bounds::height),
    };
    shapes.sort_by(|(_, a), (_, b)| start(a).total_cmp(&start(b)));

    let (Some((_, first)), Some((_, last))) = (shapes.first(), shapes.last()) else {
        return Ok(Vec::new());
    };
    let span = start(last) - (start(first) + extent(first));
    let middle = &shapes[1..shapes.len() - 1];
    let occupied: f64 = middle.iter().map(|(_, b)| extent(b)).sum();
    #[allow(clippy::cast_precision_loss)]
    let gap = (span - occupied) / (shapes.len() - 1) as f64;

    let mut cursor = start(first) + extent(first) + gap;
    let mut changes = Vec::new();
    for &(shape, b) in middle {
        let (x, y) = match direction {
            Direction::Horizontal => (cursor, b.y1),
            Direction::Vertical => (b.x1, cursor),
        };
        changes.extend(moved(&page.id, shape, b, x, y));
        cursor += extent(&b) + gap;
    }
    Ok(changes)
}
