//! Split-editing policy layered over the raw setters in `operations`.
//!
//! The setters replace fields verbatim. The interactive editor goes through
//! these helpers instead, which keep `gutter >= divider thickness` while a
//! divider is visible and keep ratios away from the degenerate ends.

use std::sync::Arc;

use crate::layout::RectPx;
use crate::operations::{set_split_divider, set_split_gutter, set_split_ratio};
use crate::paths::get_node_by_id;
use crate::templates::{Direction, Divider, SplitNode, TemplateDoc};

pub const MIN_RATIO: f64 = 0.01;
pub const MAX_RATIO: f64 = 0.99;
pub const MIN_DIVIDER_THICKNESS_MM: f64 = 0.1;

pub fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return 0.5;
    }
    ratio.clamp(MIN_RATIO, MAX_RATIO)
}

/// Round to the nearest `step_percent`%. A non-positive step disables snapping.
pub fn snap_ratio(ratio: f64, step_percent: f64) -> f64 {
    if step_percent <= 0.0 {
        return ratio;
    }
    let step = step_percent / 100.0;
    (ratio / step).round() * step
}

/// Ratio implied by dragging a split's handle to `pointer` (x for vertical
/// splits, y for horizontal ones), snapped and then clamped.
pub fn ratio_from_drag(
    parent: RectPx,
    direction: Direction,
    gutter_px: f64,
    pointer: f64,
    snap_step: f64,
) -> f64 {
    let (origin, extent) = match direction {
        Direction::Vertical => (parent.x, parent.w),
        Direction::Horizontal => (parent.y, parent.h),
    };
    let available = (extent - gutter_px).max(1.0);
    let first_end = pointer - origin - gutter_px / 2.0;
    clamp_ratio(snap_ratio(first_end / available, snap_step))
}

fn split_at<'a>(doc: &'a Arc<TemplateDoc>, id: &str) -> Option<&'a SplitNode> {
    get_node_by_id(&doc.layout, id).and_then(|node| node.as_split())
}

pub fn set_split_ratio_clamped(doc: &Arc<TemplateDoc>, id: &str, ratio: f64) -> Arc<TemplateDoc> {
    set_split_ratio(doc, id, clamp_ratio(ratio))
}

/// Gutter is floored at the divider thickness while the divider is visible.
pub fn set_split_gutter_clamped(
    doc: &Arc<TemplateDoc>,
    id: &str,
    gutter_mm: f64,
) -> Arc<TemplateDoc> {
    let Some(split) = split_at(doc, id) else {
        return Arc::clone(doc);
    };
    let mut gutter = gutter_mm.max(0.0);
    if split.divider_visible() {
        gutter = gutter.max(split.divider_thickness());
    }
    set_split_gutter(doc, id, Some(gutter))
}

/// Turning the divider on widens a too-narrow gutter to its thickness.
pub fn set_split_divider_visible(
    doc: &Arc<TemplateDoc>,
    id: &str,
    visible: bool,
) -> Arc<TemplateDoc> {
    let Some(split) = split_at(doc, id) else {
        return Arc::clone(doc);
    };
    let divider = Divider {
        visible: Some(visible),
        ..current_divider(split)
    };
    let thickness = divider.thickness();
    let gutter = split.gutter();
    let next = set_split_divider(doc, id, Some(divider));
    if visible && gutter < thickness {
        return set_split_gutter(&next, id, Some(thickness));
    }
    next
}

/// Thickness is floored at 0.1 mm; a visible divider drags the gutter along.
pub fn set_split_divider_thickness(
    doc: &Arc<TemplateDoc>,
    id: &str,
    thickness_mm: f64,
) -> Arc<TemplateDoc> {
    let Some(split) = split_at(doc, id) else {
        return Arc::clone(doc);
    };
    let thickness = thickness_mm.max(MIN_DIVIDER_THICKNESS_MM);
    let divider = Divider {
        thickness_mm: Some(thickness),
        ..current_divider(split)
    };
    let visible = divider.is_visible();
    let gutter = split.gutter();
    let next = set_split_divider(doc, id, Some(divider));
    if visible && gutter < thickness {
        return set_split_gutter(&next, id, Some(thickness));
    }
    next
}

fn current_divider(split: &SplitNode) -> Divider {
    split.divider.clone().unwrap_or(Divider {
        visible: Some(false),
        thickness_mm: Some(crate::templates::DEFAULT_DIVIDER_THICKNESS_MM),
    })
}
