//! Geometry Resolver - Split Tree to Pixel Rectangles
//!
//! Whole-tree, top-down, no caching. Along a split axis the first child gets
//! `floor(available * ratio)` pixels and the second child the remainder, so
//! `first + gutter + second` always equals the parent extent.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::paths::NodeId;
use crate::resolve::builtin;
use crate::templates::{Direction, Node, PaddingMm, TemplateDoc};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RectPx {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl RectPx {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Shrink by `[top, right, bottom, left]` pixels; size never goes negative.
    pub fn inset(self, [top, right, bottom, left]: [f64; 4]) -> Self {
        Self {
            x: self.x + left,
            y: self.y + top,
            w: (self.w - left - right).max(0.0),
            h: (self.h - top - bottom).max(0.0),
        }
    }

    /// Half-open containment: the right and bottom edges belong to the neighbour.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutOptions {
    pub scale_px_per_mm: f64,
    /// Leaf padding used where a leaf sets none.
    pub default_leaf_padding_mm: PaddingMm,
}

impl LayoutOptions {
    pub fn new(scale_px_per_mm: f64) -> Self {
        Self {
            scale_px_per_mm,
            default_leaf_padding_mm: builtin::LEAF_PADDING_MM,
        }
    }

    /// Scale plus the document's inherited leaf padding.
    pub fn for_document(doc: &TemplateDoc, scale_px_per_mm: f64) -> Self {
        Self {
            scale_px_per_mm,
            default_leaf_padding_mm: doc
                .defaults
                .as_ref()
                .and_then(|d| d.leaf_padding_mm)
                .unwrap_or(builtin::LEAF_PADDING_MM),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeafRender {
    pub node_id: NodeId,
    pub alias: Option<String>,
    pub rect: RectPx,
    /// `rect` minus the leaf padding.
    pub padded_rect: RectPx,
    /// `padded_rect` minus the element padding: where the element draws.
    pub content_rect: RectPx,
    #[serde(skip)]
    pub node: Arc<Node>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitRender {
    pub node_id: NodeId,
    pub alias: Option<String>,
    pub direction: Direction,
    pub rect: RectPx,
    pub gutter_rect: RectPx,
    pub divider_rect: Option<RectPx>,
    #[serde(skip)]
    pub node: Arc<Node>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutRender {
    pub root_rect: RectPx,
    pub leaves: Vec<LeafRender>,
    pub splits: Vec<SplitRender>,
    pub alias_to_id: BTreeMap<String, NodeId>,
}

impl LayoutRender {
    pub fn leaf(&self, id: &NodeId) -> Option<&LeafRender> {
        self.leaves.iter().find(|l| &l.node_id == id)
    }

    pub fn split(&self, id: &NodeId) -> Option<&SplitRender> {
        self.splits.iter().find(|s| &s.node_id == id)
    }

    pub fn rect_of(&self, id: &NodeId) -> Option<RectPx> {
        self.leaf(id)
            .map(|l| l.rect)
            .or_else(|| self.split(id).map(|s| s.rect))
    }

    pub fn rect_of_alias(&self, alias: &str) -> Option<RectPx> {
        self.alias_to_id.get(alias).and_then(|id| self.rect_of(id))
    }

    /// Leaf under the point, if any. Gutters belong to no leaf.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<&LeafRender> {
        self.leaves.iter().find(|l| l.rect.contains(x, y))
    }
}

pub fn compute_layout(
    root: &Arc<Node>,
    width_mm: f64,
    height_mm: f64,
    opts: LayoutOptions,
) -> LayoutRender {
    let scale = opts.scale_px_per_mm;
    let root_rect = RectPx::new(0.0, 0.0, width_mm * scale, height_mm * scale);
    let mut out = LayoutRender {
        root_rect,
        leaves: Vec::new(),
        splits: Vec::new(),
        alias_to_id: BTreeMap::new(),
    };
    walk(root, NodeId::root(), root_rect, &opts, &mut out);
    out
}

/// Layout of a whole document, inheriting its default leaf padding.
pub fn compute_document_layout(
    doc: &TemplateDoc,
    width_mm: f64,
    height_mm: f64,
    scale_px_per_mm: f64,
) -> LayoutRender {
    compute_layout(
        &doc.layout,
        width_mm,
        height_mm,
        LayoutOptions::for_document(doc, scale_px_per_mm),
    )
}

fn mm_to_px(padding: PaddingMm, scale: f64) -> [f64; 4] {
    padding.map(|v| v * scale)
}

fn walk(
    node: &Arc<Node>,
    node_id: NodeId,
    rect: RectPx,
    opts: &LayoutOptions,
    out: &mut LayoutRender,
) {
    let scale = opts.scale_px_per_mm;
    let alias = node.alias().map(str::to_string);
    if let Some(alias) = &alias {
        // first node in pre-order wins, as with `resolve_alias`
        out.alias_to_id.entry(alias.clone()).or_insert_with(|| node_id.clone());
    }

    let split = match node.as_ref() {
        Node::Leaf(leaf) => {
            let padding = leaf.padding_mm.unwrap_or(opts.default_leaf_padding_mm);
            let padded_rect = rect.inset(mm_to_px(padding, scale));
            let element_padding = leaf.element().base().padding_mm.unwrap_or([0.0; 4]);
            let content_rect = padded_rect.inset(mm_to_px(element_padding, scale));
            out.leaves.push(LeafRender {
                node_id,
                alias,
                rect,
                padded_rect,
                content_rect,
                node: Arc::clone(node),
            });
            return;
        }
        Node::Split(split) => split,
    };

    let gutter = split.gutter() * scale;
    let thickness = (split.divider_thickness() * scale).max(1.0);
    let (first, gutter_rect, second, divider_rect) = match split.direction {
        Direction::Vertical => {
            let available = (rect.w - gutter).max(0.0);
            let first_w = (available * split.ratio).floor();
            let second_w = available - first_w;
            let gutter_rect = RectPx::new(rect.x + first_w, rect.y, gutter, rect.h);
            (
                RectPx::new(rect.x, rect.y, first_w, rect.h),
                gutter_rect,
                RectPx::new(rect.x + first_w + gutter, rect.y, second_w, rect.h),
                RectPx::new(
                    gutter_rect.x + (gutter_rect.w - thickness) / 2.0,
                    rect.y,
                    thickness,
                    rect.h,
                ),
            )
        }
        Direction::Horizontal => {
            let available = (rect.h - gutter).max(0.0);
            let first_h = (available * split.ratio).floor();
            let second_h = available - first_h;
            let gutter_rect = RectPx::new(rect.x, rect.y + first_h, rect.w, gutter);
            (
                RectPx::new(rect.x, rect.y, rect.w, first_h),
                gutter_rect,
                RectPx::new(rect.x, rect.y + first_h + gutter, rect.w, second_h),
                RectPx::new(
                    rect.x,
                    gutter_rect.y + (gutter_rect.h - thickness) / 2.0,
                    rect.w,
                    thickness,
                ),
            )
        }
    };

    out.splits.push(SplitRender {
        node_id: node_id.clone(),
        alias,
        direction: split.direction,
        rect,
        gutter_rect,
        divider_rect: split.divider_visible().then_some(divider_rect),
        node: Arc::clone(node),
    });
    walk(&split.children[0], node_id.child(0), first, opts, out);
    walk(&split.children[1], node_id.child(1), second, opts, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{set_node_alias, set_split_gutter, set_split_ratio, split_leaf};
    use crate::paths::resolve_alias;
    use crate::policy::set_split_divider_visible;
    use crate::templates::{Element, LeafNode, TextElement};

    fn blank() -> Arc<TemplateDoc> {
        let leaf = LeafNode::new(Element::Text(TextElement::new("")));
        Arc::new(TemplateDoc::from_layout(Node::Leaf(leaf)))
    }

    #[test]
    fn test_root_rect_from_label_size() {
        let layout = compute_document_layout(&blank(), 74.0, 26.0, 8.0);
        assert_eq!(layout.root_rect, RectPx::new(0.0, 0.0, 592.0, 208.0));
        assert_eq!(layout.leaves.len(), 1);
        assert_eq!(layout.leaves[0].content_rect, layout.root_rect);
    }

    #[test]
    fn test_vertical_half_split() {
        let doc = split_leaf(&blank(), "r", Direction::Vertical);
        let layout = compute_document_layout(&doc, 74.0, 26.0, 8.0);
        assert_eq!(layout.leaves[0].rect, RectPx::new(0.0, 0.0, 296.0, 208.0));
        assert_eq!(layout.leaves[1].rect, RectPx::new(296.0, 0.0, 296.0, 208.0));
        assert_eq!(layout.splits[0].divider_rect, None);
    }

    #[test]
    fn test_second_child_absorbs_rounding() {
        let doc = split_leaf(&blank(), "r", Direction::Vertical);
        let doc = set_split_gutter(&doc, "r", Some(1.3));
        for step in 1..100 {
            let ratio = f64::from(step) / 100.0 + 0.0031;
            let doc = set_split_ratio(&doc, "r", ratio);
            let layout = compute_document_layout(&doc, 74.0, 26.0, 8.0);
            let split = &layout.splits[0];
            let (a, b) = (layout.leaves[0].rect, layout.leaves[1].rect);
            assert_eq!(a.w, a.w.floor());
            assert!((a.w + split.gutter_rect.w + b.w - layout.root_rect.w).abs() < 1e-9);
            assert_eq!(a.h, 208.0);
            assert_eq!(b.h, 208.0);
        }
    }

    #[test]
    fn test_horizontal_divider_centered_and_at_least_one_px() {
        let doc = split_leaf(&blank(), "r", Direction::Horizontal);
        let doc = set_split_divider_visible(&doc, "r", true);
        let layout = compute_document_layout(&doc, 74.0, 26.0, 2.0);
        let split = &layout.splits[0];
        // 0.3 mm at 2 px/mm is 0.6 px, floored to one pixel
        let divider = split.divider_rect.unwrap();
        assert_eq!(divider.h, 1.0);
        assert_eq!(divider.w, 148.0);
        let gutter = split.gutter_rect;
        assert!(((divider.y + divider.h / 2.0) - (gutter.y + gutter.h / 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_padding_insets_twice() {
        let mut doc = TemplateDoc::new_default();
        let mut leaf = doc.layout.as_leaf().unwrap().clone();
        if let Element::Text(text) = &mut leaf.elements[0] {
            text.base.padding_mm = Some([1.0, 0.0, 0.0, 2.0]);
        }
        doc.layout = Arc::new(Node::Leaf(leaf));
        let layout = compute_document_layout(&doc, 10.0, 10.0, 8.0);
        let l = &layout.leaves[0];
        assert_eq!(l.padded_rect, RectPx::new(3.0, 3.0, 74.0, 74.0));
        assert_eq!(l.content_rect, RectPx::new(19.0, 11.0, 58.0, 66.0));
    }

    #[test]
    fn test_insets_never_negative() {
        let r = RectPx::new(0.0, 0.0, 4.0, 4.0).inset([3.0, 3.0, 3.0, 3.0]);
        assert_eq!((r.w, r.h), (0.0, 0.0));
    }

    #[test]
    fn test_alias_map_and_hit_test() {
        let doc = split_leaf(&Arc::new(TemplateDoc::new_default()), "r", Direction::Vertical);
        let layout = compute_document_layout(&doc, 74.0, 26.0, 8.0);
        let left = NodeId::root().child(0);
        assert_eq!(layout.alias_to_id.get("root"), Some(&left));
        assert_eq!(layout.rect_of_alias("root"), layout.rect_of(&left));
        assert_eq!(layout.hit_test(300.0, 10.0).map(|l| l.node_id.as_str()), Some("r/1"));
        assert_eq!(layout.hit_test(295.9, 10.0).map(|l| l.node_id.as_str()), Some("r/0"));
        assert!(layout.hit_test(600.0, 10.0).is_none());
    }

    #[test]
    fn test_duplicate_alias_maps_to_first_node() {
        let doc = split_leaf(&Arc::new(TemplateDoc::new_default()), "r", Direction::Vertical);
        let doc = set_node_alias(&doc, "r/1", Some("root"));
        let layout = compute_document_layout(&doc, 74.0, 26.0, 8.0);
        let first = resolve_alias(&doc.layout, "root");
        assert_eq!(first.as_ref().map(NodeId::as_str), Some("r/0"));
        assert_eq!(layout.alias_to_id.get("root"), first.as_ref());
    }

    #[test]
    fn test_deterministic() {
        let doc = split_leaf(&blank(), "r", Direction::Vertical);
        let doc = split_leaf(&doc, "r/1", Direction::Horizontal);
        let a = serde_json::to_value(compute_document_layout(&doc, 50.0, 30.0, 8.0)).unwrap();
        let b = serde_json::to_value(compute_document_layout(&doc, 50.0, 30.0, 8.0)).unwrap();
        assert_eq!(a, b);
    }
}
