//! Mutation Operations - Pure Document Edits
//!
//! Every operation maps a document to a document. When the target id does
//! not resolve, or names the wrong kind of node, the input `Arc` is returned
//! as-is so callers (and `History::push`) can detect the no-op by identity.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::paths::{get_node_by_id, update_node_by_id};
use crate::templates::{
    DataMatrixElement, Direction, Divider, Element, ElementKind, ImageElement, ImageSource,
    ImageSourceKind, LeafNode, LineAlign, LineElement, LineOrientation, Node, PaddingMm, QrElement,
    SplitNode, TemplateDefaults, TemplateDoc, TextElement, DEFAULT_DIVIDER_THICKNESS_MM,
};

fn with_layout(doc: &Arc<TemplateDoc>, layout: Arc<Node>) -> Arc<TemplateDoc> {
    if Arc::ptr_eq(&layout, &doc.layout) {
        return Arc::clone(doc);
    }
    Arc::new(TemplateDoc {
        layout,
        ..TemplateDoc::clone(doc)
    })
}

/// Rewrite the node at `id`; `edit` returns `None` to leave it untouched.
fn edit_node<F>(doc: &Arc<TemplateDoc>, id: &str, edit: F) -> Arc<TemplateDoc>
where
    F: FnOnce(&Node) -> Option<Node>,
{
    let layout = update_node_by_id(&doc.layout, id, |node| match edit(node) {
        Some(next) => Arc::new(next),
        None => {
            tracing::debug!(node_id = id, kind = ?node.kind(), "edit skipped: wrong node kind");
            Arc::clone(node)
        }
    });
    with_layout(doc, layout)
}

fn edit_split<F>(doc: &Arc<TemplateDoc>, id: &str, edit: F) -> Arc<TemplateDoc>
where
    F: FnOnce(&mut SplitNode),
{
    edit_node(doc, id, |node| {
        let mut split = node.as_split()?.clone();
        edit(&mut split);
        Some(Node::Split(split))
    })
}

fn edit_leaf<F>(doc: &Arc<TemplateDoc>, id: &str, edit: F) -> Arc<TemplateDoc>
where
    F: FnOnce(&mut LeafNode),
{
    edit_node(doc, id, |node| {
        let mut leaf = node.as_leaf()?.clone();
        edit(&mut leaf);
        Some(Node::Leaf(leaf))
    })
}

// --- Document-level ---

pub fn set_template_name(doc: &Arc<TemplateDoc>, name: &str) -> Arc<TemplateDoc> {
    Arc::new(TemplateDoc {
        name: Some(name.to_string()),
        ..TemplateDoc::clone(doc)
    })
}

pub fn set_defaults(
    doc: &Arc<TemplateDoc>,
    defaults: Option<TemplateDefaults>,
) -> Arc<TemplateDoc> {
    Arc::new(TemplateDoc {
        defaults,
        ..TemplateDoc::clone(doc)
    })
}

// --- Structure ---

/// Replace a leaf with a split: the original leaf first, a blank text leaf second.
pub fn split_leaf(doc: &Arc<TemplateDoc>, id: &str, direction: Direction) -> Arc<TemplateDoc> {
    let layout = update_node_by_id(&doc.layout, id, |node| {
        let Node::Leaf(left) = node.as_ref() else {
            tracing::debug!(node_id = id, "split skipped: target is not a leaf");
            return Arc::clone(node);
        };
        let right = LeafNode {
            padding_mm: left.padding_mm,
            debug_border: left.debug_border,
            ..LeafNode::new(Element::Text(TextElement::new("")))
        };
        Arc::new(Node::Split(SplitNode {
            alias: None,
            direction,
            ratio: 0.5,
            gutter_mm: Some(0.0),
            divider: Some(Divider {
                visible: Some(false),
                thickness_mm: Some(DEFAULT_DIVIDER_THICKNESS_MM),
            }),
            children: [Arc::clone(node), Arc::new(Node::Leaf(right))],
            extensions: None,
        }))
    });
    with_layout(doc, layout)
}

/// Collapse a split into a fresh leaf built from the first leaf of its
/// subtree (leftmost, depth-first).
///
/// Lossy: only that leaf's element, padding and debug border carry over.
/// Every other descendant, and every alias and extension map, is dropped.
pub fn unsplit(doc: &Arc<TemplateDoc>, id: &str) -> Arc<TemplateDoc> {
    let layout = update_node_by_id(&doc.layout, id, |node| match node.as_ref() {
        Node::Split(split) => {
            let Node::Leaf(kept) = first_leaf(&split.children[0]).as_ref() else {
                return Arc::clone(node);
            };
            tracing::debug!(node_id = id, "unsplit keeps leftmost leaf content");
            Arc::new(Node::Leaf(LeafNode {
                padding_mm: kept.padding_mm,
                debug_border: kept.debug_border,
                ..LeafNode::new(kept.element().clone())
            }))
        }
        Node::Leaf(_) => {
            tracing::debug!(node_id = id, "unsplit skipped: target is a leaf");
            Arc::clone(node)
        }
    });
    with_layout(doc, layout)
}

fn first_leaf(node: &Arc<Node>) -> &Arc<Node> {
    match node.as_ref() {
        Node::Leaf(_) => node,
        Node::Split(split) => first_leaf(&split.children[0]),
    }
}

// --- Field setters ---

pub fn set_split_ratio(doc: &Arc<TemplateDoc>, id: &str, ratio: f64) -> Arc<TemplateDoc> {
    edit_split(doc, id, |split| split.ratio = ratio)
}

pub fn set_split_gutter(
    doc: &Arc<TemplateDoc>,
    id: &str,
    gutter_mm: Option<f64>,
) -> Arc<TemplateDoc> {
    edit_split(doc, id, |split| split.gutter_mm = gutter_mm)
}

pub fn set_split_divider(
    doc: &Arc<TemplateDoc>,
    id: &str,
    divider: Option<Divider>,
) -> Arc<TemplateDoc> {
    edit_split(doc, id, |split| split.divider = divider)
}

/// An empty alias clears it.
pub fn set_node_alias(doc: &Arc<TemplateDoc>, id: &str, alias: Option<&str>) -> Arc<TemplateDoc> {
    let alias = alias.filter(|a| !a.is_empty()).map(str::to_string);
    edit_node(doc, id, |node| {
        Some(match node {
            Node::Split(split) => Node::Split(SplitNode {
                alias,
                ..split.clone()
            }),
            Node::Leaf(leaf) => Node::Leaf(LeafNode {
                alias,
                ..leaf.clone()
            }),
        })
    })
}

pub fn set_leaf_padding(
    doc: &Arc<TemplateDoc>,
    id: &str,
    padding_mm: Option<PaddingMm>,
) -> Arc<TemplateDoc> {
    edit_leaf(doc, id, |leaf| leaf.padding_mm = padding_mm)
}

pub fn toggle_leaf_debug_border(doc: &Arc<TemplateDoc>, id: &str, value: bool) -> Arc<TemplateDoc> {
    edit_leaf(doc, id, |leaf| leaf.debug_border = Some(value))
}

// --- Elements ---

pub fn set_leaf_element(doc: &Arc<TemplateDoc>, id: &str, element: Element) -> Arc<TemplateDoc> {
    edit_leaf(doc, id, |leaf| leaf.elements = [element])
}

/// Shallow-merge `patch` over the element's JSON form. `null` removes a key.
/// A merge that no longer forms a valid element leaves the document untouched.
pub fn update_leaf_element(
    doc: &Arc<TemplateDoc>,
    id: &str,
    patch: &Map<String, Value>,
) -> Arc<TemplateDoc> {
    let Some(leaf) = get_node_by_id(&doc.layout, id).and_then(|n| n.as_leaf()) else {
        return Arc::clone(doc);
    };
    let mut merged = match serde_json::to_value(leaf.element()) {
        Ok(Value::Object(obj)) => obj,
        _ => return Arc::clone(doc),
    };
    for (key, value) in patch {
        if value.is_null() {
            merged.remove(key);
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    match serde_json::from_value::<Element>(Value::Object(merged)) {
        Ok(element) => set_leaf_element(doc, id, element),
        Err(err) => {
            tracing::debug!(node_id = id, %err, "element patch rejected");
            Arc::clone(doc)
        }
    }
}

/// A conservative fresh element; nothing carries over from the previous one.
pub fn make_default_element(kind: ElementKind) -> Element {
    match kind {
        ElementKind::Text => Element::Text(TextElement::new("")),
        ElementKind::Qr => Element::Qr(QrElement::default()),
        ElementKind::Datamatrix => Element::Datamatrix(DataMatrixElement {
            module_size_mm: Some(0.5),
            quality: Some(200),
            ..Default::default()
        }),
        ElementKind::Image => Element::Image(ImageElement {
            base: Default::default(),
            source: ImageSource {
                kind: ImageSourceKind::Base64,
                data: String::new(),
            },
            fit: None,
            align_h: None,
            align_v: None,
            input_dpi: None,
            threshold: None,
            dither: None,
            invert: None,
        }),
        ElementKind::Line => Element::Line(LineElement {
            base: Default::default(),
            orientation: LineOrientation::Horizontal,
            thickness_mm: 0.3,
            align: Some(LineAlign::Center),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Arc<TemplateDoc> {
        Arc::new(serde_json::from_value(json!({
            "schema_version": 1,
            "layout": {
                "kind": "leaf",
                "alias": "main",
                "padding_mm": [1, 1, 1, 1],
                "debug_border": true,
                "elements": [{"type": "text", "text": "Hello", "fit": "wrap", "wrap": "word"}]
            }
        })).unwrap())
    }

    #[test]
    fn test_split_leaf_shape() {
        let doc = base();
        let next = split_leaf(&doc, "r", Direction::Horizontal);
        let split = next.layout.as_split().unwrap();
        assert_eq!(split.ratio, 0.5);
        assert_eq!(split.gutter_mm, Some(0.0));
        assert_eq!(split.divider, Some(Divider { visible: Some(false), thickness_mm: Some(0.3) }));
        assert!(Arc::ptr_eq(&split.children[0], &doc.layout));
        let right = split.children[1].as_leaf().unwrap();
        assert_eq!(right.padding_mm, Some([1.0; 4]));
        assert_eq!(right.debug_border, Some(true));
        assert_eq!(right.alias, None);
        assert_eq!(right.element(), &Element::Text(TextElement::new("")));
    }

    #[test]
    fn test_split_then_unsplit_restores_leaf_content() {
        let doc = base();
        let split = split_leaf(&doc, "r", Direction::Vertical);
        let back = unsplit(&split, "r");
        let before = doc.layout.as_leaf().unwrap();
        let after = back.layout.as_leaf().unwrap();
        assert_eq!(after.element(), before.element());
        assert_eq!(after.padding_mm, before.padding_mm);
        assert_eq!(after.debug_border, before.debug_border);
    }

    #[test]
    fn test_unsplit_drops_aliases_and_extensions() {
        let doc: Arc<TemplateDoc> = Arc::new(serde_json::from_value(json!({
            "schema_version": 1,
            "layout": {
                "kind": "split", "alias": "outer", "direction": "v", "ratio": 0.5,
                "children": [
                    {"kind": "leaf", "alias": "inner", "extensions": {"ui": 1},
                     "elements": [{"type": "text", "text": "a"}]},
                    {"kind": "leaf", "elements": [{"type": "text", "text": "b"}]}
                ]
            }
        })).unwrap());
        let merged = unsplit(&doc, "r");
        let leaf = merged.layout.as_leaf().unwrap();
        assert_eq!(leaf.alias, None);
        assert_eq!(leaf.extensions, None);
        assert_eq!(leaf.element().template_text(), Some("a"));
    }

    #[test]
    fn test_unsplit_keeps_leftmost_leaf() {
        let doc = base();
        let doc = split_leaf(&doc, "r", Direction::Vertical);
        let doc = set_leaf_element(&doc, "r/1", Element::Text(TextElement::new("right")));
        let doc = split_leaf(&doc, "r/0", Direction::Horizontal);
        let doc = set_leaf_element(&doc, "r/0/1", Element::Text(TextElement::new("inner")));
        let merged = unsplit(&doc, "r");
        let leaf = merged.layout.as_leaf().unwrap();
        assert_eq!(leaf.element().template_text(), Some("Hello"));
    }

    #[test]
    fn test_wrong_kind_and_stale_ids_are_noops() {
        let doc = base();
        assert!(Arc::ptr_eq(&unsplit(&doc, "r"), &doc));
        assert!(Arc::ptr_eq(&set_split_ratio(&doc, "r", 0.3), &doc));
        assert!(Arc::ptr_eq(&split_leaf(&doc, "r/1", Direction::Vertical), &doc));
        assert!(Arc::ptr_eq(&set_leaf_padding(&doc, "bogus", None), &doc));

        let split = split_leaf(&doc, "r", Direction::Vertical);
        assert!(Arc::ptr_eq(&toggle_leaf_debug_border(&split, "r", false), &split));
        assert!(Arc::ptr_eq(&split_leaf(&split, "r/0/0", Direction::Vertical), &split));
    }

    #[test]
    fn test_setters_replace_fields() {
        let doc = split_leaf(&base(), "r", Direction::Vertical);
        let doc = set_split_ratio(&doc, "r", 0.25);
        let doc = set_split_gutter(&doc, "r", Some(2.0));
        let divider = Divider { visible: Some(true), thickness_mm: Some(0.5) };
        let doc = set_split_divider(&doc, "r", Some(divider));
        let doc = set_node_alias(&doc, "r/1", Some("right"));
        let split = doc.layout.as_split().unwrap();
        assert_eq!(split.ratio, 0.25);
        assert_eq!(split.gutter(), 2.0);
        assert!(split.divider_visible());
        assert_eq!(split.children[1].alias(), Some("right"));

        let cleared = set_node_alias(&doc, "r/1", Some(""));
        assert_eq!(cleared.layout.as_split().unwrap().children[1].alias(), None);
    }

    #[test]
    fn test_update_leaf_element_merges() {
        let doc = base();
        let patch = json!({"text": "Bye", "fit": null, "max_lines": 2});
        let next = update_leaf_element(&doc, "r", patch.as_object().unwrap());
        let Element::Text(text) = next.layout.as_leaf().unwrap().element() else {
            panic!("expected text element");
        };
        assert_eq!(text.text, "Bye");
        assert_eq!(text.fit, None);
        assert_eq!(text.wrap, Some(crate::templates::TextWrap::Word));
        assert_eq!(text.max_lines, Some(2));
    }

    #[test]
    fn test_update_leaf_element_rejects_bad_patch() {
        let doc = base();
        let patch = json!({"max_lines": "many"});
        assert!(Arc::ptr_eq(&update_leaf_element(&doc, "r", patch.as_object().unwrap()), &doc));
    }

    #[test]
    fn test_switching_element_kind_starts_fresh() {
        let doc = set_leaf_element(&base(), "r", make_default_element(ElementKind::Datamatrix));
        let json = serde_json::to_value(doc.layout.as_leaf().unwrap().element()).unwrap();
        assert_eq!(
            json,
            json!({"type": "datamatrix", "data": "", "module_size_mm": 0.5, "quality": 200})
        );
    }
}
