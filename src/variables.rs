//! Placeholder Extraction - Variables and Macros
//!
//! `{name}` tokens in text and 2D-code payloads name values that must be
//! supplied before rendering. `{{` and `}}` are literal braces and never
//! produce tokens. Names in [`TEMPLATE_MACROS`] are filled in downstream.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::paths::list_nodes;
use crate::templates::{Node, TemplateDoc};

/// Reserved names resolved by the renderer, never by the user.
pub const TEMPLATE_MACROS: [&str; 16] = [
    "_now_iso",
    "_date_yyyy_mm_dd",
    "_date_dd_mm_yyyy",
    "_time_hh_mm",
    "_time_hh_mm_ss",
    "_timestamp_ms",
    "_uuid",
    "_short_id",
    "_printer_id",
    "_template_name",
    "_counter_global",
    "_counter_daily",
    "_counter_printer",
    "_counter_printer_daily",
    "_counter_template",
    "_counter_template_daily",
];

pub fn is_macro(name: &str) -> bool {
    TEMPLATE_MACROS.contains(&name)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateVariables {
    /// User-supplied names, sorted.
    pub variables: Vec<String>,
    /// Reserved macro names in use, sorted.
    pub macros: Vec<String>,
}

impl TemplateVariables {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.macros.is_empty()
    }
}

/// `{identifier}` with an ASCII identifier.
fn placeholder_pattern() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("placeholder pattern compiles")
    })
}

/// Placeholder names in `text`, in order of appearance, duplicates kept.
pub fn extract_placeholders(text: &str) -> Vec<String> {
    let cleaned = text.replace("{{", "").replace("}}", "");
    placeholder_pattern()
        .captures_iter(&cleaned)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub fn extract_template_variables(doc: &TemplateDoc) -> TemplateVariables {
    let mut names = BTreeSet::new();
    for entry in list_nodes(&doc.layout) {
        let Node::Leaf(leaf) = entry.node.as_ref() else {
            continue;
        };
        for element in &leaf.elements {
            if let Some(text) = element.template_text() {
                names.extend(extract_placeholders(text));
            }
        }
    }
    let (macros, variables): (Vec<String>, Vec<String>) =
        names.into_iter().partition(|n| is_macro(n));
    TemplateVariables { variables, macros }
}

/// Required variables with no entry (or an empty value) in `supplied`.
pub fn missing_variables(doc: &TemplateDoc, supplied: &BTreeMap<String, String>) -> Vec<String> {
    extract_template_variables(doc)
        .variables
        .into_iter()
        .filter(|name| supplied.get(name).map_or(true, |v| v.is_empty()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{set_leaf_element, split_leaf};
    use crate::templates::{DataMatrixElement, Direction, Element, LeafNode, QrElement, TextElement};
    use std::sync::Arc;

    #[test]
    fn test_extract_placeholders() {
        assert_eq!(extract_placeholders("Hi {name}, lot {lot_2}"), vec!["name", "lot_2"]);
        assert_eq!(extract_placeholders("{9x} { a } {}"), Vec::<String>::new());
        assert_eq!(extract_placeholders("{a}{a}"), vec!["a", "a"]);
    }

    #[test]
    fn test_doubled_braces_are_literal() {
        assert!(extract_placeholders("{{literal}}").is_empty());
        // stripping `{{` first leaves `{x}` behind
        assert_eq!(extract_placeholders("{{{x}}}"), vec!["x"]);
    }

    #[test]
    fn test_unicode_text_does_not_confuse_scanner() {
        assert_eq!(extract_placeholders("Größe: {größe} {size}"), vec!["size"]);
    }

    #[test]
    fn test_variables_and_macros_split_sorted() {
        let text = TextElement::new("{zeta} {_uuid} {alpha} {zeta} {_counter_daily}");
        let leaf = LeafNode::new(Element::Text(text));
        let doc = Arc::new(TemplateDoc::from_layout(Node::Leaf(leaf)));
        let vars = extract_template_variables(&doc);
        assert_eq!(vars.variables, vec!["alpha", "zeta"]);
        assert_eq!(vars.macros, vec!["_counter_daily", "_uuid"]);
    }

    #[test]
    fn test_code_payloads_are_scanned() {
        let doc = Arc::new(TemplateDoc::new_default());
        let doc = split_leaf(&doc, "r", Direction::Vertical);
        let qr = Element::Qr(QrElement {
            data: "https://x/{sku}".to_string(),
            ..Default::default()
        });
        let dm = Element::Datamatrix(DataMatrixElement {
            data: "{lot}".to_string(),
            ..Default::default()
        });
        let doc = set_leaf_element(&doc, "r/0", qr);
        let doc = set_leaf_element(&doc, "r/1", dm);
        assert_eq!(extract_template_variables(&doc).variables, vec!["lot", "sku"]);
    }

    #[test]
    fn test_missing_variables() {
        let doc = TemplateDoc::from_layout(Node::Leaf(LeafNode::new(Element::Text(TextElement::new(
            "{a} {b} {_uuid}",
        )))));
        let mut supplied = BTreeMap::new();
        supplied.insert("a".to_string(), "1".to_string());
        supplied.insert("b".to_string(), String::new());
        assert_eq!(missing_variables(&doc, &supplied), vec!["b"]);
    }

    #[test]
    fn test_macro_set_is_closed() {
        assert_eq!(TEMPLATE_MACROS.len(), 16);
        assert!(TEMPLATE_MACROS.iter().all(|m| m.starts_with('_')));
        assert!(!is_macro("_custom"));
    }
}
