//! Validation System - Shape First, Then Cross-Field Rules
//!
//! Shape problems reject the value outright. Rule issues are advisory: the
//! document stays usable and editable, and only the render gate refuses it.

use base64::Engine;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use crate::schema::{check_shape, normalize_integers};
use crate::templates::{
    Element, ImageSourceKind, Node, QrInputMode, TemplateDoc, TextDefaults, TextFit, TextWrap,
};

/// Dotted location of a field, e.g. `layout.children.0.elements.0.wrap`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuePath(Vec<String>);

impl IssuePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn key(&self, segment: impl fmt::Display) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }
}

impl fmt::Display for IssuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        f.write_str(&self.0.join("."))
    }
}

impl Serialize for IssuePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub rule: &'static str,
    pub path: IssuePath,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(rule: &'static str, path: IssuePath, message: impl Into<String>) -> Self {
        Self {
            rule,
            path,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Outcome of validating an untrusted value.
#[derive(Debug, Clone)]
pub enum Validation {
    /// Shape-valid; `issues` holds the advisory rule findings (possibly none).
    Valid {
        doc: TemplateDoc,
        issues: Vec<ValidationIssue>,
    },
    /// Shape-invalid; no document is produced.
    Invalid { issues: Vec<ValidationIssue> },
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Validation::Valid { issues, .. } | Validation::Invalid { issues } => issues,
        }
    }

    /// `path: message` strings, as shown in a status area.
    pub fn issue_strings(&self) -> Vec<String> {
        self.issues().iter().map(ToString::to_string).collect()
    }

    pub fn doc(&self) -> Option<&TemplateDoc> {
        match self {
            Validation::Valid { doc, .. } => Some(doc),
            Validation::Invalid { .. } => None,
        }
    }

    pub fn into_doc(self) -> Option<TemplateDoc> {
        match self {
            Validation::Valid { doc, .. } => Some(doc),
            Validation::Invalid { .. } => None,
        }
    }
}

/// Validate an untrusted JSON value. Never panics, never errors.
pub fn validate_template(value: &Value) -> Validation {
    let issues = check_shape(value);
    if !issues.is_empty() {
        return Validation::Invalid { issues };
    }
    match serde_json::from_value::<TemplateDoc>(normalize_integers(value.clone())) {
        Ok(doc) => {
            let issues = Validator::new().validate(&doc);
            Validation::Valid { doc, issues }
        }
        Err(err) => Validation::Invalid {
            issues: vec![ValidationIssue::new("shape", IssuePath::root(), err.to_string())],
        },
    }
}

/// Rule findings for an already-typed document.
pub fn validate_document(doc: &TemplateDoc) -> Vec<ValidationIssue> {
    Validator::new().validate(doc)
}

/// One cross-field rule, checked independently of the others.
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, doc: &TemplateDoc) -> Vec<ValidationIssue>;
}

/// Pre-order walk handing each node its `layout...` path.
pub fn visit_nodes<F>(doc: &TemplateDoc, mut visit: F)
where
    F: FnMut(&Node, &IssuePath),
{
    fn walk<F: FnMut(&Node, &IssuePath)>(node: &Node, path: &IssuePath, visit: &mut F) {
        visit(node, path);
        if let Node::Split(split) = node {
            let children = path.key("children");
            walk(&split.children[0], &children.key(0), visit);
            walk(&split.children[1], &children.key(1), visit);
        }
    }
    walk(&doc.layout, &IssuePath::root().key("layout"), &mut visit);
}

fn element_path(node_path: &IssuePath) -> IssuePath {
    node_path.key("elements").key(0)
}

// --- Concrete Rules ---

pub struct AliasUniquenessRule;

impl ValidationRule for AliasUniquenessRule {
    fn name(&self) -> &'static str { "alias_uniqueness" }

    fn validate(&self, doc: &TemplateDoc) -> Vec<ValidationIssue> {
        let mut seen = HashSet::new();
        let mut issues = vec![];
        visit_nodes(doc, |node, path| {
            if let Some(alias) = node.alias() {
                if !seen.insert(alias.to_string()) {
                    issues.push(ValidationIssue::new(
                        self.name(),
                        path.key("alias"),
                        format!("Duplicate alias: {alias}"),
                    ));
                }
            }
        });
        issues
    }
}

/// `fit`/`wrap` pairing for text. Element values fall back to the template's
/// text defaults; purely inherited pairs are reported once, on the defaults.
pub struct TextFitWrapRule;

impl TextFitWrapRule {
    pub fn check(
        fit: Option<TextFit>,
        wrap: Option<TextWrap>,
        path: &IssuePath,
    ) -> Vec<ValidationIssue> {
        let mut issues = vec![];
        let rule = "text_fit_wrap";
        if fit == Some(TextFit::Overflow) && wrap.is_some_and(|w| w != TextWrap::None) {
            issues.push(ValidationIssue::new(
                rule,
                path.key("wrap"),
                "wrap must be none when fit is overflow",
            ));
        }
        if matches!(fit, Some(TextFit::Wrap | TextFit::Truncate | TextFit::ShrinkToFit))
            && wrap == Some(TextWrap::None)
        {
            issues.push(ValidationIssue::new(
                rule,
                path.key("wrap"),
                "wrap must be word or char when fit is wrap, truncate, or shrink_to_fit",
            ));
        }
        if wrap == Some(TextWrap::None) && fit.is_some_and(|f| f != TextFit::Overflow) {
            issues.push(ValidationIssue::new(
                rule,
                path.key("fit"),
                "fit must be overflow when wrap is none",
            ));
        }
        issues
    }
}

impl ValidationRule for TextFitWrapRule {
    fn name(&self) -> &'static str { "text_fit_wrap" }

    fn validate(&self, doc: &TemplateDoc) -> Vec<ValidationIssue> {
        let defaults = doc.text_defaults().cloned().unwrap_or_else(TextDefaults::default);
        let mut issues = vec![];
        if doc.text_defaults().is_some() {
            let path = IssuePath::root().key("defaults").key("text");
            issues.extend(Self::check(defaults.fit, defaults.wrap, &path));
        }
        visit_nodes(doc, |node, path| {
            let Some(Element::Text(text)) = node.as_leaf().map(|leaf| leaf.element()) else {
                return;
            };
            if text.fit.is_none() && text.wrap.is_none() {
                return;
            }
            let fit = text.fit.or(defaults.fit);
            let wrap = text.wrap.or(defaults.wrap);
            issues.extend(Self::check(fit, wrap, &element_path(path)));
        });
        issues
    }
}

pub struct DividerGutterRule;

impl ValidationRule for DividerGutterRule {
    fn name(&self) -> &'static str { "divider_gutter" }

    fn validate(&self, doc: &TemplateDoc) -> Vec<ValidationIssue> {
        let mut issues = vec![];
        visit_nodes(doc, |node, path| {
            let Some(split) = node.as_split() else {
                return;
            };
            if split.divider_visible() && split.gutter() < split.divider_thickness() {
                issues.push(ValidationIssue::new(
                    self.name(),
                    path.key("divider"),
                    "gutter_mm must be >= divider.thickness_mm when divider is visible",
                ));
            }
        });
        issues
    }
}

pub struct QrModeRule;

impl ValidationRule for QrModeRule {
    fn name(&self) -> &'static str { "qr_mode" }

    fn validate(&self, doc: &TemplateDoc) -> Vec<ValidationIssue> {
        let mut issues = vec![];
        visit_nodes(doc, |node, path| {
            let Some(Element::Qr(qr)) = node.as_leaf().map(|leaf| leaf.element()) else {
                return;
            };
            let manual = qr.input_mode == Some(QrInputMode::M);
            if manual && qr.character_mode.is_none() {
                issues.push(ValidationIssue::new(
                    self.name(),
                    element_path(path).key("character_mode"),
                    "character_mode is required when input_mode is M",
                ));
            }
            if qr.character_mode.is_some() && !manual {
                issues.push(ValidationIssue::new(
                    self.name(),
                    element_path(path).key("input_mode"),
                    "input_mode must be M when character_mode is set",
                ));
            }
        });
        issues
    }
}

pub struct ImagePayloadRule;

impl ValidationRule for ImagePayloadRule {
    fn name(&self) -> &'static str { "image_payload" }

    fn validate(&self, doc: &TemplateDoc) -> Vec<ValidationIssue> {
        let mut issues = vec![];
        visit_nodes(doc, |node, path| {
            let Some(Element::Image(image)) = node.as_leaf().map(|leaf| leaf.element()) else {
                return;
            };
            let source = &image.source;
            if source.kind != ImageSourceKind::Base64 || source.data.is_empty() {
                return;
            }
            if base64::engine::general_purpose::STANDARD.decode(&source.data).is_err() {
                issues.push(ValidationIssue::new(
                    self.name(),
                    element_path(path).key("source").key("data"),
                    "data is not valid base64 (strip any data: URL prefix)",
                ));
            }
        });
        issues
    }
}

/// Validator runs every rule over the document and concatenates findings.
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(AliasUniquenessRule),
                Box::new(TextFitWrapRule),
                Box::new(DividerGutterRule),
                Box::new(QrModeRule),
                Box::new(ImagePayloadRule),
            ],
        }
    }

    pub fn validate(&self, doc: &TemplateDoc) -> Vec<ValidationIssue> {
        self.rules.iter().flat_map(|rule| rule.validate(doc)).collect()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(element: Value) -> Value {
        json!({"kind": "leaf", "elements": [element]})
    }

    fn doc(layout: Value) -> TemplateDoc {
        serde_json::from_value(json!({"schema_version": 1, "layout": layout})).unwrap()
    }

    fn paths(issues: &[ValidationIssue]) -> Vec<String> {
        issues.iter().map(|i| i.path.to_string()).collect()
    }

    #[test]
    fn test_second_alias_occurrence_reported() {
        let d = doc(json!({
            "kind": "split",
            "direction": "v",
            "ratio": 0.5,
            "alias": "a",
            "children": [
                {"kind": "leaf", "alias": "a", "elements": [{"type": "text", "text": ""}]},
                {"kind": "leaf", "alias": "a", "elements": [{"type": "text", "text": ""}]}
            ]
        }));
        let issues = AliasUniquenessRule.validate(&d);
        assert_eq!(paths(&issues), ["layout.children.0.alias", "layout.children.1.alias"]);
        assert_eq!(issues[0].message, "Duplicate alias: a");
    }

    #[test]
    fn test_fit_wrap_pairs() {
        let path = IssuePath::root();
        let check = |fit, wrap| paths(&TextFitWrapRule::check(fit, wrap, &path));
        assert!(check(Some(TextFit::Overflow), Some(TextWrap::None)).is_empty());
        assert!(check(Some(TextFit::Wrap), Some(TextWrap::Char)).is_empty());
        assert!(check(None, Some(TextWrap::None)).is_empty());
        assert_eq!(check(Some(TextFit::Overflow), Some(TextWrap::Word)), ["wrap"]);
        assert_eq!(check(Some(TextFit::Truncate), Some(TextWrap::None)), ["wrap", "fit"]);
    }

    #[test]
    fn test_text_inherits_template_fit() {
        let mut d = doc(leaf(json!({"type": "text", "text": "x", "wrap": "word"})));
        d.defaults = serde_json::from_value(json!({"text": {"fit": "overflow"}})).unwrap();
        let issues = validate_document(&d);
        assert_eq!(paths(&issues), ["layout.elements.0.wrap"]);
    }

    #[test]
    fn test_inherited_pair_reported_on_defaults_only() {
        let mut d = doc(leaf(json!({"type": "text", "text": "x"})));
        let defaults = json!({"text": {"fit": "overflow", "wrap": "char"}});
        d.defaults = serde_json::from_value(defaults).unwrap();
        assert_eq!(paths(&validate_document(&d)), ["defaults.text.wrap"]);
    }

    #[test]
    fn test_divider_requires_gutter() {
        let empty = || leaf(json!({"type": "text", "text": ""}));
        let d = doc(json!({
            "kind": "split",
            "direction": "h",
            "ratio": 0.5,
            "gutter_mm": 0.2,
            "divider": {"visible": true},
            "children": [
                empty(),
                {
                    "kind": "split",
                    "direction": "v",
                    "ratio": 0.5,
                    "gutter_mm": 0.5,
                    "divider": {"visible": true, "thickness_mm": 0.5},
                    "children": [empty(), empty()]
                }
            ]
        }));
        assert_eq!(paths(&DividerGutterRule.validate(&d)), ["layout.divider"]);
    }

    #[test]
    fn test_qr_mode_pairing() {
        let manual = doc(leaf(json!({"type": "qr", "data": "", "input_mode": "M"})));
        assert_eq!(paths(&QrModeRule.validate(&manual)), ["layout.elements.0.character_mode"]);

        let auto = doc(leaf(json!({"type": "qr", "data": "", "character_mode": "N"})));
        assert_eq!(paths(&QrModeRule.validate(&auto)), ["layout.elements.0.input_mode"]);

        let ok = json!({"type": "qr", "data": "", "input_mode": "M", "character_mode": "A"});
        let ok = doc(leaf(ok));
        assert!(QrModeRule.validate(&ok).is_empty());
    }

    #[test]
    fn test_image_payload_must_decode() {
        let source = json!({"kind": "base64", "data": "data:image/png;base64,AAAA"});
        let bad = doc(leaf(json!({"type": "image", "source": source})));
        assert_eq!(paths(&ImagePayloadRule.validate(&bad)), ["layout.elements.0.source.data"]);
        let source = json!({"kind": "url", "data": "https://example.com/logo.png"});
        let url = doc(leaf(json!({"type": "image", "source": source})));
        assert!(ImagePayloadRule.validate(&url).is_empty());
    }

    #[test]
    fn test_integral_float_fields_deserialize() {
        let v = validate_template(&json!({
            "schema_version": 1.0,
            "layout": leaf(json!({"type": "text", "text": "Hi", "max_lines": 3.0}))
        }));
        assert!(v.is_ok(), "{:?}", v.issue_strings());
        assert!(v.issues().is_empty());
        let parsed = v.doc().unwrap();
        let Element::Text(text) = parsed.layout.as_leaf().unwrap().element() else {
            panic!("expected text element");
        };
        assert_eq!(text.max_lines, Some(3));
    }

    #[test]
    fn test_validate_template_never_fails_hard() {
        assert!(!validate_template(&json!("nope")).is_ok());
        let layout = leaf(json!({"type": "text", "text": "Hi"}));
        let v = validate_template(&json!({"schema_version": 1, "layout": layout}));
        assert!(v.is_ok());
        assert!(v.issues().is_empty());
    }
}
