//! Editor Session - Single Entry Point for Edits
//!
//! The session owns the one mutable slot: the history of document snapshots.
//! Every edit runs operation, then validation, then the history push. Issues
//! are advisory while editing; `prepare_render` is the only place they block.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::LabelTarget;
use crate::hashing::document_fingerprint;
use crate::history::History;
use crate::layout::{compute_document_layout, LayoutRender};
use crate::paths::{get_node_by_id, NodeId};
use crate::resolve::resolve_render;
use crate::templates::{MissingVariables, TemplateDoc};
use crate::validation::{
    validate_document, validate_template, IssuePath, Validation, ValidationIssue,
};
use crate::variables::{extract_template_variables, missing_variables, TemplateVariables};

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Import rejected: {}", join_issues(.0))]
    ImportRejected(Vec<ValidationIssue>),

    #[error("Document has {} validation issue(s): {}", .0.len(), join_issues(.0))]
    InvalidDocument(Vec<ValidationIssue>),

    #[error("Missing variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Everything a renderer needs, frozen at the moment the gate opened.
#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub fingerprint: String,
    pub target: LabelTarget,
    pub variables: BTreeMap<String, String>,
    pub doc: Arc<TemplateDoc>,
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    history: History<TemplateDoc>,
    issues: Vec<ValidationIssue>,
    selection: NodeId,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::from_doc(TemplateDoc::new_default())
    }

    pub fn from_doc(doc: TemplateDoc) -> Self {
        let doc = Arc::new(doc);
        Self {
            issues: revalidate(&doc),
            history: History::new(doc),
            selection: NodeId::root(),
        }
    }

    pub fn doc(&self) -> &Arc<TemplateDoc> {
        self.history.present()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn selection(&self) -> &NodeId {
        &self.selection
    }

    pub fn history(&self) -> &History<TemplateDoc> {
        &self.history
    }

    /// Select a node. Identifiers that do not resolve are ignored.
    pub fn select(&mut self, id: &str) -> bool {
        match NodeId::parse(id) {
            Ok(node_id) if get_node_by_id(&self.doc().layout, id).is_some() => {
                self.selection = node_id;
                true
            }
            _ => {
                tracing::debug!(node_id = id, "selection ignored: no such node");
                false
            }
        }
    }

    /// Run one edit. Returns false when the operation changed nothing.
    pub fn apply<F>(&mut self, op: F) -> bool
    where
        F: FnOnce(&Arc<TemplateDoc>) -> Arc<TemplateDoc>,
    {
        let next = op(self.doc());
        if Arc::ptr_eq(&next, self.doc()) {
            return false;
        }
        self.issues = revalidate(&next);
        self.history.push(next);
        self.repair_selection();
        true
    }

    pub fn undo(&mut self) -> bool {
        if !self.history.undo() {
            return false;
        }
        tracing::info!(undo_levels = self.history.undo_levels(), "undo");
        self.refresh();
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.history.redo() {
            return false;
        }
        tracing::info!(redo_levels = self.history.redo_levels(), "redo");
        self.refresh();
        true
    }

    /// Start over from the default document, forgetting history.
    pub fn new_template(&mut self) {
        tracing::info!("new template");
        self.reset(TemplateDoc::new_default());
    }

    /// Replace the document with parsed JSON. Nothing changes on rejection.
    pub fn import_json(&mut self, text: &str) -> Result<(), SessionError> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) => {
                let issues = vec![ValidationIssue::new("json", IssuePath::root(), err.to_string())];
                tracing::warn!(error = %err, "import rejected: not JSON");
                return Err(SessionError::ImportRejected(issues));
            }
        };
        count_validation();
        match validate_template(&value) {
            Validation::Valid { doc, issues } => {
                tracing::info!(issues = issues.len(), "template imported");
                self.history.reset(Arc::new(doc));
                self.issues = issues;
                self.selection = NodeId::root();
                Ok(())
            }
            Validation::Invalid { issues } => {
                tracing::warn!(issues = issues.len(), "import rejected: invalid shape");
                Err(SessionError::ImportRejected(issues))
            }
        }
    }

    pub fn export_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string_pretty(self.doc().as_ref())?)
    }

    pub fn variables(&self) -> TemplateVariables {
        extract_template_variables(self.doc())
    }

    pub fn layout(&self, target: LabelTarget, scale_px_per_mm: f64) -> LayoutRender {
        let target = target.sanitized();
        compute_document_layout(self.doc(), target.width_mm, target.height_mm, scale_px_per_mm)
    }

    /// Gate in front of the renderer: no issues, and every required variable
    /// supplied unless the template opts into lenient substitution.
    pub fn prepare_render(
        &self,
        target: LabelTarget,
        variables: BTreeMap<String, String>,
    ) -> Result<RenderRequest, SessionError> {
        if !self.issues.is_empty() {
            tracing::warn!(issues = self.issues.len(), "render refused: document has issues");
            return Err(SessionError::InvalidDocument(self.issues.clone()));
        }
        let doc = Arc::clone(self.doc());
        let policy = resolve_render(doc.defaults.as_ref()).missing_variables.value;
        if policy == MissingVariables::Error {
            let missing = missing_variables(&doc, &variables);
            if !missing.is_empty() {
                tracing::warn!(missing = ?missing, "render refused: missing variables");
                return Err(SessionError::MissingVariables(missing));
            }
        }
        Ok(RenderRequest {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            fingerprint: document_fingerprint(&doc)?,
            target: target.sanitized(),
            variables,
            doc,
        })
    }

    fn reset(&mut self, doc: TemplateDoc) {
        let doc = Arc::new(doc);
        self.issues = revalidate(&doc);
        self.history.reset(doc);
        self.selection = NodeId::root();
    }

    fn refresh(&mut self) {
        self.issues = revalidate(self.doc());
        self.repair_selection();
    }

    /// Walk the selection up to the nearest node that still exists.
    fn repair_selection(&mut self) {
        let layout = &self.history.present().layout;
        while get_node_by_id(layout, self.selection.as_str()).is_none() {
            match self.selection.parent() {
                Some(parent) => self.selection = parent,
                None => break,
            }
        }
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

fn count_validation() {
    #[cfg(feature = "test-hooks")]
    VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);
}

fn revalidate(doc: &TemplateDoc) -> Vec<ValidationIssue> {
    count_validation();
    validate_document(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{
        set_leaf_element, set_split_ratio, split_leaf, unsplit, update_leaf_element,
    };
    use crate::templates::{Direction, Element, TextElement};
    use serde_json::json;

    fn session_with_text(text: &str) -> EditorSession {
        let mut session = EditorSession::new();
        session.apply(|doc| set_leaf_element(doc, "r", Element::Text(TextElement::new(text))));
        session
    }

    #[test]
    fn test_apply_validates_and_records() {
        let mut session = EditorSession::new();
        assert!(session.issues().is_empty());
        assert!(session.apply(|doc| split_leaf(doc, "r", Direction::Vertical)));
        assert!(session.history().can_undo());

        let patch = json!({"fit": "overflow", "wrap": "word"});
        let patch = patch.as_object().unwrap();
        assert!(session.apply(|doc| update_leaf_element(doc, "r/0", patch)));
        assert_eq!(session.issues().len(), 1);
        assert_eq!(session.issues()[0].path.to_string(), "layout.children.0.elements.0.wrap");
    }

    #[test]
    fn test_noop_edit_not_recorded() {
        let mut session = EditorSession::new();
        assert!(!session.apply(|doc| set_split_ratio(doc, "r", 0.3)));
        assert!(!session.apply(|doc| split_leaf(doc, "r/1/0", Direction::Vertical)));
        assert!(!session.history().can_undo());
    }

    #[test]
    fn test_undo_redo_restore_snapshots() {
        let mut session = EditorSession::new();
        let first = Arc::clone(session.doc());
        session.apply(|doc| split_leaf(doc, "r", Direction::Horizontal));
        let second = Arc::clone(session.doc());

        assert!(session.undo());
        assert!(Arc::ptr_eq(session.doc(), &first));
        assert!(session.redo());
        assert!(Arc::ptr_eq(session.doc(), &second));
        assert!(!session.redo());
    }

    #[test]
    fn test_selection_follows_structure() {
        let mut session = EditorSession::new();
        session.apply(|doc| split_leaf(doc, "r", Direction::Vertical));
        assert!(session.select("r/1"));
        assert!(!session.select("r/1/0"));
        assert!(!session.select("bogus"));

        session.apply(|doc| unsplit(doc, "r"));
        assert_eq!(session.selection().as_str(), "r");
    }

    #[test]
    fn test_import_rejected_wholesale() {
        let mut session = session_with_text("keep me");
        let before = Arc::clone(session.doc());

        let err = session.import_json(r#"{"schema_version": 2, "layout": {}}"#).unwrap_err();
        assert!(matches!(err, SessionError::ImportRejected(ref issues) if !issues.is_empty()));
        assert!(Arc::ptr_eq(session.doc(), &before));

        let err = session.import_json("{ not json").unwrap_err();
        let SessionError::ImportRejected(issues) = err else {
            panic!("expected rejection");
        };
        assert_eq!(issues[0].rule, "json");
        assert!(session.history().can_undo());
    }

    #[test]
    fn test_import_resets_history() {
        let mut session = session_with_text("x");
        let text = json!({
            "schema_version": 1,
            "layout": {"kind": "leaf", "elements": [{"type": "text", "text": "Hi {name}"}]}
        });
        session.import_json(&text.to_string()).unwrap();
        assert!(!session.history().can_undo());
        assert_eq!(session.selection().as_str(), "r");
        assert_eq!(session.variables().variables, vec!["name"]);
        assert!(session.variables().macros.is_empty());
    }

    #[test]
    fn test_export_reimports() {
        let mut session = EditorSession::new();
        session.apply(|doc| split_leaf(doc, "r", Direction::Vertical));
        let text = session.export_json().unwrap();

        let mut other = EditorSession::new();
        other.import_json(&text).unwrap();
        assert_eq!(other.doc().as_ref(), session.doc().as_ref());
    }

    #[test]
    fn test_render_gate_missing_variables() {
        let session = session_with_text("{sku} {_uuid}");
        let target = LabelTarget::default();

        let err = session.prepare_render(target, BTreeMap::new()).unwrap_err();
        let SessionError::MissingVariables(missing) = err else {
            panic!("expected missing variables");
        };
        assert_eq!(missing, vec!["sku"]);

        let mut vars = BTreeMap::new();
        vars.insert("sku".to_string(), "A-1".to_string());
        let request = session.prepare_render(target, vars).unwrap();
        assert_eq!(request.fingerprint, document_fingerprint(session.doc()).unwrap());
        assert_eq!(request.fingerprint.len(), 64);
        assert!(Uuid::parse_str(&request.id).is_ok());
    }

    #[test]
    fn test_render_gate_lenient_substitution() {
        let mut session = session_with_text("{sku}");
        session.apply(|doc| {
            let mut defaults = doc.defaults.clone().unwrap_or_default();
            let mut render = defaults.render.clone().unwrap_or_default();
            render.missing_variables = Some(MissingVariables::Empty);
            defaults.render = Some(render);
            crate::operations::set_defaults(doc, Some(defaults))
        });
        assert!(session.prepare_render(LabelTarget::default(), BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_render_gate_refuses_issues() {
        let mut session = EditorSession::new();
        let patch = json!({"fit": "shrink_to_fit", "wrap": "none"});
        let patch = patch.as_object().unwrap();
        session.apply(|doc| update_leaf_element(doc, "r", patch));
        assert!(!session.issues().is_empty());
        let err = session.prepare_render(LabelTarget::default(), BTreeMap::new()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidDocument(_)));
    }

    #[test]
    fn test_layout_uses_sanitized_target() {
        let session = EditorSession::new();
        let layout = session.layout(LabelTarget { width_mm: 0.0, height_mm: 26.0, dpi: 203 }, 8.0);
        assert_eq!(layout.root_rect.w, 8.0);
        assert_eq!(layout.root_rect.h, 208.0);
    }
}
