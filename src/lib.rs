//! LabelGrid Core - Split-Tree Label Templates
//!
//! # Ground Rules
//! 1. Documents Are Values (every edit returns a new snapshot)
//! 2. Untouched Subtrees Are Shared, Not Copied
//! 3. Stale Identifiers Are Misses, Not Errors
//! 4. Validation Advises; Only the Render Gate Refuses
//! 5. Geometry Is Derived, Never Stored

pub mod templates;
pub mod schema;
pub mod validation;
pub mod paths;
pub mod operations;
pub mod policy;
pub mod resolve;
pub mod layout;
pub mod history;
pub mod variables;
pub mod hashing;
pub mod config;
pub mod session;

pub use templates::{
    Direction, Element, ElementKind, LeafNode, Node, SplitNode, TemplateDoc, SCHEMA_VERSION,
};
pub use validation::{
    validate_document, validate_template, Validation, ValidationIssue, ValidationRule, Validator,
};
pub use paths::{get_node_by_id, list_nodes, update_node_by_id, NodeId, NodeIdError};
pub use layout::{compute_document_layout, compute_layout, LayoutOptions, LayoutRender, RectPx};
pub use history::History;
pub use variables::{extract_template_variables, TemplateVariables, TEMPLATE_MACROS};
pub use hashing::{canonical_json, document_fingerprint};
pub use config::{ConfigError, EditorConfig, LabelTarget};
pub use session::{EditorSession, RenderRequest, SessionError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
