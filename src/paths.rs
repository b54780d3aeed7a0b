//! Path Addressing - Deterministic Node Identifiers
//!
//! `r` is the root, `r/0` its first child, `r/1/0` the first child of the
//! root's second child, and so on. Identifiers are positional: a structural
//! edit above a node changes what its identifier points to, so every lookup
//! treats an unresolvable identifier as an ordinary miss.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::templates::{Node, NodeKind};

const ROOT: &str = "r";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    #[error("Node id must start with 'r': {0:?}")]
    MissingRoot(String),

    #[error("Invalid segment {segment:?} in node id {id:?}")]
    InvalidSegment { id: String, segment: String },
}

/// Opaque address of a node: `r(/[01])*`. Depth is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    pub fn root() -> Self {
        Self(ROOT.to_string())
    }

    pub fn parse(s: &str) -> Result<Self, NodeIdError> {
        segments(s).map(|_| Self(s.to_string()))
    }

    /// Identifier of the first (`0`) or second (`1`) child.
    pub fn child(&self, index: usize) -> Self {
        debug_assert!(index < 2, "split nodes have two children");
        Self(format!("{}/{}", self.0, index))
    }

    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|i| Self(self.0[..i].to_string()))
    }

    pub fn depth(&self) -> usize {
        self.0.matches('/').count()
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = NodeIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        segments(&s)?;
        Ok(Self(s))
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

fn segments(id: &str) -> Result<Vec<usize>, NodeIdError> {
    let mut parts = id.split('/');
    if parts.next() != Some(ROOT) {
        return Err(NodeIdError::MissingRoot(id.to_string()));
    }
    parts
        .map(|p| match p {
            "0" => Ok(0),
            "1" => Ok(1),
            other => Err(NodeIdError::InvalidSegment {
                id: id.to_string(),
                segment: other.to_string(),
            }),
        })
        .collect()
}

/// One row of the structure list.
#[derive(Debug, Clone, Serialize)]
pub struct NodeEntry {
    pub node_id: NodeId,
    pub kind: NodeKind,
    pub alias: Option<String>,
    pub depth: usize,
    #[serde(skip)]
    pub node: Arc<Node>,
}

/// Every node in pre-order (node, first subtree, second subtree).
pub fn list_nodes(root: &Arc<Node>) -> Vec<NodeEntry> {
    let mut out = Vec::new();
    walk(root, NodeId::root(), 0, &mut out);
    out
}

fn walk(node: &Arc<Node>, node_id: NodeId, depth: usize, out: &mut Vec<NodeEntry>) {
    out.push(NodeEntry {
        node_id: node_id.clone(),
        kind: node.kind(),
        alias: node.alias().map(str::to_string),
        depth,
        node: Arc::clone(node),
    });
    if let Node::Split(split) = node.as_ref() {
        walk(&split.children[0], node_id.child(0), depth + 1, out);
        walk(&split.children[1], node_id.child(1), depth + 1, out);
    }
}

/// Resolve an identifier; descending into a leaf or a malformed id is a miss.
pub fn get_node_by_id<'a>(root: &'a Arc<Node>, id: &str) -> Option<&'a Arc<Node>> {
    let path = segments(id).ok()?;
    let mut cur = root;
    for index in path {
        match cur.as_ref() {
            Node::Split(split) => cur = &split.children[index],
            Node::Leaf(_) => return None,
        }
    }
    Some(cur)
}

/// Copy-on-write replace of the node at `id`.
///
/// Only the nodes on the path from the root to the target are reallocated,
/// and only when the updater returned a different `Arc`. An unresolvable id
/// returns `root` itself.
pub fn update_node_by_id<F>(root: &Arc<Node>, id: &str, updater: F) -> Arc<Node>
where
    F: FnOnce(&Arc<Node>) -> Arc<Node>,
{
    match segments(id) {
        Ok(path) => update_at(root, &path, updater),
        Err(err) => {
            tracing::debug!(%err, "update skipped: unparsable node id");
            Arc::clone(root)
        }
    }
}

fn update_at<F>(node: &Arc<Node>, path: &[usize], updater: F) -> Arc<Node>
where
    F: FnOnce(&Arc<Node>) -> Arc<Node>,
{
    let Some((&index, rest)) = path.split_first() else {
        return updater(node);
    };
    let Node::Split(split) = node.as_ref() else {
        tracing::debug!(remaining = path.len(), "update skipped: path descends into a leaf");
        return Arc::clone(node);
    };
    let child = &split.children[index];
    let next = update_at(child, rest, updater);
    if Arc::ptr_eq(&next, child) {
        return Arc::clone(node);
    }
    let mut rebuilt = split.clone();
    rebuilt.children[index] = next;
    Arc::new(Node::Split(rebuilt))
}

/// Identifier of the node carrying `alias`, first match in pre-order.
pub fn resolve_alias(root: &Arc<Node>, alias: &str) -> Option<NodeId> {
    list_nodes(root)
        .into_iter()
        .find(|entry| entry.alias.as_deref() == Some(alias))
        .map(|entry| entry.node_id)
}
