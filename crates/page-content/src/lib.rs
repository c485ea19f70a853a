//! Snapshot model for observed page content.
//!
//! An observation captures the annotated content tree of a page at a point in
//! time. The execution engine keeps the most recent snapshot and re-validates
//! action targets against it immediately before acting, so the queries here
//! answer exactly two questions: which observed node sits at a coordinate,
//! and does a `{document, node}` pair still resolve where it was observed.

use actor_core_types::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Content tree captured by one observation of a page. Subframes contribute
/// subtrees carrying their own document identifier.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AnnotatedPageContent {
    pub root: ContentNode,
}

impl AnnotatedPageContent {
    pub fn new(root: ContentNode) -> Self {
        Self { root }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContentNode {
    /// Identifier of the document this node belongs to.
    pub document_identifier: String,
    /// Renderer-assigned node id, when the node is addressable.
    pub dom_node_id: Option<i32>,
    /// Viewport bounds, when the node was laid out and visible.
    pub geometry: Option<Rect>,
    pub label: Option<String>,
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    pub fn element(document_identifier: impl Into<String>, dom_node_id: i32, bounds: Rect) -> Self {
        Self {
            document_identifier: document_identifier.into(),
            dom_node_id: Some(dom_node_id),
            geometry: Some(bounds),
            label: None,
            children: Vec::new(),
        }
    }

    pub fn container(document_identifier: impl Into<String>, bounds: Rect) -> Self {
        Self {
            document_identifier: document_identifier.into(),
            dom_node_id: None,
            geometry: Some(bounds),
            label: None,
            children: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_children(mut self, children: Vec<ContentNode>) -> Self {
        self.children = children;
        self
    }
}

/// Description of an observed node matched by a hit test or id lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TargetNodeInfo {
    pub document_identifier: String,
    pub dom_node_id: Option<i32>,
    pub geometry: Option<Rect>,
}

impl TargetNodeInfo {
    fn from_node(node: &ContentNode) -> Self {
        Self {
            document_identifier: node.document_identifier.clone(),
            dom_node_id: node.dom_node_id,
            geometry: node.geometry,
        }
    }
}

/// Returns the deepest observed node whose bounds contain `point`.
pub fn find_node_at_point(content: &AnnotatedPageContent, point: Point) -> Option<TargetNodeInfo> {
    fn descend(node: &ContentNode, point: Point) -> Option<TargetNodeInfo> {
        let hit_here = node.geometry.is_some_and(|bounds| bounds.contains(point));
        // Children may overflow the parent's recorded bounds, so they are
        // searched regardless of whether the parent itself is a hit.
        let child_hit = node
            .children
            .iter()
            .rev()
            .find_map(|child| descend(child, point));
        child_hit.or_else(|| hit_here.then(|| TargetNodeInfo::from_node(node)))
    }
    descend(&content.root, point)
}

/// Looks up a node by renderer id. A node found under a document other than
/// `document_identifier` is a miss: the caller observed it elsewhere.
pub fn find_node_with_id(
    content: &AnnotatedPageContent,
    document_identifier: &str,
    dom_node_id: i32,
) -> Option<TargetNodeInfo> {
    fn descend(node: &ContentNode, dom_node_id: i32) -> Option<TargetNodeInfo> {
        if node.dom_node_id == Some(dom_node_id) {
            return Some(TargetNodeInfo::from_node(node));
        }
        node.children
            .iter()
            .find_map(|child| descend(child, dom_node_id))
    }
    let info = descend(&content.root, dom_node_id)?;
    if info.document_identifier != document_identifier {
        return None;
    }
    Some(info)
}
