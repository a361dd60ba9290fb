//! Host adapter contract and the in-memory reference host.
//!
//! The reconciler never touches a host tree directly; every mutation goes
//! through [`HostOps`], keyed by opaque [`HostId`] handles. [`MemoryHost`]
//! implements the contract over a slab of nodes and records every mutation
//! in an op log, which is what the engine tests assert against.

use std::fmt::Write as _;

use indexmap::IndexMap;

/// Opaque handle to a host-tree node.
pub type HostId = usize;

/// Property values the reconciler can diff. Event handlers and other
/// non-comparable bindings never enter the prop map.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Num(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

/// Capability set the reconciler requires from a host tree.
pub trait HostOps {
    fn create_element(&mut self, tag: &str, is_svg: bool, is_custom: Option<&str>) -> HostId;
    fn create_text(&mut self, text: &str) -> HostId;
    fn create_comment(&mut self, text: &str) -> HostId;
    fn insert(&mut self, node: HostId, parent: HostId, anchor: Option<HostId>);
    fn remove(&mut self, node: HostId);
    fn set_text(&mut self, node: HostId, text: &str);
    fn set_element_text(&mut self, parent: HostId, text: &str);
    fn parent_node(&self, node: HostId) -> Option<HostId>;
    fn next_sibling(&self, node: HostId) -> Option<HostId>;
    fn patch_prop(
        &mut self,
        el: HostId,
        key: &str,
        prev: Option<&PropValue>,
        next: Option<&PropValue>,
        is_svg: bool,
    );

    /// Hosts may force reapplication of specific keys even when values
    /// compare equal (e.g. `value` on form controls).
    fn force_patch_prop(&self, _el: HostId, _key: &str) -> bool {
        false
    }

    fn set_scope_id(&mut self, _el: HostId, _scope: &str) {}

    /// Optional capability: clone a mounted node (enables hoisted-subtree
    /// reuse).
    fn clone_node(&mut self, _node: HostId) -> Option<HostId> {
        None
    }

    /// Optional capability: insert precompiled static content, returning
    /// the first and last inserted node.
    fn insert_static_content(
        &mut self,
        _content: &str,
        _parent: HostId,
        _anchor: Option<HostId>,
        _is_svg: bool,
    ) -> Option<(HostId, HostId)> {
        None
    }
}

/// One recorded host mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    CreateElement { node: HostId, tag: String },
    CreateText { node: HostId, text: String },
    CreateComment { node: HostId, text: String },
    Insert { node: HostId, parent: HostId, anchor: Option<HostId> },
    Remove { node: HostId },
    SetText { node: HostId, text: String },
    SetElementText { parent: HostId, text: String },
    PatchProp { el: HostId, key: String, cleared: bool },
    SetScopeId { el: HostId, scope: String },
    CloneNode { source: HostId, node: HostId },
    InsertStatic { first: HostId, last: HostId },
}

#[derive(Clone, Debug)]
enum MemoryNodeKind {
    Element {
        tag: String,
        is_svg: bool,
        attrs: IndexMap<String, PropValue>,
        scopes: Vec<String>,
    },
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug)]
struct MemoryNode {
    kind: MemoryNodeKind,
    parent: Option<HostId>,
    children: Vec<HostId>,
}

/// Slab-backed host tree that records its mutations; the reference host
/// the engine tests assert against.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<Option<MemoryNode>>,
    ops: Vec<HostOp>,
    /// Keys for which `force_patch_prop` answers true.
    pub forced_keys: Vec<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a detached element to serve as a render container.
    pub fn create_container(&mut self) -> HostId {
        let id = self.alloc(MemoryNodeKind::Element {
            tag: "root".to_owned(),
            is_svg: false,
            attrs: IndexMap::new(),
            scopes: Vec::new(),
        });
        // Container allocation is setup, not a reconciliation mutation.
        self.ops.pop();
        id
    }

    fn alloc(&mut self, kind: MemoryNodeKind) -> HostId {
        let id = self.nodes.len();
        let op = match &kind {
            MemoryNodeKind::Element { tag, .. } => HostOp::CreateElement {
                node: id,
                tag: tag.clone(),
            },
            MemoryNodeKind::Text(text) => HostOp::CreateText {
                node: id,
                text: text.clone(),
            },
            MemoryNodeKind::Comment(text) => HostOp::CreateComment {
                node: id,
                text: text.clone(),
            },
        };
        self.nodes.push(Some(MemoryNode {
            kind,
            parent: None,
            children: Vec::new(),
        }));
        self.ops.push(op);
        id
    }

    fn node(&self, id: HostId) -> Option<&MemoryNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: HostId) -> Option<&mut MemoryNode> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    fn detach(&mut self, node: HostId) {
        let parent = self.node(node).and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(parent_node) = self.node_mut(parent) {
                parent_node.children.retain(|&child| child != node);
            }
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }
    }

    /// Recorded mutations since the last [`Self::clear_ops`].
    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn op_count(&self, matcher: impl Fn(&HostOp) -> bool) -> usize {
        self.ops.iter().filter(|op| matcher(op)).count()
    }

    /// Number of `Insert` ops that re-attached an already-created node,
    /// i.e. host moves as opposed to first insertions.
    pub fn move_count(&self) -> usize {
        let created: Vec<HostId> = self
            .ops
            .iter()
            .filter_map(|op| match op {
                HostOp::CreateElement { node, .. }
                | HostOp::CreateText { node, .. }
                | HostOp::CreateComment { node, .. } => Some(*node),
                _ => None,
            })
            .collect();
        self.ops
            .iter()
            .filter(|op| match op {
                HostOp::Insert { node, .. } => !created.contains(node),
                _ => false,
            })
            .count()
    }

    pub fn children_of(&self, parent: HostId) -> Vec<HostId> {
        self.node(parent).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn attr(&self, el: HostId, key: &str) -> Option<PropValue> {
        match self.node(el).map(|n| &n.kind) {
            Some(MemoryNodeKind::Element { attrs, .. }) => attrs.get(key).cloned(),
            _ => None,
        }
    }

    pub fn scopes(&self, el: HostId) -> Vec<String> {
        match self.node(el).map(|n| &n.kind) {
            Some(MemoryNodeKind::Element { scopes, .. }) => scopes.clone(),
            _ => Vec::new(),
        }
    }

    /// Serializes a subtree to an HTML-ish string for assertions.
    pub fn to_html(&self, root: HostId) -> String {
        let mut out = String::new();
        self.write_node(&mut out, root);
        out
    }

    fn write_node(&self, out: &mut String, id: HostId) {
        let Some(node) = self.node(id) else {
            out.push_str("<!missing!>");
            return;
        };
        match &node.kind {
            MemoryNodeKind::Text(text) => out.push_str(text),
            MemoryNodeKind::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            MemoryNodeKind::Element { tag, attrs, .. } => {
                let _ = write!(out, "<{tag}");
                for (key, value) in attrs {
                    match value {
                        PropValue::Str(s) => {
                            let _ = write!(out, " {key}=\"{s}\"");
                        }
                        PropValue::Num(n) => {
                            let _ = write!(out, " {key}=\"{n}\"");
                        }
                        PropValue::Bool(true) => {
                            let _ = write!(out, " {key}");
                        }
                        PropValue::Bool(false) => {}
                    }
                }
                out.push('>');
                for &child in &node.children {
                    self.write_node(out, child);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

impl HostOps for MemoryHost {
    fn create_element(&mut self, tag: &str, is_svg: bool, _is_custom: Option<&str>) -> HostId {
        self.alloc(MemoryNodeKind::Element {
            tag: tag.to_owned(),
            is_svg,
            attrs: IndexMap::new(),
            scopes: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> HostId {
        self.alloc(MemoryNodeKind::Text(text.to_owned()))
    }

    fn create_comment(&mut self, text: &str) -> HostId {
        self.alloc(MemoryNodeKind::Comment(text.to_owned()))
    }

    fn insert(&mut self, node: HostId, parent: HostId, anchor: Option<HostId>) {
        self.detach(node);
        let Some(parent_node) = self.node_mut(parent) else {
            return;
        };
        let index = anchor
            .and_then(|anchor| parent_node.children.iter().position(|&c| c == anchor))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(index, node);
        if let Some(n) = self.node_mut(node) {
            n.parent = Some(parent);
        }
        self.ops.push(HostOp::Insert { node, parent, anchor });
    }

    fn remove(&mut self, node: HostId) {
        self.detach(node);
        self.ops.push(HostOp::Remove { node });
    }

    fn set_text(&mut self, node: HostId, text: &str) {
        if let Some(n) = self.node_mut(node) {
            match &mut n.kind {
                MemoryNodeKind::Text(content) | MemoryNodeKind::Comment(content) => {
                    *content = text.to_owned();
                }
                MemoryNodeKind::Element { .. } => {}
            }
        }
        self.ops.push(HostOp::SetText {
            node,
            text: text.to_owned(),
        });
    }

    fn set_element_text(&mut self, parent: HostId, text: &str) {
        let children = self.children_of(parent);
        for child in children {
            self.detach(child);
        }
        if !text.is_empty() {
            let text_node = self.alloc(MemoryNodeKind::Text(text.to_owned()));
            // Direct text assignment is one host op, not a create+insert.
            self.ops.pop();
            if let Some(parent_node) = self.node_mut(parent) {
                parent_node.children.push(text_node);
            }
            if let Some(n) = self.node_mut(text_node) {
                n.parent = Some(parent);
            }
        }
        self.ops.push(HostOp::SetElementText {
            parent,
            text: text.to_owned(),
        });
    }

    fn parent_node(&self, node: HostId) -> Option<HostId> {
        self.node(node).and_then(|n| n.parent)
    }

    fn next_sibling(&self, node: HostId) -> Option<HostId> {
        let parent = self.node(node)?.parent?;
        let siblings = &self.node(parent)?.children;
        let index = siblings.iter().position(|&c| c == node)?;
        siblings.get(index + 1).copied()
    }

    fn patch_prop(
        &mut self,
        el: HostId,
        key: &str,
        _prev: Option<&PropValue>,
        next: Option<&PropValue>,
        _is_svg: bool,
    ) {
        if let Some(MemoryNode {
            kind: MemoryNodeKind::Element { attrs, .. },
            ..
        }) = self.node_mut(el)
        {
            match next {
                Some(value) => {
                    attrs.insert(key.to_owned(), value.clone());
                }
                None => {
                    attrs.shift_remove(key);
                }
            }
        }
        self.ops.push(HostOp::PatchProp {
            el,
            key: key.to_owned(),
            cleared: next.is_none(),
        });
    }

    fn force_patch_prop(&self, _el: HostId, key: &str) -> bool {
        self.forced_keys.iter().any(|forced| forced == key)
    }

    fn set_scope_id(&mut self, el: HostId, scope: &str) {
        if let Some(MemoryNode {
            kind: MemoryNodeKind::Element { scopes, .. },
            ..
        }) = self.node_mut(el)
        {
            scopes.push(scope.to_owned());
        }
        self.ops.push(HostOp::SetScopeId {
            el,
            scope: scope.to_owned(),
        });
    }

    fn clone_node(&mut self, node: HostId) -> Option<HostId> {
        let source = self.node(node)?.clone();
        let children = source.children.clone();
        let id = self.alloc(source.kind);
        // alloc records a create op; rewrite it as a clone.
        self.ops.pop();
        let mut cloned_children = Vec::with_capacity(children.len());
        for child in children {
            if let Some(cloned) = self.clone_node(child) {
                self.ops.pop();
                if let Some(n) = self.node_mut(cloned) {
                    n.parent = Some(id);
                }
                cloned_children.push(cloned);
            }
        }
        if let Some(n) = self.node_mut(id) {
            n.children = cloned_children;
        }
        self.ops.push(HostOp::CloneNode { source: node, node: id });
        Some(id)
    }

    fn insert_static_content(
        &mut self,
        content: &str,
        parent: HostId,
        anchor: Option<HostId>,
        _is_svg: bool,
    ) -> Option<(HostId, HostId)> {
        // Static content is opaque to the reconciler; a text span with
        // delimiting markers is enough fidelity for an in-memory host.
        let first = self.alloc(MemoryNodeKind::Comment("[".to_owned()));
        self.ops.pop();
        let body = self.alloc(MemoryNodeKind::Text(content.to_owned()));
        self.ops.pop();
        let last = self.alloc(MemoryNodeKind::Comment("]".to_owned()));
        self.ops.pop();
        for node in [first, body, last] {
            self.insert(node, parent, anchor);
            self.ops.pop();
        }
        self.ops.push(HostOp::InsertStatic { first, last });
        Some((first, last))
    }
}
