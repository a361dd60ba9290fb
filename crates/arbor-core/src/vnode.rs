//! The virtual node model.
//!
//! A [`VNode`] is an immutable-by-convention description of one tree
//! position, produced fresh on every render pass. The host-tree bindings
//! (`el`, `anchor`, `component`) are late-bound owned cells: they start
//! unbound and are written exactly once per mount by the owning
//! reconciliation pass.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::component::{ComponentDef, ComponentInstance};
use crate::error::RenderError;
use crate::host::{HostId, HostOps, PropValue};
use crate::suspense::{SuspenseBehavior, SuspenseBoundary, TeleportBehavior};

/// Identity token distinguishing siblings across render passes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Num(i64),
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Num(value)
    }
}

/// Property map of a virtual node. Insertion order is preserved so diffs
/// walk keys deterministically.
pub type Props = IndexMap<Rc<str>, PropValue>;

/// Convenience constructor for literal prop maps in tests and manual trees.
pub fn props<'a>(entries: impl IntoIterator<Item = (&'a str, PropValue)>) -> Props {
    entries
        .into_iter()
        .map(|(key, value)| (Rc::from(key), value))
        .collect()
}

/// The closed set of node categories. The original encoded these as a bit
/// set; a tagged union keeps the same branch structure without raw bit
/// tests.
#[derive(Clone)]
pub enum NodeKind {
    Text,
    Comment,
    /// Precompiled static content, inserted as an opaque span.
    Static { content: Rc<str> },
    /// Virtual container delimited by two host anchors.
    Fragment,
    Element { tag: Rc<str> },
    Component { def: Rc<ComponentDef> },
    /// External collaborator relocating content to another host position.
    Teleport { behavior: Rc<dyn TeleportBehavior> },
    /// External collaborator coordinating async dependencies.
    Suspense { behavior: Rc<dyn SuspenseBehavior> },
}

impl NodeKind {
    /// Structural equality: same category, and for elements the same tag,
    /// for components the same definition, for delegated kinds the same
    /// behavior object.
    pub fn same(&self, other: &NodeKind) -> bool {
        match (self, other) {
            (NodeKind::Text, NodeKind::Text) => true,
            (NodeKind::Comment, NodeKind::Comment) => true,
            (NodeKind::Static { content: a }, NodeKind::Static { content: b }) => {
                Rc::ptr_eq(a, b) || a == b
            }
            (NodeKind::Fragment, NodeKind::Fragment) => true,
            (NodeKind::Element { tag: a }, NodeKind::Element { tag: b }) => a == b,
            (NodeKind::Component { def: a }, NodeKind::Component { def: b }) => Rc::ptr_eq(a, b),
            (NodeKind::Teleport { behavior: a }, NodeKind::Teleport { behavior: b }) => {
                Rc::ptr_eq(a, b)
            }
            (NodeKind::Suspense { behavior: a }, NodeKind::Suspense { behavior: b }) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Text => write!(f, "Text"),
            NodeKind::Comment => write!(f, "Comment"),
            NodeKind::Static { .. } => write!(f, "Static"),
            NodeKind::Fragment => write!(f, "Fragment"),
            NodeKind::Element { tag } => write!(f, "Element({tag})"),
            NodeKind::Component { def } => match &def.name {
                Some(name) => write!(f, "Component({name})"),
                None => write!(f, "Component"),
            },
            NodeKind::Teleport { .. } => write!(f, "Teleport"),
            NodeKind::Suspense { .. } => write!(f, "Suspense"),
        }
    }
}

/// Compiler-emitted hints restricting which aspects of a node may change
/// between renders. Hints are additive: an unset hint means "assume
/// nothing, take the slow path". `hoisted` and `bail` are the negative
/// markers of the original encoding and exclude the positive hints.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct PatchHints {
    /// Only dynamic text children.
    pub text: bool,
    /// Only a dynamic `class` binding.
    pub class: bool,
    /// Only a dynamic `style` binding.
    pub style: bool,
    /// Dynamic bindings limited to the enumerated `dynamic_props` keys.
    pub props: bool,
    /// Props contain dynamic keys; full prop diff required.
    pub full_props: bool,
    /// Fragment whose children order never changes.
    pub stable_fragment: bool,
    /// Fragment with keyed (or partially keyed) children.
    pub keyed_fragment: bool,
    /// Fragment whose children are unkeyed.
    pub unkeyed_fragment: bool,
    /// Hoisted static node; may be reused via host cloning.
    pub hoisted: bool,
    /// The compiler could not guarantee shape stability: discard every
    /// optimization and take the full diff path.
    pub bail: bool,
}

impl PatchHints {
    /// Equivalent of the original's `patchFlag > 0` test.
    pub fn is_dynamic(&self) -> bool {
        self.text
            || self.class
            || self.style
            || self.props
            || self.full_props
            || self.stable_fragment
            || self.keyed_fragment
            || self.unkeyed_fragment
    }
}

/// Children of a virtual node.
#[derive(Clone, Default)]
pub enum Children {
    #[default]
    None,
    Text(Rc<str>),
    Nodes(Vec<Rc<VNode>>),
}

impl Children {
    pub fn as_text(&self) -> Option<&Rc<str>> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[Rc<VNode>]> {
        match self {
            Children::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Children::None)
    }
}

/// Value handed to a ref binding once its node is mounted.
#[derive(Clone)]
pub enum RefValue {
    Element(HostId),
    Component(Rc<ComponentInstance>),
}

impl PartialEq for RefValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RefValue::Element(a), RefValue::Element(b)) => a == b,
            (RefValue::Component(a), RefValue::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for RefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefValue::Element(id) => write!(f, "Element({id})"),
            RefValue::Component(_) => write!(f, "Component"),
        }
    }
}

/// External mutable cell a ref can be bound to.
#[derive(Clone, Default)]
pub struct RefSlot(Rc<RefCell<Option<RefValue>>>);

impl RefSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<RefValue> {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: Option<RefValue>) {
        *self.0.borrow_mut() = value;
    }
}

impl PartialEq for RefSlot {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Callback-style refs receive the bound value and the owner's full refs
/// map.
pub type RefCallback =
    Rc<dyn Fn(Option<RefValue>, &crate::FastMap<Rc<str>, Option<RefValue>>) -> Result<(), RenderError>>;

/// Binding target for a node's `ref`. Refs are treated as always-dynamic
/// and rebound on every patch.
#[derive(Clone)]
pub enum Ref {
    /// Registered under a key in the owner component's refs map.
    Named(Rc<str>),
    /// Written into an external mutable cell.
    Slot(RefSlot),
    /// Invoked immediately with the value.
    Callback(RefCallback),
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Ref::Named(a), Ref::Named(b)) => a == b,
            (Ref::Slot(a), Ref::Slot(b)) => a == b,
            (Ref::Callback(a), Ref::Callback(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Per-node lifecycle hook, invoked with the node and (for updates) its
/// predecessor.
pub type VNodeHook = Rc<dyn Fn(&Rc<VNode>, Option<&Rc<VNode>>) -> Result<(), RenderError>>;

/// Optional per-node lifecycle hooks, mirroring the component lifecycle at
/// single-node granularity.
#[derive(Clone, Default)]
pub struct VNodeHooks {
    pub before_mount: Option<VNodeHook>,
    pub mounted: Option<VNodeHook>,
    pub before_update: Option<VNodeHook>,
    pub updated: Option<VNodeHook>,
    pub before_unmount: Option<VNodeHook>,
    pub unmounted: Option<VNodeHook>,
}

impl VNodeHooks {
    pub fn is_empty(&self) -> bool {
        self.before_mount.is_none()
            && self.mounted.is_none()
            && self.before_update.is_none()
            && self.updated.is_none()
            && self.before_unmount.is_none()
            && self.unmounted.is_none()
    }
}

/// Directive hook bundle attached to an element node.
#[derive(Clone, Default)]
pub struct DirectiveHooks {
    pub before_mount: Option<VNodeHook>,
    pub mounted: Option<VNodeHook>,
    pub before_update: Option<VNodeHook>,
    pub updated: Option<VNodeHook>,
    pub before_unmount: Option<VNodeHook>,
    pub unmounted: Option<VNodeHook>,
}

/// Enter/leave animation collaborator for element nodes. The reconciler
/// only sequences the calls; what an enter or leave actually does is the
/// behavior's business. A leave behavior receives the physical-removal
/// continuation and may hold it to defer removal past an animation.
pub trait TransitionBehavior {
    /// Persisted transitions keep their host nodes alive across toggles and
    /// are never animated by the reconciler.
    fn persisted(&self) -> bool {
        false
    }

    fn before_enter(&self, _host: &mut dyn HostOps, _el: HostId) {}

    fn enter(&self, _host: &mut dyn HostOps, _el: HostId) {}

    /// Default behavior removes immediately.
    fn leave(&self, host: &mut dyn HostOps, el: HostId, done: Box<dyn FnOnce(&mut dyn HostOps)>) {
        let _ = el;
        done(host);
    }

    fn after_leave(&self) {}
}

/// One position in a virtual tree.
pub struct VNode {
    pub kind: NodeKind,
    pub props: Option<Props>,
    pub children: RefCell<Children>,
    pub key: Option<Key>,
    pub hints: PatchHints,
    /// Keys enumerated by the compiler when `hints.props` is set.
    pub dynamic_props: SmallVec<[Rc<str>; 4]>,
    /// Flat list of dynamic descendants enabling the block fast path.
    pub dynamic_children: RefCell<Option<Vec<Rc<VNode>>>>,
    /// Host handle, bound on mount.
    pub el: Cell<Option<HostId>>,
    /// Trailing host anchor for fragments and static spans.
    pub anchor: Cell<Option<HostId>>,
    /// Runtime instance, bound when a component node mounts.
    pub component: RefCell<Option<Rc<ComponentInstance>>>,
    /// Boundary handle, bound when a suspense node mounts.
    pub suspense: RefCell<Option<Rc<SuspenseBoundary>>>,
    pub ref_binding: Option<Ref>,
    /// Style-scoping mark applied to mounted elements.
    pub scope_id: Option<Rc<str>>,
    pub hooks: VNodeHooks,
    pub dirs: Vec<DirectiveHooks>,
    pub transition: Option<Rc<dyn TransitionBehavior>>,
    /// Set by a keep-alive cache on nodes it manages.
    pub should_keep_alive: Cell<bool>,
    /// Set by a keep-alive cache on nodes re-entering from its cache.
    pub kept_alive: Cell<bool>,
}

impl VNode {
    fn new(kind: NodeKind) -> VNode {
        VNode {
            kind,
            props: None,
            children: RefCell::new(Children::None),
            key: None,
            hints: PatchHints::default(),
            dynamic_props: SmallVec::new(),
            dynamic_children: RefCell::new(None),
            el: Cell::new(None),
            anchor: Cell::new(None),
            component: RefCell::new(None),
            suspense: RefCell::new(None),
            ref_binding: None,
            scope_id: None,
            hooks: VNodeHooks::default(),
            dirs: Vec::new(),
            transition: None,
            should_keep_alive: Cell::new(false),
            kept_alive: Cell::new(false),
        }
    }

    pub fn element(tag: &str) -> VNode {
        VNode::new(NodeKind::Element { tag: Rc::from(tag) })
    }

    pub fn text(content: &str) -> VNode {
        let node = VNode::new(NodeKind::Text);
        *node.children.borrow_mut() = Children::Text(Rc::from(content));
        node
    }

    pub fn comment(content: &str) -> VNode {
        let node = VNode::new(NodeKind::Comment);
        *node.children.borrow_mut() = Children::Text(Rc::from(content));
        node
    }

    pub fn static_block(content: &str) -> VNode {
        VNode::new(NodeKind::Static {
            content: Rc::from(content),
        })
    }

    pub fn fragment(children: Vec<Rc<VNode>>) -> VNode {
        let node = VNode::new(NodeKind::Fragment);
        *node.children.borrow_mut() = Children::Nodes(children);
        node
    }

    pub fn component(def: &Rc<ComponentDef>) -> VNode {
        VNode::new(NodeKind::Component { def: def.clone() })
    }

    pub fn teleport(behavior: &Rc<dyn TeleportBehavior>) -> VNode {
        VNode::new(NodeKind::Teleport {
            behavior: behavior.clone(),
        })
    }

    pub fn suspense(behavior: &Rc<dyn SuspenseBehavior>) -> VNode {
        VNode::new(NodeKind::Suspense {
            behavior: behavior.clone(),
        })
    }

    pub fn keyed(mut self, key: impl Into<Key>) -> VNode {
        self.key = Some(key.into());
        self
    }

    pub fn with_props(mut self, props: Props) -> VNode {
        self.props = Some(props);
        self
    }

    pub fn with_children(self, children: Vec<Rc<VNode>>) -> VNode {
        *self.children.borrow_mut() = Children::Nodes(children);
        self
    }

    pub fn with_text(self, text: &str) -> VNode {
        *self.children.borrow_mut() = Children::Text(Rc::from(text));
        self
    }

    pub fn with_hints(mut self, hints: PatchHints) -> VNode {
        self.hints = hints;
        self
    }

    pub fn with_dynamic_props(mut self, keys: impl IntoIterator<Item = &'static str>) -> VNode {
        self.dynamic_props = keys.into_iter().map(Rc::from).collect();
        self
    }

    pub fn with_dynamic_children(self, children: Vec<Rc<VNode>>) -> VNode {
        *self.dynamic_children.borrow_mut() = Some(children);
        self
    }

    pub fn with_ref(mut self, binding: Ref) -> VNode {
        self.ref_binding = Some(binding);
        self
    }

    pub fn with_scope_id(mut self, scope_id: &str) -> VNode {
        self.scope_id = Some(Rc::from(scope_id));
        self
    }

    pub fn with_hooks(mut self, hooks: VNodeHooks) -> VNode {
        self.hooks = hooks;
        self
    }

    pub fn with_dirs(mut self, dirs: Vec<DirectiveHooks>) -> VNode {
        self.dirs = dirs;
        self
    }

    pub fn with_transition(mut self, transition: Rc<dyn TransitionBehavior>) -> VNode {
        self.transition = Some(transition);
        self
    }

    pub fn done(self) -> Rc<VNode> {
        Rc::new(self)
    }

    /// A node already bound to a host handle on a later pass signals
    /// reuse; it must be cloned with fresh bindings instead of being
    /// patched in place. Hoisted nodes alone keep `el` in the clone, as
    /// the handle seeds the host-clone mount path.
    pub fn clone_unbound(&self) -> Rc<VNode> {
        Rc::new(VNode {
            kind: self.kind.clone(),
            props: self.props.clone(),
            children: RefCell::new(self.children.borrow().clone()),
            key: self.key.clone(),
            hints: self.hints,
            dynamic_props: self.dynamic_props.clone(),
            dynamic_children: RefCell::new(self.dynamic_children.borrow().clone()),
            // Hoisted nodes keep their binding so a later mount can
            // host-clone the already-built subtree.
            el: Cell::new(if self.hints.hoisted { self.el.get() } else { None }),
            anchor: Cell::new(None),
            component: RefCell::new(None),
            suspense: RefCell::new(None),
            ref_binding: self.ref_binding.clone(),
            scope_id: self.scope_id.clone(),
            hooks: self.hooks.clone(),
            dirs: self.dirs.clone(),
            transition: self.transition.clone(),
            should_keep_alive: Cell::new(self.should_keep_alive.get()),
            kept_alive: Cell::new(self.kept_alive.get()),
        })
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }

    pub fn is_component(&self) -> bool {
        matches!(self.kind, NodeKind::Component { .. })
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.kind, NodeKind::Fragment)
    }

    pub fn is_teleport(&self) -> bool {
        matches!(self.kind, NodeKind::Teleport { .. })
    }

    pub fn text_children(&self) -> Option<Rc<str>> {
        self.children.borrow().as_text().cloned()
    }

    /// Snapshot of array children. Cheap: clones the `Rc` handles only.
    pub fn child_nodes(&self) -> Vec<Rc<VNode>> {
        self.children
            .borrow()
            .as_nodes()
            .map(<[Rc<VNode>]>::to_vec)
            .unwrap_or_default()
    }

    pub fn taken_dynamic_children(&self) -> Option<Vec<Rc<VNode>>> {
        self.dynamic_children.borrow().clone()
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("el", &self.el.get())
            .finish_non_exhaustive()
    }
}

/// Two nodes describe "the same" tree position when both category and key
/// match; anything else is a full replace.
pub fn same_node_type(a: &VNode, b: &VNode) -> bool {
    a.kind.same(&b.kind) && a.key == b.key
}
