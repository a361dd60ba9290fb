//! Stateful component runtime.
//!
//! A [`ComponentDef`] is the shared description (setup + render); a
//! [`ComponentInstance`] is one mounted occurrence, holding the rendered
//! subtree, queued next node, lifecycle hook lists and async-setup state.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::RendererApi;
use crate::error::{ErrorSink, ErrorSource, RenderError};
use crate::host::HostId;
use crate::suspense::SuspenseBoundary;
use crate::vnode::{Children, Props, RefValue, VNode};
use crate::FastMap;

static NEXT_UID: AtomicU64 = AtomicU64::new(0);

/// Produces the component's subtree from its current state.
pub type RenderFn = Rc<dyn Fn(&ComponentInstance) -> Rc<VNode>>;

/// One-time initialization, run before the first render.
pub type SetupFn = Rc<dyn Fn(&Rc<ComponentInstance>) -> Result<SetupOutcome, RenderError>>;

/// Zero-argument lifecycle callback.
pub type HookFn = Rc<dyn Fn() -> Result<(), RenderError>>;

/// Result of running setup.
pub enum SetupOutcome {
    Ready,
    /// Setup depends on an async resource; mounting is parked until the
    /// dependency resolves.
    Pending(Rc<AsyncDep>),
}

/// Resolvable token standing in for an async setup dependency.
#[derive(Default)]
pub struct AsyncDep {
    resolved: Cell<bool>,
}

impl AsyncDep {
    pub fn new() -> Rc<AsyncDep> {
        Rc::new(AsyncDep::default())
    }

    pub fn resolve(&self) {
        self.resolved.set(true);
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get()
    }
}

/// Cache owner that components flagged for keep-alive delegate their
/// mount and unmount to.
pub trait KeepAliveContext {
    fn activate(
        &self,
        api: &mut dyn RendererApi,
        vnode: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError>;

    fn deactivate(&self, api: &mut dyn RendererApi, vnode: &Rc<VNode>) -> Result<(), RenderError>;
}

/// Shared component description.
pub struct ComponentDef {
    pub name: Option<Rc<str>>,
    pub setup: Option<SetupFn>,
    pub render: RenderFn,
    /// Style-scoping mark applied to the rendered subtree's root elements.
    pub scope_id: Option<Rc<str>>,
}

impl ComponentDef {
    pub fn new(render: impl Fn(&ComponentInstance) -> Rc<VNode> + 'static) -> ComponentDef {
        ComponentDef {
            name: None,
            setup: None,
            render: Rc::new(render),
            scope_id: None,
        }
    }

    pub fn named(mut self, name: &str) -> ComponentDef {
        self.name = Some(Rc::from(name));
        self
    }

    pub fn with_setup(
        mut self,
        setup: impl Fn(&Rc<ComponentInstance>) -> Result<SetupOutcome, RenderError> + 'static,
    ) -> ComponentDef {
        self.setup = Some(Rc::new(setup));
        self
    }

    pub fn with_scope_id(mut self, scope_id: &str) -> ComponentDef {
        self.scope_id = Some(Rc::from(scope_id));
        self
    }

    pub fn done(self) -> Rc<ComponentDef> {
        Rc::new(self)
    }
}

/// Stoppable handle for a side effect registered during setup. Stopped
/// effects are skipped by whatever owns the underlying work.
#[derive(Clone, Default)]
pub struct EffectHandle {
    active: Rc<Cell<bool>>,
}

impl EffectHandle {
    pub fn new() -> EffectHandle {
        let handle = EffectHandle::default();
        handle.active.set(true);
        handle
    }

    pub fn stop(&self) {
        self.active.set(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

/// Registered lifecycle callbacks, grouped by phase.
#[derive(Default)]
pub struct LifecycleHooks {
    pub before_mount: RefCell<Vec<HookFn>>,
    pub mounted: RefCell<Vec<HookFn>>,
    pub before_update: RefCell<Vec<HookFn>>,
    pub updated: RefCell<Vec<HookFn>>,
    pub before_unmount: RefCell<Vec<HookFn>>,
    pub unmounted: RefCell<Vec<HookFn>>,
    pub activated: RefCell<Vec<HookFn>>,
    pub deactivated: RefCell<Vec<HookFn>>,
}

impl LifecycleHooks {
    /// Runs every hook in a list, routing failures to the sink.
    pub fn run(list: &RefCell<Vec<HookFn>>, sink: &ErrorSink) {
        let hooks: Vec<HookFn> = list.borrow().clone();
        for hook in hooks {
            sink.guard(ErrorSource::LifecycleHook, || hook());
        }
    }
}

/// One mounted occurrence of a component.
pub struct ComponentInstance {
    /// Creation-ordered id; parents always precede their children.
    pub uid: u64,
    pub def: Rc<ComponentDef>,
    /// The component node currently representing this instance.
    pub vnode: RefCell<Rc<VNode>>,
    pub parent: Option<Weak<ComponentInstance>>,
    pub props: RefCell<Props>,
    pub slots: RefCell<Children>,
    /// Root of the rendered subtree, set on first render.
    pub sub_tree: RefCell<Option<Rc<VNode>>>,
    /// Pending replacement node pushed by the parent; consumed by the
    /// next update pass.
    pub next: RefCell<Option<Rc<VNode>>>,
    pub is_mounted: Cell<bool>,
    pub is_unmounted: Cell<bool>,
    pub is_deactivated: Cell<bool>,
    /// Render effect liveness; cleared on unmount so stale queued updates
    /// become no-ops.
    pub effect_active: Cell<bool>,
    /// Side effects registered during setup, stopped on unmount.
    pub effects: RefCell<Vec<EffectHandle>>,
    pub async_dep: RefCell<Option<Rc<AsyncDep>>>,
    /// Latched once the async dependency resolves and the instance
    /// finishes its real mount.
    pub async_resolved: Cell<bool>,
    /// Named refs registered by child nodes of the rendered subtree.
    pub refs: RefCell<FastMap<Rc<str>, Option<RefValue>>>,
    pub hooks: LifecycleHooks,
    /// Nearest enclosing suspense boundary at mount time.
    pub parent_suspense: RefCell<Option<Rc<SuspenseBoundary>>>,
    /// Cache context when this instance owns a keep-alive cache.
    pub keep_alive: RefCell<Option<Rc<dyn KeepAliveContext>>>,
}

impl ComponentInstance {
    pub fn new(
        def: Rc<ComponentDef>,
        vnode: Rc<VNode>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Rc<ComponentInstance> {
        let props = vnode.props.clone().unwrap_or_default();
        let slots = vnode.children.borrow().clone();
        Rc::new(ComponentInstance {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            def,
            vnode: RefCell::new(vnode),
            parent: parent.map(Rc::downgrade),
            props: RefCell::new(props),
            slots: RefCell::new(slots),
            sub_tree: RefCell::new(None),
            next: RefCell::new(None),
            is_mounted: Cell::new(false),
            is_unmounted: Cell::new(false),
            is_deactivated: Cell::new(false),
            effect_active: Cell::new(false),
            effects: RefCell::new(Vec::new()),
            async_dep: RefCell::new(None),
            async_resolved: Cell::new(false),
            refs: RefCell::new(FastMap::default()),
            hooks: LifecycleHooks::default(),
            parent_suspense: RefCell::new(None),
            keep_alive: RefCell::new(None),
        })
    }

    pub fn name(&self) -> &str {
        self.def.name.as_deref().unwrap_or("<anonymous>")
    }

    pub fn render(&self) -> Rc<VNode> {
        (self.def.render)(self)
    }

    /// Keep-alive context of the parent chain, if any ancestor owns one.
    pub fn parent_keep_alive(&self) -> Option<Rc<dyn KeepAliveContext>> {
        let mut current = self.parent.as_ref().and_then(Weak::upgrade);
        while let Some(instance) = current {
            if let Some(ctx) = instance.keep_alive.borrow().clone() {
                return Some(ctx);
            }
            current = instance.parent.as_ref().and_then(Weak::upgrade);
        }
        None
    }

    pub fn on_before_mount(&self, hook: impl Fn() -> Result<(), RenderError> + 'static) {
        self.hooks.before_mount.borrow_mut().push(Rc::new(hook));
    }

    pub fn on_mounted(&self, hook: impl Fn() -> Result<(), RenderError> + 'static) {
        self.hooks.mounted.borrow_mut().push(Rc::new(hook));
    }

    pub fn on_before_update(&self, hook: impl Fn() -> Result<(), RenderError> + 'static) {
        self.hooks.before_update.borrow_mut().push(Rc::new(hook));
    }

    pub fn on_updated(&self, hook: impl Fn() -> Result<(), RenderError> + 'static) {
        self.hooks.updated.borrow_mut().push(Rc::new(hook));
    }

    pub fn on_before_unmount(&self, hook: impl Fn() -> Result<(), RenderError> + 'static) {
        self.hooks.before_unmount.borrow_mut().push(Rc::new(hook));
    }

    pub fn on_unmounted(&self, hook: impl Fn() -> Result<(), RenderError> + 'static) {
        self.hooks.unmounted.borrow_mut().push(Rc::new(hook));
    }

    pub fn on_activated(&self, hook: impl Fn() -> Result<(), RenderError> + 'static) {
        self.hooks.activated.borrow_mut().push(Rc::new(hook));
    }

    pub fn on_deactivated(&self, hook: impl Fn() -> Result<(), RenderError> + 'static) {
        self.hooks.deactivated.borrow_mut().push(Rc::new(hook));
    }

    pub fn register_effect(&self, effect: EffectHandle) {
        self.effects.borrow_mut().push(effect);
    }
}

/// Whether a new component node warrants re-rendering the instance, or
/// the binding update alone suffices.
pub fn should_update_component(prev: &VNode, next: &VNode, optimized: bool) -> bool {
    if !next.dirs.is_empty() || next.transition.is_some() {
        return true;
    }
    if optimized && !next.hints.bail {
        if next.hints.full_props {
            return prev.props != next.props;
        }
        if next.hints.props {
            let prev_props = prev.props.as_ref();
            let next_props = next.props.as_ref();
            return next.dynamic_props.iter().any(|key| {
                prev_props.and_then(|p| p.get(key)) != next_props.and_then(|p| p.get(key))
            });
        }
        // Hints promise a stable shape and no dynamic props.
        return false;
    }
    // Unoptimized slot content has to be assumed fresh on every pass.
    if !prev.children.borrow().is_none() || !next.children.borrow().is_none() {
        return true;
    }
    prev.props != next.props
}
