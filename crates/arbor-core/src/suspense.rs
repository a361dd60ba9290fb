//! Suspense accounting and the delegation contracts for teleport and
//! suspense nodes.
//!
//! The reconciler itself never implements teleport or suspense semantics;
//! it recognizes the node kinds and hands control to a behavior object,
//! passing its own internals back through [`RendererApi`]. What it does
//! own is the dependency accounting on [`SuspenseBoundary`] and the
//! parking of post-commit effects until a boundary resolves.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::api::{MoveType, RendererApi};
use crate::component::ComponentInstance;
use crate::error::RenderError;
use crate::host::HostId;
use crate::scheduler::{PostJob, Scheduler};
use crate::vnode::VNode;

/// Tracks outstanding async dependencies beneath one suspense node.
#[derive(Default)]
pub struct SuspenseBoundary {
    deps: Cell<i64>,
    is_resolved: Cell<bool>,
    pub is_unmounted: Cell<bool>,
    /// Post-commit jobs parked until resolution.
    effects: RefCell<Vec<PostJob>>,
}

impl SuspenseBoundary {
    pub fn new() -> Rc<SuspenseBoundary> {
        Rc::new(SuspenseBoundary::default())
    }

    pub fn deps(&self) -> i64 {
        self.deps.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.is_resolved.get()
    }

    pub fn is_pending(&self) -> bool {
        !self.is_resolved.get()
    }

    pub fn register_dep(&self) {
        self.deps.set(self.deps.get() + 1);
        self.is_resolved.set(false);
    }

    /// Releases one dependency. The count never goes negative, and
    /// reaching zero resolves the boundary exactly once.
    pub fn release_dep(&self, scheduler: &Scheduler) {
        let remaining = (self.deps.get() - 1).max(0);
        self.deps.set(remaining);
        if remaining == 0 {
            self.resolve(scheduler);
        }
    }

    /// Moves parked effects onto the post queue. Idempotent.
    pub fn resolve(&self, scheduler: &Scheduler) {
        if self.is_resolved.replace(true) {
            return;
        }
        for job in self.effects.borrow_mut().drain(..) {
            scheduler.queue_post(job);
        }
    }

    /// Parks a post-commit job until this boundary resolves.
    pub fn park(&self, job: PostJob) {
        self.effects.borrow_mut().push(job);
    }
}

/// Contract for nodes relocating their content to another host position.
pub trait TeleportBehavior {
    #[allow(clippy::too_many_arguments)]
    fn process(
        &self,
        api: &mut dyn RendererApi,
        n1: Option<Rc<VNode>>,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError>;

    fn move_to(
        &self,
        api: &mut dyn RendererApi,
        vnode: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        kind: MoveType,
    ) -> Result<(), RenderError>;

    fn remove(&self, api: &mut dyn RendererApi, vnode: &Rc<VNode>) -> Result<(), RenderError>;
}

/// Contract for nodes coordinating async subtrees.
pub trait SuspenseBehavior {
    #[allow(clippy::too_many_arguments)]
    fn process(
        &self,
        api: &mut dyn RendererApi,
        n1: Option<Rc<VNode>>,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError>;

    fn move_to(
        &self,
        api: &mut dyn RendererApi,
        vnode: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        kind: MoveType,
    ) -> Result<(), RenderError>;

    fn unmount(
        &self,
        api: &mut dyn RendererApi,
        vnode: &Rc<VNode>,
        do_remove: bool,
    ) -> Result<(), RenderError>;

    /// Host node following the suspense content, for anchor queries.
    fn next(&self, vnode: &Rc<VNode>) -> Option<HostId>;
}
