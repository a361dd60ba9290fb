//! The internals surface handed to external collaborators.
//!
//! Teleport and suspense behaviors, keep-alive caches and component code
//! all drive the engine through [`RendererApi`] instead of linking the
//! renderer crate directly. The trait is object-safe so behaviors can be
//! written against `&mut dyn RendererApi`.

use std::rc::Rc;

use crate::component::ComponentInstance;
use crate::error::{ErrorSink, RenderError};
use crate::host::{HostId, HostOps};
use crate::scheduler::Scheduler;
use crate::suspense::SuspenseBoundary;
use crate::vnode::VNode;

/// Why a subtree is being relocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveType {
    /// Entering the tree; enter transitions fire.
    Enter,
    /// Leaving visibility without unmounting (keep-alive deactivation);
    /// leave transitions fire.
    Leave,
    /// Sibling reordering; transitions never fire.
    Reorder,
}

/// Placement parameters threaded through a mount.
#[derive(Clone, Copy, Debug)]
pub struct MountArgs {
    pub container: HostId,
    pub anchor: Option<HostId>,
    pub is_svg: bool,
    pub optimized: bool,
}

/// Reconciler internals exposed to collaborators.
pub trait RendererApi {
    /// The central dispatcher: reconciles `n2` against `n1` at the given
    /// host position.
    #[allow(clippy::too_many_arguments)]
    fn patch(
        &mut self,
        n1: Option<Rc<VNode>>,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError>;

    fn unmount(
        &mut self,
        vnode: &Rc<VNode>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        do_remove: bool,
    ) -> Result<(), RenderError>;

    fn move_vnode(
        &mut self,
        vnode: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        kind: MoveType,
    ) -> Result<(), RenderError>;

    /// Physically removes a mounted node from the host tree without
    /// running teardown hooks. Used by deferred-leave continuations.
    fn remove_vnode(&mut self, vnode: &Rc<VNode>) -> Result<(), RenderError>;

    #[allow(clippy::too_many_arguments)]
    fn mount_component(
        &mut self,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError>;

    /// Mounts `owner`'s array children starting at `start`. Children that
    /// are already host-bound are cloned fresh and written back into
    /// `owner` before mounting.
    #[allow(clippy::too_many_arguments)]
    fn mount_children(
        &mut self,
        owner: &Rc<VNode>,
        start: usize,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError>;

    #[allow(clippy::too_many_arguments)]
    fn patch_children(
        &mut self,
        n1: &Rc<VNode>,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError>;

    /// Pairwise block fast path over two dynamic-descendant lists.
    fn patch_block_children(
        &mut self,
        old_children: &[Rc<VNode>],
        new_children: &[Rc<VNode>],
        fallback_container: HostId,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
    ) -> Result<(), RenderError>;

    /// Installs the instance's render effect and performs the initial
    /// mount pass.
    fn setup_render_effect(
        &mut self,
        instance: &Rc<ComponentInstance>,
        args: MountArgs,
        suspense: Option<&Rc<SuspenseBoundary>>,
    ) -> Result<(), RenderError>;

    /// Host node immediately after `vnode`'s mounted span.
    fn next_host_node(&self, vnode: &Rc<VNode>) -> Result<Option<HostId>, RenderError>;

    fn host_mut(&mut self) -> &mut dyn HostOps;

    fn scheduler(&self) -> Rc<Scheduler>;

    fn error_sink(&self) -> ErrorSink;
}
