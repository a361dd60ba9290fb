#![doc = r"Patch-based reconciliation engine over the Arbor virtual node model.

A [`Renderer`] owns a host tree (anything implementing `HostOps`), a
scheduler and an error sink, and turns successive virtual trees into the
minimal set of host mutations. The central entry points are
[`Renderer::render`] for a root tree and [`Renderer::patch`] for one
position."]

mod children;
mod component;
mod element;
mod refs;
mod sequence;
mod teardown;

#[cfg(test)]
mod tests;

use std::rc::Rc;

use arbor_core::{
    same_node_type, ComponentInstance, ErrorSink, FastMap, HostId, HostOps, MountArgs, MoveType,
    NodeKind, PostJob, RenderError, Scheduler, SuspenseBoundary, VNode,
};

pub use arbor_core::RendererApi;

/// Reconciliation engine bound to one host tree.
pub struct Renderer<H: HostOps> {
    host: H,
    scheduler: Rc<Scheduler>,
    sink: ErrorSink,
    /// Current root per render container.
    roots: FastMap<HostId, Rc<VNode>>,
    /// Placement captured for async components awaiting their dependency.
    pending_async: FastMap<u64, MountArgs>,
    /// Per-instance mount parameters, reused by the update branch of the
    /// render effect.
    effect_args: FastMap<u64, MountArgs>,
}

impl<H: HostOps> Renderer<H> {
    pub fn new(host: H) -> Renderer<H> {
        Renderer {
            host,
            scheduler: Scheduler::new(),
            sink: ErrorSink::default(),
            roots: FastMap::default(),
            pending_async: FastMap::default(),
            effect_args: FastMap::default(),
        }
    }

    pub fn with_error_sink(mut self, sink: ErrorSink) -> Renderer<H> {
        self.sink = sink;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn scheduler_handle(&self) -> Rc<Scheduler> {
        self.scheduler.clone()
    }

    /// Reconciles `vnode` into `container`; `None` unmounts whatever the
    /// container currently shows. Flushes all queued work before
    /// returning.
    pub fn render(&mut self, vnode: Option<Rc<VNode>>, container: HostId) -> Result<(), RenderError> {
        match vnode {
            Some(node) => {
                tracing::debug!(container, node = ?node, "render");
                let prev = self.roots.get(&container).cloned();
                self.patch(prev, &node, container, None, None, None, false, false)?;
                self.roots.insert(container, node);
            }
            None => {
                tracing::debug!(container, "render clear");
                if let Some(prev) = self.roots.remove(&container) {
                    self.unmount(&prev, None, None, true)?;
                }
            }
        }
        self.flush_updates()
    }

    /// Requests a re-render for `instance` on the next flush. Duplicate
    /// requests for the same instance collapse into one.
    pub fn queue_update(&self, instance: &Rc<ComponentInstance>) {
        self.scheduler.queue_update(instance);
    }

    /// Drains the update queue (parents before children), then the post
    /// queue.
    pub fn flush_updates(&mut self) -> Result<(), RenderError> {
        loop {
            self.scheduler.flush_pre(&self.sink);
            let due = self.scheduler.take_due();
            if due.is_empty() {
                break;
            }
            for instance in due {
                if instance.effect_active.get() {
                    self.run_update(&instance)?;
                }
            }
        }
        let scheduler = self.scheduler.clone();
        scheduler.flush_post(&mut self.host, &self.sink);
        Ok(())
    }

    /// Queues a post-commit job, parking it when the enclosing suspense
    /// boundary is still pending.
    pub(crate) fn queue_post_effect(&self, suspense: Option<&Rc<SuspenseBoundary>>, job: PostJob) {
        match suspense {
            Some(boundary) if boundary.is_pending() => boundary.park(job),
            _ => self.scheduler.queue_post(job),
        }
    }

    /// Reconciles one tree position. `n1` is what the position currently
    /// shows, `n2` what it should show.
    #[allow(clippy::too_many_arguments)]
    pub fn patch(
        &mut self,
        n1: Option<Rc<VNode>>,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError> {
        if let Some(prev) = &n1 {
            if Rc::ptr_eq(prev, n2) {
                return Ok(());
            }
        }

        let mut n1 = n1;
        let mut anchor = anchor;
        if let Some(prev) = n1.clone() {
            if !same_node_type(&prev, n2) {
                // Different identity: replace in place of the old node.
                anchor = self.next_host_node(&prev)?;
                self.unmount(&prev, parent, suspense, true)?;
                n1 = None;
            }
        }

        let optimized = if n2.hints.bail {
            n2.dynamic_children.borrow_mut().take();
            false
        } else {
            optimized
        };

        let old_ref = n1.as_ref().and_then(|prev| prev.ref_binding.clone());

        match &n2.kind {
            NodeKind::Text => self.process_text(n1.as_ref(), n2, container, anchor)?,
            NodeKind::Comment => self.process_comment(n1.as_ref(), n2, container, anchor)?,
            NodeKind::Static { content } => {
                let content = content.clone();
                self.process_static(n1.as_ref(), n2, &content, container, anchor, is_svg)?;
            }
            NodeKind::Fragment => {
                self.process_fragment(n1.as_ref(), n2, container, anchor, parent, suspense, is_svg, optimized)?;
            }
            NodeKind::Element { .. } => {
                self.process_element(n1.as_ref(), n2, container, anchor, parent, suspense, is_svg, optimized)?;
            }
            NodeKind::Component { .. } => {
                self.process_component(n1.clone(), n2, container, anchor, parent, suspense, is_svg, optimized)?;
            }
            NodeKind::Teleport { behavior } => {
                let behavior = behavior.clone();
                behavior.process(self, n1.clone(), n2, container, anchor, parent, suspense, is_svg, optimized)?;
            }
            NodeKind::Suspense { behavior } => {
                let behavior = behavior.clone();
                behavior.process(self, n1.clone(), n2, container, anchor, parent, is_svg, optimized)?;
            }
        }

        if let Some(binding) = n2.ref_binding.clone() {
            self.bind_ref(&binding, old_ref.as_ref(), parent, suspense, n2, false)?;
        }
        Ok(())
    }
}

impl<H: HostOps> RendererApi for Renderer<H> {
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
    ) -> Result<(), RenderError> {
        Renderer::patch(self, n1, n2, container, anchor, parent, suspense, is_svg, optimized)
    }

    fn unmount(
        &mut self,
        vnode: &Rc<VNode>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        do_remove: bool,
    ) -> Result<(), RenderError> {
        Renderer::unmount(self, vnode, parent, suspense, do_remove)
    }

    fn move_vnode(
        &mut self,
        vnode: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        kind: MoveType,
    ) -> Result<(), RenderError> {
        Renderer::move_vnode(self, vnode, container, anchor, kind)
    }

    fn remove_vnode(&mut self, vnode: &Rc<VNode>) -> Result<(), RenderError> {
        Renderer::remove_vnode(self, vnode)
    }

    fn mount_component(
        &mut self,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError> {
        Renderer::mount_component(self, n2, container, anchor, parent, suspense, is_svg, optimized)
    }

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
    ) -> Result<(), RenderError> {
        Renderer::mount_children(self, owner, start, container, anchor, parent, suspense, is_svg, optimized)
    }

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
    ) -> Result<(), RenderError> {
        Renderer::patch_children(self, n1, n2, container, anchor, parent, suspense, is_svg, optimized)
    }

    fn patch_block_children(
        &mut self,
        old_children: &[Rc<VNode>],
        new_children: &[Rc<VNode>],
        fallback_container: HostId,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
    ) -> Result<(), RenderError> {
        Renderer::patch_block_children(self, old_children, new_children, fallback_container, parent, suspense, is_svg)
    }

    fn setup_render_effect(
        &mut self,
        instance: &Rc<ComponentInstance>,
        args: MountArgs,
        suspense: Option<&Rc<SuspenseBoundary>>,
    ) -> Result<(), RenderError> {
        Renderer::setup_render_effect(self, instance, args, suspense)
    }

    fn next_host_node(&self, vnode: &Rc<VNode>) -> Result<Option<HostId>, RenderError> {
        Renderer::next_host_node(self, vnode)
    }

    fn host_mut(&mut self) -> &mut dyn HostOps {
        &mut self.host
    }

    fn scheduler(&self) -> Rc<Scheduler> {
        self.scheduler.clone()
    }

    fn error_sink(&self) -> ErrorSink {
        self.sink.clone()
    }
}
