//! Component mount and update cycle.
//!
//! Mounting creates the instance, runs setup (possibly parking behind an
//! async dependency), then installs the render effect. Updates arrive two
//! ways: the parent pushes a new component node (`update_component`), or
//! the instance invalidates itself and is picked up by the scheduler
//! flush. Both funnel into [`crate::Renderer::run_update`].

use std::rc::{Rc, Weak};

use arbor_core::{
    should_update_component, ComponentInstance, ErrorSource, HostId, HostOps, LifecycleHooks,
    MountArgs, NodeKind, RenderError, SetupOutcome, SuspenseBoundary, VNode,
};

/// Propagates a fresh root host binding up through single-root component
/// wrappers, whose own component nodes all share the subtree's handle.
pub(crate) fn update_wrapper_host_el(instance: &Rc<ComponentInstance>, el: Option<HostId>) {
    let mut vnode = instance.vnode.borrow().clone();
    let mut parent = instance.parent.as_ref().and_then(Weak::upgrade);
    while let Some(owner) = parent {
        let is_subtree_root = owner
            .sub_tree
            .borrow()
            .as_ref()
            .is_some_and(|sub| Rc::ptr_eq(sub, &vnode));
        if !is_subtree_root {
            break;
        }
        let owner_vnode = owner.vnode.borrow().clone();
        owner_vnode.el.set(el);
        vnode = owner_vnode;
        parent = owner.parent.as_ref().and_then(Weak::upgrade);
    }
}

impl<H: HostOps> crate::Renderer<H> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn process_component(
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
        match n1 {
            None => {
                if n2.kept_alive.get() {
                    let ctx = parent.and_then(|p| {
                        p.keep_alive.borrow().clone().or_else(|| p.parent_keep_alive())
                    });
                    if let Some(ctx) = ctx {
                        return ctx.activate(self, n2, container, anchor, is_svg, optimized);
                    }
                    tracing::warn!("kept-alive node mounted without a cache context");
                }
                self.mount_component(n2, container, anchor, parent, suspense, is_svg, optimized)
            }
            Some(prev) => self.update_component(&prev, n2, optimized),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn mount_component(
        &mut self,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError> {
        let NodeKind::Component { def } = &n2.kind else {
            return Err(RenderError::MissingInstance);
        };
        let instance = ComponentInstance::new(def.clone(), n2.clone(), parent);
        tracing::debug!(uid = instance.uid, name = instance.name(), "mount component");
        *n2.component.borrow_mut() = Some(instance.clone());
        *instance.parent_suspense.borrow_mut() = suspense.cloned();

        let mut outcome = SetupOutcome::Ready;
        if let Some(setup) = instance.def.setup.clone() {
            match setup(&instance) {
                Ok(result) => outcome = result,
                Err(error) => self.sink.report(ErrorSource::Setup, &error),
            }
        }

        let args = MountArgs {
            container,
            anchor,
            is_svg,
            optimized,
        };
        if let SetupOutcome::Pending(dep) = outcome {
            *instance.async_dep.borrow_mut() = Some(dep);
            match suspense {
                Some(boundary) => boundary.register_dep(),
                None => {
                    let error = RenderError::hook("async setup used without a suspense boundary");
                    self.sink.report(ErrorSource::Setup, &error);
                }
            }
            // Park behind a placeholder until the dependency resolves.
            let placeholder = VNode::comment("").done();
            *instance.sub_tree.borrow_mut() = Some(placeholder.clone());
            self.process_comment(None, &placeholder, container, anchor)?;
            n2.el.set(placeholder.el.get());
            self.pending_async.insert(instance.uid, args);
            return Ok(());
        }

        self.setup_render_effect(&instance, args, suspense)
    }

    /// Installs the render effect and performs the initial render pass.
    pub(crate) fn setup_render_effect(
        &mut self,
        instance: &Rc<ComponentInstance>,
        args: MountArgs,
        suspense: Option<&Rc<SuspenseBoundary>>,
    ) -> Result<(), RenderError> {
        instance.effect_active.set(true);
        self.effect_args.insert(instance.uid, args);
        self.run_mount(instance, args, suspense)
    }

    fn run_mount(
        &mut self,
        instance: &Rc<ComponentInstance>,
        args: MountArgs,
        suspense: Option<&Rc<SuspenseBoundary>>,
    ) -> Result<(), RenderError> {
        LifecycleHooks::run(&instance.hooks.before_mount, &self.sink);
        let vnode = instance.vnode.borrow().clone();
        if let Some(hook) = vnode.hooks.before_mount.clone() {
            self.sink.guard(ErrorSource::VNodeHook, || hook(&vnode, None));
        }

        let sub_tree = instance.render();
        *instance.sub_tree.borrow_mut() = Some(sub_tree.clone());
        self.patch(
            None,
            &sub_tree,
            args.container,
            args.anchor,
            Some(instance),
            suspense,
            args.is_svg,
            false,
        )?;
        vnode.el.set(sub_tree.el.get());
        instance.is_mounted.set(true);

        let has_post =
            !instance.hooks.mounted.borrow().is_empty() || vnode.hooks.mounted.is_some();
        if has_post {
            let instance = instance.clone();
            let vnode = vnode.clone();
            self.queue_post_effect(
                suspense,
                Box::new(move |_host| {
                    for hook in instance.hooks.mounted.borrow().clone() {
                        hook()?;
                    }
                    if let Some(hook) = &vnode.hooks.mounted {
                        hook(&vnode, None)?;
                    }
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    /// Re-renders a mounted instance, consuming a parent-pushed node when
    /// one is pending.
    pub(crate) fn run_update(&mut self, instance: &Rc<ComponentInstance>) -> Result<(), RenderError> {
        if !instance.is_mounted.get() || instance.is_unmounted.get() {
            return Ok(());
        }
        let next = instance.next.borrow_mut().take();
        let prev_vnode = instance.vnode.borrow().clone();
        let self_triggered = next.is_none();
        if let Some(next) = &next {
            next.el.set(prev_vnode.el.get());
            self.update_component_pre_render(instance, next)?;
        }

        LifecycleHooks::run(&instance.hooks.before_update, &self.sink);
        let current = instance.vnode.borrow().clone();
        if let Some(hook) = current.hooks.before_update.clone() {
            if !self_triggered {
                self.sink
                    .guard(ErrorSource::VNodeHook, || hook(&current, Some(&prev_vnode)));
            }
        }

        let next_tree = instance.render();
        let prev_tree = instance
            .sub_tree
            .borrow_mut()
            .replace(next_tree.clone())
            .ok_or(RenderError::MissingInstance)?;
        let prev_el = prev_tree.el.get().ok_or(RenderError::Unbound("subtree"))?;
        // Parent and anchor are re-resolved: the subtree may have been
        // moved since the last pass.
        let container = self
            .host
            .parent_node(prev_el)
            .ok_or(RenderError::Unbound("subtree parent"))?;
        let anchor = self.next_host_node(&prev_tree)?;
        let suspense = instance.parent_suspense.borrow().clone();
        let is_svg = self
            .effect_args
            .get(&instance.uid)
            .is_some_and(|args| args.is_svg);
        self.patch(
            Some(prev_tree),
            &next_tree,
            container,
            anchor,
            Some(instance),
            suspense.as_ref(),
            is_svg,
            false,
        )?;
        current.el.set(next_tree.el.get());
        if self_triggered {
            update_wrapper_host_el(instance, next_tree.el.get());
        }

        let has_post =
            !instance.hooks.updated.borrow().is_empty() || current.hooks.updated.is_some();
        if has_post {
            let instance_post = instance.clone();
            let current = current.clone();
            let prev_vnode = prev_vnode.clone();
            self.queue_post_effect(
                suspense.as_ref(),
                Box::new(move |_host| {
                    for hook in instance_post.hooks.updated.borrow().clone() {
                        hook()?;
                    }
                    if let Some(hook) = &current.hooks.updated {
                        hook(&current, Some(&prev_vnode))?;
                    }
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    fn update_component(
        &mut self,
        n1: &Rc<VNode>,
        n2: &Rc<VNode>,
        optimized: bool,
    ) -> Result<(), RenderError> {
        let instance = n1
            .component
            .borrow()
            .clone()
            .ok_or(RenderError::MissingInstance)?;
        *n2.component.borrow_mut() = Some(instance.clone());

        if should_update_component(n1, n2, optimized) {
            let dep_pending =
                instance.async_dep.borrow().is_some() && !instance.async_resolved.get();
            if dep_pending {
                // The instance has no rendered content yet; absorb the new
                // bindings without forcing a render.
                n2.el.set(n1.el.get());
                return self.update_component_pre_render(&instance, n2);
            }
            *instance.next.borrow_mut() = Some(n2.clone());
            // A self-queued update is superseded by this direct one.
            self.scheduler.invalidate(instance.uid);
            self.run_update(&instance)
        } else {
            n2.el.set(n1.el.get());
            *instance.vnode.borrow_mut() = n2.clone();
            Ok(())
        }
    }

    /// Adopts a parent-pushed node before rendering: rebinds the instance,
    /// refreshes props and slots, and drains pre jobs so prop-dependent
    /// work observes the new values.
    fn update_component_pre_render(
        &mut self,
        instance: &Rc<ComponentInstance>,
        next: &Rc<VNode>,
    ) -> Result<(), RenderError> {
        *next.component.borrow_mut() = Some(instance.clone());
        *instance.vnode.borrow_mut() = next.clone();
        instance.next.borrow_mut().take();
        *instance.props.borrow_mut() = next.props.clone().unwrap_or_default();
        *instance.slots.borrow_mut() = next.children.borrow().clone();
        self.scheduler.flush_pre(&self.sink);
        Ok(())
    }

    /// Continues a mount parked on an async dependency. No-op until the
    /// dependency has resolved; idempotent afterwards.
    pub fn resume_async(&mut self, instance: &Rc<ComponentInstance>) -> Result<(), RenderError> {
        let dep = instance.async_dep.borrow().clone();
        let Some(dep) = dep else { return Ok(()) };
        if !dep.is_resolved() || instance.async_resolved.get() || instance.is_unmounted.get() {
            return Ok(());
        }
        instance.async_resolved.set(true);
        tracing::debug!(uid = instance.uid, name = instance.name(), "async setup resolved");

        let placeholder = instance
            .sub_tree
            .borrow_mut()
            .take()
            .ok_or(RenderError::MissingInstance)?;
        let el = placeholder.el.get().ok_or(RenderError::Unbound("placeholder"))?;
        let container = self
            .host
            .parent_node(el)
            .ok_or(RenderError::Unbound("placeholder parent"))?;
        let anchor = self.next_host_node(&placeholder)?;
        let args = match self.pending_async.remove(&instance.uid) {
            Some(parked) => MountArgs {
                container,
                anchor,
                ..parked
            },
            None => MountArgs {
                container,
                anchor,
                is_svg: false,
                optimized: false,
            },
        };
        let suspense = instance.parent_suspense.borrow().clone();
        self.setup_render_effect(instance, args, suspense.as_ref())?;
        self.host.remove(el);
        update_wrapper_host_el(instance, instance.vnode.borrow().el.get());
        if let Some(boundary) = &suspense {
            boundary.release_dep(&self.scheduler);
        }
        self.flush_updates()
    }
}
