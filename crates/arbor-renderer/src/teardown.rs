//! Unmounting, physical removal, relocation and anchor queries.

use std::rc::Rc;

use arbor_core::{
    ComponentInstance, ErrorSource, HostId, HostOps, LifecycleHooks, MoveType, NodeKind,
    RenderError, SuspenseBoundary, VNode,
};

impl<H: HostOps> crate::Renderer<H> {
    /// Tears a mounted node down: clears its ref, runs teardown hooks,
    /// recurses into children and (when `do_remove`) detaches the host
    /// span.
    pub(crate) fn unmount(
        &mut self,
        vnode: &Rc<VNode>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        do_remove: bool,
    ) -> Result<(), RenderError> {
        if let Some(binding) = vnode.ref_binding.clone() {
            self.bind_ref(&binding, None, parent, suspense, vnode, true)?;
        }

        if vnode.should_keep_alive.get() {
            let ctx = parent
                .and_then(|p| p.keep_alive.borrow().clone().or_else(|| p.parent_keep_alive()));
            if let Some(ctx) = ctx {
                // The cache keeps the subtree alive; no teardown here.
                return ctx.deactivate(self, vnode);
            }
            tracing::warn!("keep-alive node unmounted without a cache context");
        }

        if let Some(hook) = vnode.hooks.before_unmount.clone() {
            self.sink.guard(ErrorSource::VNodeHook, || hook(vnode, None));
        }
        for dir in &vnode.dirs {
            if let Some(hook) = dir.before_unmount.clone() {
                self.sink.guard(ErrorSource::DirectiveHook, || hook(vnode, None));
            }
        }

        match &vnode.kind {
            NodeKind::Component { .. } => {
                let instance = vnode
                    .component
                    .borrow()
                    .clone()
                    .ok_or(RenderError::MissingInstance)?;
                self.unmount_component(&instance, suspense, do_remove)?;
            }
            NodeKind::Suspense { behavior } => {
                let behavior = behavior.clone();
                behavior.unmount(self, vnode, do_remove)?;
            }
            NodeKind::Teleport { behavior } => {
                // Teleported content lives in a foreign container; the
                // behavior owns its teardown.
                let behavior = behavior.clone();
                behavior.remove(self, vnode)?;
                if do_remove {
                    self.remove_vnode(vnode)?;
                }
            }
            _ => {
                let dynamic = vnode
                    .taken_dynamic_children()
                    .filter(|_| !vnode.is_fragment() || vnode.hints.stable_fragment);
                if let Some(dynamic) = dynamic {
                    self.unmount_children(&dynamic, parent, suspense, false, 0)?;
                } else if vnode.is_fragment()
                    && (vnode.hints.keyed_fragment || vnode.hints.unkeyed_fragment)
                {
                    self.unmount_children(&vnode.child_nodes(), parent, suspense, true, 0)?;
                } else {
                    let children = vnode.child_nodes();
                    if !children.is_empty() {
                        self.unmount_children(&children, parent, suspense, false, 0)?;
                    }
                }
                if do_remove {
                    self.remove_vnode(vnode)?;
                }
            }
        }

        let has_post =
            vnode.hooks.unmounted.is_some() || vnode.dirs.iter().any(|d| d.unmounted.is_some());
        if has_post {
            let vnode = vnode.clone();
            self.queue_post_effect(
                suspense,
                Box::new(move |_host| {
                    if let Some(hook) = &vnode.hooks.unmounted {
                        hook(&vnode, None)?;
                    }
                    for dir in &vnode.dirs {
                        if let Some(hook) = &dir.unmounted {
                            hook(&vnode, None)?;
                        }
                    }
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    pub(crate) fn unmount_children(
        &mut self,
        children: &[Rc<VNode>],
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        do_remove: bool,
        start: usize,
    ) -> Result<(), RenderError> {
        for child in &children[start..] {
            self.unmount(child, parent, suspense, do_remove)?;
        }
        Ok(())
    }

    pub(crate) fn unmount_component(
        &mut self,
        instance: &Rc<ComponentInstance>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        do_remove: bool,
    ) -> Result<(), RenderError> {
        tracing::debug!(uid = instance.uid, name = instance.name(), "unmount component");
        LifecycleHooks::run(&instance.hooks.before_unmount, &self.sink);

        for effect in instance.effects.borrow().iter() {
            effect.stop();
        }
        instance.effect_active.set(false);
        self.scheduler.invalidate(instance.uid);
        self.effect_args.remove(&instance.uid);
        self.pending_async.remove(&instance.uid);

        let sub_tree = instance.sub_tree.borrow_mut().take();
        if let Some(sub_tree) = sub_tree {
            self.unmount(&sub_tree, Some(instance), suspense, do_remove)?;
        }
        instance.is_unmounted.set(true);

        // A dependency that will never resolve must not wedge the
        // enclosing boundary.
        if let Some(boundary) = suspense {
            if !boundary.is_unmounted.get()
                && instance.async_dep.borrow().is_some()
                && !instance.async_resolved.get()
            {
                boundary.release_dep(&self.scheduler);
            }
        }

        if !instance.hooks.unmounted.borrow().is_empty() {
            let instance = instance.clone();
            self.queue_post_effect(
                suspense,
                Box::new(move |_host| {
                    for hook in instance.hooks.unmounted.borrow().clone() {
                        hook()?;
                    }
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    /// Physically removes a node's host span. Teardown hooks have already
    /// run by the time this is called.
    pub(crate) fn remove_vnode(&mut self, vnode: &Rc<VNode>) -> Result<(), RenderError> {
        match &vnode.kind {
            NodeKind::Fragment | NodeKind::Static { .. } => {
                let start = vnode.el.get().ok_or(RenderError::Unbound("span"))?;
                let end = vnode.anchor.get().ok_or(RenderError::Unbound("span"))?;
                self.remove_range(start, end);
            }
            _ => {
                let Some(el) = vnode.el.get() else {
                    return Ok(());
                };
                if vnode.is_element() {
                    if let Some(transition) = &vnode.transition {
                        if !transition.persisted() {
                            // The behavior decides when removal happens.
                            transition.leave(
                                &mut self.host,
                                el,
                                Box::new(move |host| host.remove(el)),
                            );
                            return Ok(());
                        }
                    }
                }
                self.host.remove(el);
            }
        }
        Ok(())
    }

    fn remove_range(&mut self, start: HostId, end: HostId) {
        let mut current = start;
        loop {
            let next = self.host.next_sibling(current);
            self.host.remove(current);
            if current == end {
                break;
            }
            match next {
                Some(node) => current = node,
                None => break,
            }
        }
    }

    /// Relocates a mounted node (and everything it spans) to a new host
    /// position.
    pub(crate) fn move_vnode(
        &mut self,
        vnode: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        kind: MoveType,
    ) -> Result<(), RenderError> {
        match &vnode.kind {
            NodeKind::Component { .. } => {
                let instance = vnode
                    .component
                    .borrow()
                    .clone()
                    .ok_or(RenderError::MissingInstance)?;
                let sub_tree = instance
                    .sub_tree
                    .borrow()
                    .clone()
                    .ok_or(RenderError::MissingInstance)?;
                return self.move_vnode(&sub_tree, container, anchor, kind);
            }
            NodeKind::Suspense { behavior } => {
                let behavior = behavior.clone();
                return behavior.move_to(self, vnode, container, anchor, kind);
            }
            NodeKind::Teleport { behavior } => {
                let behavior = behavior.clone();
                return behavior.move_to(self, vnode, container, anchor, kind);
            }
            NodeKind::Fragment => {
                let start = vnode.el.get().ok_or(RenderError::Unbound("fragment"))?;
                let end = vnode.anchor.get().ok_or(RenderError::Unbound("fragment"))?;
                self.host.insert(start, container, anchor);
                for child in vnode.child_nodes() {
                    self.move_vnode(&child, container, anchor, kind)?;
                }
                self.host.insert(end, container, anchor);
                return Ok(());
            }
            NodeKind::Static { .. } => {
                let start = vnode.el.get().ok_or(RenderError::Unbound("static"))?;
                let end = vnode.anchor.get().ok_or(RenderError::Unbound("static"))?;
                let mut span = vec![start];
                let mut current = start;
                while current != end {
                    match self.host.next_sibling(current) {
                        Some(next) => {
                            span.push(next);
                            current = next;
                        }
                        None => break,
                    }
                }
                for node in span {
                    self.host.insert(node, container, anchor);
                }
                return Ok(());
            }
            _ => {}
        }

        let el = vnode.el.get().ok_or(RenderError::Unbound("node"))?;
        let transition = vnode
            .transition
            .clone()
            .filter(|t| vnode.is_element() && kind != MoveType::Reorder && !t.persisted());
        match (transition, kind) {
            (Some(transition), MoveType::Enter) => {
                transition.before_enter(&mut self.host, el);
                self.host.insert(el, container, anchor);
                self.scheduler.queue_post(Box::new(move |host| {
                    transition.enter(host, el);
                    Ok(())
                }));
            }
            (Some(transition), _) => {
                // Leave: insertion at the new position is the behavior's
                // continuation.
                transition.leave(
                    &mut self.host,
                    el,
                    Box::new(move |host| host.insert(el, container, anchor)),
                );
            }
            (None, _) => self.host.insert(el, container, anchor),
        }
        Ok(())
    }

    /// The host node immediately following `vnode`'s mounted span.
    pub(crate) fn next_host_node(&self, vnode: &Rc<VNode>) -> Result<Option<HostId>, RenderError> {
        match &vnode.kind {
            NodeKind::Component { .. } => {
                let instance = vnode
                    .component
                    .borrow()
                    .clone()
                    .ok_or(RenderError::MissingInstance)?;
                let sub_tree = instance
                    .sub_tree
                    .borrow()
                    .clone()
                    .ok_or(RenderError::MissingInstance)?;
                self.next_host_node(&sub_tree)
            }
            NodeKind::Suspense { behavior } => Ok(behavior.next(vnode)),
            _ => {
                let handle = vnode.anchor.get().or(vnode.el.get());
                Ok(handle.and_then(|node| self.host.next_sibling(node)))
            }
        }
    }
}
