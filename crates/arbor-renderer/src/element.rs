//! Element, text, comment, static and fragment reconciliation.

use std::rc::{Rc, Weak};

use arbor_core::{
    ComponentInstance, ErrorSource, HostId, HostOps, NodeKind, Props, RenderError,
    SuspenseBoundary, VNode,
};

impl<H: HostOps> crate::Renderer<H> {
    pub(crate) fn process_text(
        &mut self,
        n1: Option<&Rc<VNode>>,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
    ) -> Result<(), RenderError> {
        let text = n2.text_children();
        let text = text.as_deref().unwrap_or("");
        match n1 {
            None => {
                let el = self.host.create_text(text);
                n2.el.set(Some(el));
                self.host.insert(el, container, anchor);
            }
            Some(prev) => {
                let el = prev.el.get().ok_or(RenderError::Unbound("text"))?;
                n2.el.set(Some(el));
                if prev.text_children().as_deref() != Some(text) {
                    self.host.set_text(el, text);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn process_comment(
        &mut self,
        n1: Option<&Rc<VNode>>,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
    ) -> Result<(), RenderError> {
        match n1 {
            None => {
                let text = n2.text_children();
                let el = self.host.create_comment(text.as_deref().unwrap_or(""));
                n2.el.set(Some(el));
                self.host.insert(el, container, anchor);
            }
            Some(prev) => {
                // Comment content is immutable; carry the binding forward.
                n2.el.set(prev.el.get());
            }
        }
        Ok(())
    }

    pub(crate) fn process_static(
        &mut self,
        n1: Option<&Rc<VNode>>,
        n2: &Rc<VNode>,
        content: &str,
        container: HostId,
        anchor: Option<HostId>,
        is_svg: bool,
    ) -> Result<(), RenderError> {
        let Some(prev) = n1 else {
            return self.mount_static(n2, content, container, anchor, is_svg);
        };
        // Static content only changes across hot rebuilds of the input
        // tree; compare in debug builds, trust in release.
        let prev_content = match &prev.kind {
            NodeKind::Static { content } => Some(content.clone()),
            _ => None,
        };
        if cfg!(debug_assertions) && prev_content.as_deref() != Some(content) {
            let end = prev.anchor.get().ok_or(RenderError::Unbound("static"))?;
            let anchor = self.host.next_sibling(end);
            let container = self
                .host
                .parent_node(end)
                .ok_or(RenderError::Unbound("static parent"))?;
            self.remove_vnode(prev)?;
            self.mount_static(n2, content, container, anchor, is_svg)
        } else {
            n2.el.set(prev.el.get());
            n2.anchor.set(prev.anchor.get());
            Ok(())
        }
    }

    fn mount_static(
        &mut self,
        n2: &Rc<VNode>,
        content: &str,
        container: HostId,
        anchor: Option<HostId>,
        is_svg: bool,
    ) -> Result<(), RenderError> {
        let (first, last) = self
            .host
            .insert_static_content(content, container, anchor, is_svg)
            .ok_or(RenderError::StaticContentUnsupported)?;
        n2.el.set(Some(first));
        n2.anchor.set(Some(last));
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn process_fragment(
        &mut self,
        n1: Option<&Rc<VNode>>,
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
                // A fragment's span is delimited by two empty text nodes.
                let start = self.host.create_text("");
                let end = self.host.create_text("");
                n2.el.set(Some(start));
                n2.anchor.set(Some(end));
                self.host.insert(start, container, anchor);
                self.host.insert(end, container, anchor);
                self.mount_children(n2, 0, container, Some(end), parent, suspense, is_svg, optimized)
            }
            Some(prev) => {
                let start = prev.el.get().ok_or(RenderError::Unbound("fragment"))?;
                let end = prev.anchor.get().ok_or(RenderError::Unbound("fragment"))?;
                n2.el.set(Some(start));
                n2.anchor.set(Some(end));
                if n2.hints.stable_fragment {
                    if let (Some(old), Some(new)) =
                        (prev.taken_dynamic_children(), n2.taken_dynamic_children())
                    {
                        // Stable shape: child order cannot change, only the
                        // tracked dynamic descendants need patching.
                        return self.patch_block_children(&old, &new, container, parent, suspense, is_svg);
                    }
                }
                self.patch_children(prev, n2, container, Some(end), parent, suspense, is_svg, optimized)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn process_element(
        &mut self,
        n1: Option<&Rc<VNode>>,
        n2: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError> {
        let NodeKind::Element { tag } = &n2.kind else {
            return Err(RenderError::Unbound("element"));
        };
        let tag = tag.clone();
        let is_svg = is_svg || &*tag == "svg";
        match n1 {
            None => self.mount_element(n2, &tag, container, anchor, parent, suspense, is_svg, optimized),
            Some(prev) => self.patch_element(prev, n2, &tag, parent, suspense, is_svg, optimized),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn mount_element(
        &mut self,
        n2: &Rc<VNode>,
        tag: &str,
        container: HostId,
        anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError> {
        let mut el = None;
        if n2.hints.hoisted && !cfg!(debug_assertions) {
            // A hoisted node reaching mount with a binding was mounted
            // elsewhere already; host cloning skips re-creating the subtree.
            if let Some(source) = n2.el.get() {
                el = self.host.clone_node(source);
            }
        }
        let el = match el {
            Some(el) => {
                n2.el.set(Some(el));
                el
            }
            None => {
                let el = self.host.create_element(tag, is_svg, None);
                n2.el.set(Some(el));
                if let Some(text) = n2.text_children() {
                    self.host.set_element_text(el, &text);
                } else if !n2.child_nodes().is_empty() {
                    let child_svg = is_svg && tag != "foreignObject";
                    self.mount_children(n2, 0, el, None, parent, suspense, child_svg, optimized)?;
                }
                if let Some(props) = &n2.props {
                    for (key, value) in props {
                        self.host.patch_prop(el, key, None, Some(value), is_svg);
                    }
                }
                self.apply_scope_ids(el, n2, parent);
                el
            }
        };

        if let Some(hook) = n2.hooks.before_mount.clone() {
            self.sink.guard(ErrorSource::VNodeHook, || hook(n2, None));
        }
        for dir in &n2.dirs {
            if let Some(hook) = dir.before_mount.clone() {
                self.sink.guard(ErrorSource::DirectiveHook, || hook(n2, None));
            }
        }
        if let Some(transition) = &n2.transition {
            if !transition.persisted() {
                transition.before_enter(&mut self.host, el);
            }
        }
        self.host.insert(el, container, anchor);

        let has_post = n2.hooks.mounted.is_some()
            || n2.transition.is_some()
            || n2.dirs.iter().any(|d| d.mounted.is_some());
        if has_post {
            let vnode = n2.clone();
            self.queue_post_effect(
                suspense,
                Box::new(move |host| {
                    if let Some(transition) = &vnode.transition {
                        if !transition.persisted() {
                            if let Some(el) = vnode.el.get() {
                                transition.enter(host, el);
                            }
                        }
                    }
                    if let Some(hook) = &vnode.hooks.mounted {
                        hook(&vnode, None)?;
                    }
                    for dir in &vnode.dirs {
                        if let Some(hook) = &dir.mounted {
                            hook(&vnode, None)?;
                        }
                    }
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn patch_element(
        &mut self,
        n1: &Rc<VNode>,
        n2: &Rc<VNode>,
        tag: &str,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError> {
        let el = n1.el.get().ok_or(RenderError::Unbound("element"))?;
        n2.el.set(Some(el));

        if let Some(hook) = n2.hooks.before_update.clone() {
            self.sink.guard(ErrorSource::VNodeHook, || hook(n2, Some(n1)));
        }
        for dir in &n2.dirs {
            if let Some(hook) = dir.before_update.clone() {
                self.sink.guard(ErrorSource::DirectiveHook, || hook(n2, Some(n1)));
            }
        }

        let old_props = n1.props.clone().unwrap_or_default();
        let new_props = n2.props.clone().unwrap_or_default();
        // The prop diff may be skipped only when both nodes carry the very
        // same map; equal contents still go through the per-key walk so
        // force-patched keys get reapplied.
        let same_props = match (n1.props.as_ref(), n2.props.as_ref()) {
            (Some(old), Some(new)) => std::ptr::eq(old, new),
            (None, None) => true,
            _ => false,
        };
        let old_dynamic = n1.taken_dynamic_children();
        let new_dynamic = n2.taken_dynamic_children();

        // Props apply before the children diff.
        // An old node compiled with dynamic keys taints the pair: the new
        // hints alone cannot promise those keys are gone.
        let full_props = n2.hints.full_props || n1.hints.full_props;
        if n2.hints.is_dynamic() || full_props {
            if full_props {
                if !same_props {
                    self.patch_props(el, &old_props, &new_props, is_svg);
                }
            } else {
                if n2.hints.class {
                    self.patch_single_prop(el, "class", &old_props, &new_props, is_svg);
                }
                if n2.hints.style {
                    self.patch_single_prop(el, "style", &old_props, &new_props, is_svg);
                }
                if n2.hints.props {
                    for key in n2.dynamic_props.clone() {
                        self.patch_single_prop(el, &key, &old_props, &new_props, is_svg);
                    }
                }
            }
            if n2.hints.text && n1.text_children() != n2.text_children() {
                let text = n2.text_children();
                self.host.set_element_text(el, text.as_deref().unwrap_or(""));
            }
        } else if !optimized && new_dynamic.is_none() && !same_props {
            self.patch_props(el, &old_props, &new_props, is_svg);
        }

        let child_svg = is_svg && tag != "foreignObject";
        match (&old_dynamic, &new_dynamic) {
            (Some(old), Some(new)) => {
                self.patch_block_children(old, new, el, parent, suspense, child_svg)?;
            }
            // A text hint owns the whole child list; the general diff would
            // write the text a second time.
            _ if !optimized && !n2.hints.text => {
                self.patch_children(n1, n2, el, None, parent, suspense, child_svg, false)?;
            }
            _ => {}
        }

        let has_post = n2.hooks.updated.is_some() || n2.dirs.iter().any(|d| d.updated.is_some());
        if has_post {
            let prev = n1.clone();
            let vnode = n2.clone();
            self.queue_post_effect(
                suspense,
                Box::new(move |_host| {
                    if let Some(hook) = &vnode.hooks.updated {
                        hook(&vnode, Some(&prev))?;
                    }
                    for dir in &vnode.dirs {
                        if let Some(hook) = &dir.updated {
                            hook(&vnode, Some(&prev))?;
                        }
                    }
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    fn patch_single_prop(
        &mut self,
        el: HostId,
        key: &str,
        old_props: &Props,
        new_props: &Props,
        is_svg: bool,
    ) {
        let prev = old_props.get(key);
        let next = new_props.get(key);
        if prev != next || self.host.force_patch_prop(el, key) {
            self.host.patch_prop(el, key, prev, next, is_svg);
        }
    }

    pub(crate) fn patch_props(&mut self, el: HostId, old: &Props, new: &Props, is_svg: bool) {
        for (key, next) in new {
            let prev = old.get(key);
            if prev != Some(next) || self.host.force_patch_prop(el, key) {
                self.host.patch_prop(el, key, prev, Some(next), is_svg);
            }
        }
        for (key, prev) in old {
            if !new.contains_key(key) {
                self.host.patch_prop(el, key, Some(prev), None, is_svg);
            }
        }
    }

    /// Applies the node's own scope mark, then walks up through component
    /// roots so a subtree root also carries the scopes of the components
    /// it renders for.
    fn apply_scope_ids(&mut self, el: HostId, n2: &Rc<VNode>, parent: Option<&Rc<ComponentInstance>>) {
        let mut node = n2.clone();
        let mut owner = parent.cloned();
        loop {
            if let Some(scope) = &node.scope_id {
                self.host.set_scope_id(el, scope);
            }
            let Some(instance) = owner else { break };
            let is_subtree_root = instance
                .sub_tree
                .borrow()
                .as_ref()
                .is_some_and(|sub| Rc::ptr_eq(sub, &node));
            if !is_subtree_root {
                break;
            }
            if let Some(scope) = &instance.def.scope_id {
                self.host.set_scope_id(el, scope);
            }
            node = instance.vnode.borrow().clone();
            owner = instance.parent.as_ref().and_then(Weak::upgrade);
        }
    }
}
