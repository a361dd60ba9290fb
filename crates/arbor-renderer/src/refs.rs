//! Ref bindings.
//!
//! A ref hands its node's mounted value (host handle or component
//! instance) to user code. Clears are applied synchronously so stale
//! values never survive an unmount; non-null sets are deferred to the
//! post queue so the tree is fully committed when user code observes
//! them.

use std::rc::Rc;

use arbor_core::{
    ComponentInstance, ErrorSource, HostOps, NodeKind, Ref, RefValue, RenderError, SuspenseBoundary,
    VNode,
};

impl<H: HostOps> crate::Renderer<H> {
    pub(crate) fn bind_ref(
        &mut self,
        binding: &Ref,
        old: Option<&Ref>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        vnode: &Rc<VNode>,
        is_unmount: bool,
    ) -> Result<(), RenderError> {
        let value = if is_unmount {
            None
        } else {
            match &vnode.kind {
                NodeKind::Component { .. } => {
                    vnode.component.borrow().clone().map(RefValue::Component)
                }
                _ => vnode.el.get().map(RefValue::Element),
            }
        };

        // A binding that changed identity releases its predecessor first.
        if let Some(old) = old {
            if old != binding {
                self.clear_ref(old, parent);
            }
        }

        match binding {
            Ref::Callback(callback) => {
                let refs = parent
                    .map(|owner| owner.refs.borrow().clone())
                    .unwrap_or_default();
                let callback = callback.clone();
                self.sink
                    .guard(ErrorSource::FunctionRef, || callback(value.clone(), &refs));
            }
            Ref::Named(name) => {
                let Some(owner) = parent else {
                    tracing::warn!(name = &**name, "named ref outside a component context");
                    return Ok(());
                };
                match value {
                    None => {
                        owner.refs.borrow_mut().insert(name.clone(), None);
                    }
                    Some(value) => {
                        let owner = owner.clone();
                        let name = name.clone();
                        self.queue_post_effect(
                            suspense,
                            Box::new(move |_host| {
                                owner.refs.borrow_mut().insert(name, Some(value));
                                Ok(())
                            }),
                        );
                    }
                }
            }
            Ref::Slot(slot) => match value {
                None => slot.set(None),
                Some(value) => {
                    let slot = slot.clone();
                    self.queue_post_effect(
                        suspense,
                        Box::new(move |_host| {
                            slot.set(Some(value));
                            Ok(())
                        }),
                    );
                }
            },
        }
        Ok(())
    }

    fn clear_ref(&mut self, old: &Ref, parent: Option<&Rc<ComponentInstance>>) {
        match old {
            Ref::Named(name) => {
                if let Some(owner) = parent {
                    owner.refs.borrow_mut().insert(name.clone(), None);
                }
            }
            Ref::Slot(slot) => slot.set(None),
            // A function ref holds no slot to null out; closures change
            // identity every render, so calling the old one here would
            // report a phantom unmount on every patch.
            Ref::Callback(_) => {}
        }
    }
}
