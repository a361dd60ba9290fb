use std::cell::{Cell, RefCell};
use std::rc::Rc;

use arbor_core::{
    AsyncDep, ComponentDef, ComponentInstance, ErrorSink, HostId, MemoryHost, MoveType,
    RenderError, RendererApi, Scheduler, SetupOutcome, SuspenseBehavior, SuspenseBoundary, VNode,
};

use super::setup;

/// Boundary wrapper that mounts its children directly in place. Enough to
/// exercise the accounting and effect parking without fallback handling.
struct PassthroughSuspense;

impl SuspenseBehavior for PassthroughSuspense {
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
    ) -> Result<(), RenderError> {
        match n1 {
            None => {
                let boundary = SuspenseBoundary::new();
                *n2.suspense.borrow_mut() = Some(boundary.clone());
                api.mount_children(n2, 0, container, anchor, parent, Some(&boundary), is_svg, optimized)
            }
            Some(prev) => {
                let boundary = prev.suspense.borrow().clone();
                *n2.suspense.borrow_mut() = boundary.clone();
                api.patch_children(&prev, n2, container, anchor, parent, boundary.as_ref(), is_svg, optimized)
            }
        }
    }

    fn move_to(
        &self,
        api: &mut dyn RendererApi,
        vnode: &Rc<VNode>,
        container: HostId,
        anchor: Option<HostId>,
        kind: MoveType,
    ) -> Result<(), RenderError> {
        for child in vnode.child_nodes() {
            api.move_vnode(&child, container, anchor, kind)?;
        }
        Ok(())
    }

    fn unmount(
        &self,
        api: &mut dyn RendererApi,
        vnode: &Rc<VNode>,
        do_remove: bool,
    ) -> Result<(), RenderError> {
        let boundary = vnode.suspense.borrow().clone();
        for child in vnode.child_nodes() {
            api.unmount(&child, None, boundary.as_ref(), do_remove)?;
        }
        if let Some(boundary) = boundary {
            boundary.is_unmounted.set(true);
        }
        Ok(())
    }

    fn next(&self, _vnode: &Rc<VNode>) -> Option<HostId> {
        None
    }
}

fn suspense_node(children: Vec<Rc<VNode>>) -> Rc<VNode> {
    let behavior: Rc<dyn SuspenseBehavior> = Rc::new(PassthroughSuspense);
    VNode::suspense(&behavior).with_children(children).done()
}

fn async_def(dep: &Rc<AsyncDep>, mounted: &Rc<Cell<bool>>) -> Rc<ComponentDef> {
    let dep = dep.clone();
    let mounted = mounted.clone();
    ComponentDef::new(|_| VNode::element("div").with_text("ready").done())
        .named("AsyncContent")
        .with_setup(move |instance| {
            let mounted = mounted.clone();
            instance.on_mounted(move || {
                mounted.set(true);
                Ok(())
            });
            Ok(SetupOutcome::Pending(dep.clone()))
        })
        .done()
}

#[test]
fn async_component_parks_behind_a_placeholder() {
    let (mut renderer, root) = setup();
    let dep = AsyncDep::new();
    let mounted = Rc::new(Cell::new(false));
    let component = VNode::component(&async_def(&dep, &mounted)).done();
    let node = suspense_node(vec![component.clone()]);

    renderer.render(Some(node.clone()), root).unwrap();
    let boundary = node.suspense.borrow().clone().unwrap();

    assert_eq!(boundary.deps(), 1);
    assert!(boundary.is_pending());
    assert!(!renderer.host().to_html(root).contains("ready"));
    assert!(!mounted.get(), "mounted must wait for resolution");

    dep.resolve();
    let instance = component.component.borrow().clone().unwrap();
    renderer.resume_async(&instance).unwrap();

    assert_eq!(boundary.deps(), 0);
    assert!(boundary.is_resolved());
    assert_eq!(renderer.host().to_html(root), "<root><div>ready</div></root>");
    assert!(mounted.get());
}

#[test]
fn resume_is_a_noop_until_the_dep_resolves() {
    let (mut renderer, root) = setup();
    let dep = AsyncDep::new();
    let mounted = Rc::new(Cell::new(false));
    let component = VNode::component(&async_def(&dep, &mounted)).done();
    let node = suspense_node(vec![component.clone()]);
    renderer.render(Some(node.clone()), root).unwrap();

    let instance = component.component.borrow().clone().unwrap();
    renderer.resume_async(&instance).unwrap();
    assert!(!mounted.get());

    dep.resolve();
    renderer.resume_async(&instance).unwrap();
    renderer.resume_async(&instance).unwrap();
    assert!(mounted.get());
    // Idempotent: the second resume must not remount.
    assert_eq!(renderer.host().to_html(root), "<root><div>ready</div></root>");
}

#[test]
fn unmounting_a_pending_component_releases_its_dep() {
    let (mut renderer, root) = setup();
    let dep = AsyncDep::new();
    let mounted = Rc::new(Cell::new(false));
    let component = VNode::component(&async_def(&dep, &mounted)).done();
    let node = suspense_node(vec![component]);
    renderer.render(Some(node.clone()), root).unwrap();
    let boundary = node.suspense.borrow().clone().unwrap();
    assert_eq!(boundary.deps(), 1);

    renderer.render(None, root).unwrap();
    assert_eq!(boundary.deps(), 0, "the count must never go negative");
    assert_eq!(renderer.host().to_html(root), "<root></root>");
}

#[test]
fn boundary_resolves_exactly_once_and_clamps_at_zero() {
    let boundary = SuspenseBoundary::new();
    let scheduler = Scheduler::new();
    let ran = Rc::new(Cell::new(0usize));
    let counter = ran.clone();
    boundary.park(Box::new(move |_host| {
        counter.set(counter.get() + 1);
        Ok(())
    }));

    boundary.register_dep();
    assert!(boundary.is_pending());
    boundary.release_dep(&scheduler);
    boundary.release_dep(&scheduler);
    assert_eq!(boundary.deps(), 0);
    assert!(boundary.is_resolved());

    let mut host = MemoryHost::new();
    scheduler.flush_post(&mut host, &ErrorSink::default());
    assert_eq!(ran.get(), 1);
}

#[test]
fn post_effects_flow_straight_through_a_resolved_boundary() {
    let (mut renderer, root) = setup();
    let behavior: Rc<dyn SuspenseBehavior> = Rc::new(PassthroughSuspense);
    let dep = AsyncDep::new();
    let mounted = Rc::new(Cell::new(false));
    let def = async_def(&dep, &mounted);
    let component = VNode::component(&def).done();
    let node = VNode::suspense(&behavior)
        .with_children(vec![component.clone()])
        .done();
    renderer.render(Some(node.clone()), root).unwrap();

    dep.resolve();
    let instance = component.component.borrow().clone().unwrap();
    renderer.resume_async(&instance).unwrap();
    let boundary = node.suspense.borrow().clone().unwrap();
    assert!(boundary.is_resolved());

    // A sibling mounted under the resolved boundary must not park.
    let sibling_mounted = Rc::new(Cell::new(false));
    let flag = sibling_mounted.clone();
    let sibling_def = ComponentDef::new(|_| VNode::element("p").done())
        .with_setup(move |instance| {
            let flag = flag.clone();
            instance.on_mounted(move || {
                flag.set(true);
                Ok(())
            });
            Ok(SetupOutcome::Ready)
        })
        .done();
    let replacement = VNode::suspense(&behavior)
        .with_children(vec![
            VNode::component(&def).done(),
            VNode::component(&sibling_def).done(),
        ])
        .done();
    renderer.render(Some(replacement), root).unwrap();
    assert!(sibling_mounted.get());
}

#[test]
fn boundary_effects_drain_through_the_scheduler() {
    let boundary = SuspenseBoundary::new();
    let scheduler = Scheduler::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let first = order.clone();
    boundary.park(Box::new(move |_host| {
        first.borrow_mut().push("parked");
        Ok(())
    }));
    let second = order.clone();
    scheduler.queue_post(Box::new(move |_host| {
        second.borrow_mut().push("direct");
        Ok(())
    }));

    boundary.resolve(&scheduler);
    let mut host = MemoryHost::new();
    scheduler.flush_post(&mut host, &ErrorSink::default());
    assert_eq!(*order.borrow(), vec!["direct", "parked"]);
}
