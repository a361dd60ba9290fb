use std::cell::{Cell, RefCell};
use std::rc::Rc;

use arbor_core::{props, ComponentDef, ComponentInstance, PropValue, VNode, VNodeHooks};

use super::{prop, setup};

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn log(entry: &str) {
    LOG.with(|log| log.borrow_mut().push(entry.to_owned()));
}

fn take_log() -> Vec<String> {
    LOG.with(|log| log.borrow_mut().drain(..).collect())
}

fn instance_of(node: &Rc<VNode>) -> Rc<ComponentInstance> {
    node.component.borrow().clone().unwrap()
}

#[test]
fn mounts_component_subtree_and_binds_host_el() {
    let (mut renderer, root) = setup();
    let def = ComponentDef::new(|_| VNode::element("div").with_text("inner").done())
        .named("Inner")
        .done();
    let node = VNode::component(&def).done();
    renderer.render(Some(node.clone()), root).unwrap();

    assert_eq!(renderer.host().to_html(root), "<root><div>inner</div></root>");
    let instance = instance_of(&node);
    assert!(instance.is_mounted.get());
    assert_eq!(node.el.get(), instance.sub_tree.borrow().as_ref().unwrap().el.get());
}

#[test]
fn parent_pushed_props_trigger_a_single_rerender() {
    let (mut renderer, root) = setup();
    let renders = Rc::new(Cell::new(0usize));
    let render_count = renders.clone();
    let def = ComponentDef::new(move |instance| {
        render_count.set(render_count.get() + 1);
        let label = match instance.props.borrow().get("label") {
            Some(PropValue::Str(s)) => s.clone(),
            _ => String::new(),
        };
        VNode::element("div").with_text(&label).done()
    })
    .done();

    let first = VNode::component(&def)
        .with_props(props([("label", prop("one"))]))
        .done();
    renderer.render(Some(first), root).unwrap();
    assert_eq!(renders.get(), 1);

    let second = VNode::component(&def)
        .with_props(props([("label", prop("two"))]))
        .done();
    renderer.render(Some(second), root).unwrap();
    assert_eq!(renders.get(), 2);
    assert_eq!(renderer.host().to_html(root), "<root><div>two</div></root>");
}

#[test]
fn equal_props_skip_the_rerender() {
    let (mut renderer, root) = setup();
    let renders = Rc::new(Cell::new(0usize));
    let render_count = renders.clone();
    let def = ComponentDef::new(move |_| {
        render_count.set(render_count.get() + 1);
        VNode::element("div").done()
    })
    .done();

    let build = || {
        VNode::component(&def)
            .with_props(props([("label", prop("same"))]))
            .done()
    };
    let first = build();
    renderer.render(Some(first.clone()), root).unwrap();
    let second = build();
    renderer.render(Some(second.clone()), root).unwrap();

    assert_eq!(renders.get(), 1);
    // Bindings still roll forward to the new node.
    assert_eq!(second.el.get(), first.el.get());
    assert!(Rc::ptr_eq(&instance_of(&second), &instance_of(&first)));
}

#[test]
fn queued_self_updates_deduplicate() {
    let (mut renderer, root) = setup();
    let state = Rc::new(Cell::new(0i64));
    let renders = Rc::new(Cell::new(0usize));
    let render_state = state.clone();
    let render_count = renders.clone();
    let def = ComponentDef::new(move |_| {
        render_count.set(render_count.get() + 1);
        VNode::element("div")
            .with_text(&render_state.get().to_string())
            .done()
    })
    .done();

    let node = VNode::component(&def).done();
    renderer.render(Some(node.clone()), root).unwrap();
    assert_eq!(renders.get(), 1);

    let instance = instance_of(&node);
    state.set(7);
    renderer.queue_update(&instance);
    renderer.queue_update(&instance);
    assert!(renderer.scheduler_handle().has_pending_updates());
    renderer.flush_updates().unwrap();

    assert_eq!(renders.get(), 2);
    assert_eq!(renderer.host().to_html(root), "<root><div>7</div></root>");
}

#[test]
fn direct_update_cancels_a_queued_one() {
    let (mut renderer, root) = setup();
    let renders = Rc::new(Cell::new(0usize));
    let render_count = renders.clone();
    let def = ComponentDef::new(move |instance| {
        render_count.set(render_count.get() + 1);
        let label = match instance.props.borrow().get("label") {
            Some(PropValue::Str(s)) => s.clone(),
            _ => String::new(),
        };
        VNode::element("div").with_text(&label).done()
    })
    .done();

    let first = VNode::component(&def)
        .with_props(props([("label", prop("one"))]))
        .done();
    renderer.render(Some(first.clone()), root).unwrap();
    let instance = instance_of(&first);

    // Self-queued, then superseded by the parent pushing new props.
    renderer.queue_update(&instance);
    let second = VNode::component(&def)
        .with_props(props([("label", prop("two"))]))
        .done();
    renderer.render(Some(second), root).unwrap();

    assert_eq!(renders.get(), 2, "the queued job must not run a third render");
    assert_eq!(renderer.host().to_html(root), "<root><div>two</div></root>");
}

#[test]
fn lifecycle_hooks_run_in_order() {
    let (mut renderer, root) = setup();
    let def = ComponentDef::new(|instance| {
        let label = match instance.props.borrow().get("label") {
            Some(PropValue::Str(s)) => s.clone(),
            _ => String::new(),
        };
        VNode::element("div").with_text(&label).done()
    })
    .with_setup(|instance| {
        log("setup");
        instance.on_before_mount(|| {
            log("before_mount");
            Ok(())
        });
        instance.on_mounted(|| {
            log("mounted");
            Ok(())
        });
        instance.on_before_update(|| {
            log("before_update");
            Ok(())
        });
        instance.on_updated(|| {
            log("updated");
            Ok(())
        });
        instance.on_before_unmount(|| {
            log("before_unmount");
            Ok(())
        });
        instance.on_unmounted(|| {
            log("unmounted");
            Ok(())
        });
        Ok(arbor_core::SetupOutcome::Ready)
    })
    .done();

    take_log();
    let first = VNode::component(&def)
        .with_props(props([("label", prop("one"))]))
        .done();
    renderer.render(Some(first), root).unwrap();
    assert_eq!(take_log(), ["setup", "before_mount", "mounted"]);

    let second = VNode::component(&def)
        .with_props(props([("label", prop("two"))]))
        .done();
    renderer.render(Some(second), root).unwrap();
    assert_eq!(take_log(), ["before_update", "updated"]);

    renderer.render(None, root).unwrap();
    assert_eq!(take_log(), ["before_unmount", "unmounted"]);
}

#[test]
fn vnode_hooks_fire_around_mount_and_update() {
    let (mut renderer, root) = setup();
    let def = ComponentDef::new(|instance| {
        let n = instance.props.borrow().len();
        VNode::element("div").with_text(&n.to_string()).done()
    })
    .done();

    take_log();
    let hooks = VNodeHooks {
        before_mount: Some(Rc::new(|_, _| {
            log("node:before_mount");
            Ok(())
        })),
        mounted: Some(Rc::new(|_, _| {
            log("node:mounted");
            Ok(())
        })),
        ..VNodeHooks::default()
    };
    let node = VNode::component(&def).with_hooks(hooks).done();
    renderer.render(Some(node), root).unwrap();
    assert_eq!(take_log(), ["node:before_mount", "node:mounted"]);
}

#[test]
fn wrapper_component_tracks_the_inner_root_el() {
    let (mut renderer, root) = setup();
    let toggle = Rc::new(Cell::new(false));
    let inner_toggle = toggle.clone();
    let inner_def = ComponentDef::new(move |_| {
        if inner_toggle.get() {
            VNode::element("div").with_text("block").done()
        } else {
            VNode::text("inline").done()
        }
    })
    .named("Inner")
    .done();
    let wrapper_def = ComponentDef::new(move |_| VNode::component(&inner_def).done())
        .named("Wrapper")
        .done();

    let node = VNode::component(&wrapper_def).done();
    renderer.render(Some(node.clone()), root).unwrap();
    let inner_node = instance_of(&node).sub_tree.borrow().clone().unwrap();
    let inner = instance_of(&inner_node);

    toggle.set(true);
    renderer.queue_update(&inner);
    renderer.flush_updates().unwrap();

    // The replacement root handle propagates through the wrapper chain.
    let new_el = inner.sub_tree.borrow().as_ref().unwrap().el.get();
    assert!(new_el.is_some());
    assert_eq!(node.el.get(), new_el);
    assert_eq!(renderer.host().to_html(root), "<root><div>block</div></root>");
}

#[test]
fn unmount_stops_the_render_effect() {
    let (mut renderer, root) = setup();
    let renders = Rc::new(Cell::new(0usize));
    let render_count = renders.clone();
    let def = ComponentDef::new(move |_| {
        render_count.set(render_count.get() + 1);
        VNode::element("div").done()
    })
    .done();

    let node = VNode::component(&def).done();
    renderer.render(Some(node.clone()), root).unwrap();
    let instance = instance_of(&node);
    let effect = arbor_core::EffectHandle::new();
    instance.register_effect(effect.clone());

    renderer.queue_update(&instance);
    renderer.render(None, root).unwrap();
    renderer.flush_updates().unwrap();

    assert!(instance.is_unmounted.get());
    assert!(!instance.effect_active.get());
    assert!(!effect.is_active(), "registered effects stop with the instance");
    assert_eq!(renders.get(), 1, "a stale queued update must not render");
}
