use std::rc::Rc;

use arbor_core::{HostOp, PatchHints, VNode};

use super::{keyed_list, keyed_span, setup};

fn span_order(renderer: &crate::Renderer<arbor_core::MemoryHost>, root: usize) -> String {
    let html = renderer.host().to_html(root);
    html.replace("<span>", "")
        .replace("</span>", " ")
        .replace("<root>", "")
        .replace("</root>", "")
        .replace("<div>", "")
        .replace("</div>", "")
        .trim()
        .to_owned()
}

#[test]
fn keyed_swap_of_neighbors_is_one_move() {
    let (mut renderer, root) = setup();
    renderer.render(Some(keyed_list(&["a", "b", "c", "d"])), root).unwrap();
    renderer.host_mut().clear_ops();

    renderer.render(Some(keyed_list(&["a", "c", "b", "d"])), root).unwrap();

    assert_eq!(span_order(&renderer, root), "a c b d");
    assert_eq!(renderer.host().move_count(), 1, "ops: {:?}", renderer.host().ops());
    let created = renderer
        .host()
        .op_count(|op| matches!(op, HostOp::CreateElement { .. }));
    assert_eq!(created, 0);
    let removed = renderer.host().op_count(|op| matches!(op, HostOp::Remove { .. }));
    assert_eq!(removed, 0);
}

#[test]
fn pure_append_creates_without_moving() {
    let (mut renderer, root) = setup();
    renderer.render(Some(keyed_list(&["a", "b"])), root).unwrap();
    renderer.host_mut().clear_ops();

    renderer.render(Some(keyed_list(&["a", "b", "c"])), root).unwrap();

    assert_eq!(span_order(&renderer, root), "a b c");
    assert_eq!(renderer.host().move_count(), 0);
    let created = renderer
        .host()
        .op_count(|op| matches!(op, HostOp::CreateElement { .. }));
    assert_eq!(created, 1);
}

#[test]
fn pure_prepend_creates_without_moving() {
    let (mut renderer, root) = setup();
    renderer.render(Some(keyed_list(&["b", "c"])), root).unwrap();
    renderer.host_mut().clear_ops();

    renderer.render(Some(keyed_list(&["a", "b", "c"])), root).unwrap();

    assert_eq!(span_order(&renderer, root), "a b c");
    assert_eq!(renderer.host().move_count(), 0);
}

#[test]
fn removes_only_the_dropped_middle_child() {
    let (mut renderer, root) = setup();
    renderer.render(Some(keyed_list(&["a", "b", "c"])), root).unwrap();
    renderer.host_mut().clear_ops();

    renderer.render(Some(keyed_list(&["a", "c"])), root).unwrap();

    assert_eq!(span_order(&renderer, root), "a c");
    assert_eq!(renderer.host().move_count(), 0);
    let removed = renderer.host().op_count(|op| matches!(op, HostOp::Remove { .. }));
    assert_eq!(removed, 1);
}

#[test]
fn reversal_keeps_one_child_stable() {
    let (mut renderer, root) = setup();
    renderer.render(Some(keyed_list(&["a", "b", "c", "d"])), root).unwrap();
    renderer.host_mut().clear_ops();

    renderer.render(Some(keyed_list(&["d", "c", "b", "a"])), root).unwrap();

    assert_eq!(span_order(&renderer, root), "d c b a");
    // The stable run has length one; every other child moves.
    assert_eq!(renderer.host().move_count(), 3);
}

#[test]
fn mixed_insert_remove_and_reorder() {
    let (mut renderer, root) = setup();
    renderer.render(Some(keyed_list(&["a", "b", "c", "d", "e"])), root).unwrap();
    renderer.host_mut().clear_ops();

    renderer.render(Some(keyed_list(&["e", "b", "f", "d"])), root).unwrap();
    assert_eq!(span_order(&renderer, root), "e b f d");
}

#[test]
fn duplicate_keys_match_the_first_registration() {
    let (mut renderer, root) = setup();
    let first = VNode::element("div")
        .with_children(vec![keyed_span("a"), keyed_span("b")])
        .done();
    renderer.render(Some(first.clone()), root).unwrap();
    let old_a = first.child_nodes()[0].el.get().unwrap();

    let dup_one = keyed_span("a");
    let dup_two = keyed_span("a");
    let second = VNode::element("div")
        .with_children(vec![keyed_span("b"), dup_one.clone(), dup_two.clone()])
        .done();
    renderer.render(Some(second), root).unwrap();

    // The surviving "a" pairs with the first duplicate entry; the second
    // mounts fresh.
    assert_eq!(dup_one.el.get(), Some(old_a));
    assert_ne!(dup_two.el.get(), Some(old_a));
    assert_eq!(span_order(&renderer, root), "b a a");
}

#[test]
fn same_key_different_tag_is_replaced_in_place() {
    let (mut renderer, root) = setup();
    let first = VNode::element("div")
        .with_children(vec![
            keyed_span("a"),
            VNode::element("span").keyed("x").with_text("x").done(),
            keyed_span("c"),
        ])
        .done();
    renderer.render(Some(first), root).unwrap();

    let replacement = VNode::element("b").keyed("x").with_text("x").done();
    let second = VNode::element("div")
        .with_children(vec![keyed_span("a"), replacement, keyed_span("c")])
        .done();
    renderer.render(Some(second), root).unwrap();

    assert_eq!(
        renderer.host().to_html(root),
        "<root><div><span>a</span><b>x</b><span>c</span></div></root>"
    );
}

#[test]
fn unkeyed_hint_patches_by_position() {
    let (mut renderer, root) = setup();
    let build = |texts: &[&str]| {
        VNode::element("div")
            .with_children(
                texts
                    .iter()
                    .map(|t| VNode::element("span").with_text(t).done())
                    .collect(),
            )
            .with_hints(PatchHints {
                unkeyed_fragment: true,
                ..PatchHints::default()
            })
            .done()
    };
    renderer.render(Some(build(&["1", "2", "3"])), root).unwrap();
    renderer.host_mut().clear_ops();

    renderer.render(Some(build(&["9", "8"])), root).unwrap();

    assert_eq!(span_order(&renderer, root), "9 8");
    assert_eq!(renderer.host().move_count(), 0);
    let removed = renderer.host().op_count(|op| matches!(op, HostOp::Remove { .. }));
    assert_eq!(removed, 1);
}

#[test]
fn fragment_children_reorder_within_anchors() {
    let (mut renderer, root) = setup();
    let build = |keys: &[&str]| {
        VNode::fragment(keys.iter().map(|k| keyed_span(k)).collect()).done()
    };
    let first = build(&["a", "b"]);
    renderer.render(Some(first.clone()), root).unwrap();
    let start = first.el.get().unwrap();
    let end = first.anchor.get().unwrap();
    renderer.host_mut().clear_ops();

    let second = build(&["b", "a"]);
    renderer.render(Some(second.clone()), root).unwrap();

    assert_eq!(span_order(&renderer, root), "b a");
    // Anchors survive the patch and still delimit the span.
    assert_eq!(second.el.get(), Some(start));
    assert_eq!(second.anchor.get(), Some(end));
    assert_eq!(renderer.host().move_count(), 1);
}

#[test]
fn fragment_unmounts_its_entire_span() {
    let (mut renderer, root) = setup();
    let node = VNode::fragment(vec![keyed_span("a"), keyed_span("b")]).done();
    renderer.render(Some(node), root).unwrap();

    renderer.render(None, root).unwrap();
    assert_eq!(renderer.host().to_html(root), "<root></root>");
}

#[test]
fn host_bound_child_is_cloned_before_reuse() {
    let (mut renderer, root) = setup();
    let shared = keyed_span("a");
    let first = VNode::element("div").with_children(vec![shared.clone()]).done();
    renderer.render(Some(first), root).unwrap();
    let mounted_el = shared.el.get().unwrap();

    let second = VNode::element("div").with_children(vec![shared.clone()]).done();
    renderer.render(Some(second.clone()), root).unwrap();

    let current = second.child_nodes()[0].clone();
    // The bound node was swapped out for a fresh clone that carries the
    // host handle forward.
    assert!(!Rc::ptr_eq(&current, &shared));
    assert_eq!(current.el.get(), Some(mounted_el));
}

#[test]
fn stable_fragment_takes_the_block_path() {
    let (mut renderer, root) = setup();
    let build = |a: &str, b: &str| {
        let stable = VNode::element("span").with_text(a).done();
        let dynamic = VNode::element("span")
            .with_text(b)
            .with_hints(PatchHints {
                text: true,
                ..PatchHints::default()
            })
            .done();
        VNode::fragment(vec![stable, dynamic.clone()])
            .with_dynamic_children(vec![dynamic])
            .with_hints(PatchHints {
                stable_fragment: true,
                ..PatchHints::default()
            })
            .done()
    };
    renderer.render(Some(build("a1", "b1")), root).unwrap();
    renderer.host_mut().clear_ops();

    renderer.render(Some(build("a1", "b2")), root).unwrap();
    let text_ops = renderer
        .host()
        .op_count(|op| matches!(op, HostOp::SetElementText { .. }));
    assert_eq!(text_ops, 1);
    assert!(renderer.host().to_html(root).contains("b2"));
}
