use std::rc::Rc;

use arbor_core::{HostId, MemoryHost, PropValue, VNode};

use crate::Renderer;

mod children_tests;
mod component_tests;
mod suspense_tests;

fn setup() -> (Renderer<MemoryHost>, HostId) {
    let mut host = MemoryHost::new();
    let root = host.create_container();
    (Renderer::new(host), root)
}

fn keyed_span(key: &str) -> Rc<VNode> {
    VNode::element("span").keyed(key).with_text(key).done()
}

fn keyed_list(keys: &[&str]) -> Rc<VNode> {
    VNode::element("div")
        .with_children(keys.iter().map(|k| keyed_span(k)).collect())
        .done()
}

fn prop(value: &str) -> PropValue {
    PropValue::from(value)
}
