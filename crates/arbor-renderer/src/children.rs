//! Child-list reconciliation: unkeyed pairing, the keyed diff with its
//! longest-stable-run move minimization, and the block fast path.

use std::rc::Rc;

use arbor_core::{
    same_node_type, Children, ComponentInstance, FastMap, HostId, HostOps, Key, MoveType,
    RenderError, SuspenseBoundary, VNode,
};

use crate::sequence::longest_stable_run;

/// Returns `owner`'s child at `index`, cloning it fresh (and writing the
/// clone back) when it is already host-bound from an earlier mount.
pub(crate) fn prepared_child(owner: &Rc<VNode>, index: usize) -> Rc<VNode> {
    let mut children = owner.children.borrow_mut();
    let Children::Nodes(nodes) = &mut *children else {
        unreachable!("prepared_child on non-array children");
    };
    let child = nodes[index].clone();
    if child.el.get().is_none() {
        return child;
    }
    let cloned = child.clone_unbound();
    nodes[index] = cloned.clone();
    cloned
}

/// Prepared snapshot of every array child.
fn prepared_children(owner: &Rc<VNode>) -> Vec<Rc<VNode>> {
    let len = owner.child_nodes().len();
    (0..len).map(|i| prepared_child(owner, i)).collect()
}

impl<H: HostOps> crate::Renderer<H> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn mount_children(
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
        let len = owner.child_nodes().len();
        for index in start..len {
            let child = prepared_child(owner, index);
            self.patch(None, &child, container, anchor, parent, suspense, is_svg, optimized)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn patch_children(
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
        if n2.hints.keyed_fragment {
            return self.patch_keyed_children(n1, n2, container, anchor, parent, suspense, is_svg, optimized);
        }
        if n2.hints.unkeyed_fragment {
            return self.patch_unkeyed_children(n1, n2, container, anchor, parent, suspense, is_svg, optimized);
        }

        let old = n1.children.borrow().clone();
        let new = n2.children.borrow().clone();
        match new {
            Children::Text(text) => {
                if let Children::Nodes(old_nodes) = &old {
                    self.unmount_children(old_nodes, parent, suspense, false, 0)?;
                }
                if old.as_text() != Some(&text) {
                    self.host.set_element_text(container, &text);
                }
            }
            Children::Nodes(_) => match &old {
                Children::Nodes(_) => {
                    // Two unhinted arrays: assume keyed, the diff degrades
                    // gracefully for keyless entries.
                    self.patch_keyed_children(n1, n2, container, anchor, parent, suspense, is_svg, optimized)?;
                }
                Children::Text(_) => {
                    self.host.set_element_text(container, "");
                    self.mount_children(n2, 0, container, anchor, parent, suspense, is_svg, optimized)?;
                }
                Children::None => {
                    self.mount_children(n2, 0, container, anchor, parent, suspense, is_svg, optimized)?;
                }
            },
            Children::None => match &old {
                Children::Nodes(old_nodes) => {
                    self.unmount_children(old_nodes, parent, suspense, true, 0)?;
                }
                Children::Text(_) => self.host.set_element_text(container, ""),
                Children::None => {}
            },
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn patch_unkeyed_children(
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
        let c1 = n1.child_nodes();
        let new_len = n2.child_nodes().len();
        let common = c1.len().min(new_len);
        for index in 0..common {
            let next = prepared_child(n2, index);
            self.patch(Some(c1[index].clone()), &next, container, None, parent, suspense, is_svg, optimized)?;
        }
        if c1.len() > new_len {
            self.unmount_children(&c1, parent, suspense, true, common)
        } else {
            self.mount_children(n2, common, container, anchor, parent, suspense, is_svg, optimized)
        }
    }

    /// Full keyed diff: sync from both ends, then resolve the unknown
    /// middle with a key map and a longest-stable-run to minimize moves.
    #[allow(clippy::too_many_arguments)]
    fn patch_keyed_children(
        &mut self,
        n1: &Rc<VNode>,
        n2: &Rc<VNode>,
        container: HostId,
        parent_anchor: Option<HostId>,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
        optimized: bool,
    ) -> Result<(), RenderError> {
        let c1 = n1.child_nodes();
        let c2 = prepared_children(n2);
        let l2 = c2.len();

        let mut i = 0usize;
        let mut e1 = c1.len() as isize - 1;
        let mut e2 = l2 as isize - 1;

        // 1. sync from the head
        while (i as isize) <= e1 && (i as isize) <= e2 {
            let prev = c1[i].clone();
            let next = c2[i].clone();
            if !same_node_type(&prev, &next) {
                break;
            }
            self.patch(Some(prev), &next, container, None, parent, suspense, is_svg, optimized)?;
            i += 1;
        }

        // 2. sync from the tail
        while (i as isize) <= e1 && (i as isize) <= e2 {
            let prev = c1[e1 as usize].clone();
            let next = c2[e2 as usize].clone();
            if !same_node_type(&prev, &next) {
                break;
            }
            self.patch(Some(prev), &next, container, None, parent, suspense, is_svg, optimized)?;
            e1 -= 1;
            e2 -= 1;
        }

        if (i as isize) > e1 {
            // 3. old exhausted: mount the remaining new children before
            // whatever follows the synced tail.
            if (i as isize) <= e2 {
                let next_pos = (e2 + 1) as usize;
                let insert_anchor = if next_pos < l2 {
                    c2[next_pos].el.get()
                } else {
                    parent_anchor
                };
                for index in i..=(e2 as usize) {
                    self.patch(None, &c2[index], container, insert_anchor, parent, suspense, is_svg, optimized)?;
                }
            }
        } else if (i as isize) > e2 {
            // 4. new exhausted: unmount the leftover old children.
            for index in i..=(e1 as usize) {
                self.unmount(&c1[index], parent, suspense, true)?;
            }
        } else {
            // 5. unknown middle
            let s1 = i;
            let s2 = i;

            let mut key_to_new: FastMap<Key, usize> = FastMap::default();
            for (index, child) in c2.iter().enumerate().take(e2 as usize + 1).skip(s2) {
                if let Some(key) = &child.key {
                    // First registration wins.
                    if key_to_new.contains_key(key) {
                        tracing::warn!(?key, "duplicate key in child list, diff may misbehave");
                    } else {
                        key_to_new.insert(key.clone(), index);
                    }
                }
            }

            let to_patch = (e2 - s2 as isize + 1) as usize;
            let mut patched = 0usize;
            let mut moved = false;
            let mut max_new_index_so_far = 0usize;
            // Entry k: old index + 1 of the new child at s2 + k, 0 when
            // the child has no old counterpart.
            let mut new_to_old = vec![0usize; to_patch];

            for (index, prev) in c1.iter().enumerate().take(e1 as usize + 1).skip(s1) {
                if patched >= to_patch {
                    // Every new slot is taken; the rest of the old list is
                    // surplus.
                    self.unmount(prev, parent, suspense, true)?;
                    continue;
                }
                let new_index = match &prev.key {
                    Some(key) => key_to_new.get(key).copied(),
                    None => {
                        // Keyless old child: claim the first unmatched new
                        // child of the same shape. Quadratic, but keyless
                        // middles are short in practice.
                        (s2..=(e2 as usize)).find(|&j| {
                            new_to_old[j - s2] == 0 && same_node_type(prev, &c2[j])
                        })
                    }
                };
                match new_index {
                    None => self.unmount(prev, parent, suspense, true)?,
                    Some(new_index) => {
                        new_to_old[new_index - s2] = index + 1;
                        if new_index >= max_new_index_so_far {
                            max_new_index_so_far = new_index;
                        } else {
                            moved = true;
                        }
                        self.patch(Some(prev.clone()), &c2[new_index], container, None, parent, suspense, is_svg, optimized)?;
                        patched += 1;
                    }
                }
            }

            // 5.3 move and mount, walking backwards so each child can
            // anchor on its (already placed) successor.
            let stable = if moved {
                longest_stable_run(&new_to_old)
            } else {
                Vec::new()
            };
            let mut j = stable.len() as isize - 1;
            for k in (0..to_patch).rev() {
                let index = s2 + k;
                let insert_anchor = if index + 1 < l2 {
                    c2[index + 1].el.get()
                } else {
                    parent_anchor
                };
                if new_to_old[k] == 0 {
                    self.patch(None, &c2[index], container, insert_anchor, parent, suspense, is_svg, optimized)?;
                } else if moved {
                    if j < 0 || k != stable[j as usize] {
                        self.move_vnode(&c2[index], container, insert_anchor, MoveType::Reorder)?;
                    } else {
                        j -= 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Pairwise fast path over tracked dynamic descendants. Pairs always
    /// describe the same stable position, so only the pair itself is
    /// diffed; containers are resolved per pair because a dynamic child
    /// may live anywhere beneath the block root.
    pub(crate) fn patch_block_children(
        &mut self,
        old_children: &[Rc<VNode>],
        new_children: &[Rc<VNode>],
        fallback_container: HostId,
        parent: Option<&Rc<ComponentInstance>>,
        suspense: Option<&Rc<SuspenseBoundary>>,
        is_svg: bool,
    ) -> Result<(), RenderError> {
        for (old_child, new_child) in old_children.iter().zip(new_children) {
            let container = match old_child.el.get() {
                // The real parent matters when the patch may relocate or
                // replace host nodes; plain in-place patches never use it.
                Some(el)
                    if old_child.is_fragment()
                        || !same_node_type(old_child, new_child)
                        || old_child.is_component()
                        || old_child.is_teleport() =>
                {
                    self.host.parent_node(el).unwrap_or(fallback_container)
                }
                _ => fallback_container,
            };
            self.patch(Some(old_child.clone()), new_child, container, None, parent, suspense, is_svg, true)?;
        }
        Ok(())
    }
}
