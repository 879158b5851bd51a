//! Filtering: logical deletion.
//!
//! A filtered node stays addressable and keeps all its edges; traversals and
//! renderings skip it. Filtering is never index-destructive. The filter
//! switch masks every flag without clearing it.

use crate::error::CoreError;
use crate::graph::Asg;
use crate::id::{NodeId, NodeKindId};

impl Asg {
    pub fn turn_filter_on(&mut self) {
        self.store.set_filter_on(true);
    }

    /// While off, [`Asg::is_filtered`] reports `false` for every node.
    pub fn turn_filter_off(&mut self) {
        self.store.set_filter_on(false);
    }

    pub fn is_filter_on(&self) -> bool {
        self.store.is_filter_on()
    }

    /// `true` if `id` is filtered and filtering is on. Unknown ids report
    /// `false`.
    pub fn is_filtered(&self, id: NodeId) -> bool {
        self.store.is_filtered(id)
    }

    /// Filters this node only; descendants are untouched.
    pub fn set_filtered(&mut self, id: NodeId) -> Result<(), CoreError> {
        self.store.set_flag(id, true)
    }

    /// Unfilters this node only.
    pub fn clear_filtered(&mut self, id: NodeId) -> Result<(), CoreError> {
        self.store.set_flag(id, false)
    }

    /// Filters `id` and every ownership descendant.
    pub fn filter_subtree(&mut self, id: NodeId) -> Result<usize, CoreError> {
        let subtree = self.subtree(id)?;
        for node in &subtree {
            self.store.set_flag(*node, true)?;
        }
        Ok(subtree.len())
    }

    /// Unfilters `id`, its descendants and its owner chain, so that the
    /// node becomes reachable again from its root.
    pub fn unfilter_with_ancestors(&mut self, id: NodeId) -> Result<(), CoreError> {
        for node in self.subtree(id)? {
            self.store.set_flag(node, false)?;
        }
        let mut current = self.parent(id)?;
        while let Some(owner) = current {
            self.store.set_flag(owner, false)?;
            current = self.parent(owner)?;
        }
        Ok(())
    }

    /// Finishing pass run after a build: bottom-up, filters each node of one
    /// of `kinds` (or a sub-kind) that has owned children, all of them
    /// filtered. Returns the number of newly filtered nodes.
    pub fn filter_emptied_containers(&mut self, kinds: &[NodeKindId]) -> Result<usize, CoreError> {
        let mut filtered = 0;
        for id in self.postorder_all()? {
            let node = self.store.get(id)?;
            if node.filtered || !kinds.iter().any(|k| self.schema.is_a(node.kind, *k)) {
                continue;
            }
            let children = self.children(id)?;
            if children.is_empty() {
                continue;
            }
            let all_filtered = children
                .iter()
                .all(|c| self.store.get(*c).map(|n| n.filtered).unwrap_or(true));
            if all_filtered {
                self.store.set_flag(id, true)?;
                filtered += 1;
            }
        }
        Ok(filtered)
    }

    /// Raw filter flags indexed by slot (slot 0 and destroyed slots are
    /// `false`).
    pub fn filter_flags(&self) -> Vec<bool> {
        let mut flags = vec![false; self.slot_count() as usize];
        for (id, node) in self.store.nodes() {
            flags[id.index()] = node.filtered;
        }
        flags
    }

    /// Applies flags produced by [`Asg::filter_flags`]. Flags of empty slots
    /// are ignored.
    pub fn apply_filter_flags(&mut self, flags: &[bool]) -> Result<(), CoreError> {
        for (idx, flag) in flags.iter().enumerate() {
            let id = NodeId(idx as u32);
            if self.store.exists(id) {
                self.store.set_flag(id, *flag)?;
            }
        }
        Ok(())
    }

    pub fn filtered_count(&self) -> usize {
        self.store.nodes().filter(|(_, n)| n.filtered).count()
    }

    /// `id` and its ownership descendants, preorder.
    pub(crate) fn subtree(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        self.store.get(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            let mut children = self.children(next)?;
            children.reverse();
            stack.extend(children);
        }
        Ok(out)
    }

    /// Every live node in ownership postorder, roots in id order.
    fn postorder_all(&self) -> Result<Vec<NodeId>, CoreError> {
        let mut out = Vec::with_capacity(self.node_count());
        for root in self.roots() {
            let mut stack = vec![(root, false)];
            while let Some((id, expanded)) = stack.pop() {
                if expanded {
                    out.push(id);
                    continue;
                }
                stack.push((id, true));
                for child in self.children(id)?.into_iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        Ok(out)
    }
}
