//! Node arena.
//!
//! [`NodeStore`] owns every node of a graph by [`NodeId`]. Slot 0 is the
//! reserved "no node" id; ids grow monotonically and destroyed slots stay
//! empty, so an id is never handed out twice.

use crate::error::CoreError;
use crate::id::NodeId;
use crate::node::Node;

#[derive(Debug, Clone)]
pub struct NodeStore {
    slots: Vec<Option<Node>>,
    live: usize,
    filter_on: bool,
}

impl Default for NodeStore {
    fn default() -> Self {
        NodeStore::new()
    }
}

impl NodeStore {
    pub fn new() -> Self {
        NodeStore {
            slots: vec![None],
            live: 0,
            filter_on: true,
        }
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(node));
        self.live += 1;
        id
    }

    /// Places a node at a fixed id, growing the arena as needed.
    pub(crate) fn restore_at(&mut self, id: NodeId, node: Node) -> Result<(), CoreError> {
        if id.is_none() {
            return Err(CoreError::SlotOccupied { id });
        }
        let idx = id.index();
        if self.slots.len() <= idx {
            self.slots.resize_with(idx + 1, || None);
        }
        if self.slots[idx].is_some() {
            return Err(CoreError::SlotOccupied { id });
        }
        self.slots[idx] = Some(node);
        self.live += 1;
        Ok(())
    }

    /// Grows the arena so that the next allocated id is at least `slot_count`.
    pub(crate) fn reserve_slots(&mut self, slot_count: u32) {
        let wanted = (slot_count as usize).max(1);
        if self.slots.len() < wanted {
            self.slots.resize_with(wanted, || None);
        }
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node> {
        if id.is_none() {
            return None;
        }
        let node = self.slots.get_mut(id.index())?.take();
        if node.is_some() {
            self.live -= 1;
        }
        node
    }

    pub fn get(&self, id: NodeId) -> Result<&Node, CoreError> {
        self.slots
            .get(id.index())
            .and_then(|slot| slot.as_ref())
            .ok_or(CoreError::NotFound { id })
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, CoreError> {
        self.slots
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
            .ok_or(CoreError::NotFound { id })
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.live
    }

    /// Number of ids ever allocated, including destroyed ones.
    pub fn len(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The id the next allocation will receive.
    pub fn slot_count(&self) -> u32 {
        self.slots.len() as u32
    }

    // -----------------------------------------------------------------------
    // Filtering
    // -----------------------------------------------------------------------

    pub fn is_filter_on(&self) -> bool {
        self.filter_on
    }

    pub(crate) fn set_filter_on(&mut self, on: bool) {
        self.filter_on = on;
    }

    /// `true` if the node is filtered and filtering is switched on. Unknown
    /// ids report `false`.
    pub fn is_filtered(&self, id: NodeId) -> bool {
        self.filter_on && self.get(id).map(|n| n.filtered).unwrap_or(false)
    }

    pub(crate) fn set_flag(&mut self, id: NodeId, filtered: bool) -> Result<(), CoreError> {
        self.get_mut(id)?.filtered = filtered;
        Ok(())
    }

    /// Live node ids in creation order.
    pub fn iter(&self) -> NodeIds<'_> {
        NodeIds {
            slots: &self.slots,
            pos: 0,
        }
    }

    /// Live nodes paired with their ids.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|n| (NodeId(i as u32), n)))
    }
}

/// Lazy iterator over live node ids. Cloning restarts from the clone point.
#[derive(Debug, Clone)]
pub struct NodeIds<'a> {
    slots: &'a [Option<Node>],
    pos: usize,
}

impl Iterator for NodeIds<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while self.pos < self.slots.len() {
            let idx = self.pos;
            self.pos += 1;
            if self.slots[idx].is_some() {
                return Some(NodeId(idx as u32));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.slots.len().saturating_sub(self.pos)))
    }
}
