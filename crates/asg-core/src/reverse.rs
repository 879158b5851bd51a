//! Reverse edge index: for each target, the `(edge kind, source)` pairs that
//! point at it, in insertion order.
//!
//! The index is derived data. [`Asg`](crate::graph::Asg) keeps it in step
//! with every forward edge mutation, and rebuilds it in one pass after a
//! bulk restore.

use smallvec::SmallVec;

use crate::id::{EdgeKindId, NodeId};
use crate::node::Node;
use crate::store::NodeStore;

type Bucket = SmallVec<[(EdgeKindId, NodeId); 2]>;

#[derive(Debug, Clone, Default)]
pub struct ReverseEdgeIndex {
    buckets: Vec<Bucket>,
}

impl ReverseEdgeIndex {
    pub fn new() -> Self {
        ReverseEdgeIndex::default()
    }

    pub(crate) fn insert(&mut self, target: NodeId, kind: EdgeKindId, source: NodeId) {
        let idx = target.index();
        if self.buckets.len() <= idx {
            self.buckets.resize_with(idx + 1, Bucket::new);
        }
        self.buckets[idx].push((kind, source));
    }

    /// Removes the first matching entry.
    pub(crate) fn remove(&mut self, target: NodeId, kind: EdgeKindId, source: NodeId) -> bool {
        let Some(bucket) = self.buckets.get_mut(target.index()) else {
            return false;
        };
        match bucket.iter().position(|e| *e == (kind, source)) {
            Some(pos) => {
                bucket.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drops every entry whose target is `id`.
    pub(crate) fn remove_node(&mut self, id: NodeId) {
        if let Some(bucket) = self.buckets.get_mut(id.index()) {
            bucket.clear();
        }
    }

    /// Recomputes the index from the forward edges of `store`. Slots carry no
    /// edge kind, so `edge_kinds` yields the slot layout of each node's kind.
    pub fn rebuild<'s, F>(store: &NodeStore, edge_kinds: F) -> Self
    where
        F: Fn(&Node) -> &'s [EdgeKindId],
    {
        let mut index = ReverseEdgeIndex::default();
        index.buckets.resize_with(store.slot_count() as usize, Bucket::new);
        for (src, node) in store.nodes() {
            let kinds = edge_kinds(node);
            for (slot, kind) in node.edge_slots().iter().zip(kinds.iter()) {
                for target in slot.targets() {
                    index.insert(*target, *kind, src);
                }
            }
        }
        index
    }

    /// Sources pointing at `target` through `kind`, in insertion order.
    ///
    /// An index built by [`rebuild`](Self::rebuild) has no history to go by:
    /// its entries follow source id, then the source's slot and list order.
    pub fn predecessors(&self, target: NodeId, kind: EdgeKindId) -> Predecessors<'_> {
        Predecessors {
            entries: self.all(target),
            kind,
            pos: 0,
        }
    }

    /// Every `(kind, source)` pair pointing at `target`.
    pub fn all(&self, target: NodeId) -> &[(EdgeKindId, NodeId)] {
        self.buckets
            .get(target.index())
            .map(|b| b.as_slice())
            .unwrap_or(&[])
    }

    pub fn entry_count(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }

    /// Targets whose entries differ from `other`, compared as multisets.
    pub fn differing_targets(&self, other: &ReverseEdgeIndex) -> Vec<NodeId> {
        let len = self.buckets.len().max(other.buckets.len());
        let mut out = Vec::new();
        for idx in 0..len {
            let target = NodeId(idx as u32);
            let mut a: Vec<_> = self.all(target).to_vec();
            let mut b: Vec<_> = other.all(target).to_vec();
            a.sort_unstable();
            b.sort_unstable();
            if a != b {
                out.push(target);
            }
        }
        out
    }
}

/// Lazy, restartable iterator over the sources of one edge kind.
#[derive(Debug, Clone)]
pub struct Predecessors<'a> {
    entries: &'a [(EdgeKindId, NodeId)],
    kind: EdgeKindId,
    pos: usize,
}

impl Iterator for Predecessors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while self.pos < self.entries.len() {
            let (kind, src) = self.entries[self.pos];
            self.pos += 1;
            if kind == self.kind {
                return Some(src);
            }
        }
        None
    }
}
