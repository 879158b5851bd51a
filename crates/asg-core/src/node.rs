//! Node representation.
//!
//! A [`Node`] is a generic record interpreted through its kind's
//! [`NodeKind`](crate::schema::NodeKind): `fields[i]` holds the value of the
//! kind's i-th field and `edges[i]` the targets of its i-th edge kind.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::{EdgeKindId, NodeId, NodeKindId};
use crate::value::Value;

/// Where a node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Origin {
    /// Built by a front end from source.
    #[default]
    Analyzer,
    /// Created by the engine or a tool, e.g. a shared builtin type. Such
    /// nodes are "special" and traversals may skip them.
    Synthetic,
}

/// Targets of one edge kind on one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeSlot {
    Single(Option<NodeId>),
    Multi(SmallVec<[NodeId; 4]>),
}

impl EdgeSlot {
    pub fn targets(&self) -> &[NodeId] {
        match self {
            EdgeSlot::Single(target) => target.as_slice(),
            EdgeSlot::Multi(targets) => targets.as_slice(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets().is_empty()
    }

    /// Removes the first occurrence of `target`.
    pub(crate) fn remove(&mut self, target: NodeId) -> bool {
        match self {
            EdgeSlot::Single(current) => {
                if *current == Some(target) {
                    *current = None;
                    true
                } else {
                    false
                }
            }
            EdgeSlot::Multi(targets) => match targets.iter().position(|t| *t == target) {
                Some(pos) => {
                    targets.remove(pos);
                    true
                }
                None => false,
            },
        }
    }
}

const HASH_VALID: u64 = 1 << 32;

/// Lazily computed structural hash. Atomic so that read-only traversals may
/// share the graph across threads.
#[derive(Debug, Default)]
pub struct HashCache(AtomicU64);

impl HashCache {
    pub fn get(&self) -> Option<u32> {
        let raw = self.0.load(Ordering::Acquire);
        if raw & HASH_VALID != 0 {
            Some(raw as u32)
        } else {
            None
        }
    }

    pub fn set(&self, hash: u32) {
        self.0.store(HASH_VALID | hash as u64, Ordering::Release);
    }

    pub fn invalidate(&self) {
        self.0.store(0, Ordering::Release);
    }
}

impl Clone for HashCache {
    fn clone(&self) -> Self {
        HashCache(AtomicU64::new(self.0.load(Ordering::Acquire)))
    }
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKindId,
    pub(crate) origin: Origin,
    pub(crate) parent: Option<(NodeId, EdgeKindId)>,
    pub(crate) filtered: bool,
    pub(crate) fields: SmallVec<[Value; 4]>,
    pub(crate) edges: Vec<EdgeSlot>,
    pub(crate) hash: HashCache,
}

impl Node {
    pub(crate) fn new(
        kind: NodeKindId,
        origin: Origin,
        fields: SmallVec<[Value; 4]>,
        edges: Vec<EdgeSlot>,
    ) -> Self {
        Node {
            kind,
            origin,
            parent: None,
            filtered: false,
            fields,
            edges,
            hash: HashCache::default(),
        }
    }

    pub fn kind(&self) -> NodeKindId {
        self.kind
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_special(&self) -> bool {
        self.origin == Origin::Synthetic
    }

    /// Owning node and the ownership edge kind that holds this node.
    pub fn parent(&self) -> Option<(NodeId, EdgeKindId)> {
        self.parent
    }

    /// The raw filter flag, regardless of whether filtering is switched on.
    pub fn filter_flag(&self) -> bool {
        self.filtered
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub fn edge_slots(&self) -> &[EdgeSlot] {
        &self.edges
    }

    pub fn cached_hash(&self) -> Option<u32> {
        self.hash.get()
    }
}
