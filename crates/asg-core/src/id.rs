//! Stable ID newtypes for graph entities.
//!
//! All IDs are distinct newtype wrappers over small unsigned integers, so a
//! `NodeId` cannot be accidentally used where an `EdgeKindId` is expected.
//! The value `0` is reserved as "none" for node ids, kind ids, edge kind ids
//! and string keys.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Stable node identifier. Dense, never reused within one graph generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identifier of a node kind declared in a [`Schema`](crate::schema::Schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKindId(pub u16);

/// Identifier of an edge kind declared in a [`Schema`](crate::schema::Schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKindId(pub u16);

/// Identifier of a facet (orthogonal node capability). At most 64 per schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FacetId(pub u8);

/// Key of an interned string in a [`StringTable`](crate::strtable::StringTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrKey(pub u32);

/// Identity of one graph instance. Used to reject edges between graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub u32);

impl NodeId {
    /// The reserved "no node" id.
    pub const NONE: NodeId = NodeId(0);

    /// Returns `true` for the reserved "no node" id.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Slot index of this id in the node arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl NodeKindId {
    pub const NONE: NodeKindId = NodeKindId(0);
}

impl EdgeKindId {
    pub const NONE: EdgeKindId = EdgeKindId(0);
}

impl StrKey {
    /// Key of the empty string. Never stored in the table.
    pub const EMPTY: StrKey = StrKey(0);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(1);

impl GraphId {
    /// Allocates a process-unique graph identity.
    pub fn fresh() -> Self {
        GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A node id tagged with the graph it belongs to.
///
/// Plain [`NodeId`]s are always interpreted relative to the graph they are
/// passed to. Handles carry their graph so that
/// [`Asg::link`](crate::graph::Asg::link) can reject cross-graph edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    pub graph: GraphId,
    pub id: NodeId,
}

// Display implementations -- just print the inner value.

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeKindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeKindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FacetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.graph)
    }
}
