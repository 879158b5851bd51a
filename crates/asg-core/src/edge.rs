//! Edge model.
//!
//! Edges are typed by an [`EdgeDecl`] of the schema. *Ownership* edges form
//! the containment tree: every owned node records its owner in `parent`.
//! *Reference* edges form a general graph over the same nodes. Every forward
//! mutation updates the reverse index and the parent link in the same call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::Asg;
use crate::id::{EdgeKindId, NodeHandle, NodeId, NodeKindId};
use crate::node::EdgeSlot;
use crate::reverse::Predecessors;

/// How many targets an edge kind holds per source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// Zero or one target.
    Single,
    /// An ordered list of targets.
    Multi,
}

/// Whether an edge kind builds the containment tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeRole {
    Ownership,
    Reference,
}

/// A resolved edge kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDecl {
    pub id: EdgeKindId,
    pub name: String,
    pub source: NodeKindId,
    /// Runtime targets must be this kind or inherit from it.
    pub target: NodeKindId,
    pub cardinality: Cardinality,
    pub role: EdgeRole,
    /// A single ownership edge that may not be cleared.
    pub mandatory: bool,
}

impl EdgeDecl {
    pub fn is_ownership(&self) -> bool {
        self.role == EdgeRole::Ownership
    }
}

impl Asg {
    /// Slot index of `kind` on `src`, plus the edge declaration.
    fn edge_slot_of(&self, src: NodeId, kind: EdgeKindId) -> Result<(usize, EdgeDecl), CoreError> {
        let decl = self.schema.edge_checked(kind)?;
        let node = self.store.get(src)?;
        let slot = self
            .schema
            .edge_slot(node.kind, kind)
            .ok_or_else(|| CoreError::KindMismatch {
                context: decl.name.clone(),
                expected: self.schema.kind_name(decl.source).to_string(),
                found: self.schema.kind_name(node.kind).to_string(),
            })?;
        Ok((slot, decl.clone()))
    }

    /// `true` if `candidate` is `node` or one of its owners.
    fn is_self_or_ancestor(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.store.get(id).ok().and_then(|n| n.parent.map(|(p, _)| p));
        }
        false
    }

    /// Removes one occurrence of `dst` from `src`'s slot together with its
    /// reverse entry and, for ownership, the parent link.
    fn detach_raw(&mut self, src: NodeId, slot: usize, kind: EdgeKindId, dst: NodeId) -> bool {
        let removed = match self.store.get_mut(src) {
            Ok(node) => {
                let removed = node.edges[slot].remove(dst);
                if removed {
                    node.hash.invalidate();
                }
                removed
            }
            Err(_) => false,
        };
        if removed {
            self.reverse.remove(dst, kind, src);
            if let Ok(target) = self.store.get_mut(dst) {
                if target.parent == Some((src, kind)) {
                    target.parent = None;
                }
            }
        }
        removed
    }

    /// Sets an edge. Single kinds replace the previous target; multi kinds
    /// append.
    ///
    /// For ownership kinds, a target owned elsewhere is detached from its
    /// previous owner and an [`CoreError::AlreadyOwned`] integrity warning is
    /// recorded. Setting an ownership edge that already holds `dst` moves it
    /// to the end of the list.
    pub fn set_edge(&mut self, src: NodeId, kind: EdgeKindId, dst: NodeId) -> Result<(), CoreError> {
        let (slot, decl) = self.edge_slot_of(src, kind)?;
        let dst_kind = self
            .store
            .get(dst)
            .map_err(|_| CoreError::UnknownEdgeEnd {
                edge: decl.name.clone(),
                src,
                dst,
            })?
            .kind;
        if !self.schema.is_a(dst_kind, decl.target) {
            return Err(CoreError::KindMismatch {
                context: decl.name.clone(),
                expected: self.schema.kind_name(decl.target).to_string(),
                found: self.schema.kind_name(dst_kind).to_string(),
            });
        }

        if decl.is_ownership() {
            if self.is_self_or_ancestor(dst, src) {
                return Err(CoreError::OwnershipCycle {
                    edge: decl.name.clone(),
                    src,
                    dst,
                });
            }
            let current_owner = self.store.get(dst)?.parent;
            if let Some((owner, owner_edge)) = current_owner {
                if owner != src || owner_edge != kind {
                    tracing::warn!(
                        child = %dst,
                        %owner,
                        new_owner = %src,
                        edge = %decl.name,
                        "re-parenting owned node"
                    );
                    self.warnings.push(CoreError::AlreadyOwned {
                        child: dst,
                        owner,
                        new_owner: src,
                    });
                    let emptied = self
                        .schema
                        .edge(owner_edge)
                        .filter(|d| d.mandatory && d.cardinality == Cardinality::Single);
                    if let Some(owner_decl) = emptied {
                        tracing::warn!(
                            %owner,
                            edge = %owner_decl.name,
                            "re-parenting leaves a mandatory edge empty"
                        );
                        self.warnings.push(CoreError::NullOwnershipEdge {
                            edge: owner_decl.name.clone(),
                            src: owner,
                        });
                    }
                }
                let owner_slot = self
                    .store
                    .get(owner)
                    .ok()
                    .and_then(|n| self.schema.edge_slot(n.kind, owner_edge));
                if let Some(owner_slot) = owner_slot {
                    self.detach_raw(owner, owner_slot, owner_edge, dst);
                }
            }
        }

        let previous = match &self.store.get(src)?.edges[slot] {
            EdgeSlot::Single(Some(prev)) => Some(*prev),
            _ => None,
        };
        if let Some(prev) = previous {
            self.detach_raw(src, slot, kind, prev);
        }

        let node = self.store.get_mut(src)?;
        match &mut node.edges[slot] {
            EdgeSlot::Single(target) => *target = Some(dst),
            EdgeSlot::Multi(targets) => targets.push(dst),
        }
        node.hash.invalidate();
        self.reverse.insert(dst, kind, src);
        if decl.is_ownership() {
            self.store.get_mut(dst)?.parent = Some((src, kind));
        }
        Ok(())
    }

    /// Appends to a multi edge. On a single kind this replaces, like
    /// [`Asg::set_edge`].
    pub fn add_edge(&mut self, src: NodeId, kind: EdgeKindId, dst: NodeId) -> Result<(), CoreError> {
        self.set_edge(src, kind, dst)
    }

    /// Removes the first occurrence of `src --kind--> dst`.
    pub fn remove_edge(&mut self, src: NodeId, kind: EdgeKindId, dst: NodeId) -> Result<(), CoreError> {
        let (slot, decl) = self.edge_slot_of(src, kind)?;
        if decl.mandatory {
            return Err(CoreError::NullOwnershipEdge {
                edge: decl.name,
                src,
            });
        }
        if !self.detach_raw(src, slot, kind, dst) {
            return Err(CoreError::EdgeNotPresent {
                edge: decl.name,
                src,
                dst,
            });
        }
        Ok(())
    }

    /// Clears a single edge or empties a multi edge.
    pub fn clear_edge(&mut self, src: NodeId, kind: EdgeKindId) -> Result<(), CoreError> {
        let (slot, decl) = self.edge_slot_of(src, kind)?;
        if decl.mandatory {
            return Err(CoreError::NullOwnershipEdge {
                edge: decl.name,
                src,
            });
        }
        let targets: Vec<NodeId> = self.store.get(src)?.edges[slot].targets().to_vec();
        for dst in targets {
            self.detach_raw(src, slot, kind, dst);
        }
        Ok(())
    }

    /// Targets of `kind` on `src`, in order.
    pub fn targets(&self, src: NodeId, kind: EdgeKindId) -> Result<&[NodeId], CoreError> {
        let (slot, _) = self.edge_slot_of(src, kind)?;
        Ok(self.store.get(src)?.edges[slot].targets())
    }

    /// Target of a single edge.
    pub fn target(&self, src: NodeId, kind: EdgeKindId) -> Result<Option<NodeId>, CoreError> {
        Ok(self.targets(src, kind)?.first().copied())
    }

    /// [`Asg::set_edge`] for graph-tagged handles; rejects ends from another
    /// graph.
    pub fn link(&mut self, src: NodeHandle, kind: EdgeKindId, dst: NodeHandle) -> Result<(), CoreError> {
        if src.graph != dst.graph {
            return Err(CoreError::CrossGraph {
                src_graph: src.graph,
                dst_graph: dst.graph,
            });
        }
        if src.graph != self.id {
            return Err(CoreError::CrossGraph {
                src_graph: self.id,
                dst_graph: src.graph,
            });
        }
        self.set_edge(src.id, kind, dst.id)
    }

    /// Sources pointing at `target` through `kind`, in insertion order. In a
    /// freshly loaded graph the order is by source id instead.
    pub fn predecessors(&self, target: NodeId, kind: EdgeKindId) -> Predecessors<'_> {
        self.reverse.predecessors(target, kind)
    }

    /// Every `(kind, source)` pair pointing at `target`.
    pub fn all_predecessors(&self, target: NodeId) -> &[(EdgeKindId, NodeId)] {
        self.reverse.all(target)
    }

    /// The edge kind ids that make up `id`'s slots, paired with the slots.
    pub fn edges_of(&self, id: NodeId) -> Result<Vec<(EdgeKindId, &[NodeId])>, CoreError> {
        let node = self.store.get(id)?;
        let kind = self.schema.kind_checked(node.kind)?;
        Ok(kind
            .edges
            .iter()
            .copied()
            .zip(node.edges.iter().map(|s| s.targets()))
            .collect())
    }

    /// Shares the schema handle; used by callers that mutate while reading
    /// declarations.
    pub fn schema_arc(&self) -> Arc<crate::schema::Schema> {
        Arc::clone(&self.schema)
    }
}
