//! Structural verification.
//!
//! [`verify`] checks the invariants that the edge model maintains
//! incrementally, which a restored or hand-edited graph may still violate:
//! ownership forms a forest, parent links agree with ownership edges, the
//! reverse index matches a fresh rebuild, every edge target exists and
//! mandatory edges are set.

use std::collections::HashMap;

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::edge::EdgeRole;
use crate::graph::Asg;
use crate::id::{EdgeKindId, NodeId};
use crate::node::EdgeSlot;
use crate::reverse::ReverseEdgeIndex;

/// One integrity violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum Issue {
    /// These nodes own each other in a cycle.
    OwnershipCycle { nodes: Vec<NodeId> },
    /// More than one ownership edge points at the node.
    MultipleOwners { node: NodeId, owners: Vec<NodeId> },
    /// The recorded parent differs from the owning edge.
    ParentMismatch {
        node: NodeId,
        recorded: Option<NodeId>,
        actual: Option<NodeId>,
    },
    /// Reverse entries of this target differ from a rebuild.
    ReverseIndexMismatch { target: NodeId },
    DanglingEdge { src: NodeId, edge: String, dst: NodeId },
    MissingMandatoryEdge { node: NodeId, edge: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub nodes_checked: usize,
    pub issues: Vec<Issue>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn verify(graph: &Asg) -> VerifyReport {
    let schema = graph.schema();
    let mut report = VerifyReport {
        nodes_checked: graph.node_count(),
        issues: Vec::new(),
    };

    let mut ownership: DiGraph<NodeId, EdgeKindId> = DiGraph::new();
    let mut index: HashMap<NodeId, NodeIndex> = HashMap::new();
    for id in graph.node_ids() {
        index.insert(id, ownership.add_node(id));
    }

    let mut owners: HashMap<NodeId, Vec<(NodeId, EdgeKindId)>> = HashMap::new();
    for (src, node) in graph.store().nodes() {
        let Some(kind) = schema.kind(node.kind()) else {
            continue;
        };
        for (slot, edge) in node.edge_slots().iter().zip(kind.edges.iter()) {
            let Some(decl) = schema.edge(*edge) else {
                continue;
            };
            if decl.mandatory && matches!(slot, EdgeSlot::Single(None)) {
                report.issues.push(Issue::MissingMandatoryEdge {
                    node: src,
                    edge: decl.name.clone(),
                });
            }
            for target in slot.targets() {
                let Some(&dst_idx) = index.get(target) else {
                    report.issues.push(Issue::DanglingEdge {
                        src,
                        edge: decl.name.clone(),
                        dst: *target,
                    });
                    continue;
                };
                if decl.role == EdgeRole::Ownership {
                    ownership.add_edge(index[&src], dst_idx, *edge);
                    owners.entry(*target).or_default().push((src, *edge));
                }
            }
        }
    }

    if is_cyclic_directed(&ownership) {
        for scc in tarjan_scc(&ownership) {
            let self_loop = scc.len() == 1 && ownership.contains_edge(scc[0], scc[0]);
            if scc.len() > 1 || self_loop {
                let mut nodes: Vec<NodeId> = scc.iter().map(|i| ownership[*i]).collect();
                nodes.sort();
                report.issues.push(Issue::OwnershipCycle { nodes });
            }
        }
    }

    for (id, node) in graph.store().nodes() {
        let incoming = owners.get(&id).map(|v| v.as_slice()).unwrap_or(&[]);
        if incoming.len() > 1 {
            report.issues.push(Issue::MultipleOwners {
                node: id,
                owners: incoming.iter().map(|(o, _)| *o).collect(),
            });
        }
        let actual = incoming.first().copied();
        if node.parent() != actual {
            report.issues.push(Issue::ParentMismatch {
                node: id,
                recorded: node.parent().map(|(p, _)| p),
                actual: actual.map(|(p, _)| p),
            });
        }
    }

    let rebuilt = ReverseEdgeIndex::rebuild(graph.store(), |node| {
        schema
            .kind(node.kind())
            .map(|k| k.edges.as_slice())
            .unwrap_or(&[])
    });
    for target in graph.reverse_index().differing_targets(&rebuilt) {
        report.issues.push(Issue::ReverseIndexMismatch { target });
    }

    if !report.is_ok() {
        tracing::warn!(issues = report.issues.len(), "graph verification failed");
    }
    report
}
