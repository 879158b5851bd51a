//! Merging one graph into another.
//!
//! Every live node of the source is recreated in the destination under a
//! fresh id. String fields are remapped through the destination's string
//! table, and edges are re-established through the edge model so the
//! reverse index and parent links are maintained as usual. The returned
//! [`OriginMap`] records `component + source id -> destination id` for the
//! destination's file header.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::Asg;
use crate::id::NodeId;
use crate::value::Value;

/// Old-to-new node id mapping produced by a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRemap {
    map: HashMap<NodeId, NodeId>,
}

impl NodeRemap {
    pub fn get(&self, old: NodeId) -> Option<NodeId> {
        self.map.get(&old).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// One cross-phase correspondence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginEntry {
    pub component: String,
    pub pre_id: NodeId,
    pub id: NodeId,
}

/// Correspondence between ids of earlier-phase graphs and this graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginMap {
    entries: Vec<OriginEntry>,
}

impl OriginMap {
    pub fn new() -> Self {
        OriginMap::default()
    }

    pub fn push(&mut self, component: &str, pre_id: NodeId, id: NodeId) {
        self.entries.push(OriginEntry {
            component: component.to_string(),
            pre_id,
            id,
        });
    }

    pub fn extend(&mut self, other: OriginMap) {
        self.entries.extend(other.entries);
    }

    /// Id in this graph of `pre_id` from `component`.
    pub fn lookup(&self, component: &str, pre_id: NodeId) -> Option<NodeId> {
        self.entries
            .iter()
            .find(|e| e.component == component && e.pre_id == pre_id)
            .map(|e| e.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OriginEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of [`merge_graph`].
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub nodes: NodeRemap,
    pub origins: OriginMap,
}

/// Copies every live node of `src` into `dst`.
///
/// Both graphs must use the same file format (schema name and binary
/// version); kinds and edge kinds are matched by name.
pub fn merge_graph(dst: &mut Asg, src: &Asg, component: &str) -> Result<MergeOutcome, CoreError> {
    if !dst.schema().is_compatible(src.schema()) {
        return Err(CoreError::SchemaMismatch {
            expected: format!("{} {}", dst.schema().name(), dst.schema().binary_version()),
            found: format!("{} {}", src.schema().name(), src.schema().binary_version()),
        });
    }
    let dst_schema = dst.schema_arc();
    let src_schema = src.schema();
    let keys = dst.strings_mut().merge_from(src.strings());

    let mut outcome = MergeOutcome::default();
    for (old, node) in src.store().nodes() {
        let kind_name = src_schema.kind_name(node.kind());
        let kind = dst_schema.kind_id(kind_name)?;
        let new = dst.create_with_origin(kind, node.origin())?;
        for (index, value) in node.fields().iter().enumerate() {
            let value = match value {
                Value::Str(key) => Value::Str(keys.get(*key)),
                other => *other,
            };
            dst.set_attribute_at(new, index, value)?;
        }
        if node.filter_flag() {
            dst.set_filtered(new)?;
        }
        outcome.nodes.map.insert(old, new);
        outcome.origins.push(component, old, new);
    }

    for (old, node) in src.store().nodes() {
        let Some(new_src) = outcome.nodes.get(old) else {
            continue;
        };
        let kind = src_schema.kind_checked(node.kind())?;
        for (slot, edge) in node.edge_slots().iter().zip(kind.edges.iter()) {
            let edge = dst_schema.edge_id(src_schema.edge_name(*edge))?;
            for target in slot.targets() {
                let new_dst = outcome.nodes.get(*target).ok_or(CoreError::UnknownEdgeEnd {
                    edge: dst_schema.edge_name(edge).to_string(),
                    src: old,
                    dst: *target,
                })?;
                dst.set_edge(new_src, edge, new_dst)?;
            }
        }
    }

    tracing::debug!(
        component,
        nodes = outcome.nodes.len(),
        "merged graph"
    );
    Ok(outcome)
}
