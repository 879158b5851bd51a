//! Deterministic content fingerprints using blake3.
//!
//! Unlike the in-graph CRC-32 structural hash, fingerprints are stable
//! across processes and string-table layouts: strings contribute their
//! text, never their keys, and node ids never enter the digest.
//!
//! # Levels
//!
//! - **Level 1**: node content (qualified kind name + field values)
//! - **Level 2**: subtree digest (content + owned child digests + kind names
//!   of reference targets, in edge declaration order)
//! - **Level 3**: per-component digests keyed by a name field
//!
//! Fingerprints are derived state and are never written to graph files.

use std::collections::{BTreeMap, HashMap, HashSet};

use asg_core::{Asg, CoreError, EdgeRole, NodeId, Value};

/// Stands in for a child that is also an ancestor in a corrupt graph.
const CYCLE_MARK: [u8; 32] = [0; 32];

/// Digest of a node's own content.
pub fn hash_node_content(graph: &Asg, id: NodeId) -> Result<blake3::Hash, CoreError> {
    let node = graph.get(id)?;
    let kind = graph.node_kind(id)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.qualified_name.as_bytes());
    hasher.update(&[0]);
    for value in node.fields() {
        match value {
            Value::Str(key) => {
                let text = graph.strings().get(*key);
                hasher.update(&(text.len() as u32).to_le_bytes());
                hasher.update(text.as_bytes());
            }
            other => {
                hasher.update(&other.le_bytes());
            }
        }
    }
    Ok(hasher.finalize())
}

/// Merkle digest of the subtree owned by `root`.
///
/// Children are digested before their owners from an explicit postorder, so
/// deep trees do not recurse.
pub fn fingerprint_root(graph: &Asg, root: NodeId) -> Result<blake3::Hash, CoreError> {
    graph.get(root)?;
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        order.push(id);
        stack.extend(graph.children(id)?);
    }

    let mut digests: HashMap<NodeId, blake3::Hash> = HashMap::with_capacity(order.len());
    for &id in order.iter().rev() {
        let digest = hash_with_children(graph, id, &digests)?;
        digests.insert(id, digest);
    }
    digests
        .get(&root)
        .copied()
        .ok_or(CoreError::NotFound { id: root })
}

fn hash_with_children(
    graph: &Asg,
    id: NodeId,
    digests: &HashMap<NodeId, blake3::Hash>,
) -> Result<blake3::Hash, CoreError> {
    let schema = graph.schema();
    let mut hasher = blake3::Hasher::new();
    hasher.update(hash_node_content(graph, id)?.as_bytes());

    for (edge, targets) in graph.edges_of(id)? {
        if targets.is_empty() {
            continue;
        }
        let decl = schema.edge_checked(edge)?;
        hasher.update(decl.name.as_bytes());
        hasher.update(&(targets.len() as u32).to_le_bytes());
        for target in targets {
            match decl.role {
                EdgeRole::Ownership => {
                    let digest = digests.get(target).map(|d| *d.as_bytes()).unwrap_or(CYCLE_MARK);
                    hasher.update(&digest);
                }
                EdgeRole::Reference => {
                    hasher.update(graph.node_kind(*target)?.qualified_name.as_bytes());
                    hasher.update(&[0]);
                }
            }
        }
    }
    Ok(hasher.finalize())
}

/// Fingerprints of every root-level component, keyed by the text of its
/// `name_field`.
///
/// Synthetic roots and roots whose kind lacks the field are not components.
/// Of two components sharing a name, the first in id order is kept.
pub fn fingerprint_components(
    graph: &Asg,
    name_field: &str,
) -> Result<BTreeMap<String, blake3::Hash>, CoreError> {
    let mut out = BTreeMap::new();
    for root in graph.roots() {
        if graph.get(root)?.is_special() {
            continue;
        }
        if graph.node_kind(root)?.field_index(name_field).is_none() {
            continue;
        }
        let name = graph.str_attribute(root, name_field)?.to_string();
        if out.contains_key(&name) {
            tracing::warn!(%root, name = %name, "duplicate component name, keeping the first");
            continue;
        }
        out.insert(name, fingerprint_root(graph, root)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{java_lite, rich_graph};

    #[test]
    fn content_hash_is_deterministic_and_field_sensitive() {
        let rich = rich_graph();
        let g = &rich.graph;
        assert_eq!(
            hash_node_content(g, rich.method).unwrap(),
            hash_node_content(g, rich.method).unwrap()
        );
        assert_ne!(
            hash_node_content(g, rich.method).unwrap(),
            hash_node_content(g, rich.helper).unwrap()
        );
    }

    #[test]
    fn fingerprint_ignores_string_key_layout() {
        let rich = rich_graph();
        // Same package, strings interned in a different order.
        let mut g = Asg::new(java_lite());
        g.intern("zzz");
        g.intern("Impl");
        let members = g.schema().edge_id("Package_members").unwrap();
        let p = g.create_named("Package").unwrap();
        g.set_str(p, "name", "p").unwrap();
        let c = g.create_named("Class").unwrap();
        g.set_str(c, "name", "Impl").unwrap();
        g.set_edge(p, members, c).unwrap();

        let mut h = Asg::new(java_lite());
        let p2 = h.create_named("Package").unwrap();
        let c2 = h.create_named("Class").unwrap();
        h.set_str(c2, "name", "Impl").unwrap();
        h.set_str(p2, "name", "p").unwrap();
        h.set_edge(p2, members, c2).unwrap();

        assert_eq!(fingerprint_root(&g, p).unwrap(), fingerprint_root(&h, p2).unwrap());
        assert_ne!(
            fingerprint_root(&g, p).unwrap(),
            fingerprint_root(&rich.graph, rich.package).unwrap()
        );
    }

    #[test]
    fn deep_change_reaches_the_root() {
        let mut rich = rich_graph();
        let before = fingerprint_root(&rich.graph, rich.package).unwrap();
        let class_before = fingerprint_root(&rich.graph, rich.base).unwrap();
        rich.graph.set_attribute(rich.literal, "value", 1i64).unwrap();
        assert_ne!(fingerprint_root(&rich.graph, rich.package).unwrap(), before);
        assert_eq!(fingerprint_root(&rich.graph, rich.base).unwrap(), class_before);
    }

    #[test]
    fn reference_targets_contribute_kind_only() {
        let mut rich = rich_graph();
        let before = fingerprint_root(&rich.graph, rich.method).unwrap();
        rich.graph.set_str(rich.int_type, "type_name", "long").unwrap();
        assert_eq!(fingerprint_root(&rich.graph, rich.method).unwrap(), before);

        let calls = rich.graph.schema().edge_id("Method_calls").unwrap();
        rich.graph.remove_edge(rich.method, calls, rich.helper).unwrap();
        assert_ne!(fingerprint_root(&rich.graph, rich.method).unwrap(), before);
    }

    #[test]
    fn components_skip_synthetic_roots() {
        let rich = rich_graph();
        let components = fingerprint_components(&rich.graph, "name").unwrap();
        assert_eq!(components.keys().collect::<Vec<_>>(), vec!["p"]);
    }

    #[test]
    fn missing_root_is_not_found() {
        let rich = rich_graph();
        assert!(matches!(
            fingerprint_root(&rich.graph, NodeId(999)),
            Err(CoreError::NotFound { .. })
        ));
    }
}
