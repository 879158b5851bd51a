//! Structural hashing.
//!
//! A node's hash is a CRC-32 seeded with its kind's qualified name, then fed
//! with each field (string fields contribute their text, not their key) and
//! with the hashes of every edge target in slot and list order. Reference
//! edges may close cycles: re-entering a node that is still in progress
//! contributes [`CYCLE_SENTINEL`].
//!
//! Results are cached per node. A mutation invalidates only the mutated
//! node's cache; ancestors keep their stale value until
//! [`Asg::invalidate_hash`] or [`Asg::invalidate_ancestor_hashes`] is called.

use std::collections::HashSet;

use crate::graph::Asg;
use crate::id::NodeId;
use crate::value::Value;

/// Hash contributed by a node that is already being hashed.
pub const CYCLE_SENTINEL: u32 = 0;

impl Asg {
    /// Structural hash of `id`. Unknown ids hash to [`CYCLE_SENTINEL`].
    pub fn structural_hash(&self, id: NodeId) -> u32 {
        let mut in_progress = HashSet::new();
        self.structural_hash_with(id, &mut in_progress)
    }

    /// Structural hash of `id` using a caller-supplied in-progress set.
    /// Returns [`CYCLE_SENTINEL`] if `id` is already in the set.
    pub fn structural_hash_with(&self, id: NodeId, in_progress: &mut HashSet<NodeId>) -> u32 {
        let mut hit_cycle = false;
        self.hash_node(id, in_progress, &mut hit_cycle)
    }

    fn hash_node(&self, id: NodeId, in_progress: &mut HashSet<NodeId>, hit_cycle: &mut bool) -> u32 {
        let Ok(node) = self.store.get(id) else {
            return CYCLE_SENTINEL;
        };
        if in_progress.contains(&id) {
            *hit_cycle = true;
            return CYCLE_SENTINEL;
        }
        if let Some(cached) = node.hash.get() {
            return cached;
        }
        in_progress.insert(id);
        let Some(kind) = self.schema.kind(node.kind) else {
            in_progress.remove(&id);
            return CYCLE_SENTINEL;
        };

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(kind.qualified_name.as_bytes());
        for value in node.fields() {
            match value {
                Value::Str(key) => {
                    let text = self.strings.get(*key);
                    hasher.update(&(text.len() as u32).to_le_bytes());
                    hasher.update(text.as_bytes());
                }
                other => hasher.update(&other.le_bytes()),
            }
        }

        // Only subtrees free of cycle cuts are cached: a value computed while
        // an ancestor was in progress depends on the entry point.
        let mut local_cycle = false;
        for slot in node.edge_slots() {
            hasher.update(&(slot.targets().len() as u32).to_le_bytes());
            for target in slot.targets() {
                let h = self.hash_node(*target, in_progress, &mut local_cycle);
                hasher.update(&h.to_le_bytes());
            }
        }
        in_progress.remove(&id);

        let hash = hasher.finalize();
        if local_cycle {
            *hit_cycle = true;
        } else {
            node.hash.set(hash);
        }
        hash
    }

    /// Drops the cached hash of `id`.
    pub fn invalidate_hash(&self, id: NodeId) {
        if let Ok(node) = self.store.get(id) {
            node.hash.invalidate();
        }
    }

    /// Drops the cached hashes of `id` and its whole owner chain.
    pub fn invalidate_ancestor_hashes(&self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            self.invalidate_hash(node_id);
            current = self.parent(node_id).ok().flatten();
        }
    }

    /// Drops every cached hash.
    pub fn invalidate_all_hashes(&self) {
        for (_, node) in self.store.nodes() {
            node.hash.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{demo_graph, sample_graph};

    #[test]
    fn hash_is_deterministic() {
        let a = sample_graph();
        let b = sample_graph();
        assert_eq!(a.graph.structural_hash(a.package), b.graph.structural_hash(b.package));
        assert_ne!(a.graph.structural_hash(a.package), CYCLE_SENTINEL);
    }

    #[test]
    fn hash_depends_on_text_not_key() {
        let mut a = demo_graph();
        a.intern("padding");
        let ca = a.create_named("Class").unwrap();
        a.set_str(ca, "name", "X").unwrap();

        let mut b = demo_graph();
        let cb = b.create_named("Class").unwrap();
        b.set_str(cb, "name", "X").unwrap();

        assert_eq!(a.structural_hash(ca), b.structural_hash(cb));
    }

    #[test]
    fn hash_reflects_fields_and_children() {
        let mut s = sample_graph();
        let before = s.graph.structural_hash(s.method);
        s.graph.set_attribute(s.method, "branches", 9u32).unwrap();
        assert_ne!(s.graph.structural_hash(s.method), before);
    }

    #[test]
    fn cycles_terminate() {
        let mut graph = demo_graph();
        let calls = graph.schema().edge_id("Method_calls").unwrap();
        let a = graph.create_named("Method").unwrap();
        let b = graph.create_named("Method").unwrap();
        graph.set_edge(a, calls, b).unwrap();
        graph.set_edge(b, calls, a).unwrap();
        graph.set_edge(a, calls, a).unwrap();

        let h1 = graph.structural_hash(a);
        let h2 = graph.structural_hash(a);
        assert_eq!(h1, h2);
        // Nodes on a cycle are never cached.
        assert_eq!(graph.get(a).unwrap().cached_hash(), None);
    }

    #[test]
    fn caller_supplied_set_returns_sentinel_on_reentry() {
        let s = sample_graph();
        let mut in_progress = HashSet::new();
        in_progress.insert(s.class);
        assert_eq!(s.graph.structural_hash_with(s.class, &mut in_progress), CYCLE_SENTINEL);
    }

    #[test]
    fn ancestor_hash_goes_stale_until_invalidated() {
        let mut s = sample_graph();
        let class_before = s.graph.structural_hash(s.class);

        s.graph.set_attribute(s.method, "branches", 7u32).unwrap();
        // Only the method's own cache was dropped.
        assert_eq!(s.graph.structural_hash(s.class), class_before);

        s.graph.invalidate_ancestor_hashes(s.method);
        assert_ne!(s.graph.structural_hash(s.class), class_before);
    }
}
