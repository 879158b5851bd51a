//! Asg: the graph container tying together schema, node arena, string table
//! and reverse edge index.
//!
//! [`Asg`] is the single entry point for building and querying a graph. Node
//! creation and attribute access live here; edge mutation is in
//! [`edge`](crate::edge), filtering in [`filter`](crate::filter), hashing in
//! [`hash`](crate::hash). All forward edge changes go through `Asg` so the
//! reverse index and parent links never drift from the forward edges.

use std::collections::HashSet;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::CoreError;
use crate::id::{GraphId, NodeHandle, NodeId, NodeKindId, StrKey};
use crate::node::{EdgeSlot, Node, Origin};
use crate::edge::{Cardinality, EdgeRole};
use crate::reverse::ReverseEdgeIndex;
use crate::schema::{NodeKind, Schema};
use crate::store::{NodeIds, NodeStore};
use crate::strtable::StringTable;
use crate::value::Value;

/// An abstract semantic graph.
#[derive(Debug)]
pub struct Asg {
    pub(crate) id: GraphId,
    pub(crate) schema: Arc<Schema>,
    pub(crate) store: NodeStore,
    pub(crate) reverse: ReverseEdgeIndex,
    pub(crate) strings: StringTable,
    pub(crate) warnings: Vec<CoreError>,
}

impl Asg {
    /// Creates an empty graph over `schema`.
    pub fn new(schema: Arc<Schema>) -> Self {
        Asg {
            id: GraphId::fresh(),
            schema,
            store: NodeStore::new(),
            reverse: ReverseEdgeIndex::new(),
            strings: StringTable::new(),
            warnings: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn strings_mut(&mut self) -> &mut StringTable {
        &mut self.strings
    }

    pub fn reverse_index(&self) -> &ReverseEdgeIndex {
        &self.reverse
    }

    pub fn intern(&mut self, text: &str) -> StrKey {
        self.strings.intern(text)
    }

    pub fn get(&self, id: NodeId) -> Result<&Node, CoreError> {
        self.store.get(id)
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.store.exists(id)
    }

    pub fn kind_of(&self, id: NodeId) -> Result<NodeKindId, CoreError> {
        Ok(self.store.get(id)?.kind)
    }

    /// Resolved kind of a live node.
    pub fn node_kind(&self, id: NodeId) -> Result<&NodeKind, CoreError> {
        let kind = self.kind_of(id)?;
        self.schema.kind_checked(kind)
    }

    /// Live node ids in creation order. Lazy and restartable via `clone`.
    pub fn node_ids(&self) -> NodeIds<'_> {
        self.store.iter()
    }

    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    /// Number of ids ever allocated, including destroyed ones.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn slot_count(&self) -> u32 {
        self.store.slot_count()
    }

    /// Live nodes without an owner, in id order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.store
            .nodes()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, CoreError> {
        Ok(self.store.get(id)?.parent.map(|(p, _)| p))
    }

    /// Owned children in edge-declaration order, then list order.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        let node = self.store.get(id)?;
        let kind = self.schema.kind_checked(node.kind)?;
        let mut out = Vec::new();
        for (slot, edge) in node.edges.iter().zip(kind.edges.iter()) {
            let is_owner = self
                .schema
                .edge(*edge)
                .map(|e| e.role == EdgeRole::Ownership)
                .unwrap_or(false);
            if is_owner {
                out.extend_from_slice(slot.targets());
            }
        }
        Ok(out)
    }

    /// A graph-tagged handle for use with [`Asg::link`].
    pub fn handle(&self, id: NodeId) -> Result<NodeHandle, CoreError> {
        self.store.get(id)?;
        Ok(NodeHandle { graph: self.id, id })
    }

    /// Structural-integrity warnings recorded since the last call to
    /// [`Asg::take_integrity_warnings`].
    pub fn integrity_warnings(&self) -> &[CoreError] {
        &self.warnings
    }

    pub fn take_integrity_warnings(&mut self) -> Vec<CoreError> {
        std::mem::take(&mut self.warnings)
    }

    // -----------------------------------------------------------------------
    // Node creation
    // -----------------------------------------------------------------------

    /// Allocates a node of `kind` with default field values and empty edges.
    pub fn create(&mut self, kind: NodeKindId) -> Result<NodeId, CoreError> {
        self.create_with_origin(kind, Origin::Analyzer)
    }

    pub fn create_named(&mut self, kind: &str) -> Result<NodeId, CoreError> {
        let kind = self.schema.kind_id(kind)?;
        self.create(kind)
    }

    pub fn create_with_origin(
        &mut self,
        kind: NodeKindId,
        origin: Origin,
    ) -> Result<NodeId, CoreError> {
        let node = self.blank_node(kind, origin)?;
        Ok(self.store.alloc(node))
    }

    fn blank_node(&self, kind: NodeKindId, origin: Origin) -> Result<Node, CoreError> {
        let decl = self.schema.kind_checked(kind)?;
        if decl.is_abstract {
            return Err(CoreError::AbstractKind {
                name: decl.name.clone(),
            });
        }
        let fields: SmallVec<[Value; 4]> =
            decl.fields.iter().map(|f| f.ty.default_value()).collect();
        let edges = decl
            .edges
            .iter()
            .map(|e| match self.schema.edge(*e).map(|d| d.cardinality) {
                Some(Cardinality::Single) => EdgeSlot::Single(None),
                _ => EdgeSlot::Multi(SmallVec::new()),
            })
            .collect();
        Ok(Node::new(kind, origin, fields, edges))
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    fn field_slot(&self, id: NodeId, field: &str) -> Result<usize, CoreError> {
        let kind = self.node_kind(id)?;
        kind.field_index(field).ok_or_else(|| CoreError::UnknownField {
            kind: kind.name.clone(),
            field: field.to_string(),
        })
    }

    /// Sets a field. The value type must match the declared type exactly.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<(), CoreError> {
        let index = self.field_slot(id, field)?;
        self.set_attribute_at(id, index, value.into())
    }

    /// Sets the `index`-th field of a node.
    pub fn set_attribute_at(
        &mut self,
        id: NodeId,
        index: usize,
        value: Value,
    ) -> Result<(), CoreError> {
        let kind = self.node_kind(id)?;
        let decl = kind.fields.get(index).ok_or_else(|| CoreError::UnknownField {
            kind: kind.name.clone(),
            field: format!("#{}", index),
        })?;
        if decl.ty != value.field_type() {
            return Err(CoreError::FieldTypeMismatch {
                field: decl.name.clone(),
                expected: decl.ty,
                found: value.field_type(),
            });
        }
        let node = self.store.get_mut(id)?;
        node.fields[index] = value;
        node.hash.invalidate();
        Ok(())
    }

    pub fn attribute(&self, id: NodeId, field: &str) -> Result<Value, CoreError> {
        let index = self.field_slot(id, field)?;
        Ok(self.store.get(id)?.fields[index])
    }

    /// Interns `text` and stores its key in a string field.
    pub fn set_str(&mut self, id: NodeId, field: &str, text: &str) -> Result<(), CoreError> {
        let index = self.field_slot(id, field)?;
        let key = self.strings.intern(text);
        self.set_attribute_at(id, index, Value::Str(key))
    }

    /// Text of a string field.
    pub fn str_attribute(&self, id: NodeId, field: &str) -> Result<&str, CoreError> {
        match self.attribute(id, field)? {
            Value::Str(key) => Ok(self.strings.get(key)),
            other => Err(CoreError::FieldTypeMismatch {
                field: field.to_string(),
                expected: crate::value::FieldType::Str,
                found: other.field_type(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Destruction
    // -----------------------------------------------------------------------

    /// Hard-deletes `id` and its ownership descendants.
    ///
    /// Incident edges in both directions are removed first, so no surviving
    /// node keeps a forward edge or a reverse entry naming a destroyed id.
    /// Returns the number of destroyed nodes.
    pub fn destroy_subtree(&mut self, id: NodeId) -> Result<usize, CoreError> {
        self.store.get(id)?;
        let mut doomed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            doomed.push(next);
            stack.extend(self.children(next)?);
        }
        let doomed_set: HashSet<NodeId> = doomed.iter().copied().collect();

        for &node_id in &doomed {
            // Outgoing edges.
            let kind = self.node_kind(node_id)?.clone();
            let slots = self.store.get(node_id)?.edges.clone();
            for (slot, edge) in slots.iter().zip(kind.edges.iter()) {
                for target in slot.targets() {
                    self.reverse.remove(*target, *edge, node_id);
                    if !doomed_set.contains(target) {
                        if let Ok(t) = self.store.get_mut(*target) {
                            if t.parent == Some((node_id, *edge)) {
                                t.parent = None;
                            }
                        }
                    }
                }
            }

            // Incoming edges from survivors.
            let incoming: Vec<_> = self.reverse.all(node_id).to_vec();
            for (edge, src) in incoming {
                if doomed_set.contains(&src) {
                    continue;
                }
                let slot = self
                    .store
                    .get(src)
                    .ok()
                    .and_then(|n| self.schema.edge_slot(n.kind, edge));
                if let (Some(slot), Ok(src_node)) = (slot, self.store.get_mut(src)) {
                    src_node.edges[slot].remove(node_id);
                    src_node.hash.invalidate();
                }
            }
            self.reverse.remove_node(node_id);
        }

        for &node_id in &doomed {
            self.store.remove(node_id);
        }
        tracing::debug!(root = %id, count = doomed.len(), "destroyed subtree");
        Ok(doomed.len())
    }

    // -----------------------------------------------------------------------
    // Bulk restore
    // -----------------------------------------------------------------------

    /// Places a node at a fixed id without touching parents or the reverse
    /// index. Call [`Asg::finish_restore`] once every node is in place.
    pub fn restore_node(
        &mut self,
        id: NodeId,
        kind: NodeKindId,
        origin: Origin,
        filtered: bool,
        fields: SmallVec<[Value; 4]>,
        edges: Vec<EdgeSlot>,
    ) -> Result<(), CoreError> {
        let decl = self.schema.kind_checked(kind)?;
        if decl.is_abstract {
            return Err(CoreError::AbstractKind {
                name: decl.name.clone(),
            });
        }
        if fields.len() != decl.fields.len() || edges.len() != decl.edges.len() {
            return Err(CoreError::KindMismatch {
                context: format!("restore NodeId({})", id.0),
                expected: decl.name.clone(),
                found: format!("{} fields, {} edges", fields.len(), edges.len()),
            });
        }
        for (value, field) in fields.iter().zip(decl.fields.iter()) {
            if value.field_type() != field.ty {
                return Err(CoreError::FieldTypeMismatch {
                    field: field.name.clone(),
                    expected: field.ty,
                    found: value.field_type(),
                });
            }
        }
        let mut node = Node::new(kind, origin, fields, edges);
        node.filtered = filtered;
        self.store.restore_at(id, node)
    }

    /// Completes a bulk restore: checks every edge target, derives parent
    /// links from ownership edges and rebuilds the reverse index in one pass.
    pub fn finish_restore(&mut self, slot_count: u32) -> Result<(), CoreError> {
        self.store.reserve_slots(slot_count);
        let schema = Arc::clone(&self.schema);

        let mut parents: Vec<(NodeId, NodeId, crate::id::EdgeKindId)> = Vec::new();
        for (src, node) in self.store.nodes() {
            let kind = schema.kind_checked(node.kind)?;
            for (slot, edge) in node.edges.iter().zip(kind.edges.iter()) {
                let decl = schema.edge_checked(*edge)?;
                for target in slot.targets() {
                    let target_node =
                        self.store
                            .get(*target)
                            .map_err(|_| CoreError::UnknownEdgeEnd {
                                edge: decl.name.clone(),
                                src,
                                dst: *target,
                            })?;
                    if !schema.is_a(target_node.kind, decl.target) {
                        return Err(CoreError::KindMismatch {
                            context: decl.name.clone(),
                            expected: schema.kind_name(decl.target).to_string(),
                            found: schema.kind_name(target_node.kind).to_string(),
                        });
                    }
                    if decl.role == EdgeRole::Ownership {
                        parents.push((*target, src, *edge));
                    }
                }
            }
        }

        for (child, owner, edge) in parents {
            let node = self.store.get_mut(child)?;
            if let Some((previous, _)) = node.parent {
                let warning = CoreError::AlreadyOwned {
                    child,
                    owner: previous,
                    new_owner: owner,
                };
                tracing::warn!(%child, %previous, %owner, "node owned twice in restored graph");
                self.warnings.push(warning);
            }
            node.parent = Some((owner, edge));
        }

        self.reverse = ReverseEdgeIndex::rebuild(&self.store, |node| {
            schema
                .kind(node.kind)
                .map(|k| k.edges.as_slice())
                .unwrap_or(&[])
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{demo_graph, sample_graph};

    #[test]
    fn create_returns_requested_kind() {
        let mut graph = demo_graph();
        let class = graph.schema().kind_id("Class").unwrap();
        let id = graph.create(class).unwrap();
        assert_eq!(graph.get(id).unwrap().kind(), class);
        assert_eq!(graph.kind_of(id).unwrap(), class);
        assert!(graph.exists(id));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn create_rejects_abstract_and_unknown_kinds() {
        let mut graph = demo_graph();
        let named = graph.schema().kind_id("Named").unwrap();
        assert!(matches!(graph.create(named), Err(CoreError::AbstractKind { .. })));
        assert!(matches!(
            graph.create(NodeKindId(999)),
            Err(CoreError::UnknownKind { .. })
        ));
        assert!(matches!(
            graph.create_named("Interface"),
            Err(CoreError::UnknownKind { .. })
        ));
    }

    #[test]
    fn new_nodes_have_default_fields() {
        let mut graph = demo_graph();
        let m = graph.create_named("Method").unwrap();
        assert_eq!(graph.attribute(m, "branches").unwrap(), Value::U32(0));
        assert_eq!(graph.str_attribute(m, "name").unwrap(), "");
        assert_eq!(graph.get(m).unwrap().origin(), Origin::Analyzer);
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let graph = demo_graph();
        assert!(matches!(graph.get(NodeId(1)), Err(CoreError::NotFound { .. })));
        assert!(matches!(graph.get(NodeId::NONE), Err(CoreError::NotFound { .. })));
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    #[test]
    fn attribute_type_is_checked() {
        let mut graph = demo_graph();
        let m = graph.create_named("Method").unwrap();
        graph.set_attribute(m, "branches", 3u32).unwrap();
        assert_eq!(graph.attribute(m, "branches").unwrap(), Value::U32(3));
        assert!(matches!(
            graph.set_attribute(m, "branches", true),
            Err(CoreError::FieldTypeMismatch { .. })
        ));
        assert!(matches!(
            graph.set_attribute(m, "lloc", 1u32),
            Err(CoreError::UnknownField { .. })
        ));
    }

    #[test]
    fn string_attributes_are_interned() {
        let mut graph = demo_graph();
        let a = graph.create_named("Class").unwrap();
        let b = graph.create_named("Class").unwrap();
        graph.set_str(a, "name", "Shared").unwrap();
        graph.set_str(b, "name", "Shared").unwrap();
        assert_eq!(graph.attribute(a, "name").unwrap(), graph.attribute(b, "name").unwrap());
        assert_eq!(graph.str_attribute(b, "name").unwrap(), "Shared");
        assert!(matches!(
            graph.str_attribute(a, "lloc"),
            Err(CoreError::FieldTypeMismatch { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Structure queries
    // -----------------------------------------------------------------------

    #[test]
    fn roots_and_children() {
        let s = sample_graph();
        assert_eq!(s.graph.roots(), vec![s.package]);
        assert_eq!(s.graph.children(s.package).unwrap(), vec![s.class]);
        // Named_comments is declared before Class_methods.
        assert_eq!(s.graph.children(s.class).unwrap(), vec![s.comment, s.method]);
        assert_eq!(s.graph.parent(s.body).unwrap(), Some(s.method));
    }

    #[test]
    fn handle_is_tagged_with_graph() {
        let s = sample_graph();
        let handle = s.graph.handle(s.class).unwrap();
        assert_eq!(handle.graph, s.graph.id());
        assert_eq!(handle.id, s.class);
    }

    // -----------------------------------------------------------------------
    // Destruction
    // -----------------------------------------------------------------------

    #[test]
    fn destroy_subtree_detaches_everything() {
        let mut s = sample_graph();
        let calls = s.graph.schema().edge_id("Method_calls").unwrap();
        let other = s.graph.create_named("Method").unwrap();
        s.graph.set_edge(other, calls, s.method).unwrap();

        let removed = s.graph.destroy_subtree(s.class).unwrap();
        assert_eq!(removed, 4); // class, comment, method, body
        assert!(!s.graph.exists(s.method));
        assert!(s.graph.children(s.package).unwrap().is_empty());
        assert!(s.graph.targets(other, calls).unwrap().is_empty());
        assert_eq!(s.graph.reverse_index().entry_count(), 0);
        assert_eq!(s.graph.node_count(), 2);

        // Ids are tombstoned, never reused.
        let fresh = s.graph.create_named("Class").unwrap();
        assert!(fresh.0 > other.0);
    }

    // -----------------------------------------------------------------------
    // Bulk restore
    // -----------------------------------------------------------------------

    #[test]
    fn restore_derives_parents_and_reverse_index() {
        let s = sample_graph();
        let mut copy = Asg::new(Arc::clone(s.graph.schema()));
        for (id, node) in s.graph.store().nodes() {
            copy.restore_node(
                id,
                node.kind(),
                node.origin(),
                node.filter_flag(),
                node.fields().iter().copied().collect(),
                node.edge_slots().to_vec(),
            )
            .unwrap();
        }
        copy.finish_restore(s.graph.slot_count()).unwrap();
        assert_eq!(copy.parent(s.method).unwrap(), Some(s.class));
        assert_eq!(
            copy.reverse_index().entry_count(),
            s.graph.reverse_index().entry_count()
        );
        assert_eq!(copy.slot_count(), s.graph.slot_count());
    }

    #[test]
    fn restore_rejects_dangling_target() {
        let s = sample_graph();
        let mut copy = Asg::new(Arc::clone(s.graph.schema()));
        let node = s.graph.get(s.package).unwrap();
        copy.restore_node(
            s.package,
            node.kind(),
            node.origin(),
            false,
            node.fields().iter().copied().collect(),
            node.edge_slots().to_vec(),
        )
        .unwrap();
        assert!(matches!(
            copy.finish_restore(10),
            Err(CoreError::UnknownEdgeEnd { .. })
        ));
    }
}
