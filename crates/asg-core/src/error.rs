//! Core error types for asg-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the node store, the edge model and schema resolution.

use thiserror::Error;

use crate::id::{GraphId, NodeId, StrKey};
use crate::schema::SchemaError;
use crate::value::FieldType;

/// Core errors produced by the asg-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node id was never allocated, or its node has been destroyed.
    #[error("node not found: NodeId({id})", id = id.0)]
    NotFound { id: NodeId },

    /// The target of an edge does not exist.
    #[error("edge '{edge}' of NodeId({src}) points to a missing node: NodeId({dst})", src = src.0, dst = dst.0)]
    UnknownEdgeEnd { edge: String, src: NodeId, dst: NodeId },

    /// A node has the wrong runtime kind for an edge or attribute.
    #[error("kind mismatch on '{context}': expected {expected}, found {found}")]
    KindMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// The two ends of an edge belong to different graphs.
    #[error("edge ends belong to different graphs: {src_graph} and {dst_graph}")]
    CrossGraph { src_graph: GraphId, dst_graph: GraphId },

    /// A mandatory ownership edge was cleared.
    #[error("mandatory ownership edge '{edge}' of NodeId({src}) cannot be cleared", src = src.0)]
    NullOwnershipEdge { edge: String, src: NodeId },

    /// A node that already has an owner was attached to another owner.
    /// Recorded as an integrity warning; the new edge wins.
    #[error("NodeId({child}) is already owned by NodeId({owner}); re-parented to NodeId({new_owner})", child = child.0, owner = owner.0, new_owner = new_owner.0)]
    AlreadyOwned {
        child: NodeId,
        owner: NodeId,
        new_owner: NodeId,
    },

    /// An ownership edge would make a node its own ancestor.
    #[error("ownership edge '{edge}' from NodeId({src}) to NodeId({dst}) would form a cycle", src = src.0, dst = dst.0)]
    OwnershipCycle { edge: String, src: NodeId, dst: NodeId },

    /// The edge to remove is not present.
    #[error("edge '{edge}' from NodeId({src}) to NodeId({dst}) does not exist", src = src.0, dst = dst.0)]
    EdgeNotPresent { edge: String, src: NodeId, dst: NodeId },

    /// No node kind with this name or id exists in the schema.
    #[error("unknown node kind: {name}")]
    UnknownKind { name: String },

    /// Abstract kinds only exist to be inherited from.
    #[error("abstract node kind cannot be instantiated: {name}")]
    AbstractKind { name: String },

    /// No edge kind with this name or id exists in the schema.
    #[error("unknown edge kind: {name}")]
    UnknownEdgeKind { name: String },

    /// The node kind does not declare this field.
    #[error("unknown field '{field}' on kind {kind}")]
    UnknownField { kind: String, field: String },

    /// A value of the wrong type was assigned to a field.
    #[error("field '{field}' expects {expected}, got {found}")]
    FieldTypeMismatch {
        field: String,
        expected: FieldType,
        found: FieldType,
    },

    /// A node slot was restored twice or outside the allocated range.
    #[error("node slot already occupied: NodeId({id})", id = id.0)]
    SlotOccupied { id: NodeId },

    /// A string key was restored with a text that is already interned under
    /// another key, or the key itself is already taken.
    #[error("string key conflict: key {key}")]
    StringKeyConflict { key: StrKey },

    /// Two graphs were combined that do not share a schema.
    #[error("schema mismatch: expected '{expected}', found '{found}'")]
    SchemaMismatch { expected: String, found: String },

    /// The schema description itself is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
