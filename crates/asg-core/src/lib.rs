pub mod config;
pub mod edge;
pub mod error;
pub mod facet;
pub mod filter;
pub mod graph;
pub mod hash;
pub mod id;
pub mod merge;
pub mod node;
pub mod reverse;
pub mod schema;
pub mod similarity;
pub mod store;
pub mod strtable;
pub mod traversal;
pub mod value;
pub mod verify;

#[cfg(test)]
mod fixtures;

// Re-export commonly used types
pub use config::{CodecConfig, EngineConfig, SimilarityConfig, StringSelection, TraversalConfig};
pub use edge::{Cardinality, EdgeDecl, EdgeRole};
pub use error::CoreError;
pub use facet::FacetSet;
pub use graph::Asg;
pub use id::{EdgeKindId, FacetId, GraphId, NodeHandle, NodeId, NodeKindId, StrKey};
pub use merge::{merge_graph, MergeOutcome, NodeRemap, OriginEntry, OriginMap};
pub use node::{EdgeSlot, Node, Origin};
pub use schema::{EdgeDef, FieldDecl, KindDef, NodeKind, Schema, SchemaBuilder, SchemaDef, SchemaError};
pub use strtable::{KeyRemap, StrType, StringTable};
pub use traversal::{preorder_ids, render_tree, run_preorder, Cursor, EdgeCtx, Preorder, TraversalStats, VisitCtx, Visitor};
pub use value::{FieldType, Value};
pub use verify::{verify, Issue, VerifyReport};
