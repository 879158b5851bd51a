//! Data-driven schema: facets, node kinds, fields and edge kinds.
//!
//! A [`Schema`] is resolved once from a serializable [`SchemaDef`] (built in
//! code with [`SchemaBuilder`] or read from JSON) and then shared by every
//! graph of that language through an `Arc`. Resolution assigns dense ids,
//! flattens inheritance (facets, fields and edges of base kinds are copied
//! into sub-kinds, inherited first) and validates names.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::edge::{Cardinality, EdgeDecl, EdgeRole};
use crate::error::CoreError;
use crate::facet::{FacetSet, MAX_FACETS};
use crate::id::{EdgeKindId, FacetId, NodeKindId};
use crate::value::FieldType;

/// Errors raised while resolving a schema description.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("duplicate {what} name: {name}")]
    DuplicateName { what: &'static str, name: String },

    #[error("kind '{kind}' extends '{base}', which is not declared before it")]
    UnknownBase { kind: String, base: String },

    #[error("edge '{edge}' refers to unknown kind '{kind}'")]
    UnknownKind { edge: String, kind: String },

    #[error("kind '{kind}' uses undeclared facet '{facet}'")]
    UnknownFacet { kind: String, facet: String },

    #[error("schema declares {count} facets, at most 64 are supported")]
    TooManyFacets { count: usize },

    #[error("schema declares {count} {what}, the id space is exhausted")]
    TooMany { what: &'static str, count: usize },

    #[error("concrete kind '{kind}' has no facets")]
    NoFacets { kind: String },

    #[error("invalid edge '{edge}': {reason}")]
    InvalidEdge { edge: String, reason: String },

    #[error("I/O error reading schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed schema JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Serializable description
// ---------------------------------------------------------------------------

/// Serializable schema description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDef {
    /// File `Type` tag written to and checked against graph headers.
    pub name: String,
    pub language: String,
    #[serde(default = "default_version")]
    pub api_version: String,
    #[serde(default = "default_version")]
    pub binary_version: String,
    pub facets: Vec<String>,
    pub kinds: Vec<KindDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// One node kind. Base kinds must be declared before their sub-kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub facets: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl KindDef {
    pub fn new(name: &str) -> Self {
        KindDef {
            name: name.to_string(),
            qualified_name: None,
            base: None,
            is_abstract: false,
            facets: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn base(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }

    pub fn qualified(mut self, qualified_name: &str) -> Self {
        self.qualified_name = Some(qualified_name.to_string());
        self
    }

    pub fn abstract_kind(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn facet(mut self, facet: &str) -> Self {
        self.facets.push(facet.to_string());
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }
}

/// A typed attribute field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    /// Participates in similarity scoring.
    #[serde(default)]
    pub compare: bool,
    /// Holds a source file path.
    #[serde(default)]
    pub path: bool,
}

impl FieldDecl {
    pub fn new(name: &str, ty: FieldType) -> Self {
        FieldDecl {
            name: name.to_string(),
            ty,
            compare: false,
            path: false,
        }
    }

    pub fn compared(mut self) -> Self {
        self.compare = true;
        self
    }

    pub fn path(mut self) -> Self {
        self.path = true;
        self
    }
}

/// Serializable edge kind description; endpoints are kind names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeDef {
    pub name: String,
    pub source: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub role: EdgeRole,
    #[serde(default)]
    pub mandatory: bool,
}

impl EdgeDef {
    pub fn ownership(name: &str, source: &str, target: &str, cardinality: Cardinality) -> Self {
        EdgeDef {
            name: name.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            cardinality,
            role: EdgeRole::Ownership,
            mandatory: false,
        }
    }

    pub fn reference(name: &str, source: &str, target: &str, cardinality: Cardinality) -> Self {
        EdgeDef {
            role: EdgeRole::Reference,
            ..EdgeDef::ownership(name, source, target, cardinality)
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}

/// Fluent construction of a [`SchemaDef`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    def: SchemaDef,
}

impl SchemaBuilder {
    pub fn new(name: &str, language: &str) -> Self {
        SchemaBuilder {
            def: SchemaDef {
                name: name.to_string(),
                language: language.to_string(),
                api_version: default_version(),
                binary_version: default_version(),
                facets: Vec::new(),
                kinds: Vec::new(),
                edges: Vec::new(),
            },
        }
    }

    pub fn api_version(mut self, version: &str) -> Self {
        self.def.api_version = version.to_string();
        self
    }

    pub fn binary_version(mut self, version: &str) -> Self {
        self.def.binary_version = version.to_string();
        self
    }

    pub fn facet(mut self, name: &str) -> Self {
        self.def.facets.push(name.to_string());
        self
    }

    pub fn kind(mut self, kind: KindDef) -> Self {
        self.def.kinds.push(kind);
        self
    }

    pub fn edge(mut self, edge: EdgeDef) -> Self {
        self.def.edges.push(edge);
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        Schema::resolve(self.def)
    }
}

// ---------------------------------------------------------------------------
// Resolved schema
// ---------------------------------------------------------------------------

/// A resolved node kind.
#[derive(Debug, Clone)]
pub struct NodeKind {
    pub id: NodeKindId,
    pub name: String,
    /// Seed of the structural hash.
    pub qualified_name: String,
    pub base: Option<NodeKindId>,
    pub is_abstract: bool,
    pub facets: FacetSet,
    /// Own and inherited fields, inherited first.
    pub fields: Vec<FieldDecl>,
    /// Own and inherited edge kinds, inherited first. A node's edge slots
    /// follow this order.
    pub edges: Vec<EdgeKindId>,
    /// Base chain from the direct base up to the root.
    pub ancestors: Vec<NodeKindId>,
}

impl NodeKind {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn edge_slot(&self, edge: EdgeKindId) -> Option<usize> {
        self.edges.iter().position(|e| *e == edge)
    }
}

/// A resolved, validated schema shared by all graphs of one language.
#[derive(Debug, Clone)]
pub struct Schema {
    def: SchemaDef,
    facets: IndexMap<String, FacetId>,
    kinds: Vec<NodeKind>,
    edges: Vec<EdgeDecl>,
    kind_index: IndexMap<String, NodeKindId>,
    edge_index: IndexMap<String, EdgeKindId>,
}

impl Schema {
    /// Validates `def` and assigns ids: kinds and edges are numbered from 1 in
    /// declaration order, facets from 0.
    pub fn resolve(def: SchemaDef) -> Result<Schema, SchemaError> {
        if def.facets.len() > MAX_FACETS {
            return Err(SchemaError::TooManyFacets {
                count: def.facets.len(),
            });
        }
        if def.kinds.len() >= u16::MAX as usize {
            return Err(SchemaError::TooMany {
                what: "kinds",
                count: def.kinds.len(),
            });
        }
        if def.edges.len() >= u16::MAX as usize {
            return Err(SchemaError::TooMany {
                what: "edges",
                count: def.edges.len(),
            });
        }

        let mut facets = IndexMap::new();
        for (i, name) in def.facets.iter().enumerate() {
            if facets.insert(name.clone(), FacetId(i as u8)).is_some() {
                return Err(SchemaError::DuplicateName {
                    what: "facet",
                    name: name.clone(),
                });
            }
        }

        let mut kinds: Vec<NodeKind> = Vec::with_capacity(def.kinds.len());
        let mut kind_index: IndexMap<String, NodeKindId> = IndexMap::new();
        for (i, kd) in def.kinds.iter().enumerate() {
            let id = NodeKindId(i as u16 + 1);
            if kind_index.contains_key(&kd.name) {
                return Err(SchemaError::DuplicateName {
                    what: "kind",
                    name: kd.name.clone(),
                });
            }

            let (base, mut facet_set, mut fields, ancestors) = match &kd.base {
                Some(base_name) => {
                    let base_id = *kind_index.get(base_name).ok_or_else(|| SchemaError::UnknownBase {
                        kind: kd.name.clone(),
                        base: base_name.clone(),
                    })?;
                    let base_kind: &NodeKind = &kinds[base_id.0 as usize - 1];
                    let mut ancestors = vec![base_id];
                    ancestors.extend(base_kind.ancestors.iter().copied());
                    (
                        Some(base_id),
                        base_kind.facets,
                        base_kind.fields.clone(),
                        ancestors,
                    )
                }
                None => (None, FacetSet::EMPTY, Vec::new(), Vec::new()),
            };

            for facet in &kd.facets {
                let fid = facets.get(facet).ok_or_else(|| SchemaError::UnknownFacet {
                    kind: kd.name.clone(),
                    facet: facet.clone(),
                })?;
                facet_set.insert(*fid);
            }
            if !kd.is_abstract && facet_set.is_empty() {
                return Err(SchemaError::NoFacets {
                    kind: kd.name.clone(),
                });
            }

            for field in &kd.fields {
                if fields.iter().any(|f| f.name == field.name) {
                    return Err(SchemaError::DuplicateName {
                        what: "field",
                        name: format!("{}.{}", kd.name, field.name),
                    });
                }
                fields.push(field.clone());
            }

            let qualified_name = kd
                .qualified_name
                .clone()
                .unwrap_or_else(|| format!("{}::{}", def.language, kd.name));

            kind_index.insert(kd.name.clone(), id);
            kinds.push(NodeKind {
                id,
                name: kd.name.clone(),
                qualified_name,
                base,
                is_abstract: kd.is_abstract,
                facets: facet_set,
                fields,
                edges: Vec::new(),
                ancestors,
            });
        }

        let mut edges = Vec::with_capacity(def.edges.len());
        let mut edge_index = IndexMap::new();
        for (i, ed) in def.edges.iter().enumerate() {
            let id = EdgeKindId(i as u16 + 1);
            if edge_index.contains_key(&ed.name) {
                return Err(SchemaError::DuplicateName {
                    what: "edge",
                    name: ed.name.clone(),
                });
            }
            let lookup = |kind: &str| {
                kind_index.get(kind).copied().ok_or_else(|| SchemaError::UnknownKind {
                    edge: ed.name.clone(),
                    kind: kind.to_string(),
                })
            };
            let source = lookup(&ed.source)?;
            let target = lookup(&ed.target)?;
            if ed.mandatory
                && (ed.cardinality != Cardinality::Single || ed.role != EdgeRole::Ownership)
            {
                return Err(SchemaError::InvalidEdge {
                    edge: ed.name.clone(),
                    reason: "only single ownership edges can be mandatory".to_string(),
                });
            }
            edge_index.insert(ed.name.clone(), id);
            edges.push(EdgeDecl {
                id,
                name: ed.name.clone(),
                source,
                target,
                cardinality: ed.cardinality,
                role: ed.role,
                mandatory: ed.mandatory,
            });
        }

        // Flatten edges: walk each kind's chain from the root down.
        for idx in 0..kinds.len() {
            let mut chain: Vec<NodeKindId> = kinds[idx].ancestors.iter().rev().copied().collect();
            chain.push(kinds[idx].id);
            let slots: Vec<EdgeKindId> = chain
                .iter()
                .flat_map(|k| edges.iter().filter(move |e: &&EdgeDecl| e.source == *k).map(|e| e.id))
                .collect();
            kinds[idx].edges = slots;
        }

        Ok(Schema {
            def,
            facets,
            kinds,
            edges,
            kind_index,
            edge_index,
        })
    }

    pub fn from_json(json: &str) -> Result<Schema, SchemaError> {
        let def: SchemaDef = serde_json::from_str(json)?;
        Schema::resolve(def)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Schema, SchemaError> {
        let text = fs::read_to_string(path)?;
        Schema::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(&self.def)?)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn def(&self) -> &SchemaDef {
        &self.def
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn language(&self) -> &str {
        &self.def.language
    }

    pub fn api_version(&self) -> &str {
        &self.def.api_version
    }

    pub fn binary_version(&self) -> &str {
        &self.def.binary_version
    }

    pub fn kinds(&self) -> &[NodeKind] {
        &self.kinds
    }

    pub fn edges(&self) -> &[EdgeDecl] {
        &self.edges
    }

    pub fn kind(&self, id: NodeKindId) -> Option<&NodeKind> {
        (id.0 as usize).checked_sub(1).and_then(|i| self.kinds.get(i))
    }

    /// Like [`Schema::kind`], failing with [`CoreError::UnknownKind`].
    pub fn kind_checked(&self, id: NodeKindId) -> Result<&NodeKind, CoreError> {
        self.kind(id).ok_or_else(|| CoreError::UnknownKind {
            name: format!("#{}", id),
        })
    }

    pub fn kind_by_name(&self, name: &str) -> Option<&NodeKind> {
        self.kind_index.get(name).and_then(|id| self.kind(*id))
    }

    pub fn kind_id(&self, name: &str) -> Result<NodeKindId, CoreError> {
        self.kind_index
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::UnknownKind {
                name: name.to_string(),
            })
    }

    pub fn kind_name(&self, id: NodeKindId) -> &str {
        self.kind(id).map(|k| k.name.as_str()).unwrap_or("<unknown>")
    }

    pub fn edge(&self, id: EdgeKindId) -> Option<&EdgeDecl> {
        (id.0 as usize).checked_sub(1).and_then(|i| self.edges.get(i))
    }

    pub fn edge_checked(&self, id: EdgeKindId) -> Result<&EdgeDecl, CoreError> {
        self.edge(id).ok_or_else(|| CoreError::UnknownEdgeKind {
            name: format!("#{}", id),
        })
    }

    pub fn edge_id(&self, name: &str) -> Result<EdgeKindId, CoreError> {
        self.edge_index
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::UnknownEdgeKind {
                name: name.to_string(),
            })
    }

    pub fn edge_name(&self, id: EdgeKindId) -> &str {
        self.edge(id).map(|e| e.name.as_str()).unwrap_or("<unknown>")
    }

    pub fn facet_id(&self, name: &str) -> Option<FacetId> {
        self.facets.get(name).copied()
    }

    pub fn facet_name(&self, id: FacetId) -> &str {
        self.facets
            .get_index(id.0 as usize)
            .map(|(name, _)| name.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    /// `true` if `kind` is `ancestor` or inherits from it.
    pub fn is_a(&self, kind: NodeKindId, ancestor: NodeKindId) -> bool {
        if kind == ancestor {
            return true;
        }
        self.kind(kind)
            .map(|k| k.ancestors.contains(&ancestor))
            .unwrap_or(false)
    }

    pub fn field_index(&self, kind: NodeKindId, field: &str) -> Option<usize> {
        self.kind(kind).and_then(|k| k.field_index(field))
    }

    pub fn edge_slot(&self, kind: NodeKindId, edge: EdgeKindId) -> Option<usize> {
        self.kind(kind).and_then(|k| k.edge_slot(edge))
    }

    /// `true` if both schemas describe the same file format.
    pub fn is_compatible(&self, other: &Schema) -> bool {
        self.def.name == other.def.name && self.def.binary_version == other.def.binary_version
    }
}
