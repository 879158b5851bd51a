//! Binary graph files.
//!
//! # Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! "ASGF"
//! header chain   {tag u16, len u32, payload}* then tag 0   (see header.rs)
//! "STRTBL"       count u32, {key u32, len u32, utf-8}*
//! "NODES"        slot_count u32, live bits[ceil(slot_count / 8)], count u32,
//!                per node, in id order:
//!                  id u32, kind u16, flags u8
//!                  bool fields packed 8 per byte, declaration order
//!                  other fields fixed-width, declaration order (strings as keys)
//!                  edge slots in declaration order:
//!                    single: target u32 (0 = none)
//!                    multi:  count u32, targets u32*
//! end mark       id 0 u32, kind 0 u16
//! ```
//!
//! The live bit of a slot is set when a node with that id follows. Every
//! slot costs the file a bit, so the arena a file can ask for is bounded by
//! its length.
//!
//! Loading checks the header before touching any node data, so a version
//! mismatch never yields a partial graph. Nodes are restored at their saved
//! ids, after which parents and the reverse index are rebuilt in one pass.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;

use asg_core::{
    Asg, Cardinality, CodecConfig, EdgeSlot, FieldType, Node, NodeId, NodeKindId, Origin, Schema,
    StrKey, StrType, StringSelection, Value,
};
use smallvec::SmallVec;

use crate::error::StorageError;
use crate::header::Header;
use crate::io::{pack_bits, unpack_bits, write_atomic, BinaryReader, BinaryWriter};

pub const MAGIC: &[u8] = b"ASGF";
const STRING_SECTION: &[u8] = b"STRTBL";
const NODE_SECTION: &[u8] = b"NODES";

const FLAG_SYNTHETIC: u8 = 0b01;
const FLAG_FILTERED: u8 = 0b10;

/// A graph together with the header it was loaded from.
#[derive(Debug)]
pub struct GraphFile {
    pub graph: Asg,
    pub header: Header,
}

// ---------------------------------------------------------------------------
// Saving
// ---------------------------------------------------------------------------

/// Saves `graph` with a fresh full-analysis header and default options.
pub fn save(graph: &Asg, path: impl AsRef<Path>) -> Result<(), StorageError> {
    let header = Header::for_schema(graph.schema(), true);
    save_with(graph, &header, &CodecConfig::default(), path)
}

/// Saves `graph` atomically. The identity properties of `header` are
/// replaced with those of the graph's schema; everything else is kept.
pub fn save_with(
    graph: &Asg,
    header: &Header,
    config: &CodecConfig,
    path: impl AsRef<Path>,
) -> Result<(), StorageError> {
    let path = path.as_ref();
    let bytes = encode(graph, header, config)?;
    write_atomic(path, &bytes)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved graph");
    Ok(())
}

pub fn encode(graph: &Asg, header: &Header, config: &CodecConfig) -> Result<Vec<u8>, StorageError> {
    let schema = graph.schema();
    let mut header = header.clone();
    header.stamp(schema);

    let mut w = BinaryWriter::new(Vec::new());
    w.raw(MAGIC)?;
    header.write(&mut w)?;

    let strings = selected_strings(graph, config.strings);
    w.raw(STRING_SECTION)?;
    w.u32(strings.len() as u32)?;
    for key in &strings {
        w.u32(key.0)?;
        w.str(graph.strings().get(*key))?;
    }

    w.raw(NODE_SECTION)?;
    w.u32(graph.slot_count())?;
    let mut live = vec![false; graph.slot_count() as usize];
    for id in graph.node_ids() {
        live[id.index()] = true;
    }
    w.raw(&pack_bits(&live))?;
    w.u32(graph.node_count() as u32)?;
    for (id, node) in graph.store().nodes() {
        write_node(&mut w, schema, id, node)?;
    }
    w.u32(0)?;
    w.u16(0)?;

    let bytes = w.into_inner();
    tracing::debug!(
        nodes = graph.node_count(),
        strings = strings.len(),
        bytes = bytes.len(),
        "encoded graph"
    );
    Ok(bytes)
}

/// Keys written to the string section. Strings referenced by a live node
/// are always included.
fn selected_strings(graph: &Asg, selection: StringSelection) -> BTreeSet<StrKey> {
    let mut keys: BTreeSet<StrKey> = graph
        .store()
        .nodes()
        .flat_map(|(_, node)| node.fields().iter())
        .filter_map(Value::as_str_key)
        .filter(|key| !key.is_empty())
        .collect();
    for (key, _, ty) in graph.strings().iter() {
        let keep = match selection {
            StringSelection::All => ty != StrType::Tmp,
            StringSelection::Referenced => ty == StrType::ToSave,
        };
        if keep {
            keys.insert(key);
        }
    }
    keys
}

fn write_node<W: Write>(
    w: &mut BinaryWriter<W>,
    schema: &Schema,
    id: NodeId,
    node: &Node,
) -> Result<(), StorageError> {
    schema.kind_checked(node.kind())?;
    w.u32(id.0)?;
    w.u16(node.kind().0)?;
    let mut flags = 0u8;
    if node.origin() == Origin::Synthetic {
        flags |= FLAG_SYNTHETIC;
    }
    if node.filter_flag() {
        flags |= FLAG_FILTERED;
    }
    w.u8(flags)?;

    let bools: Vec<bool> = node.fields().iter().filter_map(Value::as_bool).collect();
    w.raw(&pack_bits(&bools))?;
    for value in node.fields() {
        write_value(w, *value)?;
    }

    for slot in node.edge_slots() {
        match slot {
            EdgeSlot::Single(target) => w.u32(target.map_or(0, |t| t.0))?,
            EdgeSlot::Multi(targets) => {
                w.u32(targets.len() as u32)?;
                for target in targets {
                    w.u32(target.0)?;
                }
            }
        }
    }
    Ok(())
}

/// Bools are packed separately and write nothing here.
fn write_value<W: Write>(w: &mut BinaryWriter<W>, value: Value) -> std::io::Result<()> {
    match value {
        Value::Bool(_) => Ok(()),
        Value::U8(v) => w.u8(v),
        Value::U16(v) => w.u16(v),
        Value::U32(v) => w.u32(v),
        Value::U64(v) => w.u64(v),
        Value::I32(v) => w.i32(v),
        Value::I64(v) => w.i64(v),
        Value::F64(v) => w.f64(v),
        Value::Str(key) => w.u32(key.0),
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

pub fn load(path: impl AsRef<Path>, schema: Arc<Schema>) -> Result<GraphFile, StorageError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let file = decode(&bytes, schema)?;
    tracing::debug!(
        path = %path.display(),
        nodes = file.graph.node_count(),
        "loaded graph"
    );
    Ok(file)
}

/// Reads the magic and the header chain only.
pub fn load_header(path: impl AsRef<Path>) -> Result<Header, StorageError> {
    let file = File::open(path)?;
    let mut r = BinaryReader::new(BufReader::new(file));
    r.expect_magic(MAGIC)?;
    Header::read(&mut r)
}

pub fn decode(bytes: &[u8], schema: Arc<Schema>) -> Result<GraphFile, StorageError> {
    let mut r = BinaryReader::new(bytes);
    r.expect_magic(MAGIC)?;
    let header = Header::read(&mut r)?;
    header.check(&schema)?;

    let mut graph = Asg::new(Arc::clone(&schema));
    r.expect_magic(STRING_SECTION)?;
    let count = r.u32()?;
    for _ in 0..count {
        let key = StrKey(r.u32()?);
        let text = r.string()?;
        graph.strings_mut().insert_with_key(key, &text)?;
    }

    r.expect_magic(NODE_SECTION)?;
    let slot_count = r.u32()?;
    let live = r.raw((slot_count as usize).div_ceil(8))?;
    let live_count: u32 = live.iter().map(|b| b.count_ones()).sum();
    let count = r.u32()?;
    if count != live_count {
        return Err(StorageError::corrupt(format!(
            "{} nodes listed but {} slots marked live",
            count, live_count
        )));
    }
    let mut previous = NodeId::NONE;
    for _ in 0..count {
        previous = read_node(&mut r, &mut graph, &schema, slot_count, &live, previous)?;
    }
    let (end_id, end_kind) = (r.u32()?, r.u16()?);
    if end_id != 0 || end_kind != 0 {
        return Err(StorageError::corrupt(format!(
            "expected end mark after {} nodes",
            count
        )));
    }

    graph.finish_restore(slot_count)?;
    Ok(GraphFile { graph, header })
}

fn read_node<R: Read>(
    r: &mut BinaryReader<R>,
    graph: &mut Asg,
    schema: &Schema,
    slot_count: u32,
    live: &[u8],
    previous: NodeId,
) -> Result<NodeId, StorageError> {
    let id = NodeId(r.u32()?);
    if id.is_none() || id.0 >= slot_count {
        return Err(StorageError::corrupt(format!(
            "node id {} outside 1..{}",
            id, slot_count
        )));
    }
    if id.0 <= previous.0 || live[id.index() / 8] & (1 << (id.index() % 8)) == 0 {
        return Err(StorageError::corrupt(format!(
            "node {} is out of order or not marked live",
            id
        )));
    }
    let kind_id = NodeKindId(r.u16()?);
    let kind = schema.kind_checked(kind_id)?;
    let flags = r.u8()?;
    let origin = if flags & FLAG_SYNTHETIC != 0 {
        Origin::Synthetic
    } else {
        Origin::Analyzer
    };

    let bool_count = kind
        .fields
        .iter()
        .filter(|f| f.ty == FieldType::Bool)
        .count();
    let packed = r.raw(bool_count.div_ceil(8))?;
    let mut bools = unpack_bits(&packed, bool_count).into_iter();

    let mut fields: SmallVec<[Value; 4]> = SmallVec::with_capacity(kind.fields.len());
    for field in &kind.fields {
        let value = match field.ty {
            FieldType::Bool => Value::Bool(bools.next().unwrap_or(false)),
            ty => read_value(r, ty)?,
        };
        if let Value::Str(key) = value {
            if graph.strings().try_get(key).is_none() {
                return Err(StorageError::corrupt(format!(
                    "field '{}' of node {} refers to unknown string {}",
                    field.name, id, key
                )));
            }
        }
        fields.push(value);
    }

    let mut edges = Vec::with_capacity(kind.edges.len());
    for edge in &kind.edges {
        let decl = schema.edge_checked(*edge)?;
        let slot = match decl.cardinality {
            Cardinality::Single => {
                let target = NodeId(r.u32()?);
                EdgeSlot::Single((!target.is_none()).then_some(target))
            }
            Cardinality::Multi => {
                let n = r.u32()?;
                let mut targets = SmallVec::new();
                for _ in 0..n {
                    targets.push(NodeId(r.u32()?));
                }
                EdgeSlot::Multi(targets)
            }
        };
        edges.push(slot);
    }

    graph.restore_node(id, kind_id, origin, flags & FLAG_FILTERED != 0, fields, edges)?;
    Ok(id)
}

fn read_value<R: Read>(r: &mut BinaryReader<R>, ty: FieldType) -> Result<Value, StorageError> {
    Ok(match ty {
        FieldType::Bool => Value::Bool(r.u8()? != 0),
        FieldType::U8 => Value::U8(r.u8()?),
        FieldType::U16 => Value::U16(r.u16()?),
        FieldType::U32 => Value::U32(r.u32()?),
        FieldType::U64 => Value::U64(r.u64()?),
        FieldType::I32 => Value::I32(r.i32()?),
        FieldType::I64 => Value::I64(r.i64()?),
        FieldType::F64 => Value::F64(r.f64()?),
        FieldType::Str => Value::Str(StrKey(r.u32()?)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{assert_same_graph, java_lite, rich_graph};
    use crate::header::{KEY_BINARY_VERSION, KEY_FULL_ANALYSIS};
    use asg_core::{verify, CoreError};

    fn round_trip(graph: &Asg, config: &CodecConfig) -> GraphFile {
        let header = Header::for_schema(graph.schema(), true);
        let bytes = encode(graph, &header, config).unwrap();
        decode(&bytes, java_lite()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Round trips
    // -----------------------------------------------------------------------

    #[test]
    fn rich_graph_round_trips() {
        let rich = rich_graph();
        let loaded = round_trip(&rich.graph, &CodecConfig::default());
        assert_same_graph(&rich.graph, &loaded.graph);
        assert!(verify(&loaded.graph).is_ok());
        assert_eq!(
            loaded.graph.attribute(rich.literal, "raw").unwrap(),
            Value::U64(u64::MAX)
        );
        assert_eq!(
            loaded.graph.attribute(rich.literal, "ratio").unwrap(),
            Value::F64(0.25)
        );
        assert_eq!(
            loaded.graph.get(rich.int_type).unwrap().origin(),
            Origin::Synthetic
        );
        assert_eq!(
            loaded.graph.targets(rich.method, loaded.graph.schema().edge_id("Method_calls").unwrap())
                .unwrap(),
            &[rich.helper, rich.helper]
        );
    }

    #[test]
    fn destroyed_slots_stay_reserved() {
        let mut rich = rich_graph();
        let slots = rich.graph.slot_count();
        rich.graph.destroy_subtree(rich.helper).unwrap();
        let mut loaded = round_trip(&rich.graph, &CodecConfig::default()).graph;
        assert_eq!(loaded.slot_count(), slots);
        assert!(!loaded.exists(rich.helper));
        let fresh = loaded.create_named("Comment").unwrap();
        assert_eq!(fresh.0, slots);
    }

    #[test]
    fn loaded_predecessors_follow_source_id() {
        let mut graph = Asg::new(java_lite());
        let calls = graph.schema().edge_id("Method_calls").unwrap();
        let target = graph.create_named("Method").unwrap();
        let a = graph.create_named("Method").unwrap();
        let b = graph.create_named("Method").unwrap();
        graph.set_edge(b, calls, target).unwrap();
        graph.set_edge(a, calls, target).unwrap();
        assert_eq!(graph.predecessors(target, calls).collect::<Vec<_>>(), vec![b, a]);

        let loaded = round_trip(&graph, &CodecConfig::default()).graph;
        assert_eq!(loaded.predecessors(target, calls).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(loaded.targets(b, calls).unwrap(), &[target]);
    }

    #[test]
    fn empty_graph_round_trips() {
        let graph = Asg::new(java_lite());
        let loaded = round_trip(&graph, &CodecConfig::default());
        assert!(loaded.graph.is_empty());
        assert_eq!(loaded.header.full_analysis(), Some(true));
    }

    #[test]
    fn string_selection() {
        let rich = rich_graph();
        let all = round_trip(&rich.graph, &CodecConfig::default()).graph;
        assert!(all.strings().lookup("unused").is_some());
        assert!(all.strings().lookup("kept").is_some());
        assert!(all.strings().lookup("scratch").is_none());

        let referenced = round_trip(
            &rich.graph,
            &CodecConfig {
                strings: StringSelection::Referenced,
            },
        )
        .graph;
        assert!(referenced.strings().lookup("unused").is_none());
        assert!(referenced.strings().lookup("kept").is_some());
        assert!(referenced.strings().lookup("Impl").is_some());
        assert_same_graph(&rich.graph, &referenced);
    }

    #[test]
    fn caller_properties_are_kept_and_identity_is_stamped() {
        let rich = rich_graph();
        let mut header = Header::default();
        header.properties.set("Producer", "test");
        header.properties.set(KEY_FULL_ANALYSIS, "false");
        header.properties.set(KEY_BINARY_VERSION, "stale");
        let bytes = encode(&rich.graph, &header, &CodecConfig::default()).unwrap();
        let loaded = decode(&bytes, java_lite()).unwrap();
        assert_eq!(loaded.header.properties.get("Producer"), Some("test"));
        assert_eq!(loaded.header.full_analysis(), Some(false));
        assert_eq!(loaded.header.properties.get(KEY_BINARY_VERSION), Some("7"));
    }

    // -----------------------------------------------------------------------
    // Rejected input
    // -----------------------------------------------------------------------

    fn encoded() -> Vec<u8> {
        let rich = rich_graph();
        encode(
            &rich.graph,
            &Header::for_schema(rich.graph.schema(), true),
            &CodecConfig::default(),
        )
        .unwrap()
    }

    fn find(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap()
    }

    #[test]
    fn every_truncation_fails_cleanly() {
        let bytes = encoded();
        for len in (0..bytes.len()).step_by(7) {
            assert!(decode(&bytes[..len], java_lite()).is_err(), "len {}", len);
        }
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = encoded();
        bytes[0] = b'X';
        assert!(matches!(
            decode(&bytes, java_lite()),
            Err(StorageError::BadMagic { expected: "ASGF" })
        ));
    }

    #[test]
    fn missing_end_mark_is_corrupt() {
        let mut bytes = encoded();
        let len = bytes.len();
        bytes[len - 1] = 9;
        assert!(matches!(
            decode(&bytes, java_lite()),
            Err(StorageError::Corrupt { .. })
        ));
    }

    /// Offset of the first node record.
    fn first_node(bytes: &[u8]) -> usize {
        let nodes = find(bytes, NODE_SECTION) + NODE_SECTION.len();
        let slot_count = u32::from_le_bytes(bytes[nodes..nodes + 4].try_into().unwrap());
        nodes + 4 + (slot_count as usize).div_ceil(8) + 4
    }

    fn one_package() -> Vec<u8> {
        let mut graph = Asg::new(java_lite());
        let p = graph.create_named("Package").unwrap();
        graph.set_str(p, "name", "p").unwrap();
        encode(
            &graph,
            &Header::for_schema(graph.schema(), true),
            &CodecConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn node_id_outside_slot_range_is_corrupt() {
        let mut bytes = encoded();
        let nodes = find(&bytes, NODE_SECTION) + NODE_SECTION.len();
        let slot_count = bytes[nodes..nodes + 4].to_vec();
        let first = first_node(&bytes);
        bytes[first..first + 4].copy_from_slice(&slot_count);
        assert!(matches!(
            decode(&bytes, java_lite()),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn unknown_kind_is_a_core_error() {
        let mut bytes = encoded();
        let first = first_node(&bytes);
        bytes[first + 4..first + 6].copy_from_slice(&999u16.to_le_bytes());
        assert!(matches!(
            decode(&bytes, java_lite()),
            Err(StorageError::Core(CoreError::UnknownKind { .. }))
        ));
    }

    #[test]
    fn huge_slot_count_is_corrupt() {
        let mut bytes = encode(
            &Asg::new(java_lite()),
            &Header::for_schema(&java_lite(), true),
            &CodecConfig::default(),
        )
        .unwrap();
        let nodes = find(&bytes, NODE_SECTION) + NODE_SECTION.len();
        bytes[nodes..nodes + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode(&bytes, java_lite()),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn live_bits_must_match_node_count() {
        let mut bytes = one_package();
        let nodes = find(&bytes, NODE_SECTION) + NODE_SECTION.len();
        // Slot 1 holds the package; drop its live bit.
        bytes[nodes + 4] &= !0b10;
        assert!(matches!(
            decode(&bytes, java_lite()),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn huge_string_key_is_corrupt() {
        let mut bytes = one_package();
        // Section magic, then count, then the key of the only string.
        let key = find(&bytes, STRING_SECTION) + STRING_SECTION.len() + 4;
        assert_eq!(&bytes[key..key + 4], &1u32.to_le_bytes()[..]);
        bytes[key..key + 4].copy_from_slice(&(u32::MAX - 1).to_le_bytes());
        assert!(matches!(
            decode(&bytes, java_lite()),
            Err(StorageError::Corrupt { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    #[test]
    fn save_load_and_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.asg");
        let rich = rich_graph();
        save(&rich.graph, &path).unwrap();

        let header = load_header(&path).unwrap();
        assert_eq!(header.properties.get("Type"), Some("JavaLite"));
        assert_eq!(header.properties.get("Language"), Some("java"));

        let loaded = load(&path, java_lite()).unwrap();
        assert_same_graph(&rich.graph, &loaded.graph);
    }

    #[test]
    fn missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("nope.asg"), java_lite()).unwrap_err();
        assert!(err.is_io());
    }
}
