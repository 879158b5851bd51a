//! Graph files on disk through the public API.

use std::sync::Arc;

use asg_core::{render_tree, Asg, CodecConfig, NodeId, Schema};
use asg_storage::header::{UnknownBlock, KEY_BINARY_VERSION};
use asg_storage::{load, load_header, save, save_with, Header, StorageError};

const JAVA_LITE: &str = include_str!("../../../schemas/java-lite.json");

fn schema() -> Arc<Schema> {
    Arc::new(Schema::from_json(JAVA_LITE).unwrap())
}

/// Package -> Class -> Method (3 nodes, 2 ownership edges).
fn three_nodes() -> Asg {
    let mut g = Asg::new(schema());
    let members = g.schema().edge_id("Package_members").unwrap();
    let methods = g.schema().edge_id("Class_methods").unwrap();
    let p = g.create_named("Package").unwrap();
    g.set_str(p, "name", "app").unwrap();
    let c = g.create_named("Class").unwrap();
    g.set_str(c, "name", "Main").unwrap();
    let m = g.create_named("Method").unwrap();
    g.set_str(m, "name", "main").unwrap();
    g.set_edge(p, members, c).unwrap();
    g.set_edge(c, methods, m).unwrap();
    g
}

fn find(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

#[test]
fn corrupted_binary_version_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.asg");
    save(&three_nodes(), &path).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    // Key, then the length-prefixed value "7".
    let value = find(&bytes, KEY_BINARY_VERSION.as_bytes()) + KEY_BINARY_VERSION.len() + 4;
    assert_eq!(bytes[value], b'7');
    bytes[value] = b'8';
    std::fs::write(&path, &bytes).unwrap();

    match load(&path, schema()) {
        Err(StorageError::VersionMismatch {
            what,
            expected,
            found,
        }) => {
            assert_eq!(what, "BinaryVersion");
            assert_eq!(expected, "7");
            assert_eq!(found, "8");
        }
        other => panic!("expected VersionMismatch, got {:?}", other.map(|_| ())),
    }
    // The header alone is still readable.
    let header = load_header(&path).unwrap();
    assert_eq!(header.properties.get(KEY_BINARY_VERSION), Some("8"));
}

#[test]
fn loading_with_another_schema_is_wrong_file_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.asg");
    save(&three_nodes(), &path).unwrap();
    let other = Arc::new(
        Schema::from_json(&JAVA_LITE.replacen("\"JavaLite\"", "\"CppLite\"", 1)).unwrap(),
    );
    assert!(matches!(
        load(&path, other),
        Err(StorageError::WrongFileType { what: "Type", .. })
    ));
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn round_trip_keeps_tree_and_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.asg");
    let graph = three_nodes();
    save(&graph, &path).unwrap();
    let file = load(&path, schema()).unwrap();

    assert_eq!(file.graph.node_count(), 3);
    assert_eq!(render_tree(&file.graph), render_tree(&graph));
    insta::assert_snapshot!(render_tree(&file.graph), @r###"
    Package #1 name="app"
      Package_members: Class #2 name="Main"
        Class_methods: Method #3 name="main"
    "###);
    assert_eq!(file.header.properties.get("Type"), Some("JavaLite"));
    assert_eq!(file.header.properties.get("APIVersion"), Some("2.1"));
    assert_eq!(file.header.full_analysis(), Some(true));
}

#[test]
fn unknown_header_blocks_survive_a_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.asg");
    let second = dir.path().join("second.asg");

    let graph = three_nodes();
    let mut header = Header::for_schema(graph.schema(), false);
    header.unknown.push(UnknownBlock {
        tag: 40,
        payload: b"opaque".to_vec(),
    });
    header.origins.push("Main.java", NodeId(17), NodeId(2));
    save_with(&graph, &header, &CodecConfig::default(), &first).unwrap();

    let file = load(&first, schema()).unwrap();
    save_with(&file.graph, &file.header, &CodecConfig::default(), &second).unwrap();
    let reread = load_header(&second).unwrap();
    assert_eq!(reread.unknown, header.unknown);
    assert_eq!(reread.origins.lookup("Main.java", NodeId(17)), Some(NodeId(2)));
    assert_eq!(reread.full_analysis(), Some(false));
}

#[test]
fn failed_save_keeps_the_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.asg");
    save(&three_nodes(), &path).unwrap();
    let before = std::fs::read(&path).unwrap();

    // A directory in place of the target makes the final rename fail.
    let blocked = dir.path().join("blocked.asg");
    std::fs::create_dir(&blocked).unwrap();
    std::fs::write(blocked.join("keep"), b"x").unwrap();
    assert!(save(&three_nodes(), &blocked).is_err());

    assert_eq!(std::fs::read(&path).unwrap(), before);
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 2, "{:?}", leftovers);
}
