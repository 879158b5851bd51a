//! Test fixtures shared by the storage unit tests.

use std::sync::Arc;

use asg_core::{Asg, NodeId, Origin, Schema, StrType, Value};

pub const JAVA_LITE: &str = include_str!("../../../schemas/java-lite.json");

pub fn java_lite() -> Arc<Schema> {
    Arc::new(Schema::from_json(JAVA_LITE).unwrap())
}

/// Handles into the graph built by [`rich_graph`].
pub struct Rich {
    pub graph: Asg,
    pub package: NodeId,
    pub base: NodeId,
    pub class: NodeId,
    pub method: NodeId,
    pub helper: NodeId,
    pub literal: NodeId,
    pub int_type: NodeId,
}

/// A package with two classes (one extending the other), a method calling
/// a helper, a literal using every numeric field type, a shared synthetic
/// type, a filtered comment and a temporary string.
pub fn rich_graph() -> Rich {
    let mut g = Asg::new(java_lite());
    let e = |g: &Asg, name: &str| g.schema().edge_id(name).unwrap();
    let members = e(&g, "Package_members");
    let methods = e(&g, "Class_methods");
    let extends = e(&g, "Class_extends");
    let comments = e(&g, "Named_comments");
    let body = e(&g, "Method_body");
    let calls = e(&g, "Method_calls");
    let returns = e(&g, "Method_returnType");
    let literals = e(&g, "Block_literals");

    let package = g.create_named("Package").unwrap();
    g.set_str(package, "name", "p").unwrap();

    let base = g.create_named("Class").unwrap();
    g.set_str(base, "name", "Base").unwrap();
    g.set_attribute(base, "is_abstract", true).unwrap();
    let class = g.create_named("Class").unwrap();
    g.set_str(class, "name", "Impl").unwrap();
    g.set_str(class, "path", "src/p/Impl.java").unwrap();
    g.set_attribute(class, "lloc", 40u32).unwrap();
    g.set_edge(package, members, base).unwrap();
    g.set_edge(package, members, class).unwrap();
    g.set_edge(class, extends, base).unwrap();

    let typeref = g.schema().kind_id("TypeRef").unwrap();
    let int_type = g.create_with_origin(typeref, Origin::Synthetic).unwrap();
    g.set_str(int_type, "type_name", "int").unwrap();

    let method_with_body = |g: &mut Asg, name: &str| {
        let m = g.create_named("Method").unwrap();
        g.set_str(m, "name", name).unwrap();
        let b = g.create_named("Block").unwrap();
        g.set_edge(m, body, b).unwrap();
        g.set_edge(class, methods, m).unwrap();
        (m, b)
    };
    let (method, block) = method_with_body(&mut g, "run");
    let (helper, _) = method_with_body(&mut g, "help");
    g.set_attribute(method, "is_static", true).unwrap();
    g.set_attribute(method, "branches", 5u32).unwrap();
    g.set_edge(method, calls, helper).unwrap();
    g.set_edge(method, calls, helper).unwrap();
    g.set_edge(method, returns, int_type).unwrap();
    g.set_edge(helper, returns, int_type).unwrap();

    let literal = g.create_named("Literal").unwrap();
    g.set_attribute(literal, "value", -42i64).unwrap();
    g.set_attribute(literal, "ratio", 0.25f64).unwrap();
    g.set_attribute(literal, "is_final", true).unwrap();
    g.set_attribute(literal, "radix", 16u8).unwrap();
    g.set_attribute(literal, "width", 300u16).unwrap();
    g.set_attribute(literal, "raw", u64::MAX).unwrap();
    g.set_attribute(literal, "offset", -7i32).unwrap();
    g.set_edge(block, literals, literal).unwrap();

    let comment = g.create_named("Comment").unwrap();
    g.set_str(comment, "text", "see Base").unwrap();
    g.set_edge(class, comments, comment).unwrap();
    g.set_filtered(comment).unwrap();

    g.strings_mut().intern_typed("scratch", StrType::Tmp);
    g.strings_mut().intern_typed("kept", StrType::ToSave);
    g.intern("unused");

    Rich {
        graph: g,
        package,
        base,
        class,
        method,
        helper,
        literal,
        int_type,
    }
}

/// Field values with string keys resolved to text.
fn resolved(graph: &Asg, id: NodeId) -> Vec<String> {
    graph
        .get(id)
        .unwrap()
        .fields()
        .iter()
        .map(|v| match v {
            Value::Str(key) => format!("{:?}", graph.strings().get(*key)),
            other => format!("{:?}", other),
        })
        .collect()
}

/// Node-by-node structural equality, independent of string key layout.
pub fn assert_same_graph(a: &Asg, b: &Asg) {
    assert_eq!(a.slot_count(), b.slot_count());
    assert_eq!(
        a.node_ids().collect::<Vec<_>>(),
        b.node_ids().collect::<Vec<_>>()
    );
    for id in a.node_ids() {
        let (na, nb) = (a.get(id).unwrap(), b.get(id).unwrap());
        assert_eq!(na.kind(), nb.kind(), "kind of {}", id);
        assert_eq!(na.origin(), nb.origin(), "origin of {}", id);
        assert_eq!(na.filter_flag(), nb.filter_flag(), "filter flag of {}", id);
        assert_eq!(na.parent(), nb.parent(), "parent of {}", id);
        assert_eq!(na.edge_slots(), nb.edge_slots(), "edges of {}", id);
        assert_eq!(resolved(a, id), resolved(b, id), "fields of {}", id);
        let mut pa = a.all_predecessors(id).to_vec();
        let mut pb = b.all_predecessors(id).to_vec();
        pa.sort();
        pb.sort();
        assert_eq!(pa, pb, "predecessors of {}", id);
        assert_eq!(a.structural_hash(id), b.structural_hash(id));
    }
}
