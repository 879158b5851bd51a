//! Shared test fixtures: the `java-lite` demo schema and a small graph.

use std::sync::Arc;

use crate::graph::Asg;
use crate::id::NodeId;
use crate::schema::Schema;

pub const JAVA_LITE: &str = include_str!("../../../schemas/java-lite.json");

pub fn demo_schema() -> Schema {
    Schema::from_json(JAVA_LITE).unwrap()
}

pub fn demo_graph() -> Asg {
    Asg::new(Arc::new(demo_schema()))
}

/// Handles into the graph built by [`sample_graph`].
pub struct Sample {
    pub graph: Asg,
    pub package: NodeId,
    pub class: NodeId,
    pub method: NodeId,
    pub body: NodeId,
    pub comment: NodeId,
}

/// `Package p { Class C { /* doc */ void run() { ... } } }`
pub fn sample_graph() -> Sample {
    let mut graph = demo_graph();
    let package = graph.create_named("Package").unwrap();
    graph.set_str(package, "name", "p").unwrap();
    let class = graph.create_named("Class").unwrap();
    graph.set_str(class, "name", "C").unwrap();
    graph.set_str(class, "path", "src/p/C.java").unwrap();
    graph.set_attribute(class, "line", 3u32).unwrap();
    let method = graph.create_named("Method").unwrap();
    graph.set_str(method, "name", "run").unwrap();
    graph.set_attribute(method, "branches", 2u32).unwrap();
    let body = graph.create_named("Block").unwrap();
    let comment = graph.create_named("Comment").unwrap();
    graph.set_str(comment, "text", "doc").unwrap();

    let members = graph.schema().edge_id("Package_members").unwrap();
    let methods = graph.schema().edge_id("Class_methods").unwrap();
    let comments = graph.schema().edge_id("Named_comments").unwrap();
    let body_edge = graph.schema().edge_id("Method_body").unwrap();
    graph.set_edge(package, members, class).unwrap();
    graph.set_edge(class, comments, comment).unwrap();
    graph.set_edge(class, methods, method).unwrap();
    graph.set_edge(method, body_edge, body).unwrap();

    Sample {
        graph,
        package,
        class,
        method,
        body,
        comment,
    }
}
