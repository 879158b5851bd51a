//! Visitor dispatch and preorder traversal.
//!
//! A [`Visitor`] receives `visit` once per facet of each node's kind, in
//! ascending facet order. Only the first call of a node has
//! `call_base == true`, which replaces "call the virtual base exactly once"
//! in a diamond-shaped class hierarchy. After the children, `visit_end` runs
//! for the same facets in reverse order with the same flags.
//!
//! The walk follows ownership edges only, plus any reference edge kinds
//! opted into with [`Preorder::cross_edges`]. It is iterative, so deep trees
//! do not grow the call stack.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::config::TraversalConfig;
use crate::edge::EdgeRole;
use crate::error::CoreError;
use crate::graph::Asg;
use crate::id::{EdgeKindId, FacetId, NodeId, NodeKindId};
use crate::value::Value;

/// Ancestor stack of the node being visited. The current node is not on it.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    stack: Vec<NodeId>,
}

impl Cursor {
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Ancestors from the walk's start down to the direct parent.
    pub fn ancestors(&self) -> &[NodeId] {
        &self.stack
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.stack.last().copied()
    }

    /// Closest ancestor for which `pred` holds.
    pub fn nearest(&self, mut pred: impl FnMut(NodeId) -> bool) -> Option<NodeId> {
        self.stack.iter().rev().copied().find(|id| pred(*id))
    }
}

/// Arguments of a node callback.
#[derive(Debug, Clone, Copy)]
pub struct VisitCtx<'a> {
    pub graph: &'a Asg,
    pub node: NodeId,
    pub kind: NodeKindId,
    pub facet: FacetId,
    /// `true` only for the first facet of the node.
    pub call_base: bool,
    pub cursor: &'a Cursor,
}

impl VisitCtx<'_> {
    pub fn facet_name(&self) -> &str {
        self.graph.schema().facet_name(self.facet)
    }

    pub fn kind_name(&self) -> &str {
        self.graph.schema().kind_name(self.kind)
    }
}

/// Arguments of an edge callback.
#[derive(Debug, Clone, Copy)]
pub struct EdgeCtx<'a> {
    pub graph: &'a Asg,
    pub src: NodeId,
    pub kind: EdgeKindId,
    pub dst: NodeId,
    pub cursor: &'a Cursor,
}

impl EdgeCtx<'_> {
    pub fn edge_name(&self) -> &str {
        self.graph.schema().edge_name(self.kind)
    }
}

/// Callbacks driven by [`Preorder`]. Every method has an empty default.
pub trait Visitor {
    fn visit(&mut self, _ctx: &VisitCtx<'_>) {}

    fn visit_end(&mut self, _ctx: &VisitCtx<'_>) {}

    fn visit_edge(&mut self, _ctx: &EdgeCtx<'_>) {}

    fn visit_edge_end(&mut self, _ctx: &EdgeCtx<'_>) {}

    /// Polled between node visits. A stopped visitor receives no further
    /// callbacks, including `visit_end` for nodes still open.
    fn is_stopped(&self) -> bool {
        false
    }
}

/// Counters reported by a finished walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalStats {
    pub visited: usize,
    pub skipped_filtered: usize,
    pub skipped_special: usize,
    pub skipped_repeated: usize,
    /// Every visitor stopped before the walk was complete.
    pub stopped: bool,
}

enum Step {
    Enter {
        node: NodeId,
        via: Option<(NodeId, EdgeKindId)>,
        cross: bool,
    },
    Exit(NodeId),
    EdgeExit {
        src: NodeId,
        kind: EdgeKindId,
        dst: NodeId,
    },
}

/// Configurable preorder walk.
#[derive(Debug, Clone)]
pub struct Preorder<'g> {
    graph: &'g Asg,
    start: Option<NodeId>,
    skip_special: bool,
    visit_filtered: bool,
    safe_mode: bool,
    cross_edges: Vec<EdgeKindId>,
}

impl<'g> Preorder<'g> {
    pub fn new(graph: &'g Asg) -> Self {
        Preorder {
            graph,
            start: None,
            skip_special: false,
            visit_filtered: false,
            safe_mode: false,
            cross_edges: Vec::new(),
        }
    }

    pub fn from_config(graph: &'g Asg, config: &TraversalConfig) -> Self {
        Preorder::new(graph)
            .skip_special_nodes(config.skip_special_nodes)
            .safe_mode(config.safe_mode)
    }

    /// Walks only the subtree under `node`. Without a start the walk covers
    /// every root in id order.
    pub fn start_at(mut self, node: NodeId) -> Self {
        self.start = Some(node);
        self
    }

    /// Skips synthetic-origin nodes and their subtrees.
    pub fn skip_special_nodes(mut self, skip: bool) -> Self {
        self.skip_special = skip;
        self
    }

    /// Visits filtered nodes as if filtering were off.
    pub fn visit_filtered(mut self, visit: bool) -> Self {
        self.visit_filtered = visit;
        self
    }

    /// Tracks visited nodes; a node reached twice is logged and skipped.
    pub fn safe_mode(mut self, on: bool) -> Self {
        self.safe_mode = on;
        self
    }

    /// Also descends through these reference edge kinds. Targets already
    /// visited are not entered again.
    pub fn cross_edges(mut self, kinds: impl IntoIterator<Item = EdgeKindId>) -> Self {
        self.cross_edges = kinds.into_iter().collect();
        self
    }

    pub fn run_one(&self, visitor: &mut dyn Visitor) -> Result<TraversalStats, CoreError> {
        self.run(&mut [visitor])
    }

    /// Drives every visitor through one shared walk.
    pub fn run(&self, visitors: &mut [&mut dyn Visitor]) -> Result<TraversalStats, CoreError> {
        let graph = self.graph;
        let schema = graph.schema();
        let mut stats = TraversalStats::default();
        let mut live: Vec<usize> = (0..visitors.len()).collect();
        let mut cursor = Cursor::default();
        let track = self.safe_mode || !self.cross_edges.is_empty();
        let mut seen: HashSet<NodeId> = HashSet::new();

        let roots = match self.start {
            Some(start) => {
                graph.get(start)?;
                vec![start]
            }
            None => graph.roots(),
        };

        let mut stack: Vec<Step> = roots
            .into_iter()
            .rev()
            .map(|node| Step::Enter {
                node,
                via: None,
                cross: false,
            })
            .collect();

        while let Some(step) = stack.pop() {
            live.retain(|&i| !visitors[i].is_stopped());
            if live.is_empty() {
                stats.stopped = !visitors.is_empty();
                break;
            }

            match step {
                Step::Enter { node, via, cross } => {
                    let Ok(data) = graph.get(node) else {
                        continue;
                    };
                    if !self.visit_filtered && graph.is_filtered(node) {
                        stats.skipped_filtered += 1;
                        continue;
                    }
                    if self.skip_special && data.is_special() {
                        stats.skipped_special += 1;
                        continue;
                    }
                    if track && !seen.insert(node) {
                        stats.skipped_repeated += 1;
                        if self.safe_mode && !cross {
                            tracing::warn!(node = %node, "node reached twice during traversal");
                        }
                        continue;
                    }

                    if let Some((src, kind)) = via {
                        let ctx = EdgeCtx {
                            graph,
                            src,
                            kind,
                            dst: node,
                            cursor: &cursor,
                        };
                        for &i in &live {
                            visitors[i].visit_edge(&ctx);
                        }
                        stack.push(Step::EdgeExit { src, kind, dst: node });
                    }

                    let kind = schema.kind_checked(data.kind)?;
                    for &i in &live {
                        for (n, facet) in kind.facets.iter().enumerate() {
                            let ctx = VisitCtx {
                                graph,
                                node,
                                kind: data.kind,
                                facet,
                                call_base: n == 0,
                                cursor: &cursor,
                            };
                            visitors[i].visit(&ctx);
                        }
                    }
                    stats.visited += 1;
                    cursor.stack.push(node);
                    stack.push(Step::Exit(node));

                    let mut children = Vec::new();
                    for (slot, edge) in data.edge_slots().iter().zip(kind.edges.iter()) {
                        let decl = schema.edge_checked(*edge)?;
                        let is_cross = decl.role == EdgeRole::Reference;
                        if is_cross && !self.cross_edges.contains(edge) {
                            continue;
                        }
                        for target in slot.targets() {
                            children.push(Step::Enter {
                                node: *target,
                                via: Some((node, *edge)),
                                cross: is_cross,
                            });
                        }
                    }
                    stack.extend(children.into_iter().rev());
                }
                Step::Exit(node) => {
                    cursor.stack.pop();
                    let data = graph.get(node)?;
                    let kind = schema.kind_checked(data.kind)?;
                    let first = kind.facets.iter().next();
                    for &i in &live {
                        for facet in kind.facets.iter().rev() {
                            let ctx = VisitCtx {
                                graph,
                                node,
                                kind: data.kind,
                                facet,
                                call_base: Some(facet) == first,
                                cursor: &cursor,
                            };
                            visitors[i].visit_end(&ctx);
                        }
                    }
                }
                Step::EdgeExit { src, kind, dst } => {
                    let ctx = EdgeCtx {
                        graph,
                        src,
                        kind,
                        dst,
                        cursor: &cursor,
                    };
                    for &i in &live {
                        visitors[i].visit_edge_end(&ctx);
                    }
                }
            }
        }
        Ok(stats)
    }
}

/// Walks every root of `graph` with one visitor.
pub fn run_preorder(
    graph: &Asg,
    visitor: &mut dyn Visitor,
    skip_special_nodes: bool,
) -> Result<TraversalStats, CoreError> {
    Preorder::new(graph)
        .skip_special_nodes(skip_special_nodes)
        .run_one(visitor)
}

// ---------------------------------------------------------------------------
// Lazy id iteration
// ---------------------------------------------------------------------------

/// Ids in the order a default [`Preorder`] would visit them.
pub fn preorder_ids(graph: &Asg, start: Option<NodeId>) -> PreorderIds<'_> {
    let mut stack = match start {
        Some(id) => vec![id],
        None => graph.roots(),
    };
    stack.reverse();
    PreorderIds { graph, stack }
}

/// Lazy preorder over ownership edges, skipping filtered nodes and their
/// subtrees. Cloning restarts from the clone point.
#[derive(Debug, Clone)]
pub struct PreorderIds<'g> {
    graph: &'g Asg,
    stack: Vec<NodeId>,
}

impl Iterator for PreorderIds<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            if !self.graph.exists(id) || self.graph.is_filtered(id) {
                continue;
            }
            if let Ok(children) = self.graph.children(id) {
                self.stack.extend(children.into_iter().rev());
            }
            return Some(id);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Debug rendering
// ---------------------------------------------------------------------------

struct TreeRenderer {
    out: String,
    pending_edge: Option<EdgeKindId>,
}

impl Visitor for TreeRenderer {
    fn visit_edge(&mut self, ctx: &EdgeCtx<'_>) {
        self.pending_edge = Some(ctx.kind);
    }

    fn visit(&mut self, ctx: &VisitCtx<'_>) {
        if !ctx.call_base {
            return;
        }
        let graph = ctx.graph;
        let schema = graph.schema();
        let indent = "  ".repeat(ctx.cursor.depth());
        let _ = write!(self.out, "{}", indent);
        if let Some(edge) = self.pending_edge.take() {
            let _ = write!(self.out, "{}: ", schema.edge_name(edge));
        }
        let _ = write!(self.out, "{} #{}", ctx.kind_name(), ctx.node);
        if let (Ok(node), Some(kind)) = (graph.get(ctx.node), schema.kind(ctx.kind)) {
            for (value, field) in node.fields().iter().zip(kind.fields.iter()) {
                if *value == field.ty.default_value() {
                    continue;
                }
                let _ = write!(self.out, " {}=", field.name);
                match value {
                    Value::Str(key) => {
                        let _ = write!(self.out, "{:?}", graph.strings().get(*key));
                    }
                    Value::Bool(v) => {
                        let _ = write!(self.out, "{}", v);
                    }
                    Value::U8(v) => {
                        let _ = write!(self.out, "{}", v);
                    }
                    Value::U16(v) => {
                        let _ = write!(self.out, "{}", v);
                    }
                    Value::U32(v) => {
                        let _ = write!(self.out, "{}", v);
                    }
                    Value::U64(v) => {
                        let _ = write!(self.out, "{}", v);
                    }
                    Value::I32(v) => {
                        let _ = write!(self.out, "{}", v);
                    }
                    Value::I64(v) => {
                        let _ = write!(self.out, "{}", v);
                    }
                    Value::F64(v) => {
                        let _ = write!(self.out, "{}", v);
                    }
                }
            }
        }
        self.out.push('\n');
    }
}

/// Indented dump of every unfiltered tree, one node per line. Fields at their
/// default value are omitted.
pub fn render_tree(graph: &Asg) -> String {
    let mut renderer = TreeRenderer {
        out: String::new(),
        pending_edge: None,
    };
    // A walk over a live graph only fails on an inconsistent schema.
    let _ = Preorder::new(graph).run_one(&mut renderer);
    renderer.out
}
