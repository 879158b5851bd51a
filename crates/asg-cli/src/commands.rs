//! Subcommand implementations.
//!
//! Each command is load -> query or mutate -> (save), composed from the
//! library calls, and returns a serializable report that `main` prints.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use asg_core::similarity::similarity_between;
use asg_core::{
    verify, EngineConfig, NodeId, Preorder, Schema, Value, VerifyReport, VisitCtx, Visitor,
};
use asg_storage::{
    compute_dirty_set, load, merge_batch, save_with, DirtySet, GraphFile, PropertyData,
};
use serde::Serialize;

use crate::error::CliError;

/// Schema and configuration shared by every command.
pub struct Context {
    pub schema: Arc<Schema>,
    pub config: EngineConfig,
}

impl Context {
    pub fn load(schema: &Path, config: Option<&Path>) -> Result<Self, CliError> {
        let schema = Arc::new(Schema::from_json_file(schema)?);
        let config = match config {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        };
        tracing::debug!(schema = schema.name(), "loaded schema and config");
        Ok(Context { schema, config })
    }
}

// ---------------------------------------------------------------------------
// info
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct InfoReport {
    pub properties: PropertyData,
    pub origins: usize,
    pub unknown_blocks: Vec<u16>,
    pub nodes: usize,
    pub slots: u32,
    pub roots: usize,
    pub filtered: usize,
    pub strings: usize,
}

pub fn info(ctx: &Context, path: &Path) -> Result<InfoReport, CliError> {
    let GraphFile { graph, header } = load(path, Arc::clone(&ctx.schema))?;
    Ok(InfoReport {
        origins: header.origins.len(),
        unknown_blocks: header.unknown.iter().map(|b| b.tag).collect(),
        properties: header.properties,
        nodes: graph.node_count(),
        slots: graph.slot_count(),
        roots: graph.roots().len(),
        filtered: graph.filtered_count(),
        strings: graph.strings().len(),
    })
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

pub fn verify_file(ctx: &Context, path: &Path) -> Result<VerifyReport, CliError> {
    let file = load(path, Arc::clone(&ctx.schema))?;
    for warning in file.graph.integrity_warnings() {
        tracing::warn!(%warning, "integrity warning while loading");
    }
    Ok(verify(&file.graph))
}

// ---------------------------------------------------------------------------
// rewrite-paths
// ---------------------------------------------------------------------------

/// Collects replacements for path fields starting with `from`.
struct PathRewriter<'a> {
    from: &'a str,
    to: &'a str,
    edits: Vec<(NodeId, usize, String)>,
}

impl Visitor for PathRewriter<'_> {
    fn visit(&mut self, ctx: &VisitCtx<'_>) {
        // Once per node, on its first facet.
        if !ctx.call_base {
            return;
        }
        let (Ok(kind), Ok(node)) = (ctx.graph.node_kind(ctx.node), ctx.graph.get(ctx.node)) else {
            return;
        };
        for (index, (field, value)) in kind.fields.iter().zip(node.fields()).enumerate() {
            let Value::Str(key) = value else {
                continue;
            };
            if !field.path {
                continue;
            }
            if let Some(rest) = ctx.graph.strings().get(*key).strip_prefix(self.from) {
                self.edits.push((ctx.node, index, format!("{}{}", self.to, rest)));
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RewriteReport {
    pub rewritten: usize,
    pub output: PathBuf,
}

/// Replaces the `from` prefix of every path field with `to` and saves the
/// graph to `output` (in place when `None`). Filtered nodes are rewritten
/// too.
pub fn rewrite_paths(
    ctx: &Context,
    path: &Path,
    from: &str,
    to: &str,
    output: Option<&Path>,
) -> Result<RewriteReport, CliError> {
    let mut file = load(path, Arc::clone(&ctx.schema))?;

    let mut rewriter = PathRewriter {
        from,
        to,
        edits: Vec::new(),
    };
    Preorder::from_config(&file.graph, &ctx.config.traversal)
        .visit_filtered(true)
        .run_one(&mut rewriter)?;

    let rewritten = rewriter.edits.len();
    for (node, index, text) in rewriter.edits {
        let key = file.graph.intern(&text);
        file.graph.set_attribute_at(node, index, Value::Str(key))?;
    }

    let output = output.unwrap_or(path).to_path_buf();
    save_with(&file.graph, &file.header, &ctx.config.codec, &output)?;
    tracing::info!(rewritten, output = %output.display(), "rewrote path fields");
    Ok(RewriteReport { rewritten, output })
}

// ---------------------------------------------------------------------------
// dirty
// ---------------------------------------------------------------------------

pub fn dirty(ctx: &Context, old: &Path, new: &Path, name_field: &str) -> Result<DirtySet, CliError> {
    let old = load(old, Arc::clone(&ctx.schema))?;
    let new = load(new, Arc::clone(&ctx.schema))?;
    Ok(compute_dirty_set(&old.graph, &new.graph, name_field)?)
}

// ---------------------------------------------------------------------------
// similarity
// ---------------------------------------------------------------------------

/// Similarity of node `a` in `path_a` and node `b` in `path_b`, scored with
/// the configured constants.
pub fn similarity(
    ctx: &Context,
    path_a: &Path,
    a: NodeId,
    path_b: &Path,
    b: NodeId,
) -> Result<f64, CliError> {
    let ga = load(path_a, Arc::clone(&ctx.schema))?.graph;
    let gb = load(path_b, Arc::clone(&ctx.schema))?.graph;
    Ok(similarity_between(&ga, a, &gb, b, &ctx.config.similarity)?)
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct MergeReport {
    pub nodes: usize,
    pub origins: usize,
    pub failed: Vec<String>,
    pub output: PathBuf,
}

/// Merges every readable input into `output`. Unreadable inputs are listed
/// in the report and skipped.
pub fn merge(ctx: &Context, inputs: &[PathBuf], output: &Path) -> Result<MergeReport, CliError> {
    let batch = merge_batch(inputs, &ctx.schema)?;
    let failed: Vec<String> = batch
        .failures
        .iter()
        .map(|(path, _)| path.display().to_string())
        .collect();
    save_with(
        &batch.file.graph,
        &batch.file.header,
        &ctx.config.codec,
        output,
    )?;
    tracing::info!(inputs = inputs.len(), failed = failed.len(), "merged graph files");
    Ok(MergeReport {
        nodes: batch.file.graph.node_count(),
        origins: batch.file.header.origins.len(),
        failed,
        output: output.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use asg_core::{Asg, CodecConfig};
    use asg_storage::{save, Header, UnknownBlock};
    use tempfile::TempDir;

    const JAVA_LITE: &str = include_str!("../../../schemas/java-lite.json");

    struct Setup {
        dir: TempDir,
        ctx: Context,
    }

    fn setup(config: Option<&str>) -> Setup {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("schema.json");
        std::fs::write(&schema_path, JAVA_LITE).unwrap();
        let config_path = config.map(|json| {
            let p = dir.path().join("config.json");
            std::fs::write(&p, json).unwrap();
            p
        });
        let ctx = Context::load(&schema_path, config_path.as_deref()).unwrap();
        Setup { dir, ctx }
    }

    /// Package `name` with one class at `path`; returns the class id.
    fn write_graph(s: &Setup, file: &str, name: &str, path: &str) -> (PathBuf, NodeId) {
        let mut g = Asg::new(Arc::clone(&s.ctx.schema));
        let members = g.schema().edge_id("Package_members").unwrap();
        let p = g.create_named("Package").unwrap();
        g.set_str(p, "name", name).unwrap();
        let c = g.create_named("Class").unwrap();
        g.set_str(c, "name", "Main").unwrap();
        g.set_str(c, "path", path).unwrap();
        g.set_edge(p, members, c).unwrap();
        let out = s.dir.path().join(file);
        save(&g, &out).unwrap();
        (out, c)
    }

    #[test]
    fn info_reports_header_and_counts() {
        let s = setup(None);
        let (path, _) = write_graph(&s, "a.asg", "app", "/src/Main.java");
        let report = info(&s.ctx, &path).unwrap();
        assert_eq!(report.nodes, 2);
        assert_eq!(report.roots, 1);
        assert_eq!(report.properties.get("Type"), Some("JavaLite"));
        assert!(report.unknown_blocks.is_empty());
    }

    #[test]
    fn info_lists_blocks_carried_by_the_file() {
        let s = setup(None);
        let mut g = Asg::new(Arc::clone(&s.ctx.schema));
        g.create_named("Package").unwrap();
        let mut header = Header::for_schema(g.schema(), false);
        header.unknown.push(UnknownBlock {
            tag: 9,
            payload: vec![1, 2],
        });
        header.origins.push("lib", NodeId(4), NodeId(1));
        let path = s.dir.path().join("h.asg");
        save_with(&g, &header, &CodecConfig::default(), &path).unwrap();

        let report = info(&s.ctx, &path).unwrap();
        assert_eq!(report.unknown_blocks, vec![9]);
        assert_eq!(report.origins, 1);
        assert_eq!(report.properties.get("FullAnalysis"), Some("false"));
    }

    #[test]
    fn verify_reports_missing_body() {
        let s = setup(None);
        let mut g = Asg::new(Arc::clone(&s.ctx.schema));
        g.create_named("Method").unwrap();
        let path = s.dir.path().join("m.asg");
        save(&g, &path).unwrap();
        let report = verify_file(&s.ctx, &path).unwrap();
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn rewrite_paths_in_place_and_to_output() {
        let s = setup(None);
        let (path, class) = write_graph(&s, "a.asg", "app", "/old/root/Main.java");

        let out = s.dir.path().join("b.asg");
        let report = rewrite_paths(&s.ctx, &path, "/old/root", "/new", Some(&out)).unwrap();
        assert_eq!(report.rewritten, 1);
        let rewritten = load(&out, Arc::clone(&s.ctx.schema)).unwrap().graph;
        assert_eq!(rewritten.str_attribute(class, "path").unwrap(), "/new/Main.java");
        let original = load(&path, Arc::clone(&s.ctx.schema)).unwrap().graph;
        assert_eq!(
            original.str_attribute(class, "path").unwrap(),
            "/old/root/Main.java"
        );

        let report = rewrite_paths(&s.ctx, &path, "/elsewhere", "/x", None).unwrap();
        assert_eq!(report.rewritten, 0);
    }

    #[test]
    fn rewrite_reaches_filtered_nodes() {
        let s = setup(Some(r#"{ "codec": { "strings": "referenced" } }"#));
        let (path, class) = write_graph(&s, "a.asg", "app", "/old/Main.java");
        let mut file = load(&path, Arc::clone(&s.ctx.schema)).unwrap();
        file.graph.set_filtered(class).unwrap();
        save(&file.graph, &path).unwrap();

        rewrite_paths(&s.ctx, &path, "/old", "/new", None).unwrap();
        let graph = load(&path, Arc::clone(&s.ctx.schema)).unwrap().graph;
        assert_eq!(graph.str_attribute(class, "path").unwrap(), "/new/Main.java");
        assert!(graph.strings().lookup("/old/Main.java").is_none());
    }

    #[test]
    fn dirty_between_two_files() {
        let s = setup(None);
        let (old, _) = write_graph(&s, "old.asg", "app", "/a");
        let (new, _) = write_graph(&s, "new.asg", "app", "/b");
        let set = dirty(&s.ctx, &old, &new, "name").unwrap();
        assert!(set.modified.contains("app"));
        assert!(dirty(&s.ctx, &old, &old, "name").unwrap().is_clean());
    }

    #[test]
    fn similarity_uses_configured_floor() {
        let s = setup(Some(r#"{ "similarity": { "minimum": 0.5 } }"#));
        let (a, _) = write_graph(&s, "a.asg", "app", "/a");
        let (b, _) = write_graph(&s, "b.asg", "lib", "/a");
        // Packages: the only compared field is the name.
        let sim = similarity(&s.ctx, &a, NodeId(1), &b, NodeId(1)).unwrap();
        assert!((sim - 0.5).abs() < 1e-12, "sim = {}", sim);
        assert_eq!(similarity(&s.ctx, &a, NodeId(2), &b, NodeId(2)).unwrap(), 1.0);
    }

    #[test]
    fn merge_skips_unreadable_inputs() {
        let s = setup(None);
        let (a, _) = write_graph(&s, "a.asg", "app", "/a");
        let (b, _) = write_graph(&s, "b.asg", "lib", "/b");
        let missing = s.dir.path().join("missing.asg");
        let out = s.dir.path().join("all.asg");
        let report = merge(&s.ctx, &[a, missing, b], &out).unwrap();
        assert_eq!(report.nodes, 4);
        assert_eq!(report.origins, 4);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(info(&s.ctx, &out).unwrap().origins, 4);
    }

    #[test]
    fn missing_schema_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Context::load(&dir.path().join("nope.json"), None)
            .err()
            .unwrap();
        assert_eq!(err.exit_code(), 3);
    }
}
