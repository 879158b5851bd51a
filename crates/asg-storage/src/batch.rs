//! Parallel loading of independent graph files.
//!
//! Each worker decodes into its own [`Asg`]; nothing is shared but the
//! schema. Failed files are logged and reported per path, never aborting
//! the rest of the batch. Merging the loaded graphs happens afterwards on
//! the calling thread.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use asg_core::{merge_graph, Asg, Schema};
use rayon::prelude::*;

use crate::codec::{load, GraphFile};
use crate::error::StorageError;
use crate::header::Header;

/// Loads every path in parallel. Results are in input order.
pub fn load_batch<P>(paths: &[P], schema: &Arc<Schema>) -> Vec<Result<GraphFile, StorageError>>
where
    P: AsRef<Path> + Sync,
{
    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            let result = load(path, Arc::clone(schema));
            if let Err(err) = &result {
                tracing::warn!(path = %path.display(), error = %err, "skipping graph file");
            }
            result
        })
        .collect()
}

/// Outcome of [`merge_batch`].
#[derive(Debug)]
pub struct MergedBatch {
    /// The combined graph. Its header records, per input, the mapping from
    /// the input's node ids to the merged ids.
    pub file: GraphFile,
    pub failures: Vec<(PathBuf, StorageError)>,
}

/// Loads `paths` in parallel and merges the readable ones, in input order,
/// into a single graph. Each input becomes a component named by its file
/// stem.
pub fn merge_batch<P>(paths: &[P], schema: &Arc<Schema>) -> Result<MergedBatch, StorageError>
where
    P: AsRef<Path> + Sync,
{
    let mut merged = Asg::new(Arc::clone(schema));
    let mut header = Header::for_schema(schema, true);
    let mut failures = Vec::new();

    for (path, result) in paths.iter().zip(load_batch(paths, schema)) {
        let path = path.as_ref();
        match result {
            Ok(file) => {
                let component = component_name(path);
                let outcome = merge_graph(&mut merged, &file.graph, &component)?;
                tracing::debug!(
                    component = %component,
                    nodes = outcome.nodes.len(),
                    "merged graph file"
                );
                header.origins.extend(outcome.origins);
            }
            Err(err) => failures.push((path.to_path_buf(), err)),
        }
    }

    Ok(MergedBatch {
        file: GraphFile {
            graph: merged,
            header,
        },
        failures,
    })
}

fn component_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
