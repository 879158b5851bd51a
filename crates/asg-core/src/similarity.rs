//! Pairwise node similarity.
//!
//! Only fields declared with `compare` take part. Each non-string field
//! scores 1 on an exact match; each string field scores its normalized
//! edit-distance similarity. The mean over `n` compared fields is rescaled
//! to `[minimum, 1]`:
//!
//! ```text
//! minimum + (1 - minimum) * matched / n
//! ```
//!
//! Nodes of different kinds score `0.0`; kinds without compared fields score
//! `1.0`.

use crate::config::SimilarityConfig;
use crate::error::CoreError;
use crate::graph::Asg;
use crate::id::NodeId;
use crate::value::Value;

/// Levenshtein distance over chars (Wagner-Fischer, two rows).
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (curr[j - 1] + 1).min(prev[j] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max_len`; two empty strings are identical.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / max_len as f64
}

/// Similarity of `a` in `graph_a` and `b` in `graph_b`. The graphs may be
/// the same; kinds are compared by qualified name.
pub fn similarity_between(
    graph_a: &Asg,
    a: NodeId,
    graph_b: &Asg,
    b: NodeId,
    config: &SimilarityConfig,
) -> Result<f64, CoreError> {
    let kind_a = graph_a.node_kind(a)?;
    let kind_b = graph_b.node_kind(b)?;
    if kind_a.qualified_name != kind_b.qualified_name || kind_a.fields != kind_b.fields {
        return Ok(0.0);
    }

    let node_a = graph_a.get(a)?;
    let node_b = graph_b.get(b)?;
    let mut compared = 0usize;
    let mut matched = 0.0f64;
    for ((field, va), vb) in kind_a
        .fields
        .iter()
        .zip(node_a.fields().iter())
        .zip(node_b.fields().iter())
    {
        if !field.compare {
            continue;
        }
        compared += 1;
        match (va, vb) {
            (Value::Str(ka), Value::Str(kb)) => {
                let sim = string_similarity(graph_a.strings().get(*ka), graph_b.strings().get(*kb));
                if sim < config.min_for_strings {
                    return Ok(0.0);
                }
                matched += sim;
            }
            _ => {
                if va.matches(vb) {
                    matched += 1.0;
                }
            }
        }
    }

    if compared == 0 {
        return Ok(1.0);
    }
    let ratio = matched / compared as f64;
    if ratio >= 1.0 {
        return Ok(1.0);
    }
    let score = config.minimum + (1.0 - config.minimum) * ratio;
    Ok(score.clamp(0.0, 1.0))
}

impl Asg {
    /// Similarity of two nodes of this graph with default constants.
    pub fn similarity(&self, a: NodeId, b: NodeId) -> Result<f64, CoreError> {
        self.similarity_with(a, b, &SimilarityConfig::default())
    }

    pub fn similarity_with(
        &self,
        a: NodeId,
        b: NodeId,
        config: &SimilarityConfig,
    ) -> Result<f64, CoreError> {
        similarity_between(self, a, self, b, config)
    }
}
