//! Incremental analysis dirty detection.
//!
//! Compares the component fingerprints of a previous graph with the current
//! one to decide which components need re-analysis. Components are keyed by
//! name, so renumbered node ids never mark anything dirty.

use std::collections::{BTreeMap, BTreeSet};

use asg_core::{Asg, CoreError};
use serde::Serialize;

use crate::hash::fingerprint_components;

/// The set of components that changed between two graphs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirtySet {
    /// Components absent from the previous graph.
    pub new: BTreeSet<String>,
    /// Components whose subtree fingerprint changed.
    pub modified: BTreeSet<String>,
    /// Components no longer present.
    pub removed: BTreeSet<String>,
}

impl DirtySet {
    /// Components needing re-analysis (new + modified).
    pub fn needs_reanalysis(&self) -> BTreeSet<String> {
        self.new.union(&self.modified).cloned().collect()
    }

    pub fn is_clean(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.new.len() + self.modified.len() + self.removed.len()
    }
}

/// Compares two graphs component by component.
pub fn compute_dirty_set(old: &Asg, new: &Asg, name_field: &str) -> Result<DirtySet, CoreError> {
    let previous = fingerprint_components(old, name_field)?;
    compute_dirty_set_from(&previous, new, name_field)
}

/// Compares previously recorded fingerprints against `current`.
pub fn compute_dirty_set_from(
    previous: &BTreeMap<String, blake3::Hash>,
    current: &Asg,
    name_field: &str,
) -> Result<DirtySet, CoreError> {
    let current_hashes = fingerprint_components(current, name_field)?;
    let mut dirty = DirtySet::default();

    for (name, hash) in &current_hashes {
        match previous.get(name) {
            Some(prev) if prev != hash => {
                dirty.modified.insert(name.clone());
            }
            Some(_) => {}
            None => {
                dirty.new.insert(name.clone());
            }
        }
    }
    for name in previous.keys() {
        if !current_hashes.contains_key(name) {
            dirty.removed.insert(name.clone());
        }
    }

    tracing::debug!(
        new = dirty.new.len(),
        modified = dirty.modified.len(),
        removed = dirty.removed.len(),
        "computed dirty set"
    );
    Ok(dirty)
}
