//! Persistence for abstract semantic graphs.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`io`]: little-endian reader/writer, bit packing, atomic file writes
//! - [`header`]: typed header blocks (properties, origins, unknown blocks)
//! - [`codec`]: graph file save/load
//! - [`filter_file`]: filter state side files
//! - [`hash`]: blake3 subtree and component fingerprints
//! - [`dirty`]: incremental dirty sets from fingerprints
//! - [`batch`]: parallel loading and merging of many files

pub mod batch;
pub mod codec;
pub mod dirty;
pub mod error;
pub mod filter_file;
pub mod hash;
pub mod header;
pub mod io;

#[cfg(test)]
mod fixtures;

// Re-export key types for ergonomic use.
pub use batch::{load_batch, merge_batch, MergedBatch};
pub use codec::{decode, encode, load, load_header, save, save_with, GraphFile};
pub use dirty::{compute_dirty_set, compute_dirty_set_from, DirtySet};
pub use error::StorageError;
pub use filter_file::{load_filter, save_filter};
pub use hash::{fingerprint_components, fingerprint_root, hash_node_content};
pub use header::{Header, PropertyData, UnknownBlock};
