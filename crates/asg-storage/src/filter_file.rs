//! Filter state side files.
//!
//! A filter file stores one bit per node slot so that several filter views
//! of the same saved graph can be kept next to it:
//!
//! ```text
//! "FILTER"  slot_count u32  bits[ceil(slot_count / 8)]
//! ```

use std::path::Path;

use asg_core::Asg;

use crate::error::StorageError;
use crate::io::{pack_bits, unpack_bits, write_atomic, BinaryReader, BinaryWriter};

pub const FILTER_MAGIC: &[u8] = b"FILTER";

pub fn encode_filter(graph: &Asg) -> Result<Vec<u8>, StorageError> {
    let flags = graph.filter_flags();
    let mut w = BinaryWriter::new(Vec::new());
    w.raw(FILTER_MAGIC)?;
    w.u32(graph.slot_count())?;
    w.raw(&pack_bits(&flags))?;
    Ok(w.into_inner())
}

/// Replaces the filter flags of `graph` and returns the number of filtered
/// nodes.
pub fn decode_filter(graph: &mut Asg, bytes: &[u8]) -> Result<usize, StorageError> {
    let mut r = BinaryReader::new(bytes);
    r.expect_magic(FILTER_MAGIC)?;
    let found = r.u32()?;
    let expected = graph.slot_count();
    if found != expected {
        return Err(StorageError::FilterSizeMismatch { expected, found });
    }
    let count = found as usize;
    let packed = r.raw(count.div_ceil(8))?;
    graph.apply_filter_flags(&unpack_bits(&packed, count))?;
    Ok(graph.filtered_count())
}

pub fn save_filter(graph: &Asg, path: impl AsRef<Path>) -> Result<(), StorageError> {
    let path = path.as_ref();
    write_atomic(path, &encode_filter(graph)?)?;
    tracing::debug!(path = %path.display(), filtered = graph.filtered_count(), "saved filter");
    Ok(())
}

pub fn load_filter(graph: &mut Asg, path: impl AsRef<Path>) -> Result<usize, StorageError> {
    let bytes = std::fs::read(path)?;
    decode_filter(graph, &bytes)
}
