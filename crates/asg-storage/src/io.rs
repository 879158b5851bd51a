//! Little-endian primitives shared by the graph and filter file formats.
//!
//! Strings and byte blobs are framed as `[u32 length][bytes]`. Reads are
//! bounded by the declared length, so a corrupt length never allocates more
//! than the file actually holds.

use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tempfile::NamedTempFile;

use crate::error::StorageError;

/// Initial buffer reservation for length-prefixed reads.
const MAX_PREALLOC: usize = 64 * 1024;

pub struct BinaryWriter<W: Write> {
    inner: W,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W) -> Self {
        BinaryWriter { inner }
    }

    pub fn u8(&mut self, v: u8) -> io::Result<()> {
        self.inner.write_u8(v)
    }

    pub fn u16(&mut self, v: u16) -> io::Result<()> {
        self.inner.write_u16::<LittleEndian>(v)
    }

    pub fn u32(&mut self, v: u32) -> io::Result<()> {
        self.inner.write_u32::<LittleEndian>(v)
    }

    pub fn u64(&mut self, v: u64) -> io::Result<()> {
        self.inner.write_u64::<LittleEndian>(v)
    }

    pub fn i32(&mut self, v: i32) -> io::Result<()> {
        self.inner.write_i32::<LittleEndian>(v)
    }

    pub fn i64(&mut self, v: i64) -> io::Result<()> {
        self.inner.write_i64::<LittleEndian>(v)
    }

    pub fn f64(&mut self, v: f64) -> io::Result<()> {
        self.inner.write_f64::<LittleEndian>(v)
    }

    /// Raw bytes without a length prefix (magics, packed bit vectors).
    pub fn raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    pub fn blob(&mut self, bytes: &[u8]) -> io::Result<()> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "blob exceeds u32 length"))?;
        self.u32(len)?;
        self.inner.write_all(bytes)
    }

    pub fn str(&mut self, text: &str) -> io::Result<()> {
        self.blob(text.as_bytes())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

pub struct BinaryReader<R: Read> {
    inner: R,
}

/// A short read means the file ended early, which is a content problem
/// rather than an I/O one.
fn map_eof(err: io::Error) -> StorageError {
    if err.kind() == ErrorKind::UnexpectedEof {
        StorageError::corrupt("unexpected end of file")
    } else {
        StorageError::Io(err)
    }
}

impl<R: Read> BinaryReader<R> {
    pub fn new(inner: R) -> Self {
        BinaryReader { inner }
    }

    pub fn u8(&mut self) -> Result<u8, StorageError> {
        self.inner.read_u8().map_err(map_eof)
    }

    pub fn u16(&mut self) -> Result<u16, StorageError> {
        self.inner.read_u16::<LittleEndian>().map_err(map_eof)
    }

    pub fn u32(&mut self) -> Result<u32, StorageError> {
        self.inner.read_u32::<LittleEndian>().map_err(map_eof)
    }

    pub fn u64(&mut self) -> Result<u64, StorageError> {
        self.inner.read_u64::<LittleEndian>().map_err(map_eof)
    }

    pub fn i32(&mut self) -> Result<i32, StorageError> {
        self.inner.read_i32::<LittleEndian>().map_err(map_eof)
    }

    pub fn i64(&mut self) -> Result<i64, StorageError> {
        self.inner.read_i64::<LittleEndian>().map_err(map_eof)
    }

    pub fn f64(&mut self) -> Result<f64, StorageError> {
        self.inner.read_f64::<LittleEndian>().map_err(map_eof)
    }

    /// Exactly `len` bytes.
    pub fn raw(&mut self, len: usize) -> Result<Vec<u8>, StorageError> {
        let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(StorageError::corrupt(format!(
                "expected {} bytes, file has {}",
                len,
                buf.len()
            )));
        }
        Ok(buf)
    }

    pub fn blob(&mut self) -> Result<Vec<u8>, StorageError> {
        let len = self.u32()? as usize;
        self.raw(len)
    }

    pub fn string(&mut self) -> Result<String, StorageError> {
        String::from_utf8(self.blob()?)
            .map_err(|e| StorageError::corrupt(format!("invalid UTF-8 string: {}", e)))
    }

    /// Consumes `magic` or fails with [`StorageError::BadMagic`].
    pub fn expect_magic(&mut self, magic: &'static [u8]) -> Result<(), StorageError> {
        let found = self.raw(magic.len()).map_err(|_| StorageError::BadMagic {
            expected: magic_name(magic),
        })?;
        if found != magic {
            return Err(StorageError::BadMagic {
                expected: magic_name(magic),
            });
        }
        Ok(())
    }
}

fn magic_name(magic: &'static [u8]) -> &'static str {
    std::str::from_utf8(magic).unwrap_or("<binary>")
}

// ---------------------------------------------------------------------------
// Bit vectors
// ---------------------------------------------------------------------------

/// Packs flags 8 per byte, least significant bit first.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

/// Inverse of [`pack_bits`]; `bytes` must hold at least `count` bits.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes.get(i / 8).is_some_and(|b| b & (1 << (i % 8)) != 0))
        .collect()
}

// ---------------------------------------------------------------------------
// Atomic file replacement
// ---------------------------------------------------------------------------

/// Writes `bytes` to a temporary file next to `path`, then renames it over
/// `path`. On failure the previous contents of `path` are untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
