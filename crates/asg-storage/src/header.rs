//! File header blocks.
//!
//! A graph file starts with a chain of typed blocks, each framed as
//! `{tag u16, len u32, payload}` and terminated by tag 0. The loader
//! dispatches on the tag: property blocks and origin blocks are decoded,
//! anything else is kept verbatim so that a rewrite preserves it.

use std::io::Write;

use asg_core::{NodeId, OriginMap, Schema};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::StorageError;
use crate::io::{BinaryReader, BinaryWriter};

pub const TAG_END: u16 = 0;
pub const TAG_PROPERTIES: u16 = 1;
pub const TAG_ORIGINS: u16 = 2;

pub const KEY_TYPE: &str = "Type";
pub const KEY_API_VERSION: &str = "APIVersion";
pub const KEY_BINARY_VERSION: &str = "BinaryVersion";
pub const KEY_LANGUAGE: &str = "Language";
pub const KEY_FULL_ANALYSIS: &str = "FullAnalysis";

/// Free-form key/value header properties, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PropertyData {
    props: IndexMap<String, String>,
}

impl PropertyData {
    pub fn new() -> Self {
        PropertyData::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.props.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.props.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    fn required(&self, key: &'static str) -> Result<&str, StorageError> {
        self.get(key).ok_or(StorageError::MissingHeaderField(key))
    }
}

/// A header block of a type this reader does not understand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownBlock {
    pub tag: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Header {
    pub properties: PropertyData,
    pub origins: OriginMap,
    pub unknown: Vec<UnknownBlock>,
}

impl Header {
    /// A header identifying files of `schema`.
    pub fn for_schema(schema: &Schema, full_analysis: bool) -> Self {
        let mut header = Header::default();
        header.stamp(schema);
        header
            .properties
            .set(KEY_FULL_ANALYSIS, if full_analysis { "true" } else { "false" });
        header
    }

    /// Overwrites the identity properties with those of `schema`, adding
    /// `FullAnalysis = true` when absent.
    pub fn stamp(&mut self, schema: &Schema) {
        self.properties.set(KEY_TYPE, schema.name());
        self.properties.set(KEY_API_VERSION, schema.api_version());
        self.properties.set(KEY_BINARY_VERSION, schema.binary_version());
        self.properties.set(KEY_LANGUAGE, schema.language());
        if self.properties.get(KEY_FULL_ANALYSIS).is_none() {
            self.properties.set(KEY_FULL_ANALYSIS, "true");
        }
    }

    /// `None` when the property is absent or not a boolean.
    pub fn full_analysis(&self) -> Option<bool> {
        match self.properties.get(KEY_FULL_ANALYSIS)? {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// Checks that this header describes a file `schema` can read.
    pub fn check(&self, schema: &Schema) -> Result<(), StorageError> {
        let ty = self.properties.required(KEY_TYPE)?;
        if ty != schema.name() {
            return Err(StorageError::WrongFileType {
                what: KEY_TYPE,
                expected: schema.name().to_string(),
                found: ty.to_string(),
            });
        }
        if let Some(language) = self.properties.get(KEY_LANGUAGE) {
            if language != schema.language() {
                return Err(StorageError::WrongFileType {
                    what: KEY_LANGUAGE,
                    expected: schema.language().to_string(),
                    found: language.to_string(),
                });
            }
        }
        let api = self.properties.required(KEY_API_VERSION)?;
        if api != schema.api_version() {
            return Err(StorageError::VersionMismatch {
                what: KEY_API_VERSION,
                expected: schema.api_version().to_string(),
                found: api.to_string(),
            });
        }
        let binary = self.properties.required(KEY_BINARY_VERSION)?;
        if binary != schema.binary_version() {
            return Err(StorageError::VersionMismatch {
                what: KEY_BINARY_VERSION,
                expected: schema.binary_version().to_string(),
                found: binary.to_string(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    pub(crate) fn write<W: Write>(&self, w: &mut BinaryWriter<W>) -> std::io::Result<()> {
        let mut props = BinaryWriter::new(Vec::new());
        props.u32(self.properties.len() as u32)?;
        for (key, value) in self.properties.iter() {
            props.str(key)?;
            props.str(value)?;
        }
        write_block(w, TAG_PROPERTIES, &props.into_inner())?;

        if !self.origins.is_empty() {
            let mut origins = BinaryWriter::new(Vec::new());
            origins.u32(self.origins.len() as u32)?;
            for entry in self.origins.iter() {
                origins.str(&entry.component)?;
                origins.u32(entry.pre_id.0)?;
                origins.u32(entry.id.0)?;
            }
            write_block(w, TAG_ORIGINS, &origins.into_inner())?;
        }

        for block in &self.unknown {
            write_block(w, block.tag, &block.payload)?;
        }
        w.u16(TAG_END)
    }

    /// Reads blocks up to and including the end tag. Repeated property
    /// blocks overwrite earlier keys; repeated origin blocks accumulate.
    pub(crate) fn read<R: std::io::Read>(r: &mut BinaryReader<R>) -> Result<Header, StorageError> {
        let mut header = Header::default();
        loop {
            let tag = r.u16()?;
            if tag == TAG_END {
                break;
            }
            let payload = r.blob()?;
            let mut block = BinaryReader::new(payload.as_slice());
            match tag {
                TAG_PROPERTIES => {
                    let count = block.u32()?;
                    for _ in 0..count {
                        let key = block.string()?;
                        let value = block.string()?;
                        header.properties.set(&key, &value);
                    }
                }
                TAG_ORIGINS => {
                    let count = block.u32()?;
                    for _ in 0..count {
                        let component = block.string()?;
                        let pre_id = NodeId(block.u32()?);
                        let id = NodeId(block.u32()?);
                        header.origins.push(&component, pre_id, id);
                    }
                }
                _ => {
                    tracing::debug!(tag, len = payload.len(), "keeping unknown header block");
                    header.unknown.push(UnknownBlock { tag, payload });
                }
            }
        }
        Ok(header)
    }
}

fn write_block<W: Write>(w: &mut BinaryWriter<W>, tag: u16, payload: &[u8]) -> std::io::Result<()> {
    w.u16(tag)?;
    w.blob(payload)
}
