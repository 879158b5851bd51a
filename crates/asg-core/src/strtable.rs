//! String interning.
//!
//! Every string attribute of every node is stored as a [`StrKey`]. The table
//! deduplicates text, keeps keys stable for its lifetime and merges with an
//! explicit old-to-new [`KeyRemap`]. Key `0` always denotes the empty string
//! and is never stored.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::StrKey;

/// Persistence class of an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrType {
    /// Written when all strings are saved, or when referenced by a live node.
    #[default]
    Default,
    /// Never written to disk.
    Tmp,
    /// Always written, even when only referenced strings are saved.
    ToSave,
}

#[derive(Debug, Clone)]
struct Entry {
    text: String,
    ty: StrType,
}

/// Deduplicating string table.
///
/// Entries are keyed sparsely: a table restored from a file may have gaps
/// where unsaved strings used to be, and fresh keys fill those gaps.
#[derive(Debug, Clone)]
pub struct StringTable {
    entries: BTreeMap<StrKey, Entry>,
    lookup: HashMap<String, StrKey>,
    /// Lowest key that may still be free.
    next: u32,
}

impl Default for StringTable {
    fn default() -> Self {
        StringTable::new()
    }
}

/// Mapping from keys of a merged-in table to keys of the receiving table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRemap {
    map: HashMap<StrKey, StrKey>,
}

impl KeyRemap {
    /// New key for `old`. The empty key maps to itself; keys the source table
    /// did not contain map to the empty key.
    pub fn get(&self, old: StrKey) -> StrKey {
        if old.is_empty() {
            return StrKey::EMPTY;
        }
        self.map.get(&old).copied().unwrap_or(StrKey::EMPTY)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl StringTable {
    pub fn new() -> Self {
        StringTable {
            entries: BTreeMap::new(),
            lookup: HashMap::new(),
            next: 1,
        }
    }

    /// Interns `text`, returning the existing key when already present.
    pub fn intern(&mut self, text: &str) -> StrKey {
        self.intern_typed(text, StrType::Default)
    }

    /// Interns `text` with a persistence class. Re-interning an existing
    /// string upgrades `Tmp` to the requested class.
    pub fn intern_typed(&mut self, text: &str, ty: StrType) -> StrKey {
        if text.is_empty() {
            return StrKey::EMPTY;
        }
        if let Some(&key) = self.lookup.get(text) {
            if let Some(entry) = self.entries.get_mut(&key) {
                if entry.ty == StrType::Tmp && ty != StrType::Tmp {
                    entry.ty = ty;
                }
            }
            return key;
        }
        while self.entries.contains_key(&StrKey(self.next)) {
            self.next += 1;
        }
        let key = StrKey(self.next);
        self.next += 1;
        self.entries.insert(
            key,
            Entry {
                text: text.to_string(),
                ty,
            },
        );
        self.lookup.insert(text.to_string(), key);
        key
    }

    /// Text for `key`. Unknown keys and the empty key yield `""`.
    pub fn get(&self, key: StrKey) -> &str {
        self.try_get(key).unwrap_or("")
    }

    pub fn try_get(&self, key: StrKey) -> Option<&str> {
        if key.is_empty() {
            return Some("");
        }
        self.entries.get(&key).map(|entry| entry.text.as_str())
    }

    /// Key of `text` if it is interned.
    pub fn lookup(&self, text: &str) -> Option<StrKey> {
        if text.is_empty() {
            return Some(StrKey::EMPTY);
        }
        self.lookup.get(text).copied()
    }

    pub fn str_type(&self, key: StrKey) -> Option<StrType> {
        self.entries.get(&key).map(|entry| entry.ty)
    }

    pub fn set_type(&mut self, key: StrKey, ty: StrType) -> bool {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.ty = ty;
                true
            }
            None => false,
        }
    }

    /// Restores an entry under a fixed key, as read from a graph file.
    ///
    /// Restoring the same pair twice is a no-op; a key that is taken by other
    /// text, or text already interned under another key, is a conflict.
    pub fn insert_with_key(&mut self, key: StrKey, text: &str) -> Result<(), CoreError> {
        if key.is_empty() {
            return if text.is_empty() {
                Ok(())
            } else {
                Err(CoreError::StringKeyConflict { key })
            };
        }
        if let Some(existing) = self.lookup.get(text) {
            return if *existing == key {
                Ok(())
            } else {
                Err(CoreError::StringKeyConflict { key })
            };
        }
        if self.entries.contains_key(&key) {
            return Err(CoreError::StringKeyConflict { key });
        }
        self.entries.insert(
            key,
            Entry {
                text: text.to_string(),
                ty: StrType::Default,
            },
        );
        self.lookup.insert(text.to_string(), key);
        Ok(())
    }

    /// Interns every string of `other` into `self`.
    pub fn merge_from(&mut self, other: &StringTable) -> KeyRemap {
        let mut remap = KeyRemap::default();
        for (old, text, ty) in other.iter() {
            let new = self.intern_typed(text, ty);
            remap.map.insert(old, new);
        }
        remap
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (StrKey, &str, StrType)> + '_ {
        self.entries
            .iter()
            .map(|(key, entry)| (*key, entry.text.as_str(), entry.ty))
    }

    /// Number of interned strings, excluding the empty string.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}
