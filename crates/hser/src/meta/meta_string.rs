// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interned byte strings on the wire.
//!
//! The first occurrence of a string in a stream carries its bytes and is
//! implicitly assigned the next dynamic id; later occurrences carry only
//! that id. Writer and reader assign ids in the same order, so no id is
//! ever transmitted explicitly on first use.
//!
//! Record layout: `varint(len << 1)` + bytes for a first occurrence,
//! `varint(id << 1 | 1)` for a back-reference.

use super::content_hash64;
use crate::buffer::Buffer;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable byte string with a precomputed 64-bit content hash.
#[derive(Clone)]
pub struct MetaString {
    bytes: Arc<[u8]>,
    hash: u64,
}

impl MetaString {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        MetaString {
            bytes: Arc::from(bytes),
            hash: content_hash64(bytes),
        }
    }

    pub fn from_str(value: &str) -> Self {
        Self::from_bytes(value.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn hash64(&self) -> u64 {
        self.hash
    }

    pub fn as_utf8(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes).map_err(|_| Error::InvalidData {
            reason: "meta string is not valid UTF-8".into(),
        })
    }
}

impl PartialEq for MetaString {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.bytes == other.bytes
    }
}

impl Eq for MetaString {}

impl std::hash::Hash for MetaString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl std::fmt::Debug for MetaString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.bytes) {
            Ok(s) => write!(f, "MetaString({s:?})"),
            Err(_) => write!(f, "MetaString({} bytes)", self.bytes.len()),
        }
    }
}

/// Per-stream interning state for meta strings.
///
/// The write side and the read side are independent; a resolver typically
/// uses one direction per stream.
pub struct MetaStringResolver {
    write_ids: HashMap<MetaString, u32>,
    read_table: Vec<MetaString>,
}

impl MetaStringResolver {
    pub fn new() -> Self {
        MetaStringResolver {
            write_ids: HashMap::new(),
            read_table: Vec::new(),
        }
    }

    pub fn write_meta_string(&mut self, buf: &mut Buffer, value: &MetaString) {
        if let Some(id) = self.write_ids.get(value) {
            buf.write_var_u32((id << 1) | 1);
        } else {
            let id = self.write_ids.len() as u32;
            buf.write_var_u32((value.as_bytes().len() as u32) << 1);
            buf.write_bytes(value.as_bytes());
            self.write_ids.insert(value.clone(), id);
        }
    }

    pub fn read_meta_string(&mut self, buf: &mut Buffer) -> Result<MetaString> {
        let header = buf.read_var_u32()?;
        if header & 1 == 1 {
            let id = (header >> 1) as usize;
            self.read_table
                .get(id)
                .cloned()
                .ok_or_else(|| Error::InvalidData {
                    reason: format!("unknown interned string id {id}"),
                })
        } else {
            let len = (header >> 1) as usize;
            let value = MetaString::from_bytes(buf.read_bytes(len)?);
            self.read_table.push(value.clone());
            Ok(value)
        }
    }

    pub fn reset_write(&mut self) {
        self.write_ids.clear();
    }

    pub fn reset_read(&mut self) {
        self.read_table.clear();
    }
}

impl Default for MetaStringResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_carries_bytes() {
        let mut resolver = MetaStringResolver::new();
        let mut buf = Buffer::new();
        let name = MetaString::from_str("user");
        resolver.write_meta_string(&mut buf, &name);
        // header = len 4 << 1 = 8, then the raw bytes.
        assert_eq!(buf.as_slice(), &[8, b'u', b's', b'e', b'r']);
    }

    #[test]
    fn test_second_occurrence_is_id_only() {
        let mut writer = MetaStringResolver::new();
        let mut buf = Buffer::new();
        let a = MetaString::from_str("user");
        let b = MetaString::from_str("App$Foo");
        writer.write_meta_string(&mut buf, &a);
        writer.write_meta_string(&mut buf, &b);
        let before = buf.writer_index();
        writer.write_meta_string(&mut buf, &a);
        writer.write_meta_string(&mut buf, &b);
        // Back-references: id 0 -> 0x01, id 1 -> 0x03.
        assert_eq!(&buf.as_slice()[before..], &[0x01, 0x03]);

        let mut reader = MetaStringResolver::new();
        for expected in [&a, &b, &a, &b] {
            let got = reader.read_meta_string(&mut buf).expect("meta string");
            assert_eq!(&got, expected);
            assert_eq!(got.hash64(), expected.hash64());
        }
    }

    #[test]
    fn test_unknown_back_reference_is_invalid() {
        let mut reader = MetaStringResolver::new();
        let mut buf = Buffer::from_vec(vec![0x05]); // id 2, nothing interned
        assert!(reader.read_meta_string(&mut buf).is_err());
    }

    #[test]
    fn test_reset_clears_interning_state() {
        let mut resolver = MetaStringResolver::new();
        let mut buf = Buffer::new();
        let name = MetaString::from_str("user");
        resolver.write_meta_string(&mut buf, &name);
        resolver.reset_write();
        resolver.write_meta_string(&mut buf, &name);
        // Both occurrences carry bytes after the reset.
        assert_eq!(buf.as_slice().len(), 2 * 5);
    }
}
