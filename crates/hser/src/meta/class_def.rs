// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structural class definitions shipped once per peer session.
//!
//! A `ClassDef` is the canonical schema of a type: qualified name, ordered
//! field descriptors, and a small protocol-level ext-meta map. Its id is
//! content-addressed (hash of the serialized body), so two processes that
//! build the definition of an identical type agree on the id without
//! negotiation.

use super::content_hash64;
use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::types::{Field, FieldType, RType};
use std::collections::BTreeMap;

/// Ext-meta key flagging whether field descriptors were transmitted.
pub const SHARE_FIELDS_INFO_KEY: &str = "shareFieldsInfo";

/// Canonical structural description of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    name: String,
    id: u64,
    fields: Vec<Field>,
    ext_meta: BTreeMap<String, String>,
}

impl ClassDef {
    /// Build the full field-bearing definition of `rtype`.
    pub fn build(rtype: &RType) -> ClassDef {
        Self::assemble(
            rtype.qualified_name().to_owned(),
            rtype.fields().to_vec(),
            BTreeMap::new(),
        )
    }

    /// Build a name-only definition (`shareFieldsInfo = "false"`), used when
    /// the peer will deserialize with its own local schema.
    pub fn build_name_only(rtype: &RType) -> ClassDef {
        let mut ext_meta = BTreeMap::new();
        ext_meta.insert(SHARE_FIELDS_INFO_KEY.to_owned(), "false".to_owned());
        Self::assemble(rtype.qualified_name().to_owned(), Vec::new(), ext_meta)
    }

    fn assemble(name: String, fields: Vec<Field>, ext_meta: BTreeMap<String, String>) -> ClassDef {
        let mut def = ClassDef {
            name,
            id: 0,
            fields,
            ext_meta,
        };
        def.id = content_hash64(&def.encode_body());
        def
    }

    pub fn qualified_name(&self) -> &str {
        &self.name
    }

    /// Stable content-addressed id; equal ids mean semantically equal defs.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn ext_meta(&self) -> &BTreeMap<String, String> {
        &self.ext_meta
    }

    /// False when the definition was sent name-only.
    pub fn share_fields_info(&self) -> bool {
        self.ext_meta.get(SHARE_FIELDS_INFO_KEY).map(String::as_str) != Some("false")
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut body = Buffer::new();
        body.write_str(&self.name);
        body.write_var_u32(self.fields.len() as u32);
        for field in &self.fields {
            body.write_str(&field.name);
            body.write_u8(field.ty.wire_tag());
            if let FieldType::Object(type_name) = &field.ty {
                body.write_str(type_name);
            }
            body.write_str(&field.declared_in);
        }
        body.write_var_u32(self.ext_meta.len() as u32);
        for (key, value) in &self.ext_meta {
            body.write_str(key);
            body.write_str(value);
        }
        body.as_slice().to_vec()
    }

    /// Wire form: `[id: u64 LE][body]`.
    pub fn write(&self, buf: &mut Buffer) {
        buf.write_u64_le(self.id);
        buf.write_bytes(&self.encode_body());
    }

    pub fn read(buf: &mut Buffer) -> Result<ClassDef> {
        let id = buf.read_u64_le()?;
        let name = buf.read_str()?;
        let field_count = buf.read_var_u32()? as usize;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            let field_name = buf.read_str()?;
            let tag = buf.read_u8()?;
            let type_name = if tag == FieldType::Object(String::new()).wire_tag() {
                Some(buf.read_str()?)
            } else {
                None
            };
            let ty = FieldType::from_wire_tag(tag, type_name).ok_or_else(|| Error::InvalidData {
                reason: format!("unknown field type tag {tag}"),
            })?;
            let declared_in = buf.read_str()?;
            fields.push(Field {
                name: field_name,
                ty,
                declared_in,
            });
        }
        let ext_count = buf.read_var_u32()? as usize;
        let mut ext_meta = BTreeMap::new();
        for _ in 0..ext_count {
            let key = buf.read_str()?;
            let value = buf.read_str()?;
            ext_meta.insert(key, value);
        }
        let def = ClassDef {
            name,
            id,
            fields,
            ext_meta,
        };
        debug_assert_eq!(
            def.id,
            content_hash64(&def.encode_body()),
            "class def id does not match its body"
        );
        Ok(def)
    }
}
