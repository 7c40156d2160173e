// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codecs driven by a peer's class definition.

use super::value::{self, Value};
use super::{Codec, CodecKind};
use crate::buffer::Buffer;
use crate::error::Result;
use crate::meta::ClassDef;
use crate::types::RType;
use std::sync::Arc;

/// Decodes payloads laid out in the *sender's* field order (carried by the
/// received [`ClassDef`]), mapping them onto the local type: fields the
/// local type lacks are skipped, local fields the sender lacks default.
pub struct MetaSharedCodec {
    local: RType,
    def: Arc<ClassDef>,
}

impl MetaSharedCodec {
    pub fn new(local: RType, def: Arc<ClassDef>) -> Self {
        MetaSharedCodec { local, def }
    }

    pub fn class_def(&self) -> &Arc<ClassDef> {
        &self.def
    }

    fn has_local_field(&self, name: &str) -> bool {
        self.local.fields().iter().any(|f| f.name == name)
    }
}

impl Codec for MetaSharedCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::MetaShared
    }

    fn write_value(&self, buf: &mut Buffer, val: &Value) -> Result<()> {
        // Writing also follows the def order, so a stream stays
        // self-consistent when a value is re-emitted.
        for field in self.def.fields() {
            match val.struct_field(&field.name) {
                Some(field_value) => value::write_field(buf, &field.ty, field_value)?,
                None => value::write_field(buf, &field.ty, &Value::default_for(&field.ty))?,
            }
        }
        Ok(())
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        let mut fields = Vec::with_capacity(self.local.fields().len());
        for field in self.def.fields() {
            if self.has_local_field(&field.name) {
                fields.push((field.name.clone(), value::read_field(buf, &field.ty)?));
            } else {
                value::skip_field(buf, &field.ty)?;
            }
        }
        for local_field in self.local.fields() {
            if !fields.iter().any(|(n, _)| n == &local_field.name) {
                fields.push((
                    local_field.name.clone(),
                    Value::default_for(&local_field.ty),
                ));
            }
        }
        Ok(Value::Struct {
            type_name: self.local.qualified_name().to_owned(),
            fields,
        })
    }
}

/// Codec for types that do not exist locally. With a class definition the
/// payload is fully decoded (and can be re-emitted); without one nothing
/// is consumed.
pub struct UnexistedCodec {
    def: Option<Arc<ClassDef>>,
}

impl UnexistedCodec {
    pub fn new(def: Option<Arc<ClassDef>>) -> Self {
        UnexistedCodec { def }
    }
}

impl Codec for UnexistedCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Unexisted
    }

    fn write_value(&self, buf: &mut Buffer, val: &Value) -> Result<()> {
        if let Some(def) = &self.def {
            for field in def.fields() {
                match val.struct_field(&field.name) {
                    Some(field_value) => value::write_field(buf, &field.ty, field_value)?,
                    None => value::write_field(buf, &field.ty, &Value::default_for(&field.ty))?,
                }
            }
        }
        Ok(())
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        let Some(def) = &self.def else {
            return Ok(Value::Struct {
                type_name: String::new(),
                fields: Vec::new(),
            });
        };
        let mut fields = Vec::with_capacity(def.fields().len());
        for field in def.fields() {
            fields.push((field.name.clone(), value::read_field(buf, &field.ty)?));
        }
        Ok(Value::Struct {
            type_name: def.qualified_name().to_owned(),
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;

    fn sender_type() -> RType {
        // The peer's view: has "gone" which we lack, lacks "local_only".
        RType::builder("user", "Evolved")
            .field("a", FieldType::I32)
            .field("gone", FieldType::Str)
            .field("b", FieldType::I64)
            .build()
    }

    fn local_type() -> RType {
        RType::builder("user", "Evolved")
            .field("a", FieldType::I32)
            .field("b", FieldType::I64)
            .field("local_only", FieldType::Bool)
            .build()
    }

    #[test]
    fn test_meta_shared_skips_and_defaults() {
        let def = Arc::new(ClassDef::build(&sender_type()));
        let writer = MetaSharedCodec::new(sender_type(), def.clone());
        let reader = MetaSharedCodec::new(local_type(), def);

        let mut buf = Buffer::new();
        writer
            .write_value(
                &mut buf,
                &Value::Struct {
                    type_name: "user.Evolved".into(),
                    fields: vec![
                        ("a".into(), Value::I32(1)),
                        ("gone".into(), Value::Str("dropped".into())),
                        ("b".into(), Value::I64(2)),
                    ],
                },
            )
            .expect("write");

        let back = reader.read_value(&mut buf).expect("read");
        assert!(buf.is_eof());
        assert_eq!(back.struct_field("a"), Some(&Value::I32(1)));
        assert_eq!(back.struct_field("b"), Some(&Value::I64(2)));
        // Sender-only field skipped, local-only field defaulted.
        assert_eq!(back.struct_field("gone"), None);
        assert_eq!(back.struct_field("local_only"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_unexisted_codec_preserves_payload() {
        let def = Arc::new(ClassDef::build(&sender_type()));
        let codec = UnexistedCodec::new(Some(def.clone()));
        let original = Value::Struct {
            type_name: "user.Evolved".into(),
            fields: vec![
                ("a".into(), Value::I32(5)),
                ("gone".into(), Value::Str("kept".into())),
                ("b".into(), Value::I64(6)),
            ],
        };

        let mut buf = Buffer::new();
        codec.write_value(&mut buf, &original).expect("write");
        let back = codec.read_value(&mut buf).expect("read");
        assert_eq!(back.struct_field("gone"), Some(&Value::Str("kept".into())));

        // Round-trip the recovered value byte-identically.
        let mut again = Buffer::new();
        codec.write_value(&mut again, &back).expect("write");
        let mut reference = Buffer::new();
        codec.write_value(&mut reference, &original).expect("write");
        assert_eq!(again.as_slice(), reference.as_slice());
    }

    #[test]
    fn test_unexisted_codec_without_def_reads_nothing() {
        let codec = UnexistedCodec::new(None);
        let mut buf = Buffer::from_vec(vec![1, 2, 3]);
        let back = codec.read_value(&mut buf).expect("read");
        assert_eq!(buf.reader_index(), 0);
        assert!(matches!(back, Value::Struct { ref fields, .. } if fields.is_empty()));
    }
}
