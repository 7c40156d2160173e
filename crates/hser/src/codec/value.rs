// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic values and their wire encoding.
//!
//! Codecs operate on `Value` so the resolver can be exercised without
//! compile-time knowledge of payload types. Two encodings exist:
//!
//! - *field-typed*: the declared [`FieldType`] directs the layout
//!   (fixed-width primitives, length-prefixed variable data), used inside
//!   object payloads where both sides know the schema;
//! - *tagged*: a leading tag byte makes the value self-describing, used for
//!   container elements.
//!
//! Every variable-width field is length-prefixed so unknown fields can be
//! skipped without understanding them.

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::types::FieldType;

/// A dynamically-typed payload value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    /// Enum constant by ordinal.
    Enum(u32),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct {
        type_name: String,
        fields: Vec<(String, Value)>,
    },
}

impl Value {
    /// Default value for a declared field type (used for fields the peer
    /// did not transmit).
    pub fn default_for(ty: &FieldType) -> Value {
        match ty {
            FieldType::Bool => Value::Bool(false),
            FieldType::I8 => Value::I8(0),
            FieldType::I16 => Value::I16(0),
            FieldType::I32 => Value::I32(0),
            FieldType::I64 => Value::I64(0),
            FieldType::F32 => Value::F32(0.0),
            FieldType::F64 => Value::F64(0.0),
            FieldType::Str => Value::Str(String::new()),
            FieldType::Bytes => Value::Bytes(Vec::new()),
            FieldType::Object(_) => Value::Null,
        }
    }

    pub fn struct_field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct { fields, .. } => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }
}

// Tags of the self-describing encoding.
const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_I8: u8 = 2;
const TAG_I16: u8 = 3;
const TAG_I32: u8 = 4;
const TAG_I64: u8 = 5;
const TAG_F32: u8 = 6;
const TAG_F64: u8 = 7;
const TAG_CHAR: u8 = 8;
const TAG_STR: u8 = 9;
const TAG_BYTES: u8 = 10;
const TAG_ENUM: u8 = 11;
const TAG_LIST: u8 = 12;
const TAG_MAP: u8 = 13;

/// Write a self-describing (tagged) value.
pub fn write_tagged(buf: &mut Buffer, value: &Value) -> Result<()> {
    match value {
        Value::Null => buf.write_u8(TAG_NULL),
        Value::Bool(v) => {
            buf.write_u8(TAG_BOOL);
            buf.write_u8(u8::from(*v));
        }
        Value::I8(v) => {
            buf.write_u8(TAG_I8);
            buf.write_i8(*v);
        }
        Value::I16(v) => {
            buf.write_u8(TAG_I16);
            buf.write_i16_le(*v);
        }
        Value::I32(v) => {
            buf.write_u8(TAG_I32);
            buf.write_i32_le(*v);
        }
        Value::I64(v) => {
            buf.write_u8(TAG_I64);
            buf.write_i64_le(*v);
        }
        Value::F32(v) => {
            buf.write_u8(TAG_F32);
            buf.write_f32_le(*v);
        }
        Value::F64(v) => {
            buf.write_u8(TAG_F64);
            buf.write_f64_le(*v);
        }
        Value::Char(v) => {
            buf.write_u8(TAG_CHAR);
            buf.write_u32_le(*v as u32);
        }
        Value::Str(v) => {
            buf.write_u8(TAG_STR);
            buf.write_str(v);
        }
        Value::Bytes(v) => {
            buf.write_u8(TAG_BYTES);
            buf.write_var_u32(v.len() as u32);
            buf.write_bytes(v);
        }
        Value::Enum(ordinal) => {
            buf.write_u8(TAG_ENUM);
            buf.write_var_u32(*ordinal);
        }
        Value::List(items) => {
            buf.write_u8(TAG_LIST);
            buf.write_var_u32(items.len() as u32);
            for item in items {
                write_tagged(buf, item)?;
            }
        }
        Value::Map(entries) => {
            buf.write_u8(TAG_MAP);
            buf.write_var_u32(entries.len() as u32);
            for (key, val) in entries {
                write_tagged(buf, key)?;
                write_tagged(buf, val)?;
            }
        }
        Value::Struct { type_name, .. } => {
            return Err(Error::Unsupported {
                reason: format!(
                    "struct value {type_name} cannot be encoded self-describing; \
                     use its type-bound codec"
                ),
            });
        }
    }
    Ok(())
}

/// Read a self-describing (tagged) value.
pub fn read_tagged(buf: &mut Buffer) -> Result<Value> {
    let tag = buf.read_u8()?;
    Ok(match tag {
        TAG_NULL => Value::Null,
        TAG_BOOL => Value::Bool(buf.read_u8()? != 0),
        TAG_I8 => Value::I8(buf.read_i8()?),
        TAG_I16 => Value::I16(buf.read_i16_le()?),
        TAG_I32 => Value::I32(buf.read_i32_le()?),
        TAG_I64 => Value::I64(buf.read_i64_le()?),
        TAG_F32 => Value::F32(buf.read_f32_le()?),
        TAG_F64 => Value::F64(buf.read_f64_le()?),
        TAG_CHAR => {
            let raw = buf.read_u32_le()?;
            Value::Char(char::from_u32(raw).ok_or_else(|| Error::InvalidData {
                reason: format!("invalid char scalar {raw:#x}"),
            })?)
        }
        TAG_STR => Value::Str(buf.read_str()?),
        TAG_BYTES => {
            let len = buf.read_var_u32()? as usize;
            Value::Bytes(buf.read_bytes(len)?.to_vec())
        }
        TAG_ENUM => Value::Enum(buf.read_var_u32()?),
        TAG_LIST => {
            let len = buf.read_var_u32()? as usize;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(read_tagged(buf)?);
            }
            Value::List(items)
        }
        TAG_MAP => {
            let len = buf.read_var_u32()? as usize;
            let mut entries = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                let key = read_tagged(buf)?;
                let val = read_tagged(buf)?;
                entries.push((key, val));
            }
            Value::Map(entries)
        }
        other => {
            return Err(Error::InvalidData {
                reason: format!("unknown value tag {other}"),
            })
        }
    })
}

/// Write a value with the layout directed by its declared field type.
pub fn write_field(buf: &mut Buffer, ty: &FieldType, value: &Value) -> Result<()> {
    match (ty, value) {
        (FieldType::Bool, Value::Bool(v)) => buf.write_u8(u8::from(*v)),
        (FieldType::I8, Value::I8(v)) => buf.write_i8(*v),
        (FieldType::I16, Value::I16(v)) => buf.write_i16_le(*v),
        (FieldType::I32, Value::I32(v)) => buf.write_i32_le(*v),
        (FieldType::I64, Value::I64(v)) => buf.write_i64_le(*v),
        (FieldType::F32, Value::F32(v)) => buf.write_f32_le(*v),
        (FieldType::F64, Value::F64(v)) => buf.write_f64_le(*v),
        (FieldType::Str, Value::Str(v)) => buf.write_str(v),
        (FieldType::Bytes, Value::Bytes(v)) => {
            buf.write_var_u32(v.len() as u32);
            buf.write_bytes(v);
        }
        (FieldType::Object(_), Value::Null) => buf.write_u8(0),
        (FieldType::Object(_), Value::Bytes(blob)) => {
            buf.write_u8(1);
            buf.write_var_u32(blob.len() as u32);
            buf.write_bytes(blob);
        }
        (ty, value) => {
            return Err(Error::InvalidData {
                reason: format!("value {value:?} does not match declared field type {ty:?}"),
            })
        }
    }
    Ok(())
}

/// Read a value with the layout directed by its declared field type.
pub fn read_field(buf: &mut Buffer, ty: &FieldType) -> Result<Value> {
    Ok(match ty {
        FieldType::Bool => Value::Bool(buf.read_u8()? != 0),
        FieldType::I8 => Value::I8(buf.read_i8()?),
        FieldType::I16 => Value::I16(buf.read_i16_le()?),
        FieldType::I32 => Value::I32(buf.read_i32_le()?),
        FieldType::I64 => Value::I64(buf.read_i64_le()?),
        FieldType::F32 => Value::F32(buf.read_f32_le()?),
        FieldType::F64 => Value::F64(buf.read_f64_le()?),
        FieldType::Str => Value::Str(buf.read_str()?),
        FieldType::Bytes => {
            let len = buf.read_var_u32()? as usize;
            Value::Bytes(buf.read_bytes(len)?.to_vec())
        }
        FieldType::Object(_) => {
            if buf.read_u8()? == 0 {
                Value::Null
            } else {
                let len = buf.read_var_u32()? as usize;
                Value::Bytes(buf.read_bytes(len)?.to_vec())
            }
        }
    })
}

/// Advance past a field value without materializing it.
pub fn skip_field(buf: &mut Buffer, ty: &FieldType) -> Result<()> {
    match ty {
        FieldType::Bool | FieldType::I8 => buf.skip(1),
        FieldType::I16 => buf.skip(2),
        FieldType::I32 | FieldType::F32 => buf.skip(4),
        FieldType::I64 | FieldType::F64 => buf.skip(8),
        FieldType::Str | FieldType::Bytes => {
            let len = buf.read_var_u32()? as usize;
            buf.skip(len)
        }
        FieldType::Object(_) => {
            if buf.read_u8()? == 0 {
                Ok(())
            } else {
                let len = buf.read_var_u32()? as usize;
                buf.skip(len)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_roundtrip() {
        let values = [
            Value::Null,
            Value::Bool(true),
            Value::I8(-3),
            Value::I32(1_000_000),
            Value::I64(-7),
            Value::F64(2.5),
            Value::Char('λ'),
            Value::Str("hello".into()),
            Value::Bytes(vec![1, 2, 3]),
            Value::Enum(4),
            Value::List(vec![Value::I32(1), Value::Str("x".into())]),
            Value::Map(vec![(Value::Str("k".into()), Value::I64(9))]),
        ];
        let mut buf = Buffer::new();
        for v in &values {
            write_tagged(&mut buf, v).expect("write");
        }
        for v in &values {
            assert_eq!(&read_tagged(&mut buf).expect("read"), v);
        }
        assert!(buf.is_eof());
    }

    #[test]
    fn test_struct_is_not_self_describing() {
        let mut buf = Buffer::new();
        let err = write_tagged(
            &mut buf,
            &Value::Struct {
                type_name: "user.Foo".into(),
                fields: vec![],
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[test]
    fn test_field_typed_roundtrip_and_skip() {
        let fields = [
            (FieldType::I32, Value::I32(42)),
            (FieldType::Str, Value::Str("abc".into())),
            (FieldType::Object("user.Other".into()), Value::Null),
            (
                FieldType::Object("user.Other".into()),
                Value::Bytes(vec![9, 9]),
            ),
            (FieldType::F64, Value::F64(1.25)),
        ];
        let mut buf = Buffer::new();
        for (ty, v) in &fields {
            write_field(&mut buf, ty, v).expect("write");
        }
        for (ty, v) in &fields {
            assert_eq!(&read_field(&mut buf, ty).expect("read"), v);
        }

        // Same stream again, skipping everything.
        let mut buf = Buffer::new();
        for (ty, v) in &fields {
            write_field(&mut buf, ty, v).expect("write");
        }
        for (ty, _) in &fields {
            skip_field(&mut buf, ty).expect("skip");
        }
        assert!(buf.is_eof());
    }

    #[test]
    fn test_field_type_mismatch_is_rejected() {
        let mut buf = Buffer::new();
        let err = write_field(&mut buf, &FieldType::I32, &Value::Str("no".into())).unwrap_err();
        assert!(matches!(err, Error::InvalidData { .. }));
    }

    #[test]
    fn test_defaults_match_declared_types() {
        assert_eq!(Value::default_for(&FieldType::I64), Value::I64(0));
        assert_eq!(Value::default_for(&FieldType::Str), Value::Str(String::new()));
        assert_eq!(
            Value::default_for(&FieldType::Object("user.X".into())),
            Value::Null
        );
    }
}
