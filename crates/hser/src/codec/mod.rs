// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec seam and the built-in codec family.
//!
//! The resolver selects a [`CodecKind`] per type (the selection cascade
//! lives in the resolver), then materializes a `Codec` trait object from
//! it. Codecs are deliberately shallow here: the resolver is the subject of
//! this crate, codecs are its collaborators. The structurally interesting
//! ones are the object codecs (declared-order, self-describing compatible,
//! generated-plan) and the meta-shared codec that decodes against a peer's
//! class definition.

mod meta_shared;
mod object;
pub mod value;

pub use meta_shared::{MetaSharedCodec, UnexistedCodec};
pub use object::{CompatibleObjectCodec, FieldPlan, GeneratedObjectCodec, ObjectCodec};
pub use value::Value;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::types::{PrimitiveKind, RType, TypeKind};
use std::sync::{Arc, OnceLock};

/// Identifies a codec family. Selection returns a kind; instantiation
/// turns the kind into a codec bound to a concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    Primitive,
    String,
    Enum,
    EnumSet,
    Charset,
    ObjectArray,
    Lambda,
    Proxy,
    Time,
    Externalizable,
    ImmutableList,
    ImmutableMap,
    ByteBuffer,
    Class,
    /// Collection that must round-trip through the legacy stream protocol.
    StreamCollection,
    StreamMap,
    DefaultCollection,
    CrossLangCollection,
    DefaultMap,
    CrossLangMap,
    ReplaceResolve,
    /// Configured fallback for types requiring legacy stream serialization.
    StreamFallback,
    Object,
    CompatibleObject,
    GeneratedObject,
    GeneratedCompatible,
    MetaShared,
    LazyInit,
    Unexisted,
}

impl CodecKind {
    /// Kinds whose payload layout follows the local schema, making a full
    /// field-bearing class def useful to the peer.
    pub fn is_schema_aware(self) -> bool {
        matches!(
            self,
            CodecKind::Object
                | CodecKind::GeneratedObject
                | CodecKind::LazyInit
                | CodecKind::MetaShared
        )
    }
}

/// Pluggable reader/writer for one type.
///
/// The bound codec may be swapped while shared (compilation upgrades), so
/// callers must re-fetch through [`ClassInfo`](crate::resolver::ClassInfo)
/// rather than caching the trait object.
pub trait Codec: Send + Sync {
    fn kind(&self) -> CodecKind;

    fn write_value(&self, buf: &mut Buffer, value: &Value) -> Result<()>;

    fn read_value(&self, buf: &mut Buffer) -> Result<Value>;

    /// Whether values of this type participate in reference tracking.
    fn needs_ref_tracking(&self) -> bool {
        true
    }

    /// Cross-language numeric type id, when this codec speaks it.
    fn xlang_type_id(&self) -> Option<i16> {
        None
    }

    /// Cross-language type tag, when this codec speaks it.
    fn xlang_type_tag(&self) -> Option<&str> {
        None
    }
}

impl std::fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Codec").field(&self.kind()).finish()
    }
}

/// Fixed-width primitive codec, also covering boxed forms.
pub struct PrimitiveCodec {
    kind: PrimitiveKind,
}

impl PrimitiveCodec {
    pub fn new(kind: PrimitiveKind) -> Self {
        PrimitiveCodec { kind }
    }
}

impl Codec for PrimitiveCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Primitive
    }

    fn write_value(&self, buf: &mut Buffer, value: &Value) -> Result<()> {
        match (self.kind, value) {
            (PrimitiveKind::Void, Value::Null) => {}
            (PrimitiveKind::Bool, Value::Bool(v)) => buf.write_u8(u8::from(*v)),
            (PrimitiveKind::I8, Value::I8(v)) => buf.write_i8(*v),
            (PrimitiveKind::Char, Value::Char(v)) => buf.write_u32_le(*v as u32),
            (PrimitiveKind::I16, Value::I16(v)) => buf.write_i16_le(*v),
            (PrimitiveKind::I32, Value::I32(v)) => buf.write_i32_le(*v),
            (PrimitiveKind::F32, Value::F32(v)) => buf.write_f32_le(*v),
            (PrimitiveKind::I64, Value::I64(v)) => buf.write_i64_le(*v),
            (PrimitiveKind::F64, Value::F64(v)) => buf.write_f64_le(*v),
            (kind, value) => {
                return Err(Error::InvalidData {
                    reason: format!("value {value:?} is not a {kind:?}"),
                })
            }
        }
        Ok(())
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        Ok(match self.kind {
            PrimitiveKind::Void => Value::Null,
            PrimitiveKind::Bool => Value::Bool(buf.read_u8()? != 0),
            PrimitiveKind::I8 => Value::I8(buf.read_i8()?),
            PrimitiveKind::Char => {
                let raw = buf.read_u32_le()?;
                Value::Char(char::from_u32(raw).ok_or_else(|| Error::InvalidData {
                    reason: format!("invalid char scalar {raw:#x}"),
                })?)
            }
            PrimitiveKind::I16 => Value::I16(buf.read_i16_le()?),
            PrimitiveKind::I32 => Value::I32(buf.read_i32_le()?),
            PrimitiveKind::F32 => Value::F32(buf.read_f32_le()?),
            PrimitiveKind::I64 => Value::I64(buf.read_i64_le()?),
            PrimitiveKind::F64 => Value::F64(buf.read_f64_le()?),
        })
    }

    fn needs_ref_tracking(&self) -> bool {
        false
    }

    fn xlang_type_id(&self) -> Option<i16> {
        Some(self.kind as i16 + 1)
    }
}

/// Varint-length-prefixed UTF-8.
pub struct StringCodec;

impl Codec for StringCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::String
    }

    fn write_value(&self, buf: &mut Buffer, value: &Value) -> Result<()> {
        match value {
            Value::Str(v) => {
                buf.write_str(v);
                Ok(())
            }
            other => Err(Error::InvalidData {
                reason: format!("value {other:?} is not a string"),
            }),
        }
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        Ok(Value::Str(buf.read_str()?))
    }

    fn needs_ref_tracking(&self) -> bool {
        false
    }
}

/// Enum constants by varint ordinal.
pub struct EnumCodec;

impl Codec for EnumCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Enum
    }

    fn write_value(&self, buf: &mut Buffer, value: &Value) -> Result<()> {
        match value {
            Value::Enum(ordinal) => {
                buf.write_var_u32(*ordinal);
                Ok(())
            }
            other => Err(Error::InvalidData {
                reason: format!("value {other:?} is not an enum constant"),
            }),
        }
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        Ok(Value::Enum(buf.read_var_u32()?))
    }

    fn needs_ref_tracking(&self) -> bool {
        false
    }
}

/// Sequence of self-describing elements; serves every collection-shaped
/// kind (arrays, lists, sets, enum-sets, immutable and stream variants).
pub struct ListCodec {
    kind: CodecKind,
}

impl ListCodec {
    pub fn new(kind: CodecKind) -> Self {
        ListCodec { kind }
    }
}

impl Codec for ListCodec {
    fn kind(&self) -> CodecKind {
        self.kind
    }

    fn write_value(&self, buf: &mut Buffer, value: &Value) -> Result<()> {
        match value {
            Value::List(items) => {
                buf.write_var_u32(items.len() as u32);
                for item in items {
                    value::write_tagged(buf, item)?;
                }
                Ok(())
            }
            other => Err(Error::InvalidData {
                reason: format!("value {other:?} is not a sequence"),
            }),
        }
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        let len = buf.read_var_u32()? as usize;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(value::read_tagged(buf)?);
        }
        Ok(Value::List(items))
    }
}

/// Key/value pairs of self-describing elements; serves every map-shaped
/// kind.
pub struct MapCodec {
    kind: CodecKind,
}

impl MapCodec {
    pub fn new(kind: CodecKind) -> Self {
        MapCodec { kind }
    }
}

impl Codec for MapCodec {
    fn kind(&self) -> CodecKind {
        self.kind
    }

    fn write_value(&self, buf: &mut Buffer, value: &Value) -> Result<()> {
        match value {
            Value::Map(entries) => {
                buf.write_var_u32(entries.len() as u32);
                for (key, val) in entries {
                    value::write_tagged(buf, key)?;
                    value::write_tagged(buf, val)?;
                }
                Ok(())
            }
            other => Err(Error::InvalidData {
                reason: format!("value {other:?} is not a map"),
            }),
        }
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        let len = buf.read_var_u32()? as usize;
        let mut entries = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            let key = value::read_tagged(buf)?;
            let val = value::read_tagged(buf)?;
            entries.push((key, val));
        }
        Ok(Value::Map(entries))
    }
}

/// Opaque length-prefixed payload. Covers the kinds whose internals are
/// delegated to the runtime binding (lambdas, proxies, time types,
/// externalizable values, byte buffers, stream fallbacks, ...).
pub struct BlobCodec {
    kind: CodecKind,
    tag: Option<String>,
}

impl BlobCodec {
    pub fn new(kind: CodecKind) -> Self {
        BlobCodec { kind, tag: None }
    }

    /// Attach a cross-language type tag.
    pub fn with_tag(kind: CodecKind, tag: impl Into<String>) -> Self {
        BlobCodec {
            kind,
            tag: Some(tag.into()),
        }
    }
}

impl Codec for BlobCodec {
    fn kind(&self) -> CodecKind {
        self.kind
    }

    fn write_value(&self, buf: &mut Buffer, value: &Value) -> Result<()> {
        match value {
            Value::Bytes(bytes) => {
                buf.write_var_u32(bytes.len() as u32);
                buf.write_bytes(bytes);
                Ok(())
            }
            other => Err(Error::InvalidData {
                reason: format!("value {other:?} is not an opaque payload"),
            }),
        }
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        let len = buf.read_var_u32()? as usize;
        Ok(Value::Bytes(buf.read_bytes(len)?.to_vec()))
    }

    fn xlang_type_tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

/// Interim codec breaking circular selection; upgrades itself once the
/// real codec is available.
pub struct LazyInitCodec {
    slot: OnceLock<Arc<dyn Codec>>,
}

impl LazyInitCodec {
    pub fn new() -> Self {
        LazyInitCodec {
            slot: OnceLock::new(),
        }
    }

    /// Install the concrete codec. Later calls are ignored.
    pub fn resolve(&self, codec: Arc<dyn Codec>) {
        let _ = self.slot.set(codec);
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }

    fn target(&self) -> Result<&Arc<dyn Codec>> {
        self.slot.get().ok_or_else(|| Error::InvalidData {
            reason: "lazily-initialized codec used before resolution".into(),
        })
    }
}

impl Default for LazyInitCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for LazyInitCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::LazyInit
    }

    fn write_value(&self, buf: &mut Buffer, value: &Value) -> Result<()> {
        self.target()?.write_value(buf, value)
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        self.target()?.read_value(buf)
    }
}

/// Materialize a codec from a selected kind.
///
/// `MetaShared` and `Unexisted` need a peer class definition and are built
/// at their dedicated call sites, not here.
pub fn new_codec(kind: CodecKind, rtype: &RType) -> Result<Arc<dyn Codec>> {
    Ok(match kind {
        CodecKind::Primitive => {
            let prim = match rtype.kind() {
                TypeKind::Primitive(k) | TypeKind::Boxed(k) => k,
                other => {
                    return Err(Error::InvalidData {
                        reason: format!("primitive codec for non-primitive kind {other:?}"),
                    })
                }
            };
            Arc::new(PrimitiveCodec::new(prim))
        }
        CodecKind::String => Arc::new(StringCodec),
        CodecKind::Enum => Arc::new(EnumCodec),
        CodecKind::EnumSet
        | CodecKind::ObjectArray
        | CodecKind::ImmutableList
        | CodecKind::StreamCollection
        | CodecKind::DefaultCollection
        | CodecKind::CrossLangCollection => Arc::new(ListCodec::new(kind)),
        CodecKind::ImmutableMap
        | CodecKind::StreamMap
        | CodecKind::DefaultMap
        | CodecKind::CrossLangMap => Arc::new(MapCodec::new(kind)),
        CodecKind::Charset
        | CodecKind::Lambda
        | CodecKind::Proxy
        | CodecKind::Time
        | CodecKind::Externalizable
        | CodecKind::ByteBuffer
        | CodecKind::Class
        | CodecKind::ReplaceResolve
        | CodecKind::StreamFallback => Arc::new(BlobCodec::new(kind)),
        CodecKind::Object => Arc::new(ObjectCodec::new(rtype.clone())),
        CodecKind::CompatibleObject => Arc::new(CompatibleObjectCodec::new(rtype.clone())),
        CodecKind::GeneratedObject => {
            Arc::new(GeneratedObjectCodec::new(FieldPlan::of(rtype).into(), false))
        }
        CodecKind::GeneratedCompatible => {
            Arc::new(GeneratedObjectCodec::new(FieldPlan::of(rtype).into(), true))
        }
        CodecKind::LazyInit => Arc::new(LazyInitCodec::new()),
        CodecKind::MetaShared | CodecKind::Unexisted => {
            return Err(Error::InvalidData {
                reason: format!("{kind:?} codec requires a class definition"),
            })
        }
    })
}
