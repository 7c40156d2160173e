// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object codecs: schema-consistent, compatible, and generated-plan.

use super::value::{self, Value};
use super::{Codec, CodecKind};
use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::types::{FieldType, RType};
use std::sync::Arc;

/// Precomputed field walk for a struct type: names and declared types in
/// declaration order. This is what codec compilation produces.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlan {
    type_name: String,
    entries: Vec<(String, FieldType)>,
}

impl FieldPlan {
    pub fn of(rtype: &RType) -> FieldPlan {
        FieldPlan {
            type_name: rtype.qualified_name().to_owned(),
            entries: rtype
                .fields()
                .iter()
                .map(|f| (f.name.clone(), f.ty.clone()))
                .collect(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn entries(&self) -> &[(String, FieldType)] {
        &self.entries
    }

    fn write_declared_order(&self, buf: &mut Buffer, val: &Value) -> Result<()> {
        for (name, ty) in &self.entries {
            match val.struct_field(name) {
                Some(field_value) => value::write_field(buf, ty, field_value)?,
                None => value::write_field(buf, ty, &Value::default_for(ty))?,
            }
        }
        Ok(())
    }

    fn read_declared_order(&self, buf: &mut Buffer) -> Result<Value> {
        let mut fields = Vec::with_capacity(self.entries.len());
        for (name, ty) in &self.entries {
            fields.push((name.clone(), value::read_field(buf, ty)?));
        }
        Ok(Value::Struct {
            type_name: self.type_name.clone(),
            fields,
        })
    }
}

/// Schema-consistent object codec: both peers agree on the layout, fields
/// are written in declaration order with no per-field metadata.
pub struct ObjectCodec {
    plan: FieldPlan,
}

impl ObjectCodec {
    pub fn new(rtype: RType) -> Self {
        ObjectCodec {
            plan: FieldPlan::of(&rtype),
        }
    }
}

impl Codec for ObjectCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Object
    }

    fn write_value(&self, buf: &mut Buffer, val: &Value) -> Result<()> {
        self.plan.write_declared_order(buf, val)
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        self.plan.read_declared_order(buf)
    }
}

/// Compatible-mode object codec: each field is written as a
/// `name + type tag + value` record, so peers tolerate added or removed
/// fields without a shared class definition.
pub struct CompatibleObjectCodec {
    plan: FieldPlan,
}

impl CompatibleObjectCodec {
    pub fn new(rtype: RType) -> Self {
        CompatibleObjectCodec {
            plan: FieldPlan::of(&rtype),
        }
    }
}

impl Codec for CompatibleObjectCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::CompatibleObject
    }

    fn write_value(&self, buf: &mut Buffer, val: &Value) -> Result<()> {
        buf.write_var_u32(self.plan.entries().len() as u32);
        for (name, ty) in self.plan.entries() {
            buf.write_str(name);
            buf.write_u8(ty.wire_tag());
            match val.struct_field(name) {
                Some(field_value) => value::write_field(buf, ty, field_value)?,
                None => value::write_field(buf, ty, &Value::default_for(ty))?,
            }
        }
        Ok(())
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        let wire_count = buf.read_var_u32()? as usize;
        let mut incoming: Vec<(String, Value)> = Vec::with_capacity(wire_count);
        for _ in 0..wire_count {
            let name = buf.read_str()?;
            let tag = buf.read_u8()?;
            // The type name of object fields is not repeated per value.
            let ty = FieldType::from_wire_tag(tag, Some(String::new())).ok_or_else(|| {
                Error::InvalidData {
                    reason: format!("unknown field type tag {tag}"),
                }
            })?;
            let field_value = value::read_field(buf, &ty)?;
            incoming.push((name, field_value));
        }

        // Local declaration order wins; unknown incoming fields are dropped,
        // missing ones default.
        let mut fields = Vec::with_capacity(self.plan.entries().len());
        for (name, ty) in self.plan.entries() {
            let found = incoming
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone());
            fields.push((name.clone(), found.unwrap_or_else(|| Value::default_for(ty))));
        }
        Ok(Value::Struct {
            type_name: self.plan.type_name().to_owned(),
            fields,
        })
    }
}

/// Compiled object codec working from a precomputed [`FieldPlan`]; the
/// product of codec compilation. `compatible` selects the self-describing
/// field-record layout instead of bare declaration order.
pub struct GeneratedObjectCodec {
    plan: Arc<FieldPlan>,
    compatible: bool,
}

impl GeneratedObjectCodec {
    pub fn new(plan: Arc<FieldPlan>, compatible: bool) -> Self {
        GeneratedObjectCodec { plan, compatible }
    }

    pub fn plan(&self) -> &Arc<FieldPlan> {
        &self.plan
    }
}

impl Codec for GeneratedObjectCodec {
    fn kind(&self) -> CodecKind {
        if self.compatible {
            CodecKind::GeneratedCompatible
        } else {
            CodecKind::GeneratedObject
        }
    }

    fn write_value(&self, buf: &mut Buffer, val: &Value) -> Result<()> {
        if self.compatible {
            buf.write_var_u32(self.plan.entries().len() as u32);
            for (name, ty) in self.plan.entries() {
                buf.write_str(name);
                buf.write_u8(ty.wire_tag());
                match val.struct_field(name) {
                    Some(field_value) => value::write_field(buf, ty, field_value)?,
                    None => value::write_field(buf, ty, &Value::default_for(ty))?,
                }
            }
            Ok(())
        } else {
            self.plan.write_declared_order(buf, val)
        }
    }

    fn read_value(&self, buf: &mut Buffer) -> Result<Value> {
        if self.compatible {
            // Layout-compatible with CompatibleObjectCodec.
            CompatibleObjectCodec {
                plan: (*self.plan).clone(),
            }
            .read_value(buf)
        } else {
            self.plan.read_declared_order(buf)
        }
    }
}
