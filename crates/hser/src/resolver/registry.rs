// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reserved class ids and the id/type registry.
//!
//! The reserved block is part of the wire protocol: every id below
//! [`Registry::inner_end_class_id`] is stable across releases and peers.
//! Never derive these values with arithmetic elsewhere.

use super::class_info::ClassInfo;
use crate::error::{Error, Result};
use crate::types::RType;
use std::collections::HashMap;
use std::sync::Arc;

/// Sentinel: the type has no registered id and is transmitted by name.
pub const NO_CLASS_ID: u16 = 0;
/// Stub dispatch id for lambda values.
pub const LAMBDA_STUB_ID: u16 = 1;
/// Stub dispatch id for dynamic proxies.
pub const PROXY_STUB_ID: u16 = 2;
/// Stub dispatch id for replace/resolve values.
pub const REPLACE_STUB_ID: u16 = 3;

// Primitive block, contiguous.
pub const PRIMITIVE_VOID_CLASS_ID: u16 = 4;
pub const PRIMITIVE_BOOL_CLASS_ID: u16 = 5;
pub const PRIMITIVE_BYTE_CLASS_ID: u16 = 6;
pub const PRIMITIVE_CHAR_CLASS_ID: u16 = 7;
pub const PRIMITIVE_SHORT_CLASS_ID: u16 = 8;
pub const PRIMITIVE_INT_CLASS_ID: u16 = 9;
pub const PRIMITIVE_FLOAT_CLASS_ID: u16 = 10;
pub const PRIMITIVE_LONG_CLASS_ID: u16 = 11;
pub const PRIMITIVE_DOUBLE_CLASS_ID: u16 = 12;

// Boxed block and String.
pub const BOOLEAN_CLASS_ID: u16 = 13;
pub const BYTE_CLASS_ID: u16 = 14;
pub const CHAR_CLASS_ID: u16 = 15;
pub const SHORT_CLASS_ID: u16 = 16;
pub const INTEGER_CLASS_ID: u16 = 17;
pub const FLOAT_CLASS_ID: u16 = 18;
pub const LONG_CLASS_ID: u16 = 19;
pub const DOUBLE_CLASS_ID: u16 = 20;
pub const VOID_CLASS_ID: u16 = 21;
pub const STRING_CLASS_ID: u16 = 22;

// 1-D primitive arrays.
pub const PRIMITIVE_BOOL_ARRAY_CLASS_ID: u16 = 23;
pub const PRIMITIVE_BYTE_ARRAY_CLASS_ID: u16 = 24;
pub const PRIMITIVE_CHAR_ARRAY_CLASS_ID: u16 = 25;
pub const PRIMITIVE_SHORT_ARRAY_CLASS_ID: u16 = 26;
pub const PRIMITIVE_INT_ARRAY_CLASS_ID: u16 = 27;
pub const PRIMITIVE_FLOAT_ARRAY_CLASS_ID: u16 = 28;
pub const PRIMITIVE_LONG_ARRAY_CLASS_ID: u16 = 29;
pub const PRIMITIVE_DOUBLE_ARRAY_CLASS_ID: u16 = 30;

pub const STRING_ARRAY_CLASS_ID: u16 = 31;
pub const OBJECT_ARRAY_CLASS_ID: u16 = 32;
pub const ARRAY_LIST_CLASS_ID: u16 = 33;
pub const HASH_MAP_CLASS_ID: u16 = 34;
pub const HASH_SET_CLASS_ID: u16 = 35;
pub const CLASS_CLASS_ID: u16 = 36;

/// Largest assignable id; ids live in `[1, MAX_CLASS_ID]`.
pub const MAX_CLASS_ID: u16 = 32766;

/// Bidirectional `id <-> type` registry with dense id storage.
pub struct Registry {
    /// Grow-on-demand dense vector; doubles when an id lands past the end.
    id_to_info: Vec<Option<Arc<ClassInfo>>>,
    type_to_id: HashMap<RType, u16>,
    name_to_type: HashMap<String, RType>,
    /// Next candidate for automatic id assignment.
    next_id: u16,
    /// Highest id of the built-in block; frozen after initialization.
    inner_end_class_id: u16,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            id_to_info: Vec::new(),
            type_to_id: HashMap::new(),
            name_to_type: HashMap::new(),
            next_id: 1,
            inner_end_class_id: 0,
        }
    }

    /// Bind `info`'s type to `id`.
    ///
    /// Re-binding the exact same (type, id) pair is a no-op; any other
    /// overlap on type, id, or qualified name fails. On success the
    /// existing `ClassInfo` instance is mutated to carry the id, keeping
    /// identity with the type map.
    pub fn bind(&mut self, info: &Arc<ClassInfo>, id: u16) -> Result<()> {
        let rtype = info.rtype();
        if id == NO_CLASS_ID || id > MAX_CLASS_ID {
            return Err(Error::DuplicateRegistration {
                reason: format!(
                    "id {id} for {} is outside the assignable range [1, {MAX_CLASS_ID}]",
                    rtype.qualified_name()
                ),
            });
        }
        if let Some(&existing) = self.type_to_id.get(rtype) {
            if existing == id {
                return Ok(());
            }
            return Err(Error::DuplicateRegistration {
                reason: format!(
                    "type {} already registered with id {existing}",
                    rtype.qualified_name()
                ),
            });
        }
        if let Some(other) = self.name_to_type.get(rtype.qualified_name()) {
            if other != rtype {
                return Err(Error::DuplicateRegistration {
                    reason: format!(
                        "another type named {} is already registered",
                        rtype.qualified_name()
                    ),
                });
            }
        }
        if let Some(Some(occupant)) = self.id_to_info.get(id as usize) {
            return Err(Error::DuplicateRegistration {
                reason: format!(
                    "id {id} already bound to {}, cannot bind {}",
                    occupant.rtype().qualified_name(),
                    rtype.qualified_name()
                ),
            });
        }

        self.ensure_capacity(id);
        self.id_to_info[id as usize] = Some(Arc::clone(info));
        self.type_to_id.insert(rtype.clone(), id);
        self.name_to_type
            .insert(rtype.qualified_name().to_owned(), rtype.clone());
        info.set_class_id(id);
        Ok(())
    }

    /// Like [`Registry::bind`], but refuses a previously registered type
    /// even for the same id.
    pub fn bind_with_check(&mut self, info: &Arc<ClassInfo>, id: u16) -> Result<()> {
        if let Some(&existing) = self.type_to_id.get(info.rtype()) {
            return Err(Error::DuplicateRegistration {
                reason: format!(
                    "type {} already registered with id {existing}",
                    info.rtype().qualified_name()
                ),
            });
        }
        self.bind(info, id)
    }

    /// Assign the smallest free id at or above the running counter.
    /// Idempotent for already-registered types.
    pub fn bind_auto(&mut self, info: &Arc<ClassInfo>) -> Result<u16> {
        if let Some(&id) = self.type_to_id.get(info.rtype()) {
            return Ok(id);
        }
        while self.is_id_occupied(self.next_id) {
            self.next_id += 1;
        }
        let id = self.next_id;
        self.bind(info, id)?;
        self.next_id = id + 1;
        Ok(id)
    }

    fn is_id_occupied(&self, id: u16) -> bool {
        matches!(self.id_to_info.get(id as usize), Some(Some(_)))
    }

    fn ensure_capacity(&mut self, id: u16) {
        if id as usize >= self.id_to_info.len() {
            self.id_to_info.resize((id as usize + 1) * 2, None);
        }
    }

    pub fn registered_id(&self, rtype: &RType) -> Option<u16> {
        self.type_to_id.get(rtype).copied()
    }

    pub fn is_registered(&self, rtype: &RType) -> bool {
        self.type_to_id.contains_key(rtype)
    }

    pub fn info_by_id(&self, id: u16) -> Option<&Arc<ClassInfo>> {
        self.id_to_info.get(id as usize).and_then(|slot| slot.as_ref())
    }

    pub fn registered_type(&self, id: u16) -> Option<RType> {
        self.info_by_id(id).map(|info| info.rtype().clone())
    }

    pub fn type_by_name(&self, qualified: &str) -> Option<&RType> {
        self.name_to_type.get(qualified)
    }

    /// All registered types, in id order.
    pub fn registered_types(&self) -> Vec<RType> {
        self.id_to_info
            .iter()
            .filter_map(|slot| slot.as_ref().map(|info| info.rtype().clone()))
            .collect()
    }

    /// Freeze the built-in block: records the highest id assigned so far.
    pub(crate) fn seal_inner(&mut self) {
        self.inner_end_class_id = self.next_id - 1;
    }

    /// Highest built-in id; user registrations always land above it.
    pub fn inner_end_class_id(&self) -> u16 {
        self.inner_end_class_id
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// True when `id` falls in the reserved primitive block.
pub fn is_primitive_class_id(id: u16) -> bool {
    (PRIMITIVE_VOID_CLASS_ID..=PRIMITIVE_DOUBLE_CLASS_ID).contains(&id)
}
