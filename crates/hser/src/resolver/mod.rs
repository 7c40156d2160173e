// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The class resolver: registry, wire class tags, codec dispatch.
//!
//! One `Resolver` is owned by one serializer (single primary thread).
//! Registration and codec setup happen before traffic; after that the hot
//! path is `write_class_and_update` / `read_class_info`, accelerated by a
//! single-slot last-seen cache in front of the identity-keyed info map.
//! The only sanctioned cross-thread interaction is the codec-compilation
//! callback, which swaps the codec inside an existing [`ClassInfo`].

mod blacklist;
mod class_info;
mod class_name;
mod meta_share;
pub mod registry;
mod selector;

pub use blacklist::default_blacklist;
pub use class_info::{ClassInfo, ClassInfoCell};
pub use meta_share::MetaContext;
pub use registry::{is_primitive_class_id, Registry};

use crate::buffer::Buffer;
use crate::codec::{
    BlobCodec, Codec, CodecKind, FieldPlan, ListCodec, MapCodec, ObjectCodec, PrimitiveCodec,
    StringCodec, UnexistedCodec,
};
use crate::config::{Language, ResolverConfig};
use crate::error::{Error, Result};
use crate::jit::JitContext;
use crate::meta::{ClassDef, MetaString, MetaStringResolver};
use crate::types::loader::{CompositeLoader, TypeLoader, TypeUniverse};
use crate::types::{Builtins, PrimitiveKind, RType};
use class_name::ClassNameKey;
use dashmap::DashMap;
use registry::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Class tag: the payload identifies its type by name or per-session id.
pub const USE_CLASS_VALUE: u8 = 0;
/// Class tag: a little-endian u16 registered id follows.
pub const USE_ID: u8 = 1;

/// A class definition shared across sessions, with its lazily built info.
pub(crate) struct DefEntry {
    pub(crate) def: Arc<ClassDef>,
    pub(crate) info: Option<Arc<ClassInfo>>,
}

/// Auxiliary resolver state, grouped to keep the facade readable.
pub(crate) struct ExtState {
    /// Types currently inside codec selection (circular-selection guard).
    pub(crate) selecting: HashSet<RType>,
    /// Types already warned about by the security gate.
    pub(crate) warned: HashSet<RType>,
    /// Subclass specializations for collection/map codecs, by name.
    pub(crate) child_containers: HashMap<String, CodecKind>,
    /// Caller hook consulted before the selection cascade.
    pub(crate) codec_provider:
        Option<Box<dyn Fn(&RType) -> Option<Arc<dyn Codec>> + Send + Sync>>,
    /// Definitions deduplicated by content id across all sessions.
    pub(crate) class_id_to_def: HashMap<u64, DefEntry>,
    /// Field plans shared with the compile thread.
    pub(crate) field_plans: Arc<DashMap<RType, Arc<FieldPlan>>>,
    /// Compile submission deferred until the interim codec is installed.
    pub(crate) pending_compile: Option<Box<dyn FnOnce() + Send>>,
}

impl ExtState {
    fn new() -> Self {
        ExtState {
            selecting: HashSet::new(),
            warned: HashSet::new(),
            child_containers: HashMap::new(),
            codec_provider: None,
            class_id_to_def: HashMap::new(),
            field_plans: Arc::new(DashMap::new()),
            pending_compile: None,
        }
    }
}

/// Central registry and dispatcher for serialized types.
pub struct Resolver {
    pub(crate) config: ResolverConfig,
    universe: Arc<TypeUniverse>,
    pub(crate) loader: Arc<dyn TypeLoader>,
    pub(crate) builtins: Builtins,
    pub(crate) meta_strings: MetaStringResolver,
    pub(crate) registry: Registry,
    /// Identity-keyed `type -> info`; all lookups yield the same instance.
    pub(crate) class_info_map: HashMap<RType, Arc<ClassInfo>>,
    /// Single-slot last-seen cache.
    pub(crate) class_info_cache: Option<Arc<ClassInfo>>,
    pub(crate) composite_name_cache: HashMap<ClassNameKey, RType>,
    xlang_name_cache: HashMap<MetaString, RType>,
    type_id_to_type: HashMap<i16, RType>,
    type_tag_to_type: HashMap<String, RType>,
    pub(crate) class_def_map: HashMap<RType, Arc<ClassDef>>,
    pub(crate) meta_context: Option<MetaContext>,
    current_read_class: Option<RType>,
    pub(crate) ext: ExtState,
    pub(crate) jit: Arc<JitContext>,
}

impl Resolver {
    /// Build a resolver with its own type universe (plus the process-wide
    /// ambient universe as loader fallback) and register the built-ins.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Build with a caller-supplied primary loader, tried before the
    /// resolver's own universe and the ambient fallback.
    pub fn with_loader(config: ResolverConfig, loader: Arc<dyn TypeLoader>) -> Result<Self> {
        Self::build(config, Some(loader))
    }

    fn build(config: ResolverConfig, configured: Option<Arc<dyn TypeLoader>>) -> Result<Self> {
        let universe = Arc::new(TypeUniverse::new());
        let builtins = Builtins::install(&universe);
        let own: Arc<dyn TypeLoader> = Arc::new(CompositeLoader::new(
            Arc::clone(&universe) as Arc<dyn TypeLoader>,
            Arc::new(TypeUniverse::global()),
        ));
        let loader: Arc<dyn TypeLoader> = match configured {
            Some(primary) => Arc::new(CompositeLoader::new(primary, own)),
            None => own,
        };
        let jit = Arc::new(JitContext::new(config.async_compilation));
        let mut resolver = Resolver {
            config,
            universe,
            loader,
            builtins,
            meta_strings: MetaStringResolver::new(),
            registry: Registry::new(),
            class_info_map: HashMap::new(),
            class_info_cache: None,
            composite_name_cache: HashMap::new(),
            xlang_name_cache: HashMap::new(),
            type_id_to_type: HashMap::new(),
            type_tag_to_type: HashMap::new(),
            class_def_map: HashMap::new(),
            meta_context: None,
            current_read_class: None,
            ext: ExtState::new(),
            jit,
        };
        resolver.initialize()?;
        Ok(resolver)
    }

    /// Register the reserved block, bind default codecs, and freeze the
    /// built-in id range.
    fn initialize(&mut self) -> Result<()> {
        use PrimitiveKind as P;

        let lambda_stub = self.builtins.lambda_stub.clone();
        let proxy_stub = self.builtins.proxy_stub.clone();
        let replace_stub = self.builtins.replace_stub.clone();
        self.register_fixed(&lambda_stub, LAMBDA_STUB_ID)?;
        self.register_fixed(&proxy_stub, PROXY_STUB_ID)?;
        self.register_fixed(&replace_stub, REPLACE_STUB_ID)?;

        for (index, kind) in P::ALL.into_iter().enumerate() {
            let rtype = self.builtins.primitive(kind).clone();
            self.register_fixed(&rtype, PRIMITIVE_VOID_CLASS_ID + index as u16)?;
        }
        let boxed_ids = [
            (P::Bool, BOOLEAN_CLASS_ID),
            (P::I8, BYTE_CLASS_ID),
            (P::Char, CHAR_CLASS_ID),
            (P::I16, SHORT_CLASS_ID),
            (P::I32, INTEGER_CLASS_ID),
            (P::F32, FLOAT_CLASS_ID),
            (P::I64, LONG_CLASS_ID),
            (P::F64, DOUBLE_CLASS_ID),
            (P::Void, VOID_CLASS_ID),
        ];
        for (kind, id) in boxed_ids {
            let rtype = self.builtins.boxed(kind).clone();
            self.register_fixed(&rtype, id)?;
        }
        let string = self.builtins.string.clone();
        self.register_fixed(&string, STRING_CLASS_ID)?;
        for (index, array) in self.builtins.primitive_arrays.clone().iter().enumerate() {
            self.register_fixed(array, PRIMITIVE_BOOL_ARRAY_CLASS_ID + index as u16)?;
        }
        let string_array = self.builtins.string_array.clone();
        let object_array = self.builtins.object_array.clone();
        let array_list = self.builtins.array_list.clone();
        let hash_map = self.builtins.hash_map.clone();
        let hash_set = self.builtins.hash_set.clone();
        let class_type = self.builtins.class_type.clone();
        self.register_fixed(&string_array, STRING_ARRAY_CLASS_ID)?;
        self.register_fixed(&object_array, OBJECT_ARRAY_CLASS_ID)?;
        self.register_fixed(&array_list, ARRAY_LIST_CLASS_ID)?;
        self.register_fixed(&hash_map, HASH_MAP_CLASS_ID)?;
        self.register_fixed(&hash_set, HASH_SET_CLASS_ID)?;
        self.register_fixed(&class_type, CLASS_CLASS_ID)?;

        // Built-ins registered after the fixed table take dynamic ids.
        let object = self.builtins.object.clone();
        let byte_buffer = self.builtins.byte_buffer.clone();
        let unexisted_skip = self.builtins.unexisted_skip.clone();
        let unexisted_meta_shared = self.builtins.unexisted_meta_shared.clone();
        self.register(&object)?;
        self.register(&byte_buffer)?;
        self.register(&unexisted_skip)?;
        self.register(&unexisted_meta_shared)?;

        self.add_default_codecs();
        self.registry.seal_inner();
        log::debug!(
            "registered {} built-in types, inner end class id {}",
            self.registry.registered_types().len(),
            self.registry.inner_end_class_id()
        );
        Ok(())
    }

    fn add_default_codecs(&mut self) {
        for kind in PrimitiveKind::ALL {
            let codec: Arc<dyn Codec> = Arc::new(PrimitiveCodec::new(kind));
            let primitive = self.builtins.primitive(kind).clone();
            let boxed = self.builtins.boxed(kind).clone();
            self.add_codec(&primitive, Arc::clone(&codec));
            self.add_codec(&boxed, codec);
        }
        let string = self.builtins.string.clone();
        self.add_codec(&string, Arc::new(StringCodec));
        for array in self.builtins.primitive_arrays.clone() {
            self.add_codec(&array, Arc::new(ListCodec::new(CodecKind::ObjectArray)));
        }
        let string_array = self.builtins.string_array.clone();
        let object_array = self.builtins.object_array.clone();
        self.add_codec(
            &string_array,
            Arc::new(ListCodec::new(CodecKind::ObjectArray)),
        );
        self.add_codec(
            &object_array,
            Arc::new(ListCodec::new(CodecKind::ObjectArray)),
        );
        let array_list = self.builtins.array_list.clone();
        let hash_set = self.builtins.hash_set.clone();
        let hash_map = self.builtins.hash_map.clone();
        self.add_codec(
            &array_list,
            Arc::new(ListCodec::new(CodecKind::DefaultCollection)),
        );
        self.add_codec(
            &hash_set,
            Arc::new(ListCodec::new(CodecKind::DefaultCollection)),
        );
        self.add_codec(&hash_map, Arc::new(MapCodec::new(CodecKind::DefaultMap)));
        let class_type = self.builtins.class_type.clone();
        self.add_codec(&class_type, Arc::new(BlobCodec::new(CodecKind::Class)));
        let lambda_stub = self.builtins.lambda_stub.clone();
        let proxy_stub = self.builtins.proxy_stub.clone();
        let replace_stub = self.builtins.replace_stub.clone();
        self.add_codec(&lambda_stub, Arc::new(BlobCodec::new(CodecKind::Lambda)));
        self.add_codec(&proxy_stub, Arc::new(BlobCodec::new(CodecKind::Proxy)));
        self.add_codec(
            &replace_stub,
            Arc::new(BlobCodec::new(CodecKind::ReplaceResolve)),
        );
        let object = self.builtins.object.clone();
        self.add_codec(&object, Arc::new(ObjectCodec::new(object.clone())));
        let byte_buffer = self.builtins.byte_buffer.clone();
        self.add_codec(
            &byte_buffer,
            Arc::new(BlobCodec::new(CodecKind::ByteBuffer)),
        );
        let unexisted_skip = self.builtins.unexisted_skip.clone();
        let unexisted_meta_shared = self.builtins.unexisted_meta_shared.clone();
        self.add_codec(&unexisted_skip, Arc::new(UnexistedCodec::new(None)));
        self.add_codec(&unexisted_meta_shared, Arc::new(UnexistedCodec::new(None)));
    }

    fn register_fixed(&mut self, rtype: &RType, id: u16) -> Result<()> {
        let info = self.ensure_class_info(rtype);
        self.registry.bind_with_check(&info, id)
    }

    // ------------------------------------------------------------------
    // Registration surface
    // ------------------------------------------------------------------

    /// Register `rtype` under the smallest free id. Idempotent.
    pub fn register(&mut self, rtype: &RType) -> Result<u16> {
        let info = self.ensure_class_info(rtype);
        self.registry.bind_auto(&info)
    }

    /// Register `rtype` under `id`; see the registry for conflict rules.
    pub fn register_with_id(&mut self, rtype: &RType, id: u16) -> Result<()> {
        let info = self.ensure_class_info(rtype);
        self.registry.bind(&info, id)
    }

    /// Like [`Resolver::register_with_id`], refusing previously registered
    /// types outright.
    pub fn register_with_check(&mut self, rtype: &RType, id: u16) -> Result<()> {
        let info = self.ensure_class_info(rtype);
        self.registry.bind_with_check(&info, id)
    }

    /// Tagged cross-language registration. Declared for API completeness;
    /// the tag table is populated through codecs carrying tags instead.
    pub fn register_by_tag(&mut self, rtype: &RType, tag: &str) -> Result<()> {
        if self.type_tag_to_type.contains_key(tag) {
            return Err(Error::DuplicateRegistration {
                reason: format!("cross-language tag {tag} is already bound"),
            });
        }
        Err(Error::Unsupported {
            reason: format!(
                "tagged registration for {} is not implemented",
                rtype.qualified_name()
            ),
        })
    }

    /// Bind `codec` to `rtype`, registering the type first when native.
    pub fn register_codec(&mut self, rtype: &RType, codec: Arc<dyn Codec>) -> Result<()> {
        if !self.registry.is_registered(rtype) && self.config.language == Language::Native {
            self.register(rtype)?;
        }
        self.add_codec(rtype, codec);
        Ok(())
    }

    pub fn registered_id(&self, rtype: &RType) -> Option<u16> {
        self.registry.registered_id(rtype)
    }

    pub fn registered_type(&self, id: u16) -> Option<RType> {
        self.registry.registered_type(id)
    }

    pub fn registered_types(&self) -> Vec<RType> {
        self.registry.registered_types()
    }

    /// Highest built-in id; user ids always land above it.
    pub fn inner_end_class_id(&self) -> u16 {
        self.registry.inner_end_class_id()
    }

    /// True when the type carries a reserved (built-in) id.
    pub fn is_inner_type(&self, rtype: &RType) -> bool {
        let id = self
            .registry
            .registered_id(rtype)
            .or_else(|| self.class_info_map.get(rtype).map(|info| info.class_id()));
        matches!(id, Some(id) if id != NO_CLASS_ID && id <= self.registry.inner_end_class_id())
    }

    // ------------------------------------------------------------------
    // Codec management
    // ------------------------------------------------------------------

    /// Set (or replace) the codec for `rtype`, reusing the existing
    /// `ClassInfo` so compilation callbacks keep taking effect.
    pub fn set_codec(&mut self, rtype: &RType, codec: Arc<dyn Codec>) {
        self.add_codec(rtype, codec);
    }

    /// Bind only when no codec exists yet; used to break circular codec
    /// construction.
    pub fn set_codec_if_absent(&mut self, rtype: &RType, codec: Arc<dyn Codec>) {
        if self.get_codec_if_exists(rtype).is_none() {
            self.add_codec(rtype, codec);
        }
    }

    pub fn clear_codec(&mut self, rtype: &RType) {
        if let Some(info) = self.class_info_map.get(rtype) {
            info.clear_codec();
        }
    }

    /// Set when `Some`, clear when `None`.
    pub fn reset_codec(&mut self, rtype: &RType, codec: Option<Arc<dyn Codec>>) {
        match codec {
            Some(codec) => self.set_codec(rtype, codec),
            None => self.clear_codec(rtype),
        }
    }

    /// Get or materialize the codec for `rtype`.
    pub fn get_codec(&mut self, rtype: &RType) -> Result<Arc<dyn Codec>> {
        let info = self.get_or_create_class_info(rtype)?;
        info.codec().ok_or_else(|| Error::InvalidData {
            reason: format!("no codec materialized for {}", rtype.qualified_name()),
        })
    }

    pub fn get_codec_if_exists(&self, rtype: &RType) -> Option<Arc<dyn Codec>> {
        self.class_info_map.get(rtype).and_then(|info| info.codec())
    }

    /// Hook consulted before the selection cascade; a `Some` result
    /// short-circuits selection entirely.
    pub fn set_codec_provider(
        &mut self,
        provider: impl Fn(&RType) -> Option<Arc<dyn Codec>> + Send + Sync + 'static,
    ) {
        self.ext.codec_provider = Some(Box::new(provider));
    }

    /// Map a named container subtype to a specialized codec kind.
    pub fn register_child_container(&mut self, qualified_name: &str, kind: CodecKind) {
        self.ext
            .child_containers
            .insert(qualified_name.to_owned(), kind);
    }

    /// Wire a codec into its info and the cross-language tables.
    pub(crate) fn add_codec(&mut self, rtype: &RType, codec: Arc<dyn Codec>) {
        if let Some(type_id) = codec.xlang_type_id() {
            self.type_id_to_type.insert(type_id, rtype.clone());
        }
        let info = self.ensure_class_info(rtype);
        if let Some(tag) = codec.xlang_type_tag() {
            self.type_tag_to_type.insert(tag.to_owned(), rtype.clone());
            info.set_type_tag(tag);
        }
        // Replaced values are written under the replace stub id unless the
        // type itself is registered.
        if !self.registry.is_registered(rtype) && codec.kind() == CodecKind::ReplaceResolve {
            info.set_class_id(REPLACE_STUB_ID);
        }
        info.install_codec(codec);
    }

    /// Info for `rtype` without materializing a codec; absent while the
    /// type is mid-selection.
    pub fn class_info(&self, rtype: &RType) -> Option<Arc<ClassInfo>> {
        if self.ext.selecting.contains(rtype) {
            return None;
        }
        self.class_info_map.get(rtype).cloned()
    }

    pub(crate) fn ensure_class_info(&mut self, rtype: &RType) -> Arc<ClassInfo> {
        if let Some(info) = self.class_info_map.get(rtype) {
            return Arc::clone(info);
        }
        let id = self.registry.registered_id(rtype).unwrap_or(NO_CLASS_ID);
        let info = Arc::new(ClassInfo::new(rtype.clone(), id));
        self.class_info_map.insert(rtype.clone(), Arc::clone(&info));
        info
    }

    // ------------------------------------------------------------------
    // Hot path
    // ------------------------------------------------------------------

    /// The sole codec-materialization entry point: single-slot cache, then
    /// the identity map, then selection.
    pub fn get_or_create_class_info(&mut self, rtype: &RType) -> Result<Arc<ClassInfo>> {
        if let Some(info) = &self.class_info_cache {
            if info.rtype() == rtype && info.has_codec() {
                return Ok(Arc::clone(info));
            }
        }
        let info = match self.class_info_map.get(rtype) {
            Some(info) if info.has_codec() => Arc::clone(info),
            _ => self.create_codec(rtype)?,
        };
        self.class_info_cache = Some(Arc::clone(&info));
        Ok(info)
    }

    /// Write the class tag for `rtype`, with inlined fast paths for the
    /// three most common boxed numerics.
    pub fn write_class_and_update(&mut self, buf: &mut Buffer, rtype: &RType) -> Result<()> {
        let fast_id = if rtype == self.builtins.boxed(PrimitiveKind::I64) {
            Some(LONG_CLASS_ID)
        } else if rtype == self.builtins.boxed(PrimitiveKind::I32) {
            Some(INTEGER_CLASS_ID)
        } else if rtype == self.builtins.boxed(PrimitiveKind::F64) {
            Some(DOUBLE_CLASS_ID)
        } else {
            None
        };
        if let Some(id) = fast_id {
            buf.write_u8(USE_ID);
            buf.write_u16_le(id);
            return Ok(());
        }
        let info = self.get_or_create_class_info(rtype)?;
        self.write_class(buf, &info)
    }

    /// Write the class tag for an already-resolved info.
    pub fn write_class(&mut self, buf: &mut Buffer, info: &Arc<ClassInfo>) -> Result<()> {
        let class_id = info.class_id();
        if class_id == NO_CLASS_ID {
            buf.write_u8(USE_CLASS_VALUE);
            if self.config.meta_share_enabled {
                self.write_class_with_meta_share(buf, info)?;
            } else {
                self.write_name_bytes(buf, info);
            }
        } else {
            // 3-byte record placed through one cursor pre-advance.
            let offset = buf.grow(3);
            buf.put_u8(offset, USE_ID);
            buf.put_u16_le(offset + 1, class_id);
        }
        Ok(())
    }

    /// Read a class tag, materializing the codec on first use, and update
    /// the single-slot cache and `current_read_class`.
    pub fn read_class_info(&mut self, buf: &mut Buffer) -> Result<Arc<ClassInfo>> {
        let tag = buf.read_u8()?;
        let info = match tag {
            USE_CLASS_VALUE => {
                if self.config.meta_share_enabled {
                    self.read_class_info_with_meta_share(buf)?
                } else {
                    let cached = self.class_info_cache.clone();
                    self.read_class_info_from_bytes(buf, cached)?
                }
            }
            USE_ID => {
                let class_id = buf.read_u16_le()?;
                self.class_info_by_id(class_id)?
            }
            other => {
                return Err(Error::InvalidData {
                    reason: format!("unknown class tag byte {other:#04x}"),
                })
            }
        };
        self.class_info_cache = Some(Arc::clone(&info));
        self.current_read_class = Some(info.rtype().clone());
        Ok(info)
    }

    /// Read variant taking a caller-owned cache cell (generated-code
    /// call sites keep one per field).
    pub fn read_class_info_cached(
        &mut self,
        buf: &mut Buffer,
        cell: &mut ClassInfoCell,
    ) -> Result<Arc<ClassInfo>> {
        let tag = buf.read_u8()?;
        let info = match tag {
            USE_CLASS_VALUE => {
                if self.config.meta_share_enabled {
                    self.read_class_info_with_meta_share(buf)?
                } else {
                    self.read_class_info_from_bytes(buf, cell.get().cloned())?
                }
            }
            USE_ID => {
                let class_id = buf.read_u16_le()?;
                self.class_info_by_id(class_id)?
            }
            other => {
                return Err(Error::InvalidData {
                    reason: format!("unknown class tag byte {other:#04x}"),
                })
            }
        };
        cell.set(Arc::clone(&info));
        self.current_read_class = Some(info.rtype().clone());
        Ok(info)
    }

    /// Read a class tag and return the type alone.
    pub fn read_class(&mut self, buf: &mut Buffer) -> Result<RType> {
        Ok(self.read_class_info(buf)?.rtype().clone())
    }

    /// Resolve a registered id, materializing its codec on first use.
    pub fn class_info_by_id(&mut self, class_id: u16) -> Result<Arc<ClassInfo>> {
        let info = self
            .registry
            .info_by_id(class_id)
            .cloned()
            .ok_or_else(|| Error::InvalidData {
                reason: format!("unknown registered class id {class_id}"),
            })?;
        if !info.has_codec() {
            let rtype = info.rtype().clone();
            self.create_codec(&rtype)?;
        }
        Ok(info)
    }

    // ------------------------------------------------------------------
    // Tag I/O for possibly-non-serializable values
    // ------------------------------------------------------------------

    /// Write a class tag without requiring a codec. A type written under
    /// the replace stub id temporarily drops the id so the real name goes
    /// out instead; this applies only while a replace/resolve codec is
    /// bound.
    pub fn write_class_internal(&mut self, buf: &mut Buffer, rtype: &RType) -> Result<()> {
        let info = self.ensure_class_info(rtype);
        let saved_id = info.class_id();
        let transient = saved_id == REPLACE_STUB_ID
            && info.codec_kind() == Some(CodecKind::ReplaceResolve);
        if transient {
            info.set_class_id(NO_CLASS_ID);
        }
        let result = self.write_class(buf, &info);
        if transient {
            info.set_class_id(saved_id);
        }
        result
    }

    /// Read a class tag without materializing a codec.
    pub fn read_class_internal(&mut self, buf: &mut Buffer) -> Result<RType> {
        let tag = buf.read_u8()?;
        let rtype = match tag {
            USE_CLASS_VALUE => {
                if self.config.meta_share_enabled {
                    self.read_class_info_with_meta_share(buf)?.rtype().clone()
                } else {
                    let package = self.meta_strings.read_meta_string(buf)?;
                    let simple = self.meta_strings.read_meta_string(buf)?;
                    self.load_bytes_to_type(&package, &simple)?
                }
            }
            USE_ID => {
                let class_id = buf.read_u16_le()?;
                self.registry
                    .registered_type(class_id)
                    .ok_or_else(|| Error::InvalidData {
                        reason: format!("unknown registered class id {class_id}"),
                    })?
            }
            other => {
                return Err(Error::InvalidData {
                    reason: format!("unknown class tag byte {other:#04x}"),
                })
            }
        };
        self.current_read_class = Some(rtype.clone());
        Ok(rtype)
    }

    // ------------------------------------------------------------------
    // Cross-language operations
    // ------------------------------------------------------------------

    /// Emit the full dotted name as one interned byte string.
    pub fn xlang_write_class(&mut self, buf: &mut Buffer, rtype: &RType) -> Result<()> {
        let info = self.get_or_create_class_info(rtype)?;
        let full = info.full_name_bytes().clone();
        self.meta_strings.write_meta_string(buf, &full);
        Ok(())
    }

    /// Emit the registered cross-language tag of `rtype`.
    pub fn xlang_write_type_tag(&mut self, buf: &mut Buffer, rtype: &RType) -> Result<()> {
        let info = self.get_or_create_class_info(rtype)?;
        let tag = info
            .type_tag_bytes()
            .cloned()
            .ok_or_else(|| Error::Unsupported {
                reason: format!(
                    "no cross-language tag registered for {}",
                    rtype.qualified_name()
                ),
            })?;
        self.meta_strings.write_meta_string(buf, &tag);
        Ok(())
    }

    pub fn xlang_read_class(&mut self, buf: &mut Buffer) -> Result<RType> {
        let name = self.meta_strings.read_meta_string(buf)?;
        let rtype = match self.xlang_name_cache.get(&name) {
            Some(rtype) => rtype.clone(),
            None => {
                let qualified = name.as_utf8()?.to_owned();
                let rtype = self.load_type(&qualified)?;
                self.xlang_name_cache.insert(name, rtype.clone());
                rtype
            }
        };
        self.current_read_class = Some(rtype.clone());
        Ok(rtype)
    }

    pub fn xlang_read_class_name(&mut self, buf: &mut Buffer) -> Result<String> {
        Ok(self.meta_strings.read_meta_string(buf)?.as_utf8()?.to_owned())
    }

    /// Resolve a type through the `tag -> type` table.
    pub fn xlang_read_type_tag(&mut self, buf: &mut Buffer) -> Result<RType> {
        let tag = self.meta_strings.read_meta_string(buf)?;
        let tag_str = tag.as_utf8()?;
        self.type_tag_to_type
            .get(tag_str)
            .cloned()
            .ok_or_else(|| Error::ClassNotFound {
                name: tag_str.to_owned(),
            })
    }

    /// Resolve a type through the `numeric id -> type` table.
    pub fn type_by_xlang_id(&self, type_id: i16) -> Option<RType> {
        self.type_id_to_type.get(&type_id).cloned()
    }

    // ------------------------------------------------------------------
    // Session state
    // ------------------------------------------------------------------

    pub fn set_meta_context(&mut self, ctx: MetaContext) {
        self.meta_context = Some(ctx);
    }

    pub fn meta_context(&self) -> Option<&MetaContext> {
        self.meta_context.as_ref()
    }

    pub fn take_meta_context(&mut self) -> Option<MetaContext> {
        self.meta_context.take()
    }

    /// The type identified by the most recent read.
    pub fn current_read_class(&self) -> Option<&RType> {
        self.current_read_class.as_ref()
    }

    pub fn reset(&mut self) {
        self.reset_read();
        self.reset_write();
    }

    pub fn reset_read(&mut self) {
        self.current_read_class = None;
        self.meta_strings.reset_read();
    }

    pub fn reset_write(&mut self) {
        self.meta_strings.reset_write();
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether values of `rtype` participate in reference tracking.
    pub fn needs_ref_tracking(&self, rtype: &RType) -> bool {
        if !self.config.ref_tracking {
            return false;
        }
        match self.class_info_map.get(rtype).and_then(|info| info.codec()) {
            Some(codec) => codec.needs_ref_tracking(),
            None => !rtype.is_enum(),
        }
    }

    /// The resolver's own type universe; declare application types here.
    pub fn universe(&self) -> &Arc<TypeUniverse> {
        &self.universe
    }

    /// Intern a type into the resolver's universe.
    pub fn declare(&self, rtype: RType) -> RType {
        self.universe.declare(rtype)
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The compilation context (exposed so callers can await quiescence).
    pub fn jit(&self) -> &Arc<JitContext> {
        &self.jit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::types::{FieldType, TypeKind};

    fn open_config() -> ResolverConfig {
        ResolverConfig::new().with_require_class_registration(false)
    }

    fn user_type(resolver: &Resolver, simple: &str) -> RType {
        resolver.declare(
            RType::builder("user", simple)
                .serializable()
                .field("x", FieldType::I32)
                .build(),
        )
    }

    #[test]
    fn test_builtins_occupy_reserved_ids() {
        let resolver = Resolver::new(ResolverConfig::default()).expect("resolver");
        let b = resolver.builtins();
        assert_eq!(
            resolver.registered_id(b.boxed(PrimitiveKind::I32)),
            Some(INTEGER_CLASS_ID)
        );
        assert_eq!(resolver.registered_id(&b.string), Some(STRING_CLASS_ID));
        assert_eq!(
            resolver.registered_id(&b.object_array),
            Some(OBJECT_ARRAY_CLASS_ID)
        );
        assert_eq!(resolver.registered_id(&b.lambda_stub), Some(LAMBDA_STUB_ID));
        assert!(resolver.inner_end_class_id() > CLASS_CLASS_ID);
        assert!(resolver.is_inner_type(&b.array_list));
    }

    #[test]
    fn test_get_or_create_is_identity_stable() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let t = user_type(&resolver, "A");
        let first = resolver.get_or_create_class_info(&t).expect("info");
        let second = resolver.get_or_create_class_info(&t).expect("info");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.has_codec());
    }

    #[test]
    fn test_user_ids_start_above_inner_end() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let t = user_type(&resolver, "A");
        let id = resolver.register(&t).expect("register");
        assert!(id > resolver.inner_end_class_id());
        assert!(!resolver.is_inner_type(&t));
        assert_eq!(resolver.registered_type(id), Some(t));
    }

    #[test]
    fn test_registered_write_is_three_bytes() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let t = user_type(&resolver, "A");
        resolver.register_with_id(&t, 200).expect("register");
        let info = resolver.get_or_create_class_info(&t).expect("info");
        let mut buf = Buffer::new();
        resolver.write_class(&mut buf, &info).expect("write");
        assert_eq!(buf.as_slice(), &[USE_ID, 200, 0]);

        let back = resolver.read_class_info(&mut buf).expect("read");
        assert!(Arc::ptr_eq(&back, &info));
        assert_eq!(resolver.current_read_class(), Some(info.rtype()));
    }

    #[test]
    fn test_unregistered_name_roundtrip_updates_current_read_class() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let t = user_type(&resolver, "ByName");
        let mut buf = Buffer::new();
        resolver.write_class_and_update(&mut buf, &t).expect("write");
        assert_eq!(buf.as_slice()[0], USE_CLASS_VALUE);

        let info = resolver.read_class_info(&mut buf).expect("read");
        assert_eq!(info.rtype(), &t);
        assert_eq!(resolver.current_read_class(), Some(&t));
    }

    #[test]
    fn test_boxed_numeric_fast_paths() {
        let mut resolver = Resolver::new(ResolverConfig::default()).expect("resolver");
        let long_type = resolver.builtins().boxed(PrimitiveKind::I64).clone();
        let double_type = resolver.builtins().boxed(PrimitiveKind::F64).clone();
        let mut buf = Buffer::new();
        resolver
            .write_class_and_update(&mut buf, &long_type)
            .expect("write");
        resolver
            .write_class_and_update(&mut buf, &double_type)
            .expect("write");
        assert_eq!(
            buf.as_slice(),
            &[USE_ID, 19, 0, USE_ID, 20, 0],
            "LONG=19 and DOUBLE=20 as little-endian u16"
        );
    }

    #[test]
    fn test_replace_stub_transient_clearing() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let t = resolver.declare(
            RType::builder("user", "Replaced")
                .serializable()
                .traits(crate::types::TypeTraits {
                    serializable: true,
                    write_replace: true,
                    ..Default::default()
                })
                .build(),
        );
        // Selection binds a replace/resolve codec and stamps the stub id.
        let info = resolver.get_or_create_class_info(&t).expect("info");
        assert_eq!(info.class_id(), REPLACE_STUB_ID);
        assert_eq!(info.codec_kind(), Some(CodecKind::ReplaceResolve));

        // write_class uses the stub id...
        let mut buf = Buffer::new();
        resolver.write_class(&mut buf, &info).expect("write");
        assert_eq!(buf.as_slice(), &[USE_ID, REPLACE_STUB_ID as u8, 0]);

        // ...while write_class_internal transmits the real name.
        let mut buf = Buffer::new();
        resolver.write_class_internal(&mut buf, &t).expect("write");
        assert_eq!(buf.as_slice()[0], USE_CLASS_VALUE);
        assert_eq!(info.class_id(), REPLACE_STUB_ID, "id restored after write");
        let back = resolver.read_class_internal(&mut buf).expect("read");
        assert_eq!(back, t);
    }

    #[test]
    fn test_xlang_class_roundtrip() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let t = user_type(&resolver, "Tagged");
        let mut buf = Buffer::new();
        resolver.xlang_write_class(&mut buf, &t).expect("write");
        let back = resolver.xlang_read_class(&mut buf).expect("read");
        assert_eq!(back, t);
        assert_eq!(resolver.current_read_class(), Some(&t));
    }

    #[test]
    fn test_xlang_tag_tables_populated_by_codec() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let t = user_type(&resolver, "Sensor");
        resolver
            .register_codec(
                &t,
                Arc::new(BlobCodec::with_tag(CodecKind::Externalizable, "demo.sensor")),
            )
            .expect("register");

        let mut buf = Buffer::new();
        resolver.xlang_write_type_tag(&mut buf, &t).expect("write");
        let back = resolver.xlang_read_type_tag(&mut buf).expect("read");
        assert_eq!(back, t);
        // Primitive codecs populate the numeric id table at startup.
        assert!(resolver.type_by_xlang_id(PrimitiveKind::I32 as i16 + 1).is_some());
    }

    #[test]
    fn test_register_by_tag_is_declared_but_unsupported() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let t = user_type(&resolver, "Tagged");
        let err = resolver.register_by_tag(&t, "demo.tagged").unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[test]
    fn test_needs_ref_tracking() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let enum_type = resolver.declare(
            RType::builder("user", "Color").kind(TypeKind::Enum).build(),
        );
        let struct_type = user_type(&resolver, "Node");
        assert!(!resolver.needs_ref_tracking(&enum_type));
        assert!(resolver.needs_ref_tracking(&struct_type));
        resolver.get_or_create_class_info(&enum_type).expect("info");
        assert!(!resolver.needs_ref_tracking(&enum_type));

        let untracked = Resolver::new(open_config().with_ref_tracking(false)).expect("resolver");
        assert!(!untracked.needs_ref_tracking(&struct_type));
    }

    #[test]
    fn test_codec_provider_short_circuits_selection() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let t = user_type(&resolver, "Provided");
        resolver.set_codec_provider(|rtype| {
            (rtype.qualified_name() == "user.Provided")
                .then(|| Arc::new(crate::codec::EnumCodec) as Arc<dyn Codec>)
        });
        let codec = resolver.get_codec(&t).expect("codec");
        assert_eq!(codec.kind(), CodecKind::Enum);
    }

    #[test]
    fn test_clear_and_reset_codec() {
        let mut resolver = Resolver::new(open_config()).expect("resolver");
        let t = user_type(&resolver, "A");
        resolver.get_or_create_class_info(&t).expect("info");
        assert!(resolver.get_codec_if_exists(&t).is_some());
        resolver.clear_codec(&t);
        assert!(resolver.get_codec_if_exists(&t).is_none());
        resolver.reset_codec(&t, Some(Arc::new(crate::codec::EnumCodec)));
        assert_eq!(
            resolver.get_codec_if_exists(&t).map(|c| c.kind()),
            Some(CodecKind::Enum)
        );
        resolver.set_codec_if_absent(&t, Arc::new(StringCodec));
        assert_eq!(
            resolver.get_codec_if_exists(&t).map(|c| c.kind()),
            Some(CodecKind::Enum),
            "set_codec_if_absent must not overwrite"
        );
    }
}
