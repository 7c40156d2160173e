// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session-scoped class-definition sharing.
//!
//! Instead of transmitting a class name per value, meta-sharing assigns
//! each type a dense per-session id on first use and ships the full
//! [`ClassDef`] once, in a trailer the caller places at a well-known
//! offset. Readers resolve per-session ids lazily, so a definition for a
//! locally unknown class still occupies its slot and later streams can
//! reference it by id alone.

use super::{ClassInfo, DefEntry, Resolver};
use crate::buffer::Buffer;
use crate::codec::{Codec, MetaSharedCodec, UnexistedCodec};
use crate::config::CompatibleMode;
use crate::error::{Error, Result};
use crate::meta::ClassDef;
use crate::resolver::registry::NO_CLASS_ID;
use crate::types::{PlaceholderKind, RType, TypeKind};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// Session state attached by the caller before meta-shared I/O.
///
/// Write side: `type -> per-session id` plus the queue of definitions not
/// yet flushed. Read side: definitions and lazily resolved infos, both
/// indexed by the same per-session id.
pub struct MetaContext {
    pub(crate) class_map: HashMap<RType, u32>,
    pub(crate) writing_class_defs: Vec<Arc<ClassDef>>,
    pub(crate) read_class_defs: Vec<Arc<ClassDef>>,
    pub(crate) read_class_infos: Vec<Option<Arc<ClassInfo>>>,
}

impl MetaContext {
    pub fn new() -> Self {
        MetaContext {
            class_map: HashMap::new(),
            writing_class_defs: Vec::new(),
            read_class_defs: Vec::new(),
            read_class_infos: Vec::new(),
        }
    }

    /// Definitions queued for the next flush.
    pub fn writing_class_defs(&self) -> &[Arc<ClassDef>] {
        &self.writing_class_defs
    }

    pub fn read_class_defs(&self) -> &[Arc<ClassDef>] {
        &self.read_class_defs
    }

    /// Lazily resolved infos, parallel to `read_class_defs`.
    pub fn read_class_infos(&self) -> &[Option<Arc<ClassInfo>>] {
        &self.read_class_infos
    }
}

impl Default for MetaContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    fn take_context(&mut self) -> Result<MetaContext> {
        self.meta_context.take().ok_or(Error::MissingMetaContext)
    }

    /// Write the per-session id of `info`'s type, queueing its definition
    /// when the type is new to this session.
    pub(crate) fn write_class_with_meta_share(
        &mut self,
        buf: &mut Buffer,
        info: &Arc<ClassInfo>,
    ) -> Result<()> {
        let mut ctx = self.take_context()?;
        let result = self.write_with_meta_share_inner(buf, info, &mut ctx);
        self.meta_context = Some(ctx);
        result
    }

    fn write_with_meta_share_inner(
        &mut self,
        buf: &mut Buffer,
        info: &Arc<ClassInfo>,
        ctx: &mut MetaContext,
    ) -> Result<()> {
        let rtype = info.rtype();
        if let Some(&id) = ctx.class_map.get(rtype) {
            buf.write_var_u32(id);
            return Ok(());
        }
        let new_id = ctx.class_map.len() as u32;
        ctx.class_map.insert(rtype.clone(), new_id);
        buf.write_var_u32(new_id);

        let schema_aware = info
            .codec_kind()
            .is_some_and(|kind| kind.is_schema_aware());
        let full_def =
            self.config.compatible_mode == CompatibleMode::Compatible && schema_aware;
        let def = match self.class_def_map.entry(rtype.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let built = if full_def {
                    Arc::new(ClassDef::build(rtype))
                } else {
                    Arc::new(ClassDef::build_name_only(rtype))
                };
                entry.insert(built.clone());
                built
            }
        };
        ctx.writing_class_defs.push(def);
        Ok(())
    }

    /// Write the queued definitions (`count` then bodies) and clear the
    /// queue. The caller places this trailer and records its absolute
    /// offset in the envelope.
    pub fn flush_class_defs(&mut self, buf: &mut Buffer) -> Result<()> {
        let ctx = self
            .meta_context
            .as_mut()
            .ok_or(Error::MissingMetaContext)?;
        buf.write_var_u32(ctx.writing_class_defs.len() as u32);
        for def in ctx.writing_class_defs.drain(..) {
            def.write(buf);
        }
        Ok(())
    }

    /// Read the definition trailer: a LE u32 absolute offset at the
    /// current cursor, then `count` definitions at that offset. The main
    /// cursor is restored afterwards. Definitions are deduplicated by
    /// content id across every session of this resolver.
    pub fn read_class_defs(&mut self, buf: &mut Buffer) -> Result<()> {
        let mut ctx = self.take_context()?;
        let result = self.read_class_defs_inner(buf, &mut ctx);
        self.meta_context = Some(ctx);
        result
    }

    fn read_class_defs_inner(&mut self, buf: &mut Buffer, ctx: &mut MetaContext) -> Result<()> {
        let defs_offset = buf.read_u32_le()? as usize;
        let resume_at = buf.reader_index();
        buf.seek_reader(defs_offset)?;
        let count = buf.read_var_u32()?;
        for _ in 0..count {
            let def = ClassDef::read(buf)?;
            let shared = match self.ext.class_id_to_def.entry(def.id()) {
                Entry::Occupied(entry) => entry.get().def.clone(),
                Entry::Vacant(entry) => {
                    let arc = Arc::new(def);
                    entry.insert(DefEntry {
                        def: arc.clone(),
                        info: None,
                    });
                    arc
                }
            };
            ctx.read_class_defs.push(shared);
            ctx.read_class_infos.push(None);
        }
        buf.seek_reader(resume_at)
    }

    /// Resolve a per-session id to a `ClassInfo`, materializing it on
    /// first sight and memoizing it for the rest of the session.
    pub(crate) fn read_class_info_with_meta_share(
        &mut self,
        buf: &mut Buffer,
    ) -> Result<Arc<ClassInfo>> {
        let mut ctx = self.take_context()?;
        let result = self.read_with_meta_share_inner(buf, &mut ctx);
        self.meta_context = Some(ctx);
        result
    }

    fn read_with_meta_share_inner(
        &mut self,
        buf: &mut Buffer,
        ctx: &mut MetaContext,
    ) -> Result<Arc<ClassInfo>> {
        let id = buf.read_var_u32()? as usize;
        if let Some(Some(info)) = ctx.read_class_infos.get(id) {
            return Ok(info.clone());
        }
        let def = ctx
            .read_class_defs
            .get(id)
            .cloned()
            .ok_or_else(|| Error::InvalidData {
                reason: format!("per-session class id {id} has no exchanged definition"),
            })?;

        let info = if !def.share_fields_info() {
            // Name-only definition: the local schema applies.
            let rtype = self.load_type(def.qualified_name())?;
            self.get_or_create_class_info(&rtype)?
        } else {
            let shared = self
                .ext
                .class_id_to_def
                .get(&def.id())
                .map(|entry| (entry.def.clone(), entry.info.clone()));
            match shared {
                Some((_, Some(info))) => info,
                other => {
                    let canonical = other.map_or(def, |(shared_def, _)| shared_def);
                    let rtype = self.load_type(canonical.qualified_name())?;
                    let info = self.meta_shared_class_info(canonical.clone(), rtype)?;
                    self.ext.class_id_to_def.insert(
                        canonical.id(),
                        DefEntry {
                            def: canonical,
                            info: Some(info.clone()),
                        },
                    );
                    info
                }
            }
        };
        ctx.read_class_infos[id] = Some(info.clone());
        Ok(info)
    }

    /// Build the session `ClassInfo` for a field-bearing peer definition.
    /// Not inserted into the process-wide info map: the codec is bound to
    /// the peer's layout, not the type in general.
    fn meta_shared_class_info(
        &mut self,
        def: Arc<ClassDef>,
        rtype: RType,
    ) -> Result<Arc<ClassInfo>> {
        let rtype = if rtype.kind() == TypeKind::Unexisted(PlaceholderKind::Skip) {
            // Payload decoding must still progress for unknown classes.
            self.builtins.unexisted_meta_shared.clone()
        } else {
            rtype
        };
        let class_id = self.registry.registered_id(&rtype).unwrap_or(NO_CLASS_ID);
        let info = Arc::new(ClassInfo::new(rtype.clone(), class_id));
        info.set_structural_def(def.clone());
        let codec: Arc<dyn Codec> =
            if rtype.kind() == TypeKind::Unexisted(PlaceholderKind::MetaShared) {
                debug_assert_ne!(class_id, NO_CLASS_ID, "placeholder must be registered");
                Arc::new(UnexistedCodec::new(Some(def)))
            } else {
                Arc::new(MetaSharedCodec::new(rtype, def))
            };
        info.install_codec(codec);
        Ok(info)
    }
}
