// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-type resolver record.

use crate::codec::{Codec, CodecKind};
use crate::meta::{ClassDef, MetaString};
use crate::types::RType;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, OnceLock};

use super::registry::NO_CLASS_ID;

/// One record per known type: id, interned name bytes, bound codec.
///
/// Shared as `Arc<ClassInfo>`; every lookup for a type yields the same
/// instance. The codec slot may be swapped by the compile thread, so it
/// sits behind a lock and callers re-fetch it on each use.
pub struct ClassInfo {
    rtype: RType,
    class_id: AtomicU16,
    package_bytes: OnceLock<MetaString>,
    name_bytes: OnceLock<MetaString>,
    full_name_bytes: OnceLock<MetaString>,
    type_tag_bytes: OnceLock<MetaString>,
    codec: RwLock<Option<Arc<dyn Codec>>>,
    structural_def: OnceLock<Arc<ClassDef>>,
}

impl ClassInfo {
    pub fn new(rtype: RType, class_id: u16) -> Self {
        ClassInfo {
            rtype,
            class_id: AtomicU16::new(class_id),
            package_bytes: OnceLock::new(),
            name_bytes: OnceLock::new(),
            full_name_bytes: OnceLock::new(),
            type_tag_bytes: OnceLock::new(),
            codec: RwLock::new(None),
            structural_def: OnceLock::new(),
        }
    }

    pub fn rtype(&self) -> &RType {
        &self.rtype
    }

    pub fn class_id(&self) -> u16 {
        self.class_id.load(Ordering::Relaxed)
    }

    pub fn is_registered(&self) -> bool {
        self.class_id() != NO_CLASS_ID
    }

    pub(crate) fn set_class_id(&self, id: u16) {
        self.class_id.store(id, Ordering::Relaxed);
    }

    /// Interned package-name bytes, computed on first use.
    pub fn package_bytes(&self) -> &MetaString {
        self.package_bytes
            .get_or_init(|| MetaString::from_str(self.rtype.package_name()))
    }

    /// Interned simple-name bytes, computed on first use.
    pub fn name_bytes(&self) -> &MetaString {
        self.name_bytes
            .get_or_init(|| MetaString::from_str(self.rtype.simple_name()))
    }

    /// Interned full dotted name, used on the cross-language wire.
    pub fn full_name_bytes(&self) -> &MetaString {
        self.full_name_bytes
            .get_or_init(|| MetaString::from_str(self.rtype.qualified_name()))
    }

    pub(crate) fn set_type_tag(&self, tag: &str) {
        let _ = self.type_tag_bytes.set(MetaString::from_str(tag));
    }

    pub fn type_tag_bytes(&self) -> Option<&MetaString> {
        self.type_tag_bytes.get()
    }

    /// The bound codec, if materialized. May change between calls while a
    /// compilation upgrade is in flight.
    pub fn codec(&self) -> Option<Arc<dyn Codec>> {
        self.codec.read().clone()
    }

    pub fn has_codec(&self) -> bool {
        self.codec.read().is_some()
    }

    pub fn codec_kind(&self) -> Option<CodecKind> {
        self.codec.read().as_ref().map(|c| c.kind())
    }

    pub(crate) fn install_codec(&self, codec: Arc<dyn Codec>) {
        *self.codec.write() = Some(codec);
    }

    pub(crate) fn clear_codec(&self) {
        *self.codec.write() = None;
    }

    pub(crate) fn set_structural_def(&self, def: Arc<ClassDef>) {
        let _ = self.structural_def.set(def);
    }

    pub fn structural_def(&self) -> Option<&Arc<ClassDef>> {
        self.structural_def.get()
    }
}

impl std::fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassInfo")
            .field("type", &self.rtype.qualified_name())
            .field("class_id", &self.class_id())
            .field("codec", &self.codec_kind())
            .finish()
    }
}

/// Caller-owned single-slot cache of the last resolved [`ClassInfo`],
/// passed into the read hot path by generated code.
#[derive(Default)]
pub struct ClassInfoCell {
    info: Option<Arc<ClassInfo>>,
}

impl ClassInfoCell {
    pub fn new() -> Self {
        ClassInfoCell { info: None }
    }

    pub fn get(&self) -> Option<&Arc<ClassInfo>> {
        self.info.as_ref()
    }

    pub fn set(&mut self, info: Arc<ClassInfo>) {
        self.info = Some(info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EnumCodec;
    use crate::types::RType;

    #[test]
    fn test_name_bytes_are_lazy_and_stable() {
        let info = ClassInfo::new(RType::builder("user", "App$Foo").build(), NO_CLASS_ID);
        let package = info.package_bytes().clone();
        assert_eq!(package.as_bytes(), b"user");
        assert_eq!(info.name_bytes().as_bytes(), b"App$Foo");
        assert_eq!(info.full_name_bytes().as_bytes(), b"user.App$Foo");
        // Second call returns the identical interned value.
        assert_eq!(info.package_bytes().hash64(), package.hash64());
    }

    #[test]
    fn test_codec_swap() {
        let info = ClassInfo::new(RType::builder("user", "E").build(), NO_CLASS_ID);
        assert!(!info.has_codec());
        info.install_codec(Arc::new(EnumCodec));
        assert_eq!(info.codec_kind(), Some(CodecKind::Enum));
        info.clear_codec();
        assert!(info.codec().is_none());
    }

    #[test]
    fn test_class_id_mutation() {
        let info = ClassInfo::new(RType::builder("user", "T").build(), NO_CLASS_ID);
        assert!(!info.is_registered());
        info.set_class_id(200);
        assert_eq!(info.class_id(), 200);
        assert!(info.is_registered());
    }
}
