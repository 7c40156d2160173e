// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Class-name wire channel.
//!
//! Unregistered types are transmitted as two interned byte strings
//! (package, simple name). Reads are served by three layers, fastest
//! first: the single-slot cache compared by name hashes, the composite
//! `(package_hash, name_hash)` cache, and finally UTF-8 decoding plus the
//! loader chain.

use super::{ClassInfo, Resolver};
use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::meta::MetaString;
use crate::types::RType;
use std::sync::Arc;

/// Composite cache key: a reconstructed type identified by two 64-bit
/// content hashes, with no string comparison on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ClassNameKey {
    package_hash: u64,
    name_hash: u64,
}

impl Resolver {
    /// Emit `package` then `simple name` through the interned-string
    /// channel.
    pub(crate) fn write_name_bytes(&mut self, buf: &mut Buffer, info: &Arc<ClassInfo>) {
        let package = info.package_bytes().clone();
        let simple = info.name_bytes().clone();
        self.meta_strings.write_meta_string(buf, &package);
        self.meta_strings.write_meta_string(buf, &simple);
    }

    /// Read a class transmitted by name, trying `cached` first: when both
    /// name hashes match the cached info, it is returned without any map
    /// lookup.
    pub(crate) fn read_class_info_from_bytes(
        &mut self,
        buf: &mut Buffer,
        cached: Option<Arc<ClassInfo>>,
    ) -> Result<Arc<ClassInfo>> {
        let package = self.meta_strings.read_meta_string(buf)?;
        let simple = self.meta_strings.read_meta_string(buf)?;
        if let Some(cached) = cached {
            if cached.name_bytes().hash64() == simple.hash64()
                && cached.package_bytes().hash64() == package.hash64()
            {
                debug_assert_eq!(cached.package_bytes().as_bytes(), package.as_bytes());
                debug_assert_eq!(cached.name_bytes().as_bytes(), simple.as_bytes());
                return Ok(cached);
            }
        }
        let rtype = self.load_bytes_to_type(&package, &simple)?;
        self.get_or_create_class_info(&rtype)
    }

    /// Resolve two name byte strings to a type through the composite
    /// cache.
    pub(crate) fn load_bytes_to_type(
        &mut self,
        package: &MetaString,
        simple: &MetaString,
    ) -> Result<RType> {
        let key = ClassNameKey {
            package_hash: package.hash64(),
            name_hash: simple.hash64(),
        };
        if let Some(rtype) = self.composite_name_cache.get(&key) {
            return Ok(rtype.clone());
        }
        let package_name = package.as_utf8()?;
        let simple_name = simple.as_utf8()?;
        let qualified = if package_name.is_empty() {
            simple_name.to_owned()
        } else {
            format!("{package_name}.{simple_name}")
        };
        let rtype = self.load_type(&qualified)?;
        self.composite_name_cache.insert(key, rtype.clone());
        Ok(rtype)
    }

    /// Resolve a qualified name through the loader chain. In tolerant mode
    /// an unresolvable name yields the skip placeholder instead of failing.
    pub(crate) fn load_type(&mut self, qualified: &str) -> Result<RType> {
        if let Some(rtype) = self.loader.try_load(qualified) {
            return Ok(rtype);
        }
        if self.config.deserialize_unexisted {
            log::error!("type {qualified} not found by any loader, substituting skip placeholder");
            return Ok(self.builtins.unexisted_skip.clone());
        }
        Err(Error::ClassNotFound {
            name: qualified.to_owned(),
        })
    }
}
