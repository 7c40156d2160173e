// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name-to-type resolution.
//!
//! `TypeLoader` is the narrow seam through which the resolver reconstructs
//! types from wire names. `TypeUniverse` is the interning implementation the
//! application populates; a process-wide ambient universe serves as the
//! fallback of the default loader chain.

use super::RType;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Resolves a qualified name to a declared type, if known.
pub trait TypeLoader: Send + Sync {
    fn try_load(&self, qualified: &str) -> Option<RType>;
}

/// Interning registry of declared types, keyed by qualified name.
///
/// `declare` returns the canonical handle: declaring the same name twice
/// yields the first handle, preserving identity semantics for every map
/// keyed by `RType`.
pub struct TypeUniverse {
    by_name: RwLock<HashMap<String, RType>>,
}

impl TypeUniverse {
    pub fn new() -> Self {
        TypeUniverse {
            by_name: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide ambient universe, the default loader fallback.
    pub fn global() -> &'static TypeUniverse {
        static GLOBAL: OnceLock<TypeUniverse> = OnceLock::new();
        GLOBAL.get_or_init(TypeUniverse::new)
    }

    /// Intern a type. Returns the canonical handle for its name.
    pub fn declare(&self, rtype: RType) -> RType {
        let mut map = self.by_name.write().unwrap_or_else(|e| e.into_inner());
        map.entry(rtype.qualified_name().to_owned())
            .or_insert(rtype)
            .clone()
    }

    pub fn get(&self, qualified: &str) -> Option<RType> {
        let map = self.by_name.read().unwrap_or_else(|e| e.into_inner());
        map.get(qualified).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeUniverse {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeLoader for TypeUniverse {
    fn try_load(&self, qualified: &str) -> Option<RType> {
        self.get(qualified)
    }
}

impl TypeLoader for &'static TypeUniverse {
    fn try_load(&self, qualified: &str) -> Option<RType> {
        self.get(qualified)
    }
}

/// Tries a primary loader, then a fallback.
pub struct CompositeLoader {
    primary: Arc<dyn TypeLoader>,
    fallback: Arc<dyn TypeLoader>,
}

impl CompositeLoader {
    pub fn new(primary: Arc<dyn TypeLoader>, fallback: Arc<dyn TypeLoader>) -> Self {
        CompositeLoader { primary, fallback }
    }
}

impl TypeLoader for CompositeLoader {
    fn try_load(&self, qualified: &str) -> Option<RType> {
        self.primary
            .try_load(qualified)
            .or_else(|| self.fallback.try_load(qualified))
    }
}
