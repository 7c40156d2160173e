// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resolver configuration.
//!
//! Security-relevant switches default to the strict side: class
//! registration is required and standard-library serializability is
//! checked unless the application opts out.

use crate::codec::CodecKind;

/// Schema agreement between peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompatibleMode {
    /// Sender and receiver agree on layouts; fastest.
    #[default]
    SchemaConsistent,
    /// Deserialization tolerates schema drift.
    Compatible,
}

/// Peer language family, affecting default container codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Native,
    Cross,
}

/// Immutable resolver configuration, built once at setup.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub compatible_mode: CompatibleMode,
    pub language: Language,
    /// Ask the compilation context for generated codecs.
    pub codegen_enabled: bool,
    /// Compile on a worker thread instead of inline.
    pub async_compilation: bool,
    /// Ship class defs once per session instead of names per value.
    pub meta_share_enabled: bool,
    /// Refuse unregistered types that are not implicitly trusted.
    pub require_class_registration: bool,
    /// Substitute a skip placeholder for unresolvable wire names.
    pub deserialize_unexisted: bool,
    /// Refuse standard-library types without the serializable marker.
    pub check_std_serializable: bool,
    /// Track references to shared values.
    pub ref_tracking: bool,
    /// Codec used for types requiring legacy stream serialization.
    pub stream_fallback: CodecKind,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            compatible_mode: CompatibleMode::SchemaConsistent,
            language: Language::Native,
            codegen_enabled: true,
            async_compilation: false,
            meta_share_enabled: false,
            require_class_registration: true,
            deserialize_unexisted: false,
            check_std_serializable: true,
            ref_tracking: true,
            stream_fallback: CodecKind::StreamFallback,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compatible_mode(mut self, mode: CompatibleMode) -> Self {
        self.compatible_mode = mode;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_codegen(mut self, enabled: bool) -> Self {
        self.codegen_enabled = enabled;
        self
    }

    pub fn with_async_compilation(mut self, enabled: bool) -> Self {
        self.async_compilation = enabled;
        self
    }

    pub fn with_meta_share(mut self, enabled: bool) -> Self {
        self.meta_share_enabled = enabled;
        self
    }

    pub fn with_require_class_registration(mut self, required: bool) -> Self {
        self.require_class_registration = required;
        self
    }

    pub fn with_deserialize_unexisted(mut self, enabled: bool) -> Self {
        self.deserialize_unexisted = enabled;
        self
    }

    pub fn with_check_std_serializable(mut self, enabled: bool) -> Self {
        self.check_std_serializable = enabled;
        self
    }

    pub fn with_ref_tracking(mut self, enabled: bool) -> Self {
        self.ref_tracking = enabled;
        self
    }

    pub fn with_stream_fallback(mut self, kind: CodecKind) -> Self {
        self.stream_fallback = kind;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_strict() {
        let config = ResolverConfig::default();
        assert!(config.require_class_registration);
        assert!(config.check_std_serializable);
        assert!(!config.meta_share_enabled);
        assert_eq!(config.compatible_mode, CompatibleMode::SchemaConsistent);
        assert_eq!(config.stream_fallback, CodecKind::StreamFallback);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ResolverConfig::new()
            .with_compatible_mode(CompatibleMode::Compatible)
            .with_meta_share(true)
            .with_require_class_registration(false)
            .with_codegen(false);
        assert_eq!(config.compatible_mode, CompatibleMode::Compatible);
        assert!(config.meta_share_enabled);
        assert!(!config.require_class_registration);
        assert!(!config.codegen_enabled);
    }
}
