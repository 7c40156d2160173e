// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec selection policy.
//!
//! `select_codec_kind` is a cascade of disjoint predicates in a fixed
//! order; the first match wins. The security gate runs before any codec is
//! materialized for an unregistered type. Circular selection (type A's
//! field is B, B's field is A) is broken by the per-resolver selecting set:
//! the nested frame gets a lazily-initialized codec and the outer frame
//! installs the real one.

use super::blacklist::default_blacklist;
use super::{ClassInfo, Resolver};
use crate::codec::{
    self, CodecKind, FieldPlan, GeneratedObjectCodec, UnexistedCodec,
};
use crate::config::{CompatibleMode, Language};
use crate::error::{Error, Result};
use crate::types::{ContainerKind, FieldType, RType, StubKind, TypeKind};
use std::sync::Arc;

/// True when the type substitutes objects at write time or reconstructs
/// them at read time.
pub(crate) fn uses_replace_resolve(t: &RType) -> bool {
    t.traits().write_replace || t.traits().read_resolve
}

/// True when the type requires legacy stream serialization: serializable,
/// not an enum/array/runtime-generated type, no replace/resolve hooks, not
/// externalizable, but declares at least one custom stream hook.
pub(crate) fn requires_stream_serialization(t: &RType) -> bool {
    if t.is_enum() || t.is_array() {
        return false;
    }
    let traits_ = t.traits();
    if traits_.runtime_generated || !traits_.serializable {
        return false;
    }
    if uses_replace_resolve(t) || traits_.externalizable {
        return false;
    }
    traits_.stream_read_hook || traits_.stream_write_hook
}

impl Resolver {
    /// Materialize and bind the codec for `t`. This is the sole codec
    /// creation path; every lookup that finds no codec funnels here.
    pub(crate) fn create_codec(&mut self, t: &RType) -> Result<Arc<ClassInfo>> {
        self.security_gate(t)?;
        let info = self.ensure_class_info(t);
        let provided = match &self.ext.codec_provider {
            Some(provider) => provider(t),
            None => None,
        };
        if let Some(codec) = provided {
            self.add_codec(t, codec);
            return Ok(info);
        }
        let kind = self.select_codec_kind(t)?;
        let codec = self.instantiate(kind, t)?;
        self.add_codec(t, codec);
        // Deferred compiles must not be submitted before the interim codec
        // is installed; a fast worker would be overwritten otherwise.
        if let Some(submit) = self.ext.pending_compile.take() {
            submit();
        }
        Ok(info)
    }

    /// The selection cascade. Pure policy: no codec is built here.
    pub(crate) fn select_codec_kind(&mut self, t: &RType) -> Result<CodecKind> {
        // Primitives use their boxed form's codec.
        if matches!(t.kind(), TypeKind::Primitive(_) | TypeKind::Boxed(_)) {
            return Ok(CodecKind::Primitive);
        }
        // Pre-bound codec wins.
        if let Some(info) = self.class_info_map.get(t) {
            if let Some(codec) = info.codec() {
                return Ok(codec.kind());
            }
        }
        match t.kind() {
            TypeKind::Enum => return Ok(CodecKind::Enum),
            TypeKind::EnumSet => return Ok(CodecKind::EnumSet),
            TypeKind::Charset => return Ok(CodecKind::Charset),
            TypeKind::Array => {
                if t.element().is_some_and(RType::is_primitive) {
                    return Err(Error::Unsupported {
                        reason: format!(
                            "primitive array {} must be pre-registered",
                            t.qualified_name()
                        ),
                    });
                }
                return Ok(CodecKind::ObjectArray);
            }
            TypeKind::Lambda | TypeKind::Stub(StubKind::Lambda) => return Ok(CodecKind::Lambda),
            TypeKind::Proxy | TypeKind::Stub(StubKind::Proxy) => return Ok(CodecKind::Proxy),
            TypeKind::Stub(StubKind::Replace) => return Ok(CodecKind::ReplaceResolve),
            TypeKind::Time(_) => return Ok(CodecKind::Time),
            TypeKind::Str => return Ok(CodecKind::String),
            TypeKind::Class => return Ok(CodecKind::Class),
            TypeKind::Unexisted(_) => return Ok(CodecKind::Unexisted),
            _ => {}
        }
        if t.traits().externalizable {
            return Ok(CodecKind::Externalizable);
        }
        if t.kind() == TypeKind::Collection(ContainerKind::Immutable) {
            return Ok(CodecKind::ImmutableList);
        }
        if t.kind() == TypeKind::Map(ContainerKind::Immutable) {
            return Ok(CodecKind::ImmutableMap);
        }
        if t.kind() == TypeKind::ByteBuffer {
            return Ok(CodecKind::ByteBuffer);
        }
        if self.config.check_std_serializable
            && t.traits().std_library
            && !t.traits().serializable
        {
            return Err(Error::Unsupported {
                reason: format!(
                    "standard-library type {} does not support serialization",
                    t.qualified_name()
                ),
            });
        }
        if t.is_collection() {
            if let Some(&kind) = self.ext.child_containers.get(t.qualified_name()) {
                return Ok(kind);
            }
            if requires_stream_serialization(t) || uses_replace_resolve(t) {
                return Ok(CodecKind::StreamCollection);
            }
            return Ok(match self.config.language {
                Language::Native => CodecKind::DefaultCollection,
                Language::Cross => CodecKind::CrossLangCollection,
            });
        }
        if t.is_map() {
            if let Some(&kind) = self.ext.child_containers.get(t.qualified_name()) {
                return Ok(kind);
            }
            if requires_stream_serialization(t) || uses_replace_resolve(t) {
                return Ok(CodecKind::StreamMap);
            }
            return Ok(match self.config.language {
                Language::Native => CodecKind::DefaultMap,
                Language::Cross => CodecKind::CrossLangMap,
            });
        }
        if uses_replace_resolve(t) {
            return Ok(CodecKind::ReplaceResolve);
        }
        if requires_stream_serialization(t) {
            return Ok(self.config.stream_fallback);
        }
        self.object_codec_kind(t)
    }

    /// Fallback object-codec choice, including the compilation request and
    /// the circular-selection guard.
    fn object_codec_kind(&mut self, t: &RType) -> Result<CodecKind> {
        let share_meta = self.config.meta_share_enabled;
        let default_kind = match self.config.compatible_mode {
            CompatibleMode::SchemaConsistent => CodecKind::Object,
            // With shared class defs the peer rebuilds the layout itself,
            // so the plain object layout suffices.
            CompatibleMode::Compatible => {
                if share_meta {
                    CodecKind::Object
                } else {
                    CodecKind::CompatibleObject
                }
            }
        };
        if !self.config.codegen_enabled {
            return Ok(default_kind);
        }
        if self.ext.selecting.contains(t) {
            return Ok(CodecKind::LazyInit);
        }
        self.ext.selecting.insert(t.clone());
        let result = self.request_compiled_codec(t, default_kind);
        self.ext.selecting.remove(t);
        result
    }

    fn request_compiled_codec(
        &mut self,
        t: &RType,
        default_kind: CodecKind,
    ) -> Result<CodecKind> {
        let compatible = default_kind == CodecKind::CompatibleObject;
        let compiled_kind = if compatible {
            CodecKind::GeneratedCompatible
        } else {
            CodecKind::GeneratedObject
        };
        let info = self.ensure_class_info(t);
        let plans = Arc::clone(&self.ext.field_plans);
        let target = t.clone();
        let compile = move || {
            let plan = plans
                .entry(target.clone())
                .or_insert_with(|| Arc::new(FieldPlan::of(&target)))
                .value()
                .clone();
            Ok(Arc::new(GeneratedObjectCodec::new(plan, compatible)) as Arc<dyn codec::Codec>)
        };
        let on_ready = move |compiled: Arc<dyn codec::Codec>| info.install_codec(compiled);
        if self.jit.is_async() {
            let jit = Arc::clone(&self.jit);
            let label = t.qualified_name().to_owned();
            self.ext.pending_compile = Some(Box::new(move || {
                jit.register_codec_callback(default_kind, &label, compile, on_ready);
            }));
            Ok(default_kind)
        } else {
            // Inline compilation resolves field codecs eagerly; this is the
            // recursion point for mutually referential types.
            self.pre_resolve_fields(t)?;
            let factory = self.jit.register_codec_callback(
                default_kind,
                t.qualified_name(),
                compile,
                on_ready,
            );
            debug_assert!(
                matches!(factory.current_kind(), k if k == compiled_kind || k == default_kind)
            );
            Ok(factory.current_kind())
        }
    }

    fn pre_resolve_fields(&mut self, t: &RType) -> Result<()> {
        let referenced: Vec<String> = t
            .fields()
            .iter()
            .filter_map(|field| match &field.ty {
                FieldType::Object(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        for name in referenced {
            if let Some(field_type) = self.loader.try_load(&name) {
                if field_type.is_struct() {
                    self.get_or_create_class_info(&field_type)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn instantiate(&self, kind: CodecKind, t: &RType) -> Result<Arc<dyn codec::Codec>> {
        match kind {
            CodecKind::GeneratedObject | CodecKind::GeneratedCompatible => {
                let plan = self
                    .ext
                    .field_plans
                    .entry(t.clone())
                    .or_insert_with(|| Arc::new(FieldPlan::of(t)))
                    .value()
                    .clone();
                Ok(Arc::new(GeneratedObjectCodec::new(
                    plan,
                    kind == CodecKind::GeneratedCompatible,
                )))
            }
            // A definition-less placeholder; meta-shared reads build a
            // def-bearing instance at their own call site.
            CodecKind::Unexisted => Ok(Arc::new(UnexistedCodec::new(None))),
            _ => codec::new_codec(kind, t),
        }
    }

    /// Refuse blacklisted or untrusted unregistered types; warn once per
    /// tolerated type.
    pub(crate) fn security_gate(&mut self, t: &RType) -> Result<()> {
        let forbidden = default_blacklist().contains(t.qualified_name());
        if self.registry.is_registered(t) {
            // Explicit registration overrides the deny-list, loudly.
            if forbidden && self.ext.warned.insert(t.clone()) {
                log::warn!(
                    "{} is on the default deny-list but was explicitly registered",
                    t.qualified_name()
                );
            }
            return Ok(());
        }
        let reason = format!(
            "{} is not registered; if this is not a type you intend to serialize it may \
             be a vulnerability, and registering it will also perform better than \
             transmitting its name",
            t.qualified_name()
        );
        if forbidden || (self.config.require_class_registration && !self.is_trusted(t)) {
            return Err(Error::Insecure { reason });
        }
        if !t.is_lambda() && !t.is_proxy() && self.ext.warned.insert(t.clone()) {
            log::warn!("{reason}");
        }
        Ok(())
    }

    /// Unregistered types implicitly trusted by the gate: lambdas, proxies,
    /// and arrays of trusted components.
    fn is_trusted(&self, t: &RType) -> bool {
        if default_blacklist().contains(t.qualified_name()) {
            return false;
        }
        if self.registry.is_registered(t) {
            return true;
        }
        if let Some(element) = t.element() {
            if t.is_array() {
                return self.is_trusted(element);
            }
        }
        t.is_lambda() || t.is_proxy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::types::{TimeKind, TypeTraits};

    fn resolver() -> Resolver {
        Resolver::new(ResolverConfig::new().with_require_class_registration(false))
            .expect("resolver")
    }

    fn kind_of(resolver: &mut Resolver, t: &RType) -> CodecKind {
        resolver.get_codec(t).expect("codec").kind()
    }

    fn declared(resolver: &Resolver, builder: crate::types::TypeBuilder) -> RType {
        resolver.declare(builder.build())
    }

    #[test]
    fn test_special_kinds_pick_their_codecs() {
        let mut r = resolver();
        let cases = [
            (TypeKind::Enum, CodecKind::Enum),
            (TypeKind::EnumSet, CodecKind::EnumSet),
            (TypeKind::Charset, CodecKind::Charset),
            (TypeKind::Lambda, CodecKind::Lambda),
            (TypeKind::Proxy, CodecKind::Proxy),
            (TypeKind::Time(TimeKind::ZoneId), CodecKind::Time),
            (TypeKind::ByteBuffer, CodecKind::ByteBuffer),
            (
                TypeKind::Collection(ContainerKind::Immutable),
                CodecKind::ImmutableList,
            ),
            (TypeKind::Map(ContainerKind::Immutable), CodecKind::ImmutableMap),
        ];
        for (index, (type_kind, codec_kind)) in cases.into_iter().enumerate() {
            let t = declared(&r, RType::builder("user", format!("T{index}")).kind(type_kind));
            assert_eq!(kind_of(&mut r, &t), codec_kind, "{type_kind:?}");
        }
    }

    #[test]
    fn test_externalizable_beats_container_choice() {
        let mut r = resolver();
        let t = declared(
            &r,
            RType::builder("user", "ExtList")
                .kind(TypeKind::Collection(ContainerKind::Standard))
                .traits(TypeTraits {
                    serializable: true,
                    externalizable: true,
                    ..Default::default()
                }),
        );
        assert_eq!(kind_of(&mut r, &t), CodecKind::Externalizable);
    }

    #[test]
    fn test_container_cascade() {
        let mut r = resolver();
        let plain = declared(
            &r,
            RType::builder("user", "MyList").kind(TypeKind::Collection(ContainerKind::Standard)),
        );
        assert_eq!(kind_of(&mut r, &plain), CodecKind::DefaultCollection);

        // Stream hooks force the stream-compatible container codec.
        let hooked = declared(
            &r,
            RType::builder("user", "HookedMap")
                .kind(TypeKind::Map(ContainerKind::Standard))
                .traits(TypeTraits {
                    serializable: true,
                    stream_write_hook: true,
                    ..Default::default()
                }),
        );
        assert_eq!(kind_of(&mut r, &hooked), CodecKind::StreamMap);

        // Child-container specializations override both.
        let special = declared(
            &r,
            RType::builder("user", "Special").kind(TypeKind::Collection(ContainerKind::Standard)),
        );
        r.register_child_container("user.Special", CodecKind::ImmutableList);
        assert_eq!(kind_of(&mut r, &special), CodecKind::ImmutableList);
    }

    #[test]
    fn test_replace_resolve_and_stream_fallback() {
        let mut r = resolver();
        let replaced = declared(
            &r,
            RType::builder("user", "Replaced").traits(TypeTraits {
                serializable: true,
                write_replace: true,
                ..Default::default()
            }),
        );
        assert_eq!(kind_of(&mut r, &replaced), CodecKind::ReplaceResolve);

        let streamed = declared(
            &r,
            RType::builder("user", "Streamed").traits(TypeTraits {
                serializable: true,
                stream_read_hook: true,
                ..Default::default()
            }),
        );
        assert_eq!(kind_of(&mut r, &streamed), CodecKind::StreamFallback);
        // Replace/resolve hooks disqualify stream serialization.
        assert!(!requires_stream_serialization(&replaced));
        assert!(requires_stream_serialization(&streamed));
    }

    #[test]
    fn test_std_library_serializability_check() {
        let mut strict = resolver();
        let t = declared(
            &strict,
            RType::builder("std.io", "Handle").traits(TypeTraits {
                std_library: true,
                ..Default::default()
            }),
        );
        let err = strict.get_codec(&t).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));

        let mut lenient = Resolver::new(
            ResolverConfig::new()
                .with_require_class_registration(false)
                .with_check_std_serializable(false),
        )
        .expect("resolver");
        let t = declared(
            &lenient,
            RType::builder("std.io", "Handle").traits(TypeTraits {
                std_library: true,
                ..Default::default()
            }),
        );
        assert_eq!(kind_of(&mut lenient, &t), CodecKind::GeneratedObject);
    }

    #[test]
    fn test_user_primitive_array_is_rejected() {
        let mut r = resolver();
        let int_primitive = r.builtins().primitive(crate::types::PrimitiveKind::I32).clone();
        let t = declared(
            &r,
            RType::builder("user", "int[][]")
                .kind(TypeKind::Array)
                .element(int_primitive),
        );
        let err = r.get_codec(&t).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));

        let boxed = declared(&r, RType::builder("user", "Box"));
        let object_array = declared(
            &r,
            RType::builder("user", "Box[]").kind(TypeKind::Array).element(boxed),
        );
        assert_eq!(kind_of(&mut r, &object_array), CodecKind::ObjectArray);
    }

    #[test]
    fn test_lambdas_are_trusted_under_required_registration() {
        let mut strict = Resolver::new(ResolverConfig::default()).expect("resolver");
        let lambda = strict.declare(
            RType::builder("user", "Fn$1").kind(TypeKind::Lambda).build(),
        );
        assert_eq!(kind_of(&mut strict, &lambda), CodecKind::Lambda);

        let stranger = strict.declare(RType::builder("user", "Stranger").build());
        assert!(matches!(
            strict.get_codec(&stranger).unwrap_err(),
            Error::Insecure { .. }
        ));
    }
}
