// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end resolver scenarios with exact wire bytes.

use hser::types::{FieldType, PrimitiveKind};
use hser::{
    Buffer, CodecKind, Error, MetaContext, Resolver, ResolverConfig, RType, TypeUniverse,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const USE_CLASS_VALUE: u8 = 0x00;

fn open_config() -> ResolverConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    ResolverConfig::new().with_require_class_registration(false)
}

fn struct_type(package: &str, simple: &str) -> RType {
    RType::builder(package, simple)
        .serializable()
        .field("x", FieldType::I32)
        .build()
}

#[test]
fn test_fast_integer_path() {
    let mut resolver = Resolver::new(ResolverConfig::default()).expect("resolver");
    let integer = resolver.builtins().boxed(PrimitiveKind::I32).clone();

    let mut buf = Buffer::new();
    resolver
        .write_class_and_update(&mut buf, &integer)
        .expect("write");
    // tag=USE_ID, little-endian id 17 (INTEGER_CLASS_ID).
    assert_eq!(buf.as_slice(), &[0x01, 0x11, 0x00]);

    assert_eq!(resolver.read_class(&mut buf).expect("read"), integer);
}

#[test]
fn test_unregistered_name_path_interns_strings() {
    let mut resolver = Resolver::new(open_config()).expect("resolver");
    let foo = resolver.declare(struct_type("user", "App$Foo"));

    let mut buf = Buffer::new();
    resolver.write_class_and_update(&mut buf, &foo).expect("write");

    let mut expected = vec![USE_CLASS_VALUE];
    expected.push((b"user".len() as u8) << 1);
    expected.extend_from_slice(b"user");
    expected.push((b"App$Foo".len() as u8) << 1);
    expected.extend_from_slice(b"App$Foo");
    assert_eq!(buf.as_slice(), expected.as_slice());

    // A second write of the same class emits only short interned ids.
    let before = buf.writer_index();
    resolver.write_class_and_update(&mut buf, &foo).expect("write");
    assert_eq!(&buf.as_slice()[before..], &[USE_CLASS_VALUE, 0x01, 0x03]);

    // Both records resolve back to the same info.
    let first = resolver.read_class_info(&mut buf).expect("read");
    let second = resolver.read_class_info(&mut buf).expect("read");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.rtype(), &foo);
}

#[test]
fn test_duplicate_id_registration() {
    let mut resolver = Resolver::new(open_config()).expect("resolver");
    let a = resolver.declare(struct_type("user", "A"));
    let b = resolver.declare(struct_type("user", "B"));

    resolver.register_with_id(&a, 200).expect("register A");
    let err = resolver.register_with_id(&b, 200).unwrap_err();
    assert!(matches!(err, Error::DuplicateRegistration { .. }));
    // The registry still resolves 200 -> A.
    assert_eq!(resolver.registered_type(200), Some(a));
    assert_eq!(resolver.registered_id(&b), None);
}

#[test]
fn test_blacklisted_class_is_insecure_unless_registered() {
    let gadget = || struct_type("com.sun.rowset", "JdbcRowSetImpl");

    let mut resolver = Resolver::new(open_config()).expect("resolver");
    let t = resolver.declare(gadget());
    let err = resolver.get_codec(&t).unwrap_err();
    assert!(matches!(err, Error::Insecure { .. }));

    // Explicit registration overrides the deny-list (with a warning).
    let mut trusting = Resolver::new(open_config()).expect("resolver");
    let t = trusting.declare(gadget());
    trusting.register(&t).expect("register");
    let codec = trusting.get_codec(&t).expect("codec");
    assert_ne!(codec.kind(), CodecKind::LazyInit);
}

#[test]
fn test_meta_share_round_trip() {
    let shared = Arc::new(TypeUniverse::new());
    let x = shared.declare(struct_type("user", "X"));
    let y = shared.declare(struct_type("user", "Y"));

    let config = open_config().with_meta_share(true);
    let mut writer =
        Resolver::with_loader(config.clone(), shared.clone()).expect("writer");
    writer.set_meta_context(MetaContext::new());

    let mut buf = Buffer::new();
    let envelope = buf.grow(4);
    writer.write_class_and_update(&mut buf, &x).expect("write X");
    writer.write_class_and_update(&mut buf, &y).expect("write Y");
    writer.write_class_and_update(&mut buf, &x).expect("write X again");
    // Write sites carry session ids 0, 1, 0 as positive varints.
    assert_eq!(
        &buf.as_slice()[4..],
        &[
            USE_CLASS_VALUE, 0x00, //
            USE_CLASS_VALUE, 0x01, //
            USE_CLASS_VALUE, 0x00,
        ]
    );

    let defs_at = buf.writer_index();
    writer.flush_class_defs(&mut buf).expect("flush");
    buf.put_u32_le(envelope, defs_at as u32);
    // Trailing section: count 2, then the two definition blobs.
    assert_eq!(buf.as_slice()[defs_at], 2);
    assert!(writer
        .meta_context()
        .expect("ctx")
        .writing_class_defs()
        .is_empty());

    let mut reader = Resolver::with_loader(config, shared).expect("reader");
    reader.set_meta_context(MetaContext::new());
    let mut incoming = Buffer::from_vec(buf.as_slice().to_vec());
    reader.read_class_defs(&mut incoming).expect("read defs");
    assert_eq!(reader.meta_context().expect("ctx").read_class_defs().len(), 2);

    for expected in [&x, &y, &x] {
        let info = reader.read_class_info(&mut incoming).expect("read");
        assert_eq!(info.rtype(), expected);
    }
    let ctx = reader.meta_context().expect("ctx");
    assert_eq!(
        ctx.read_class_infos()[0].as_ref().expect("slot 0").rtype(),
        &x
    );
    assert_eq!(
        ctx.read_class_infos()[1].as_ref().expect("slot 1").rtype(),
        &y
    );
}

#[test]
fn test_meta_share_requires_def_exchange() {
    let shared = Arc::new(TypeUniverse::new());
    let x = shared.declare(struct_type("user", "X"));
    let config = open_config().with_meta_share(true);

    let mut writer = Resolver::with_loader(config.clone(), shared.clone()).expect("writer");
    writer.set_meta_context(MetaContext::new());
    let mut buf = Buffer::new();
    writer.write_class_and_update(&mut buf, &x).expect("write");

    // Reader that never saw the definition trailer cannot resolve id 0.
    let mut reader = Resolver::with_loader(config, shared).expect("reader");
    reader.set_meta_context(MetaContext::new());
    let mut incoming = Buffer::from_vec(buf.as_slice().to_vec());
    let err = reader.read_class_info(&mut incoming).unwrap_err();
    assert!(matches!(err, Error::InvalidData { .. }));
}

#[test]
fn test_meta_share_without_context_fails() {
    let mut resolver = Resolver::new(open_config().with_meta_share(true)).expect("resolver");
    let t = resolver.declare(struct_type("user", "NoCtx"));
    let mut buf = Buffer::new();
    let err = resolver.write_class_and_update(&mut buf, &t).unwrap_err();
    assert!(matches!(err, Error::MissingMetaContext));
}

#[test]
fn test_recursive_types_resolve_to_concrete_codecs() {
    // A.field: B, B.field: A. The nested frame must break the cycle with a
    // lazily initialized codec and both types must end concrete.
    let mut resolver = Resolver::new(open_config()).expect("resolver");
    let a = resolver.declare(
        RType::builder("user", "A")
            .serializable()
            .field("b", FieldType::Object("user.B".into()))
            .build(),
    );
    let b = resolver.declare(
        RType::builder("user", "B")
            .serializable()
            .field("a", FieldType::Object("user.A".into()))
            .build(),
    );

    let codec_a = resolver.get_codec(&a).expect("codec A");
    let codec_b = resolver.get_codec(&b).expect("codec B");
    assert_eq!(codec_a.kind(), CodecKind::GeneratedObject);
    assert_eq!(codec_b.kind(), CodecKind::GeneratedObject);
}

#[test]
fn test_registered_ids_resolve_back_to_their_types() {
    let mut resolver = Resolver::new(open_config()).expect("resolver");
    let a = resolver.declare(struct_type("user", "A"));
    let b = resolver.declare(struct_type("user", "B"));
    resolver.register(&a).expect("register");
    resolver.register_with_id(&b, 500).expect("register");

    for t in resolver.registered_types() {
        let id = resolver.registered_id(&t).expect("id");
        assert_eq!(resolver.registered_type(id), Some(t));
    }
}

#[test]
fn test_selection_is_stable_across_calls() {
    let mut resolver = Resolver::new(open_config()).expect("resolver");
    let t = resolver.declare(struct_type("user", "Stable"));
    let first = resolver.get_codec(&t).expect("codec").kind();
    let second = resolver.get_codec(&t).expect("codec").kind();
    assert_eq!(first, second);
}

#[test]
fn test_user_registration_boundaries() {
    let mut resolver = Resolver::new(open_config()).expect("resolver");
    let t = resolver.declare(struct_type("user", "Bounds"));
    assert!(resolver.register_with_id(&t, 0).is_err());
    assert!(resolver.register_with_id(&t, 32767).is_err());

    let id = resolver.register(&t).expect("register");
    assert!(id > resolver.inner_end_class_id());
}

#[test]
fn test_async_compilation_upgrades_codec() {
    let config = open_config().with_async_compilation(true);
    let mut resolver = Resolver::new(config).expect("resolver");
    let t = resolver.declare(struct_type("user", "Hot"));

    // First materialization returns the fallback immediately.
    let interim = resolver.get_codec(&t).expect("codec");
    assert_eq!(interim.kind(), CodecKind::Object);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !resolver.jit().is_idle() {
        assert!(Instant::now() < deadline, "compile worker stuck");
        std::thread::sleep(Duration::from_millis(1));
    }
    // The compiled codec was swapped into the same ClassInfo; callers
    // re-fetching through the resolver observe the upgrade.
    assert_eq!(
        resolver.get_codec_if_exists(&t).map(|c| c.kind()),
        Some(CodecKind::GeneratedObject)
    );
}

#[test]
fn test_caller_owned_cache_cell() {
    let mut resolver = Resolver::new(open_config()).expect("resolver");
    let t = resolver.declare(struct_type("user", "Cached"));
    let mut buf = Buffer::new();
    resolver.write_class_and_update(&mut buf, &t).expect("write");
    resolver.write_class_and_update(&mut buf, &t).expect("write");

    let mut cell = hser::ClassInfoCell::new();
    let first = resolver
        .read_class_info_cached(&mut buf, &mut cell)
        .expect("read");
    assert!(Arc::ptr_eq(cell.get().expect("cell filled"), &first));
    let second = resolver
        .read_class_info_cached(&mut buf, &mut cell)
        .expect("read");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_compatible_mode_selects_compatible_codec() {
    let config = open_config()
        .with_compatible_mode(hser::CompatibleMode::Compatible)
        .with_codegen(false);
    let mut resolver = Resolver::new(config).expect("resolver");
    let t = resolver.declare(struct_type("user", "Drifty"));
    assert_eq!(
        resolver.get_codec(&t).expect("codec").kind(),
        CodecKind::CompatibleObject
    );
}

#[test]
fn test_required_registration_refuses_unknown_struct() {
    let mut resolver = Resolver::new(ResolverConfig::default()).expect("resolver");
    let t = resolver.declare(struct_type("user", "Stranger"));
    let err = resolver.get_codec(&t).unwrap_err();
    assert!(matches!(err, Error::Insecure { .. }));
}

#[test]
fn test_tolerant_mode_substitutes_skip_placeholder() {
    // Writer knows the type; reader does not, but tolerates it.
    let writer_universe = Arc::new(TypeUniverse::new());
    let ghost = writer_universe.declare(struct_type("user", "Ghost"));
    let mut writer =
        Resolver::with_loader(open_config(), writer_universe).expect("writer");
    let mut buf = Buffer::new();
    writer.write_class_and_update(&mut buf, &ghost).expect("write");

    let mut reader =
        Resolver::new(open_config().with_deserialize_unexisted(true)).expect("reader");
    let mut incoming = Buffer::from_vec(buf.as_slice().to_vec());
    let info = reader.read_class_info(&mut incoming).expect("read");
    assert_eq!(info.rtype(), &reader.builtins().unexisted_skip);

    // Without tolerance the same bytes fail.
    let mut strict = Resolver::new(open_config()).expect("reader");
    let mut incoming = Buffer::from_vec(buf.as_slice().to_vec());
    let err = strict.read_class_info(&mut incoming).unwrap_err();
    assert!(matches!(err, Error::ClassNotFound { .. }));
}
