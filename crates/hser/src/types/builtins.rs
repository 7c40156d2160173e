// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built-in types backing the reserved id block.

use super::loader::TypeUniverse;
use super::{ContainerKind, PlaceholderKind, PrimitiveKind, RType, StubKind, TypeKind};

/// Handles to every built-in type, declared once per universe.
pub struct Builtins {
    primitives: [RType; 9],
    boxed: [RType; 9],
    pub string: RType,
    /// bool[] .. double[] (no void array).
    pub primitive_arrays: [RType; 8],
    pub string_array: RType,
    pub object_array: RType,
    pub array_list: RType,
    pub hash_map: RType,
    pub hash_set: RType,
    pub class_type: RType,
    pub object: RType,
    pub byte_buffer: RType,
    pub lambda_stub: RType,
    pub proxy_stub: RType,
    pub replace_stub: RType,
    pub unexisted_skip: RType,
    pub unexisted_meta_shared: RType,
}

/// Package owning the internal stub and placeholder types.
pub(crate) const INTERNAL_PACKAGE: &str = "hser";

impl Builtins {
    /// Declare all built-in types into `universe` and return their handles.
    ///
    /// Idempotent: re-installing over a populated universe returns the
    /// already-interned handles.
    pub fn install(universe: &TypeUniverse) -> Builtins {
        let primitive =
            |k: PrimitiveKind| -> RType {
                universe.declare(
                    RType::builder("", k.primitive_name())
                        .kind(TypeKind::Primitive(k))
                        .build(),
                )
            };
        let boxed = |k: PrimitiveKind| -> RType {
            universe.declare(
                RType::builder("", k.boxed_name())
                    .kind(TypeKind::Boxed(k))
                    .build(),
            )
        };

        let primitives = PrimitiveKind::ALL.map(primitive);
        let boxed = PrimitiveKind::ALL.map(boxed);
        let string = universe.declare(RType::builder("", "String").kind(TypeKind::Str).build());

        let array_kinds = [
            PrimitiveKind::Bool,
            PrimitiveKind::I8,
            PrimitiveKind::Char,
            PrimitiveKind::I16,
            PrimitiveKind::I32,
            PrimitiveKind::F32,
            PrimitiveKind::I64,
            PrimitiveKind::F64,
        ];
        let primitive_arrays = array_kinds.map(|k| {
            let element = primitives[k as usize].clone();
            universe.declare(
                RType::builder("", format!("{}[]", k.primitive_name()))
                    .kind(TypeKind::Array)
                    .element(element)
                    .build(),
            )
        });

        let object = universe.declare(RType::builder("", "Object").kind(TypeKind::Object).build());
        let string_array = universe.declare(
            RType::builder("", "String[]")
                .kind(TypeKind::Array)
                .element(string.clone())
                .build(),
        );
        let object_array = universe.declare(
            RType::builder("", "Object[]")
                .kind(TypeKind::Array)
                .element(object.clone())
                .build(),
        );

        let array_list = universe.declare(
            RType::builder("", "ArrayList")
                .kind(TypeKind::Collection(ContainerKind::Standard))
                .build(),
        );
        let hash_map = universe.declare(
            RType::builder("", "HashMap")
                .kind(TypeKind::Map(ContainerKind::Standard))
                .build(),
        );
        let hash_set = universe.declare(
            RType::builder("", "HashSet")
                .kind(TypeKind::Collection(ContainerKind::Standard))
                .build(),
        );
        let class_type =
            universe.declare(RType::builder("", "Class").kind(TypeKind::Class).build());
        let byte_buffer = universe.declare(
            RType::builder("", "ByteBuffer")
                .kind(TypeKind::ByteBuffer)
                .build(),
        );

        let stub = |name: &str, kind: StubKind| -> RType {
            universe.declare(
                RType::builder(INTERNAL_PACKAGE, name)
                    .kind(TypeKind::Stub(kind))
                    .build(),
            )
        };
        let lambda_stub = stub("LambdaStub", StubKind::Lambda);
        let proxy_stub = stub("ProxyStub", StubKind::Proxy);
        let replace_stub = stub("ReplaceStub", StubKind::Replace);

        let unexisted_skip = universe.declare(
            RType::builder(INTERNAL_PACKAGE, "UnexistedSkip")
                .kind(TypeKind::Unexisted(PlaceholderKind::Skip))
                .build(),
        );
        let unexisted_meta_shared = universe.declare(
            RType::builder(INTERNAL_PACKAGE, "UnexistedMetaShared")
                .kind(TypeKind::Unexisted(PlaceholderKind::MetaShared))
                .build(),
        );

        Builtins {
            primitives,
            boxed,
            string,
            primitive_arrays,
            string_array,
            object_array,
            array_list,
            hash_map,
            hash_set,
            class_type,
            object,
            byte_buffer,
            lambda_stub,
            proxy_stub,
            replace_stub,
            unexisted_skip,
            unexisted_meta_shared,
        }
    }

    pub fn primitive(&self, kind: PrimitiveKind) -> &RType {
        &self.primitives[kind as usize]
    }

    pub fn boxed(&self, kind: PrimitiveKind) -> &RType {
        &self.boxed[kind as usize]
    }
}
