// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime type model.
//!
//! The resolver never manufactures types on its own: the application
//! declares them up front (or a [`TypeLoader`](loader::TypeLoader)
//! reconstructs them by name) and the resolver only ever sees opaque
//! [`RType`] handles. A handle compares and hashes by identity, so every
//! map keyed by `RType` behaves like an identity map; the
//! [`TypeUniverse`](loader::TypeUniverse) interner guarantees at most one
//! live handle per qualified name.

mod builtins;
pub mod loader;

pub use builtins::Builtins;

use std::fmt;
use std::sync::Arc;

/// The nine primitive kinds, in reserved-id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Void,
    Bool,
    I8,
    Char,
    I16,
    I32,
    F32,
    I64,
    F64,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 9] = [
        PrimitiveKind::Void,
        PrimitiveKind::Bool,
        PrimitiveKind::I8,
        PrimitiveKind::Char,
        PrimitiveKind::I16,
        PrimitiveKind::I32,
        PrimitiveKind::F32,
        PrimitiveKind::I64,
        PrimitiveKind::F64,
    ];

    /// Canonical lowercase name used for the primitive type itself.
    pub fn primitive_name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::I16 => "short",
            PrimitiveKind::I32 => "int",
            PrimitiveKind::F32 => "float",
            PrimitiveKind::I64 => "long",
            PrimitiveKind::F64 => "double",
        }
    }

    /// Canonical name of the boxed form.
    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "Unit",
            PrimitiveKind::Bool => "Boolean",
            PrimitiveKind::I8 => "Byte",
            PrimitiveKind::Char => "Character",
            PrimitiveKind::I16 => "Short",
            PrimitiveKind::I32 => "Integer",
            PrimitiveKind::F32 => "Float",
            PrimitiveKind::I64 => "Long",
            PrimitiveKind::F64 => "Double",
        }
    }
}

/// Calendar-family kinds that map to dedicated time codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeKind {
    Calendar,
    TimeZone,
    ZoneId,
}

/// Wire stubs registered under reserved ids 1..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubKind {
    Lambda,
    Proxy,
    Replace,
}

/// Placeholders substituted for types the local process cannot resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// Payload is skipped entirely.
    Skip,
    /// Payload is decoded against the peer's class definition.
    MetaShared,
}

/// Mutability flavor of a container type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Standard,
    Immutable,
}

/// Shape of a runtime type, as far as codec selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Boxed(PrimitiveKind),
    Str,
    Array,
    Struct,
    Enum,
    EnumSet,
    Charset,
    Lambda,
    Proxy,
    Time(TimeKind),
    ByteBuffer,
    Collection(ContainerKind),
    Map(ContainerKind),
    /// The meta-type describing types themselves.
    Class,
    /// The root object type.
    Object,
    Stub(StubKind),
    Unexisted(PlaceholderKind),
}

/// Per-type capabilities reported by the runtime binding.
///
/// All flags default to `false`; struct builders opt in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeTraits {
    /// Carries the runtime's serializable marker.
    pub serializable: bool,
    /// Declares its own binary in/out methods.
    pub externalizable: bool,
    /// Defines a custom stream read hook.
    pub stream_read_hook: bool,
    /// Defines a custom stream write hook.
    pub stream_write_hook: bool,
    /// Substitutes another object at write time.
    pub write_replace: bool,
    /// Reconstructs an object at read time.
    pub read_resolve: bool,
    /// Generated at runtime (no stable declaration site).
    pub runtime_generated: bool,
    /// Belongs to the runtime's standard library.
    pub std_library: bool,
}

/// Declared type of a struct field, as carried by class definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Str,
    Bytes,
    /// Reference to another declared type, by qualified name.
    Object(String),
}

impl FieldType {
    pub fn wire_tag(&self) -> u8 {
        match self {
            FieldType::Bool => 0,
            FieldType::I8 => 1,
            FieldType::I16 => 2,
            FieldType::I32 => 3,
            FieldType::I64 => 4,
            FieldType::F32 => 5,
            FieldType::F64 => 6,
            FieldType::Str => 7,
            FieldType::Bytes => 8,
            FieldType::Object(_) => 9,
        }
    }

    pub fn from_wire_tag(tag: u8, type_name: Option<String>) -> Option<FieldType> {
        Some(match tag {
            0 => FieldType::Bool,
            1 => FieldType::I8,
            2 => FieldType::I16,
            3 => FieldType::I32,
            4 => FieldType::I64,
            5 => FieldType::F32,
            6 => FieldType::F64,
            7 => FieldType::Str,
            8 => FieldType::Bytes,
            9 => FieldType::Object(type_name?),
            _ => return None,
        })
    }
}

/// One declared field of a struct-like type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    /// Qualified name of the class that declares the field (super-chain
    /// fields keep their owner).
    pub declared_in: String,
}

struct TypeInner {
    package: String,
    simple: String,
    qualified: String,
    kind: TypeKind,
    traits_: TypeTraits,
    fields: Vec<Field>,
    element: Option<RType>,
}

/// Opaque handle to a runtime type. Cheap to clone; equality and hashing
/// are by identity.
#[derive(Clone)]
pub struct RType(Arc<TypeInner>);

impl PartialEq for RType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for RType {}

impl std::hash::Hash for RType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for RType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RType({})", self.0.qualified)
    }
}

impl RType {
    pub fn builder(package: impl Into<String>, simple: impl Into<String>) -> TypeBuilder {
        TypeBuilder {
            package: package.into(),
            simple: simple.into(),
            kind: TypeKind::Struct,
            traits_: TypeTraits::default(),
            fields: Vec::new(),
            element: None,
        }
    }

    pub fn package_name(&self) -> &str {
        &self.0.package
    }

    pub fn simple_name(&self) -> &str {
        &self.0.simple
    }

    /// `package.simple`, or just `simple` when the package is empty.
    pub fn qualified_name(&self) -> &str {
        &self.0.qualified
    }

    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    pub fn traits(&self) -> &TypeTraits {
        &self.0.traits_
    }

    pub fn fields(&self) -> &[Field] {
        &self.0.fields
    }

    /// Array element type, when this is an array.
    pub fn element(&self) -> Option<&RType> {
        self.0.element.as_ref()
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.0.kind, TypeKind::Primitive(_))
    }

    pub fn is_array(&self) -> bool {
        self.0.kind == TypeKind::Array
    }

    pub fn is_enum(&self) -> bool {
        self.0.kind == TypeKind::Enum
    }

    pub fn is_lambda(&self) -> bool {
        self.0.kind == TypeKind::Lambda
    }

    pub fn is_proxy(&self) -> bool {
        self.0.kind == TypeKind::Proxy
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.0.kind, TypeKind::Collection(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.0.kind, TypeKind::Map(_))
    }

    pub fn is_struct(&self) -> bool {
        self.0.kind == TypeKind::Struct
    }
}

/// Builder for declared types.
pub struct TypeBuilder {
    package: String,
    simple: String,
    kind: TypeKind,
    traits_: TypeTraits,
    fields: Vec<Field>,
    element: Option<RType>,
}

impl TypeBuilder {
    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn traits(mut self, traits_: TypeTraits) -> Self {
        self.traits_ = traits_;
        self
    }

    pub fn serializable(mut self) -> Self {
        self.traits_.serializable = true;
        self
    }

    /// Declare a field; `declared_in` defaults to the type itself.
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        let declared_in = qualify(&self.package, &self.simple);
        self.fields.push(Field {
            name: name.into(),
            ty,
            declared_in,
        });
        self
    }

    pub fn inherited_field(
        mut self,
        name: impl Into<String>,
        ty: FieldType,
        declared_in: impl Into<String>,
    ) -> Self {
        self.fields.push(Field {
            name: name.into(),
            ty,
            declared_in: declared_in.into(),
        });
        self
    }

    pub fn element(mut self, element: RType) -> Self {
        self.element = Some(element);
        self
    }

    pub fn build(self) -> RType {
        let qualified = qualify(&self.package, &self.simple);
        RType(Arc::new(TypeInner {
            package: self.package,
            simple: self.simple,
            qualified,
            kind: self.kind,
            traits_: self.traits_,
            fields: self.fields,
            element: self.element,
        }))
    }
}

fn qualify(package: &str, simple: &str) -> String {
    if package.is_empty() {
        simple.to_owned()
    } else {
        format!("{package}.{simple}")
    }
}
