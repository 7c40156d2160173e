// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HSER - High-performance cross-language object serialization
//!
//! This crate is the **class resolver** core of the framework: for every
//! value written or read it decides which codec is responsible, transmits
//! a compact on-wire identity of the value's runtime type, and cooperates
//! with an optional meta-sharing channel that ships structural schemas
//! once per peer session instead of inlining them per value.
//!
//! ## Quick Start
//!
//! ```rust
//! use hser::{Buffer, Resolver, ResolverConfig, RType};
//! use hser::types::FieldType;
//!
//! fn main() -> hser::Result<()> {
//!     let mut resolver = Resolver::new(ResolverConfig::new())?;
//!     let point = resolver.declare(
//!         RType::builder("demo", "Point")
//!             .serializable()
//!             .field("x", FieldType::I32)
//!             .field("y", FieldType::I32)
//!             .build(),
//!     );
//!     resolver.register_with_id(&point, 200)?;
//!
//!     let mut buf = Buffer::new();
//!     resolver.write_class_and_update(&mut buf, &point)?;
//!     assert_eq!(resolver.read_class(&mut buf)?, point);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +------------------------------------------------------------------+
//! |                         Resolver (facade)                        |
//! |  hot path: single-slot cache -> identity map -> codec selection  |
//! +------------------------------------------------------------------+
//! |  Registry          |  CodecSelector       |  MetaShare           |
//! |  id <-> type,      |  selection cascade,  |  per-session ids,    |
//! |  reserved block    |  security gate, JIT  |  ClassDef exchange   |
//! +------------------------------------------------------------------+
//! |  ClassNameCodec    |  MetaStringResolver  |  JitContext          |
//! |  name-bytes wire   |  interned strings    |  deferred compiles   |
//! +------------------------------------------------------------------+
//! |                    Buffer (LE primitives, varints)               |
//! +------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Resolver`] | Central registry and dispatcher, one per serializer |
//! | [`RType`] | Identity handle to a declared runtime type |
//! | [`ClassInfo`] | Per-type record: id, name bytes, bound codec |
//! | [`MetaContext`] | Session state for class-definition sharing |
//! | [`ClassDef`] | Content-addressed structural schema of a type |
//! | [`Buffer`] | Little-endian wire buffer with split cursors |
//!
//! ## Wire format
//!
//! Every object payload is preceded by a class tag: `0x01` plus a
//! little-endian u16 for registered types (3 bytes total), or `0x00`
//! followed by either two interned name strings or, under meta-sharing, a
//! positive-varint per-session id. The reserved id block is part of the
//! protocol and lives in [`resolver::registry`].

/// Growable little-endian wire buffer with independent cursors.
pub mod buffer;
/// Codec seam, dynamic values, and the built-in codec family.
pub mod codec;
/// Resolver configuration (modes, security switches, compilation).
pub mod config;
/// Crate-wide error type.
pub mod error;
/// Deferred codec compilation with completion callbacks.
pub mod jit;
/// Wire metadata: interned strings and class definitions.
pub mod meta;
/// The class resolver: registry, class tags, selection, meta-sharing.
pub mod resolver;
/// Runtime type model and name-to-type loading.
pub mod types;

pub use buffer::Buffer;
pub use codec::{Codec, CodecKind, Value};
pub use config::{CompatibleMode, Language, ResolverConfig};
pub use error::{Error, Result};
pub use jit::{CodecFactory, JitContext};
pub use meta::{ClassDef, MetaString};
pub use resolver::{ClassInfo, ClassInfoCell, MetaContext, Resolver};
pub use types::loader::{CompositeLoader, TypeLoader, TypeUniverse};
pub use types::RType;
