// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type and result alias.

use thiserror::Error;

/// Errors produced by the class resolver and its wire channels.
#[derive(Debug, Error)]
pub enum Error {
    /// Two registrations conflict on type, id, or qualified name.
    #[error("duplicate registration: {reason}")]
    DuplicateRegistration { reason: String },

    /// An unregistered type is blacklisted or refused by the
    /// required-registration policy.
    #[error("insecure type: {reason}")]
    Insecure { reason: String },

    /// Name-to-type resolution failed and tolerant mode is off.
    #[error("type not found: {name}")]
    ClassNotFound { name: String },

    /// The operation is not supported for this type or configuration.
    #[error("unsupported: {reason}")]
    Unsupported { reason: String },

    /// A meta-shared read/write was invoked without a session context.
    #[error("meta context must be set before meta-shared class I/O")]
    MissingMetaContext,

    /// Buffer write overflow or invalid write target.
    #[error("write failed at offset {offset}: {reason}")]
    WriteFailed { offset: usize, reason: String },

    /// Buffer read ran past the end or hit an inconsistent cursor.
    #[error("read failed at offset {offset}: {reason}")]
    ReadFailed { offset: usize, reason: String },

    /// Structurally invalid wire data (bad tag, bad UTF-8, unknown id).
    #[error("invalid data: {reason}")]
    InvalidData { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
