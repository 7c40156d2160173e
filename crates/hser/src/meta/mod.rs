// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire metadata: interned strings and structural class definitions.

mod class_def;
mod meta_string;

pub use class_def::{ClassDef, SHARE_FIELDS_INFO_KEY};
pub use meta_string::{MetaString, MetaStringResolver};

use md5::{Digest, Md5};

/// 64-bit content hash: first 8 bytes of the MD5 digest, little-endian.
///
/// One algorithm for every content-addressed identity in the crate
/// (interned string hashes, class-def ids).
pub fn content_hash64(bytes: &[u8]) -> u64 {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_deterministic() {
        let a = content_hash64(b"user.App$Foo");
        let b = content_hash64(b"user.App$Foo");
        let c = content_hash64(b"user.App$Bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, 0);
    }
}
