// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built-in deny-list of known deserialization gadget classes.
//!
//! Matching is by exact qualified name of the type as transmitted by the
//! peer. The list covers the widely abused gadget entry points; the
//! required-registration mode remains the primary defense.

use std::collections::HashSet;
use std::sync::OnceLock;

const GADGET_CLASS_NAMES: &[&str] = &[
    "com.sun.rowset.JdbcRowSetImpl",
    "com.sun.org.apache.xalan.internal.xsltc.trax.TemplatesImpl",
    "com.sun.org.apache.bcel.internal.util.ClassLoader",
    "org.apache.commons.collections.functors.InvokerTransformer",
    "org.apache.commons.collections.functors.InstantiateTransformer",
    "org.apache.commons.collections4.functors.InvokerTransformer",
    "org.apache.commons.collections4.functors.InstantiateTransformer",
    "org.apache.commons.beanutils.BeanComparator",
    "org.apache.commons.fileupload.disk.DiskFileItem",
    "org.codehaus.groovy.runtime.ConvertedClosure",
    "org.codehaus.groovy.runtime.MethodClosure",
    "org.springframework.beans.factory.ObjectFactory",
    "org.springframework.beans.factory.config.PropertyPathFactoryBean",
    "com.mchange.v2.c3p0.impl.PoolBackedDataSourceBase",
    "com.mchange.v2.c3p0.WrapperConnectionPoolDataSource",
    "javax.management.BadAttributeValueExpException",
    "java.rmi.server.UnicastRemoteObject",
    "java.util.logging.FileHandler",
    "clojure.lang.PersistentArrayMap",
    "org.python.core.PyObject",
];

/// The default deny-list, built once per process.
pub fn default_blacklist() -> &'static HashSet<&'static str> {
    static LIST: OnceLock<HashSet<&'static str>> = OnceLock::new();
    LIST.get_or_init(|| GADGET_CLASS_NAMES.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_gadgets_are_listed() {
        let list = default_blacklist();
        assert!(list.contains("com.sun.rowset.JdbcRowSetImpl"));
        assert!(list.contains("org.apache.commons.collections.functors.InvokerTransformer"));
        assert!(!list.contains("user.App$Foo"));
    }

    #[test]
    fn test_list_has_no_duplicates() {
        assert_eq!(default_blacklist().len(), GADGET_CLASS_NAMES.len());
    }
}
