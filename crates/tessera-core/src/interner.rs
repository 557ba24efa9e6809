//! # String Interner
//!
//! Maps strings to small, stable integer keys and back.
//!
//! This is the substrate for node identity: IRIs and literal components are
//! interned once, and every node built from the same text shares the same
//! allocation. Keys are stable for the lifetime of the interner; nothing here
//! is persisted.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Key of an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringKey(pub u32);

/// Bidirectional string <-> key table.
///
/// Strings are held as `Arc<str>` so that nodes can share the interned
/// allocation instead of copying it.
#[derive(Debug, Clone, Default)]
pub struct StringInterner {
    keys: BTreeMap<Arc<str>, StringKey>,
    strings: Vec<Arc<str>>,
}

impl StringInterner {
    /// Create an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value`, creating a key if it is not present yet.
    pub fn store(&mut self, value: &str) -> StringKey {
        if let Some(&key) = self.keys.get(value) {
            return key;
        }
        let key = StringKey(self.strings.len() as u32);
        let shared: Arc<str> = Arc::from(value);
        self.strings.push(Arc::clone(&shared));
        self.keys.insert(shared, key);
        key
    }

    /// Look up the key of `value` without creating it.
    #[must_use]
    pub fn contains(&self, value: &str) -> Option<StringKey> {
        self.keys.get(value).copied()
    }

    /// Retrieve the string behind `key`.
    #[must_use]
    pub fn retrieve(&self, key: StringKey) -> Option<&str> {
        self.strings.get(key.0 as usize).map(|s| &**s)
    }

    /// Retrieve the shared allocation behind `key`.
    #[must_use]
    pub fn retrieve_shared(&self, key: StringKey) -> Option<Arc<str>> {
        self.strings.get(key.0 as usize).cloned()
    }

    /// Number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check whether nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
