//! Interned strings (spec section 3.3).
//!
//! A string is immutable and stored once in a heap-wide content-hash
//! table; lookups by equal content return the same `GcRef`, so string
//! equality is a pointer comparison after interning. The table holds only
//! `Weak` references — the strong count living in application code is
//! what keeps a string alive; once the last strong ref drops, `Rc`'s own
//! drop frees it, and a later `intern` of the same text reinserts fresh.

use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use rustc_hash::{FxHashMap, FxHasher};

use crate::gc::GcRef;

/// An interned, immutable string.
pub struct JsString {
    header: esvm_gc::GcHeader,
    data: Box<str>,
    hash: u64,
    /// Precomputed UTF-16 code unit count (JS `.length` semantics), not
    /// the UTF-8 byte length.
    utf16_len: u32,
}

impl JsString {
    fn compute_hash(s: &str) -> u64 {
        let mut hasher = FxHasher::default();
        s.hash(&mut hasher);
        hasher.finish()
    }

    fn new(s: &str) -> Self {
        Self {
            header: esvm_gc::GcHeader::new(esvm_gc::HeapTag::String),
            data: s.into(),
            hash: Self::compute_hash(s),
            utf16_len: s.encode_utf16().count() as u32,
        }
    }

    /// The string's text.
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Content hash, used by the intern table and by `PropertyKey`.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// UTF-16 code unit count (the value `.length` reports in script).
    pub fn utf16_len(&self) -> u32 {
        self.utf16_len
    }

    /// Byte length of the UTF-8 encoding.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// True if the string is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Interns `s` in the thread-local default table, allocating a fresh
    /// `JsString` only if no live interned copy already exists.
    pub fn intern(s: &str) -> GcRef<JsString> {
        DEFAULT_TABLE.with(|t| t.intern(s))
    }
}

impl std::fmt::Debug for JsString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JsString({:?})", self.data)
    }
}

impl PartialEq for JsString {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}
impl Eq for JsString {}

impl esvm_gc::Traceable for JsString {
    fn header(&self) -> &esvm_gc::GcHeader {
        &self.header
    }

    fn trace(&self, _push: &mut dyn FnMut(Rc<dyn esvm_gc::Traceable>)) {
        // Strings hold only bytes, no outgoing heap references.
    }
}

/// One isolate's string intern table, per spec section 3.3/3.10.
pub struct StringTable {
    entries: RefCell<FxHashMap<u64, Vec<Weak<JsString>>>>,
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(FxHashMap::default()),
        }
    }

    /// Interns `s`, reusing a live entry with equal content if one exists.
    pub fn intern(&self, s: &str) -> GcRef<JsString> {
        let hash = JsString::compute_hash(s);
        let mut entries = self.entries.borrow_mut();
        let bucket = entries.entry(hash).or_default();

        bucket.retain(|w| w.strong_count() > 0);
        for weak in bucket.iter() {
            if let Some(existing) = weak.upgrade()
                && existing.data.as_ref() == s
            {
                return existing;
            }
        }

        let fresh = Rc::new(JsString::new(s));
        bucket.push(Rc::downgrade(&fresh));
        fresh
    }

    /// True if `s` currently has a live interned entry.
    pub fn is_interned(&self, s: &str) -> bool {
        let hash = JsString::compute_hash(s);
        self.entries
            .borrow()
            .get(&hash)
            .is_some_and(|bucket| bucket.iter().any(|w| w.upgrade().is_some()))
    }

    /// Number of live interned strings (walks and prunes dead entries).
    pub fn len(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let mut count = 0;
        for bucket in entries.values_mut() {
            bucket.retain(|w| w.strong_count() > 0);
            count += bucket.len();
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static DEFAULT_TABLE: StringTable = StringTable::new();
}

/// Clears the thread-local default intern table. Used between isolate
/// lifecycles in tests and embeddings that reuse a thread for several
/// short-lived isolates.
pub fn clear_default_table() {
    DEFAULT_TABLE.with(|t| t.entries.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_dedups_equal_content() {
        let table = StringTable::new();
        let a = table.intern("hello");
        let b = table.intern("hello");
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn intern_distinguishes_different_content() {
        let table = StringTable::new();
        let a = table.intern("hello");
        let b = table.intern("world");
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn dead_entry_is_not_reused() {
        let table = StringTable::new();
        {
            let s = table.intern("temp");
            assert!(table.is_interned("temp"));
            drop(s);
        }
        assert!(!table.is_interned("temp"));
        let fresh = table.intern("temp");
        assert_eq!(fresh.as_str(), "temp");
    }

    #[test]
    fn utf16_len_counts_code_units() {
        let table = StringTable::new();
        let s = table.intern("hi");
        assert_eq!(s.utf16_len(), 2);
    }
}
