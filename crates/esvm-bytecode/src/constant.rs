//! Constant pool for bytecode modules.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A constant value in the constant pool.
///
/// Strings are stored as UTF-8 (`Box<str>`), matching the interned-string
/// representation spec section 3.3 describes for the heap itself, so
/// loading a module interns each string constant directly with no
/// UTF-16-to-UTF-8 conversion step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// 64-bit floating point number.
    Number(f64),
    /// String value (UTF-8).
    String(Box<str>),
}

impl Constant {
    /// Creates a number constant.
    #[inline]
    pub fn number(n: f64) -> Self {
        Self::Number(n)
    }

    /// Creates a string constant.
    #[inline]
    pub fn string(s: impl Into<Box<str>>) -> Self {
        Self::String(s.into())
    }

    /// True if this is a number constant.
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// True if this is a string constant.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// The number, if this is a number constant.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string, if this is a string constant.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Hash for deduplication purposes.
    ///
    /// Custom because `f64` doesn't implement `Hash`; all NaN bit patterns
    /// collapse to one hash bucket since ES5.1 treats NaN !== NaN but the
    /// pool only needs content-equality among distinct literal constants.
    fn hash_for_dedup<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Number(n) => n.to_bits().hash(state),
            Self::String(s) => s.hash(state),
        }
    }
}

/// Constant pool with O(1) hash-based deduplication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    /// Hash -> indices sharing that hash (collisions are resolved by an
    /// exact-equality scan over this short list).
    #[serde(skip)]
    dedup_index: FxHashMap<u64, Vec<u32>>,
}

impl ConstantPool {
    /// Creates a new empty constant pool.
    pub fn new() -> Self {
        Self {
            constants: Vec::new(),
            dedup_index: FxHashMap::default(),
        }
    }

    /// Creates a constant pool with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            constants: Vec::with_capacity(capacity),
            dedup_index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    #[inline]
    fn hash_constant(constant: &Constant) -> u64 {
        let mut hasher = rustc_hash::FxHasher::default();
        constant.hash_for_dedup(&mut hasher);
        hasher.finish()
    }

    /// Adds a constant to the pool, deduplicating identical constants, and
    /// returns its index.
    pub fn add(&mut self, constant: Constant) -> u32 {
        let hash = Self::hash_constant(&constant);
        if let Some(indices) = self.dedup_index.get(&hash) {
            for &idx in indices {
                if self.constants[idx as usize] == constant {
                    return idx;
                }
            }
        }
        let idx = self.constants.len() as u32;
        self.constants.push(constant);
        self.dedup_index.entry(hash).or_default().push(idx);
        idx
    }

    /// Rebuilds the dedup index after deserialization (it is not itself
    /// serialized).
    pub fn rebuild_dedup_index(&mut self) {
        self.dedup_index.clear();
        for (idx, constant) in self.constants.iter().enumerate() {
            let hash = Self::hash_constant(constant);
            self.dedup_index.entry(hash).or_default().push(idx as u32);
        }
    }

    /// Adds a number constant.
    #[inline]
    pub fn add_number(&mut self, n: f64) -> u32 {
        self.add(Constant::number(n))
    }

    /// Adds a string constant.
    #[inline]
    pub fn add_string(&mut self, s: &str) -> u32 {
        self.add(Constant::string(s))
    }

    /// Gets a constant by index.
    #[inline]
    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    /// Number of constants in the pool.
    #[inline]
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    /// True if the pool holds no constants.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Iterates over the constants in index order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.constants.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_strings() {
        let mut pool = ConstantPool::new();
        let idx1 = pool.add_string("hello");
        let idx2 = pool.add_string("world");
        let idx3 = pool.add_string("hello");
        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(idx3, 0);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn dedup_numbers_including_nan() {
        let mut pool = ConstantPool::new();
        let idx1 = pool.add_number(42.0);
        let idx2 = pool.add_number(3.25);
        let idx3 = pool.add_number(42.0);
        let idx4 = pool.add_number(f64::NAN);
        let idx5 = pool.add_number(f64::NAN);
        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(idx3, 0);
        assert_eq!(idx4, idx5);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn get_out_of_range() {
        let mut pool = ConstantPool::new();
        pool.add_string("test");
        assert_eq!(pool.get(0), Some(&Constant::string("test")));
        assert_eq!(pool.get(5), None);
    }
}
