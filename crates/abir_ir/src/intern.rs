//! String interner backing the environment's interned-string pool.
//!
//! Provides O(1) interning and lookup. Interned strings live for the
//! whole process (they are leaked), which is the right trade-off for an
//! analysis session: the pool only ever grows and dies with the
//! process, and callers get `&'static str` back without lifetime
//! plumbing.

use crate::Name;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Error when interning a string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternError {
    /// The pool exceeded capacity (over 4 billion distinct strings).
    #[error("string pool exceeded capacity: {count} strings, max is {max}", max = u32::MAX)]
    PoolOverflow {
        /// Number of strings already interned.
        count: usize,
    },
}

/// Storage behind the interner lock.
struct PoolInner {
    /// Map from string content to its index.
    map: FxHashMap<&'static str, u32>,
    /// Storage for string contents, indexed by `Name::raw()`.
    strings: Vec<&'static str>,
}

/// Interned-string pool.
///
/// Interning goes through a [`parking_lot::RwLock`] so it works from
/// `&self`, which lets the environment hand out names while the rest of
/// it is borrowed. The environment itself is single-threaded; the lock
/// is about borrow ergonomics, not concurrency.
pub struct StringInterner {
    inner: RwLock<PoolInner>,
}

impl StringInterner {
    /// Create a new pool with the empty string at index 0 and common
    /// C/C++ tokens pre-interned.
    pub fn new() -> Self {
        let mut inner = PoolInner {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(256),
        };

        let empty: &'static str = "";
        inner.map.insert(empty, 0);
        inner.strings.push(empty);

        let interner = Self {
            inner: RwLock::new(inner),
        };
        interner.pre_intern_common_tokens();
        interner
    }

    /// Try to intern a string, returning its [`Name`] or an error on
    /// overflow.
    pub fn try_intern(&self, s: &str) -> Result<Name, InternError> {
        // Fast path: already interned.
        {
            let guard = self.inner.read();
            if let Some(&idx) = guard.map.get(s) {
                return Ok(Name::from_raw(idx));
            }
        }

        let mut guard = self.inner.write();

        // Re-check after acquiring the write lock.
        if let Some(&idx) = guard.map.get(s) {
            return Ok(Name::from_raw(idx));
        }

        let idx = u32::try_from(guard.strings.len()).map_err(|_| InternError::PoolOverflow {
            count: guard.strings.len(),
        })?;

        // Leak the string to get a 'static lifetime.
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        guard.strings.push(leaked);
        guard.map.insert(leaked, idx);

        Ok(Name::from_raw(idx))
    }

    /// Intern a string, returning its [`Name`].
    ///
    /// # Panics
    /// Panics if the pool exceeds capacity (over 4 billion strings).
    /// Use [`StringInterner::try_intern`] for fallible interning.
    pub fn intern(&self, s: &str) -> Name {
        self.try_intern(s).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Look up the string for a [`Name`].
    ///
    /// The returned reference is `'static` because interned strings are
    /// never deallocated.
    ///
    /// # Panics
    /// Panics if the name was not produced by this pool.
    pub fn lookup(&self, name: Name) -> &'static str {
        let guard = self.inner.read();
        guard.strings[name.raw() as usize]
    }

    /// Get the number of interned strings.
    pub fn len(&self) -> usize {
        self.inner.read().strings.len()
    }

    /// Check whether the pool only holds the empty string.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Pre-intern tokens that show up in virtually every corpus.
    fn pre_intern_common_tokens(&self) {
        const TOKENS: &[&str] = &[
            // Fundamental type spellings
            "void",
            "bool",
            "char",
            "int",
            "float",
            "double",
            "wchar_t",
            "char16_t",
            "char32_t",
            // Modifiers and qualifiers
            "signed",
            "unsigned",
            "short",
            "long",
            "const",
            "volatile",
            "restrict",
            // Aggregate keywords
            "class",
            "struct",
            "union",
            "enum",
            "namespace",
            "typedef",
            // Separators and markers
            "::",
            "...",
            "variadic parameter type",
        ];

        for token in TOKENS {
            self.intern(token);
        }
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
