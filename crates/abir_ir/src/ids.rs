//! Arena handles for IR artifacts.
//!
//! Every node of the IR lives in an arena owned by the
//! [`Environment`](crate::Environment) and is addressed by a stable
//! 32-bit handle. Handles are `Copy`, comparable in O(1), and only
//! meaningful in the environment that minted them. Cyclic type graphs
//! fall out for free: a node refers to any other node (including
//! itself, transitively) by handle.

use std::fmt;

macro_rules! define_handle {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create a handle from a raw u32 index.
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw u32 index.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as a usize, for arena access.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        // Handles are stored pervasively; keep them at 4 bytes.
        const _: () = assert!(std::mem::size_of::<$name>() == 4);
    };
}

define_handle!(
    /// Handle to a type node in the environment's type arena.
    TypeId,
    "TypeId"
);

define_handle!(
    /// Handle to a declaration node in the environment's decl arena.
    DeclId,
    "DeclId"
);

define_handle!(
    /// Handle to a scope node in the environment's scope arena.
    ScopeId,
    "ScopeId"
);

define_handle!(
    /// Handle to an ELF symbol in the environment's symbol table.
    SymbolId,
    "SymbolId"
);

define_handle!(
    /// Handle to a translation unit.
    TuId,
    "TuId"
);

define_handle!(
    /// Handle to an ABI corpus.
    CorpusId,
    "CorpusId"
);

define_handle!(
    /// Handle to a corpus group.
    CorpusGroupId,
    "CorpusGroupId"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compare_by_index() {
        assert_eq!(TypeId::from_raw(3), TypeId::from_raw(3));
        assert_ne!(TypeId::from_raw(3), TypeId::from_raw(4));
        assert!(DeclId::from_raw(1) < DeclId::from_raw(2));
    }

    #[test]
    fn raw_round_trips() {
        let t = TypeId::from_raw(42);
        assert_eq!(t.raw(), 42);
        assert_eq!(t.index(), 42);
    }
}
