//! abir canonicalization — structural equality and type
//! canonicalization over the abir IR.
//!
//! The engine turns structural type equality, which must terminate on
//! arbitrarily cyclic type graphs, into handle equality: after
//! [`canonicalize`] has run over a translation unit, comparing two of
//! its types is a pointer-sized comparison.
//!
//! The load-bearing pieces:
//!
//! - [`equal`](cmp::equal): member-wise comparison with per-pair
//!   re-entrancy sets for class and function types, and an optional
//!   [`ChangeKind`](cmp::ChangeKind) sink accumulating where the
//!   difference lives;
//! - [`canonicalize`](canonical::canonicalize): registry lookup by
//!   internal representation, with the One-Definition-Rule fast path
//!   and candidate scanning from the end;
//! - speculative canonical-type propagation (state machine on the
//!   environment, see `abir_ir::comparison`), driven from the
//!   comparison epilogues here;
//! - [`peel`] helpers and [`hash`]ing for the diff engine's queries.

mod canonical;
pub mod cmp;
pub mod hash;
pub mod peel;

pub use canonical::{canonicalize, canonicalize_translation_unit, get_canonical_type_for};
pub use cmp::{equal, equal_decl, functions_alias, ChangeKind};
pub use hash::{hash_decl, hash_type, hash_type_or_decl, Artifact};
pub use peel::{
    peel_array_type, peel_composition, peel_pointer_type, peel_qualified_type,
    peel_reference_type, strip_typedef, type_or_void,
};
