//! abir IR — the intermediate representation of the ABI of native
//! compiled code.
//!
//! This crate models the types, declarations and linker symbols that
//! make up an ABI corpus:
//!
//! - an [`Environment`] owning every arena, the interned-string pool,
//!   the canonical-type registry and the comparison scratch state;
//! - a [type graph](types) of tagged-variant nodes addressed by stable
//!   32-bit [`TypeId`] handles (so the graph may be cyclic);
//! - a [declaration graph](decl) attached to [scopes](scope), with
//!   qualified names kept consistent by a dedicated update pass;
//! - an [ELF symbol model](symbol) with alias rings;
//! - [translation units](tu) aggregated into [corpora](corpus);
//! - a reentrancy-guarded [traversal](visit).
//!
//! The canonicalization and structural-equality engine that operates
//! on this model lives in the sibling `abir_canon` crate; the
//! propagation bookkeeping it drives is defined here, on the
//! environment ([`comparison`]).
//!
//! # Design
//!
//! - **Intern everything**: strings become [`Name`] (u32), and every
//!   IR node is addressed by a 4-byte handle into an environment arena.
//! - **No global state**: everything mutable lives on the
//!   [`Environment`]; tests build independent environments.
//! - **Single-threaded**: an environment must not be shared across
//!   threads without external synchronization.

mod build;
pub mod comparison;
pub mod corpus;
mod decl;
mod env;
mod ids;
mod integral;
mod intern;
mod location;
mod name;
pub mod repr;
pub mod scope;
mod symbol;
pub mod tu;
pub mod types;
pub mod visit;

pub use corpus::{Corpus, CorpusGroup, CorpusOrigin};
pub use decl::{
    ClassTemplateDecl, DeclBinding, DeclData, DeclKind, DeclNode, FnTemplateDecl, FuncDecl,
    NamespaceDecl, VarDecl, Visibility,
};
pub use env::{EnvConfig, Environment};
pub use ids::{CorpusGroupId, CorpusId, DeclId, ScopeId, SymbolId, TuId, TypeId};
pub use integral::{IntegralBase, IntegralModifiers, IntegralType, ParseIntegralError};
pub use intern::{InternError, StringInterner};
pub use location::{Location, LocationManager, LocationTriple};
pub use name::Name;
pub use symbol::{
    get_name_and_version_from_id, Symbol, SymbolBinding, SymbolError, SymbolTable, SymbolType,
    SymbolVersion,
};
pub use scope::{ScopeError, ScopeKind, ScopeNode};
pub use tu::{SourceLanguage, TranslationUnit};
pub use types::{
    AccessSpecifier, ArrayType, BaseSpec, ClassOrUnionParts, ClassType, ContextRel,
    DataMemberInfo, EnumType, Enumerator, FnType, MemberFnInfo, MethodType, Parameter,
    PointerType, QualifiedType, Qualifiers, ReferenceType, ScalarType, Subrange,
    TemplateParmKind, TemplateParmType, TypeKind, TypeNode, TypeTag, TypedefType, UnionType,
};
pub use visit::{IrVisitor, Traversal};
