//! The declaration graph.
//!
//! Declarations (variables, functions, namespaces, the decl facet of
//! named types, templates) live in the environment's decl arena. Every
//! decl is owned by exactly one scope; decls refer to their types
//! through plain handles (the types outlive them, both being owned by
//! the environment).

use crate::{
    ContextRel, DataMemberInfo, DeclId, Location, MemberFnInfo, Name, ScopeId, SymbolId, TuId,
    TypeId,
};

/// ELF visibility of a declaration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Visibility {
    /// Unspecified visibility.
    #[default]
    Unspecified,
    /// Default (exported) visibility.
    Default,
    /// Protected visibility.
    Protected,
    /// Hidden visibility.
    Hidden,
    /// Internal visibility.
    Internal,
}

/// Binding of a variable or function declaration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum DeclBinding {
    /// No binding recorded.
    #[default]
    None,
    /// Local binding.
    Local,
    /// Global binding.
    Global,
    /// Weak binding.
    Weak,
}

/// Attributes shared by every declaration.
#[derive(Clone, Debug)]
pub struct DeclData {
    /// Unqualified name; empty for anonymous decls.
    pub name: Name,
    /// Qualified name of the owning scope chain.
    pub qualified_parent_name: Name,
    /// Cached qualified name, kept consistent by the name-update pass
    /// whenever the decl is (re)parented.
    pub qualified_name: Name,
    /// Mangled linkage name, when known.
    pub linkage_name: Name,
    /// ELF visibility.
    pub visibility: Visibility,
    /// Source location.
    pub location: Location,
    /// Owning scope; `None` until attached.
    pub scope: Option<ScopeId>,
    /// Owning translation unit, propagated down at attach time.
    pub tu: Option<TuId>,
    /// Whether the decl is anonymous.
    pub is_anonymous: bool,
    /// Whether the decl is associated with a public ELF symbol.
    pub is_in_public_symbol_table: bool,
    /// Member-context record (access, static-ness) when the decl is a
    /// class or union member.
    pub context: ContextRel,
}

impl DeclData {
    /// Create decl data for a (possibly anonymous) name.
    pub fn new(name: Name, location: Location) -> Self {
        Self {
            name,
            qualified_parent_name: Name::EMPTY,
            qualified_name: name,
            linkage_name: Name::EMPTY,
            visibility: Visibility::Unspecified,
            location,
            scope: None,
            tu: None,
            is_anonymous: name.is_empty(),
            is_in_public_symbol_table: false,
            context: ContextRel::default(),
        }
    }
}

/// A variable declaration.
#[derive(Clone, Debug)]
pub struct VarDecl {
    /// The variable's type.
    pub ty: TypeId,
    /// Binding of the variable.
    pub binding: DeclBinding,
    /// The ELF symbol exporting the variable, when any.
    pub symbol: Option<SymbolId>,
    /// Layout information when the variable is a data member.
    pub member: Option<DataMemberInfo>,
}

/// A function declaration.
#[derive(Clone, Debug)]
pub struct FuncDecl {
    /// The function or method type.
    pub ty: TypeId,
    /// Binding of the function.
    pub binding: DeclBinding,
    /// Whether the function was declared inline.
    pub declared_inline: bool,
    /// The ELF symbol exporting the function, when any.
    pub symbol: Option<SymbolId>,
    /// Virtuality information when the function is a member function.
    pub member: Option<MemberFnInfo>,
}

/// A namespace declaration.
#[derive(Clone, Debug)]
pub struct NamespaceDecl {
    /// The namespace's scope.
    pub scope: ScopeId,
}

/// A function template declaration.
#[derive(Clone, Debug)]
pub struct FnTemplateDecl {
    /// The function decl serving as the template pattern.
    pub pattern: DeclId,
    /// Template parameters.
    pub parms: Vec<TypeId>,
}

/// A class template declaration.
#[derive(Clone, Debug)]
pub struct ClassTemplateDecl {
    /// The class type serving as the template pattern.
    pub pattern: TypeId,
    /// Template parameters.
    pub parms: Vec<TypeId>,
}

/// Tagged variant of all declaration kinds.
#[derive(Clone, Debug)]
pub enum DeclKind {
    /// Variable declaration.
    Var(VarDecl),
    /// Function declaration.
    Func(FuncDecl),
    /// Namespace declaration.
    Namespace(NamespaceDecl),
    /// Declaration facet of a named type.
    Type(TypeId),
    /// Function template.
    FunctionTemplate(FnTemplateDecl),
    /// Class template.
    ClassTemplate(ClassTemplateDecl),
}

impl DeclKind {
    /// The type this decl declares or is typed with, if any.
    pub fn type_of(&self) -> Option<TypeId> {
        match self {
            DeclKind::Var(v) => Some(v.ty),
            DeclKind::Func(f) => Some(f.ty),
            DeclKind::Type(t) => Some(*t),
            DeclKind::ClassTemplate(t) => Some(t.pattern),
            DeclKind::Namespace(_) | DeclKind::FunctionTemplate(_) => None,
        }
    }

    /// The symbol attached to the decl, if any.
    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            DeclKind::Var(v) => v.symbol,
            DeclKind::Func(f) => f.symbol,
            _ => None,
        }
    }
}

/// A node of the decl arena.
#[derive(Clone, Debug)]
pub struct DeclNode {
    /// Shared declaration attributes.
    pub data: DeclData,
    /// The variant payload.
    pub kind: DeclKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_flag_follows_name() {
        let named = DeclData::new(Name::from_raw(5), Location::NONE);
        assert!(!named.is_anonymous);
        let anon = DeclData::new(Name::EMPTY, Location::NONE);
        assert!(anon.is_anonymous);
    }

    #[test]
    fn qualified_name_defaults_to_name() {
        let d = DeclData::new(Name::from_raw(5), Location::NONE);
        assert_eq!(d.qualified_name, d.name);
        assert_eq!(d.qualified_parent_name, Name::EMPTY);
    }
}
