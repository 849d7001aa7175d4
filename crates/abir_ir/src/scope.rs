//! Scopes, decl attachment, and qualified-name lookup.
//!
//! A scope (translation-unit global, namespace, class, union, enum)
//! owns its member decls in declaration order. Attachment goes through
//! the primitives here, which also propagate the owning translation
//! unit down the attached sub-tree and recompute qualified names, so
//! the invariant `qualified_name == qualified_parent_name ++ "::" ++
//! name` holds at all times.

use crate::{DeclId, DeclKind, Environment, Name, ScopeId, TuId, TypeId};
use rustc_hash::FxHashSet;

/// The kind of a scope.
#[derive(Copy, Clone, Debug)]
pub enum ScopeKind {
    /// The global scope of a translation unit.
    Global {
        /// The owning translation unit.
        tu: TuId,
    },
    /// A namespace's scope.
    Namespace {
        /// The namespace decl.
        decl: DeclId,
    },
    /// A class's member scope.
    Class {
        /// The class type.
        ty: TypeId,
    },
    /// A union's member scope.
    Union {
        /// The union type.
        ty: TypeId,
    },
    /// An enum's scope.
    Enum {
        /// The enum type.
        ty: TypeId,
    },
}

/// A node of the scope arena.
#[derive(Debug)]
pub struct ScopeNode {
    /// What the scope is.
    pub kind: ScopeKind,
    /// Member decls, in declaration order.
    pub members: Vec<DeclId>,
    /// Members that are themselves scopes, in declaration order.
    pub sub_scopes: Vec<ScopeId>,
    /// The translation unit the scope belongs to, once known.
    pub tu: Option<TuId>,
}

impl ScopeNode {
    /// Create an empty scope.
    pub fn new(kind: ScopeKind, tu: Option<TuId>) -> Self {
        Self {
            kind,
            members: Vec::new(),
            sub_scopes: Vec::new(),
            tu,
        }
    }
}

/// Errors from the scope-attachment primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// The decl already belongs to a scope.
    #[error("declaration already belongs to a scope")]
    AlreadyInScope,
    /// The decl is not a member of the given scope.
    #[error("declaration is not a member of the given scope")]
    NotAMember,
    /// The insertion position is past the end of the member list.
    #[error("insertion position is out of bounds")]
    PositionOutOfBounds,
}

/// The qualified name of a scope: empty for a global scope, the
/// owner's qualified name otherwise.
pub fn scope_qualified_name(env: &Environment, s: ScopeId) -> Name {
    match env.scope_node(s).kind {
        ScopeKind::Global { .. } => Name::EMPTY,
        ScopeKind::Namespace { decl } => env.decl(decl).data.qualified_name,
        ScopeKind::Class { ty } | ScopeKind::Union { ty } | ScopeKind::Enum { ty } => env
            .type_decl(ty)
            .map_or(Name::EMPTY, |d| env.decl(d).data.qualified_name),
    }
}

/// The scope of a scope-like decl (namespace, or the member scope of a
/// class/union it declares).
fn decl_own_scope(env: &Environment, d: DeclId) -> Option<ScopeId> {
    match &env.decl(d).kind {
        DeclKind::Namespace(ns) => Some(ns.scope),
        DeclKind::Type(t) => env.type_node(*t).kind.class_or_union().map(|p| p.scope),
        _ => None,
    }
}

/// Attach `d` to `scope`: record membership, propagate the owning
/// translation unit downward, and recompute the qualified names of the
/// attached sub-tree.
pub fn add_decl_to_scope(env: &mut Environment, d: DeclId, scope: ScopeId) -> Result<(), ScopeError> {
    let end = env.scope_node(scope).members.len();
    insert_decl_into_scope(env, d, end, scope)
}

/// Positional variant of [`add_decl_to_scope`].
pub fn insert_decl_into_scope(
    env: &mut Environment,
    d: DeclId,
    position: usize,
    scope: ScopeId,
) -> Result<(), ScopeError> {
    if env.decl(d).data.scope.is_some() {
        return Err(ScopeError::AlreadyInScope);
    }
    if position > env.scope_node(scope).members.len() {
        return Err(ScopeError::PositionOutOfBounds);
    }

    env.scope_node_mut(scope).members.insert(position, d);
    env.decl_mut(d).data.scope = Some(scope);

    if let Some(sub) = decl_own_scope(env, d) {
        env.scope_node_mut(scope).sub_scopes.push(sub);
    }

    if let Some(tu) = env.scope_node(scope).tu {
        propagate_translation_unit(env, d, tu);
    }
    update_qualified_names(env, d);
    Ok(())
}

/// Detach `d` from its scope.
pub fn remove_decl_from_scope(env: &mut Environment, d: DeclId) -> Result<(), ScopeError> {
    let Some(scope) = env.decl(d).data.scope else {
        return Err(ScopeError::NotAMember);
    };
    let position =
        find_member_index(env, scope, d).ok_or(ScopeError::NotAMember)?;
    env.scope_node_mut(scope).members.remove(position);
    if let Some(sub) = decl_own_scope(env, d) {
        env.scope_node_mut(scope).sub_scopes.retain(|&s| s != sub);
    }
    env.decl_mut(d).data.scope = None;
    Ok(())
}

/// Linear scan of a scope's member list by handle identity.
pub fn find_member_index(env: &Environment, scope: ScopeId, d: DeclId) -> Option<usize> {
    env.scope_node(scope).members.iter().position(|&m| m == d)
}

/// Propagate the owning translation unit down the sub-tree rooted at
/// `d`. Descends into scope-like nodes only, guarding against cyclic
/// scope graphs with a visited set.
pub fn propagate_translation_unit(env: &mut Environment, d: DeclId, tu: TuId) {
    let mut visited = FxHashSet::default();
    propagate_tu_impl(env, d, tu, &mut visited);
}

fn propagate_tu_impl(env: &mut Environment, d: DeclId, tu: TuId, visited: &mut FxHashSet<DeclId>) {
    if !visited.insert(d) {
        return;
    }
    env.decl_mut(d).data.tu = Some(tu);
    if let Some(sub) = decl_own_scope(env, d) {
        env.scope_node_mut(sub).tu = Some(tu);
        let members = env.scope_node(sub).members.clone();
        for m in members {
            propagate_tu_impl(env, m, tu, visited);
        }
    }
}

/// Recompute qualified names for the sub-tree rooted at `d`, from its
/// current scope. Named types under `d` are (re)registered in their
/// translation unit's name-to-type map under the new qualified name.
pub fn update_qualified_names(env: &mut Environment, d: DeclId) {
    let parent = match env.decl(d).data.scope {
        Some(s) => scope_qualified_name(env, s),
        None => Name::EMPTY,
    };
    let mut visited = FxHashSet::default();
    update_names_impl(env, d, parent, &mut visited);
}

fn update_names_impl(
    env: &mut Environment,
    d: DeclId,
    parent: Name,
    visited: &mut FxHashSet<DeclId>,
) {
    if !visited.insert(d) {
        return;
    }

    let name = env.decl(d).data.name;
    let qualified = if parent.is_empty() || name.is_empty() {
        name
    } else {
        let qname = format!("{}::{}", env.str(parent), env.str(name));
        env.intern(&qname)
    };

    {
        let data = &mut env.decl_mut(d).data;
        data.qualified_parent_name = parent;
        data.qualified_name = qualified;
    }

    // A type whose decl was renamed must drop its cached
    // representations; they are only authoritative after
    // canonicalization, and reparenting a canonicalized type is a
    // contract violation anyway.
    if let DeclKind::Type(t) = env.decl(d).kind {
        debug_assert!(
            env.canonical_type(t).is_none(),
            "reparenting a canonicalized type"
        );
        let node = env.type_node_mut(t);
        node.cached_internal_repr = None;
        node.cached_repr = None;

        if let Some(tu) = env.decl(d).data.tu {
            if !qualified.is_empty() {
                env.tu_mut(tu).register_type_name(qualified, t);
            }
        }
    }

    if let Some(sub) = decl_own_scope(env, d) {
        let members = env.scope_node(sub).members.clone();
        for m in members {
            update_names_impl(env, m, qualified, visited);
        }
    }
}

/// Split a fully qualified name on `::`, respecting template-argument
/// nesting: a delimiter is only recognized at angle-bracket depth zero.
pub fn fqn_to_components(fqn: &str) -> Vec<String> {
    let mut components = Vec::new();
    let bytes = fqn.as_bytes();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && i + 1 < bytes.len() && bytes[i + 1] == b':' => {
                components.push(fqn[start..i].to_owned());
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    components.push(fqn[start..].to_owned());
    components
}

/// Join name components back into a fully qualified name.
pub fn components_to_type_name(components: &[String]) -> String {
    components.join("::")
}

/// Walk `components` through nested scopes starting at `scope`,
/// resolving the final component to a type.
///
/// Intermediate components resolve through namespaces and
/// class/union member scopes; declaration-only classes without a known
/// definition are skipped during resolution.
pub fn lookup_type_in_scope(
    env: &Environment,
    components: &[String],
    scope: ScopeId,
) -> Option<TypeId> {
    let mut current = scope;
    for (i, component) in components.iter().enumerate() {
        let is_last = i + 1 == components.len();
        let mut next_scope = None;
        let mut found_type = None;

        for &m in &env.scope_node(current).members {
            let decl = env.decl(m);
            if env.str(decl.data.name) != component {
                continue;
            }
            match &decl.kind {
                DeclKind::Type(t) => {
                    if env.is_declaration_only(*t) && env.decl_only_definition(*t).is_none() {
                        continue;
                    }
                    if is_last {
                        found_type = Some(*t);
                        break;
                    }
                    if let Some(parts) = env.type_node(*t).kind.class_or_union() {
                        next_scope = Some(parts.scope);
                        break;
                    }
                }
                DeclKind::Namespace(ns) if !is_last => {
                    next_scope = Some(ns.scope);
                    break;
                }
                _ => {}
            }
        }

        if is_last {
            return found_type;
        }
        current = next_scope?;
    }
    None
}

/// Direct name-to-type lookup in a translation unit's map. Intended
/// for use after the unit is constructed.
pub fn lookup_type_in_translation_unit(
    env: &Environment,
    tu: TuId,
    qualified_name: &str,
) -> Option<TypeId> {
    let name = env.intern(qualified_name);
    env.tu(tu).lookup_type(name)
}

/// Look a type up in every translation unit of a corpus, in order.
pub fn lookup_type_in_corpus(
    env: &Environment,
    corpus: crate::CorpusId,
    qualified_name: &str,
) -> Option<TypeId> {
    let name = env.intern(qualified_name);
    env.corpus(corpus)
        .translation_units()
        .iter()
        .find_map(|&tu| env.tu(tu).lookup_type(name))
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "Tests use expect for clarity")]
mod tests {
    use super::*;
    use crate::{DeclBinding, Location, SourceLanguage};
    use pretty_assertions::assert_eq;

    #[test]
    fn fqn_components_respect_template_nesting() {
        assert_eq!(
            fqn_to_components("foo<ns1::x, ns2::y>::inner"),
            vec!["foo<ns1::x, ns2::y>".to_owned(), "inner".to_owned()]
        );
        assert_eq!(fqn_to_components("a::b::c"), vec!["a", "b", "c"]);
        assert_eq!(fqn_to_components("plain"), vec!["plain"]);
    }

    #[test]
    fn components_join_back() {
        let components = fqn_to_components("a::b<c::d>::e");
        assert_eq!(components_to_type_name(&components), "a::b<c::d>::e");
    }

    #[test]
    fn attach_updates_qualified_names() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.cc", 64, SourceLanguage::CPlusPlus);
        let global = env.tu(tu).global_scope();

        let ns = env.new_namespace("outer", Location::NONE);
        add_decl_to_scope(&mut env, ns, global).expect("attach succeeds");

        let int = env.new_scalar_type("int", 32, 32);
        let var = env.new_var_decl("x", int, DeclBinding::Global, Location::NONE);
        let ns_scope = env.decl(ns).kind.clone();
        let ns_scope = match ns_scope {
            DeclKind::Namespace(n) => n.scope,
            _ => unreachable!("namespace decl"),
        };
        add_decl_to_scope(&mut env, var, ns_scope).expect("attach succeeds");

        assert_eq!(env.str(env.decl(var).data.qualified_name), "outer::x");
        assert_eq!(env.str(env.decl(var).data.qualified_parent_name), "outer");
        assert_eq!(env.decl(var).data.tu, Some(tu));
    }

    #[test]
    fn reattach_requires_detach_first() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.c", 64, SourceLanguage::C);
        let global = env.tu(tu).global_scope();

        let int = env.new_scalar_type("int", 32, 32);
        let var = env.new_var_decl("x", int, DeclBinding::Global, Location::NONE);
        add_decl_to_scope(&mut env, var, global).expect("attach succeeds");
        assert_eq!(
            add_decl_to_scope(&mut env, var, global),
            Err(ScopeError::AlreadyInScope)
        );

        remove_decl_from_scope(&mut env, var).expect("detach succeeds");
        assert_eq!(env.decl(var).data.scope, None);
        add_decl_to_scope(&mut env, var, global).expect("reattach succeeds");
    }

    #[test]
    fn positional_insert_and_member_lookup() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.c", 64, SourceLanguage::C);
        let global = env.tu(tu).global_scope();
        let int = env.new_scalar_type("int", 32, 32);

        let a = env.new_var_decl("a", int, DeclBinding::Global, Location::NONE);
        let b = env.new_var_decl("b", int, DeclBinding::Global, Location::NONE);
        let c = env.new_var_decl("c", int, DeclBinding::Global, Location::NONE);

        add_decl_to_scope(&mut env, a, global).expect("attach succeeds");
        add_decl_to_scope(&mut env, c, global).expect("attach succeeds");
        insert_decl_into_scope(&mut env, b, 1, global).expect("insert succeeds");

        assert_eq!(find_member_index(&env, global, a), Some(0));
        assert_eq!(find_member_index(&env, global, b), Some(1));
        assert_eq!(find_member_index(&env, global, c), Some(2));
    }

    #[test]
    fn lookup_walks_nested_scopes() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.cc", 64, SourceLanguage::CPlusPlus);
        let global = env.tu(tu).global_scope();

        let ns = env.new_namespace("ns", Location::NONE);
        add_decl_to_scope(&mut env, ns, global).expect("attach succeeds");
        let ns_scope = match &env.decl(ns).kind {
            DeclKind::Namespace(n) => n.scope,
            _ => unreachable!("namespace decl"),
        };

        let class = env.new_class_type("C", 64, 64, false, false, Location::NONE);
        let class_decl = env.type_decl(class).expect("class has a decl");
        add_decl_to_scope(&mut env, class_decl, ns_scope).expect("attach succeeds");

        let components = fqn_to_components("ns::C");
        assert_eq!(lookup_type_in_scope(&env, &components, global), Some(class));
        assert_eq!(
            lookup_type_in_scope(&env, &fqn_to_components("ns::D"), global),
            None
        );

        // The TU map was filled at attach time with the qualified name.
        assert_eq!(lookup_type_in_translation_unit(&env, tu, "ns::C"), Some(class));
    }

    #[test]
    fn decl_only_without_definition_is_skipped_by_lookup() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.cc", 64, SourceLanguage::CPlusPlus);
        let global = env.tu(tu).global_scope();

        let decl_only = env.new_class_type("C", 0, 0, false, true, Location::NONE);
        let d = env.type_decl(decl_only).expect("class has a decl");
        add_decl_to_scope(&mut env, d, global).expect("attach succeeds");

        assert_eq!(
            lookup_type_in_scope(&env, &fqn_to_components("C"), global),
            None
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Splitting and re-joining a qualified name with no
            // leading/trailing "::" is the identity.
            #[test]
            fn fqn_split_join_round_trip(
                components in proptest::collection::vec("[a-z][a-z0-9_]{0,8}", 1..5)
            ) {
                let fqn = components.join("::");
                let split = fqn_to_components(&fqn);
                prop_assert_eq!(components_to_type_name(&split), fqn);
            }

            #[test]
            fn template_arguments_hide_delimiters(
                inner in "[a-z][a-z0-9_]{0,6}(::[a-z][a-z0-9_]{0,6}){0,2}"
            ) {
                let fqn = format!("outer<{inner}>::last");
                let split = fqn_to_components(&fqn);
                prop_assert_eq!(split.len(), 2);
                prop_assert_eq!(split[1].as_str(), "last");
            }
        }
    }
}
