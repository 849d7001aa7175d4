//! Hashing of types and decls for the diff engine.
//!
//! A canonicalized type hashes to its canonical handle value, so
//! structurally equal types hash equal in O(1). Types without a
//! canonical fall back to a cycle-safe recursive structural hash.

use abir_ir::types::TypeKind;
use abir_ir::{DeclId, DeclKind, Environment, TypeId};
use rustc_hash::{FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};

/// A type or a decl, for the combined hashing entry point.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Artifact {
    /// A type.
    Type(TypeId),
    /// A decl.
    Decl(DeclId),
}

/// Hash a type: the canonical handle value when available, else a
/// recursive structural hash.
pub fn hash_type(env: &Environment, t: TypeId) -> u64 {
    if let Some(canonical) = env.canonical_type(t) {
        return u64::from(canonical.raw());
    }
    let mut visited = FxHashSet::default();
    let mut hasher = FxHasher::default();
    hash_type_structural(env, t, &mut visited, &mut hasher);
    hasher.finish()
}

/// Hash a decl: its qualified name, kind, and the hash of its type.
pub fn hash_decl(env: &Environment, d: DeclId) -> u64 {
    let mut hasher = FxHasher::default();
    let data = &env.decl(d).data;
    data.qualified_name.raw().hash(&mut hasher);
    data.linkage_name.raw().hash(&mut hasher);
    match &env.decl(d).kind {
        DeclKind::Var(v) => {
            0u8.hash(&mut hasher);
            hash_type(env, v.ty).hash(&mut hasher);
        }
        DeclKind::Func(f) => {
            1u8.hash(&mut hasher);
            hash_type(env, f.ty).hash(&mut hasher);
        }
        DeclKind::Namespace(_) => 2u8.hash(&mut hasher),
        DeclKind::Type(t) => {
            3u8.hash(&mut hasher);
            hash_type(env, *t).hash(&mut hasher);
        }
        DeclKind::FunctionTemplate(_) => 4u8.hash(&mut hasher),
        DeclKind::ClassTemplate(t) => {
            5u8.hash(&mut hasher);
            hash_type(env, t.pattern).hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Hash either artifact kind.
pub fn hash_type_or_decl(env: &Environment, artifact: Artifact) -> u64 {
    match artifact {
        Artifact::Type(t) => hash_type(env, t),
        Artifact::Decl(d) => hash_decl(env, d),
    }
}

fn hash_type_structural(
    env: &Environment,
    t: TypeId,
    visited: &mut FxHashSet<TypeId>,
    hasher: &mut FxHasher,
) {
    if !visited.insert(t) {
        // Cycle: the back-edge itself contributes a marker only.
        0xCAFEu16.hash(hasher);
        return;
    }

    let node = env.type_node(t);
    std::mem::discriminant(&node.kind).hash(hasher);
    node.size_in_bits().hash(hasher);
    node.alignment_in_bits().hash(hasher);
    if let Some(name) = env.type_name_id(t) {
        name.raw().hash(hasher);
    }

    match &node.kind {
        TypeKind::Scalar(_) | TypeKind::TemplateParameter(_) => {}
        TypeKind::Qualified(q) => {
            q.quals.bits().hash(hasher);
            hash_type_structural(env, q.underlying, visited, hasher);
        }
        TypeKind::Pointer(p) => hash_type_structural(env, p.pointee, visited, hasher),
        TypeKind::Reference(r) => {
            r.is_lvalue.hash(hasher);
            hash_type_structural(env, r.pointee, visited, hasher);
        }
        TypeKind::Array(a) => {
            for s in &a.subranges {
                s.is_infinite().hash(hasher);
                s.length().hash(hasher);
            }
            hash_type_structural(env, a.element, visited, hasher);
        }
        TypeKind::Enum(e) => {
            for enumerator in &e.enumerators {
                enumerator.name.raw().hash(hasher);
                enumerator.value.hash(hasher);
            }
            hash_type_structural(env, e.underlying, visited, hasher);
        }
        TypeKind::Typedef(td) => hash_type_structural(env, td.underlying, visited, hasher),
        TypeKind::Function(f) => {
            hash_type_structural(env, f.return_type, visited, hasher);
            for p in &f.parms {
                if p.is_artificial {
                    continue;
                }
                p.is_variadic.hash(hasher);
                hash_type_structural(env, p.ty, visited, hasher);
            }
        }
        TypeKind::Method(m) => {
            if let Some(name) = env.type_name_id(m.class) {
                name.raw().hash(hasher);
            }
            hash_type_structural(env, m.fn_type.return_type, visited, hasher);
            for p in &m.fn_type.parms {
                if p.is_artificial {
                    continue;
                }
                hash_type_structural(env, p.ty, visited, hasher);
            }
        }
        TypeKind::Class(c) => {
            for base in &c.bases {
                base.offset_in_bits.hash(hasher);
                hash_type_structural(env, base.base, visited, hasher);
            }
            for &member in &c.parts.data_members {
                hash_data_member(env, member, visited, hasher);
            }
        }
        TypeKind::Union(u) => {
            for &member in &u.parts.data_members {
                hash_data_member(env, member, visited, hasher);
            }
        }
    }

    visited.remove(&t);
}

fn hash_data_member(
    env: &Environment,
    d: DeclId,
    visited: &mut FxHashSet<TypeId>,
    hasher: &mut FxHasher,
) {
    let data = &env.decl(d).data;
    data.name.raw().hash(hasher);
    if let DeclKind::Var(v) = &env.decl(d).kind {
        if let Some(member) = v.member {
            member.offset_in_bits.hash(hasher);
        }
        hash_type_structural(env, v.ty, visited, hasher);
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "Tests use expect for clarity")]
mod tests {
    use super::*;
    use abir_ir::{AccessSpecifier, DeclBinding, Location};

    #[test]
    fn canonicalized_types_hash_by_canonical_handle() {
        let mut env = Environment::new();
        let a = env.new_scalar_type("int", 32, 32);
        let b = env.new_scalar_type("int", 32, 32);
        env.set_canonical_type(a, a);
        env.set_canonical_type(b, a);
        assert_eq!(hash_type(&env, a), hash_type(&env, b));
        assert_eq!(hash_type(&env, a), u64::from(a.raw()));
    }

    #[test]
    fn structural_hash_is_stable_and_cycle_safe() {
        let mut env = Environment::new();
        // class Node { Node* next; } twice, no canonicalization.
        let build = |env: &mut Environment| {
            let node = env.new_class_type("Node", 64, 64, false, false, Location::NONE);
            let ptr = env.new_pointer_type(node, 64, 64);
            let next = env.new_var_decl("next", ptr, DeclBinding::None, Location::NONE);
            env.class_add_data_member(node, next, AccessSpecifier::Public, false, true, 0)
                .expect("attach succeeds");
            node
        };
        let n1 = build(&mut env);
        let n2 = build(&mut env);

        assert_eq!(hash_type(&env, n1), hash_type(&env, n2));

        // A layout difference shows up in the hash.
        let other = env.new_class_type("Node", 128, 64, false, false, Location::NONE);
        assert_ne!(hash_type(&env, n1), hash_type(&env, other));
    }

    #[test]
    fn decl_hash_covers_name_and_type() {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        let a = env.new_var_decl("a", int, DeclBinding::Global, Location::NONE);
        let a2 = env.new_var_decl("a", int, DeclBinding::Global, Location::NONE);
        let b = env.new_var_decl("b", int, DeclBinding::Global, Location::NONE);

        assert_eq!(
            hash_type_or_decl(&env, Artifact::Decl(a)),
            hash_type_or_decl(&env, Artifact::Decl(a2))
        );
        assert_ne!(
            hash_type_or_decl(&env, Artifact::Decl(a)),
            hash_type_or_decl(&env, Artifact::Decl(b))
        );
    }
}
