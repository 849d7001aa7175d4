//! Type canonicalization.
//!
//! [`canonicalize`] assigns each type the unique representative of its
//! structural-equality class. After a type has been canonicalized,
//! testing it for equality against any other canonicalized type is a
//! handle comparison.
//!
//! The registry lives on the environment and is keyed by the internal
//! pretty representation. Candidate vectors are scanned from the end:
//! when a second corpus is loaded, its freshly appended types are
//! found first, which maximizes the hit rate of the
//! One-Definition-Rule fast path.

use crate::cmp::equal;
use abir_ir::repr::type_repr_id;
use abir_ir::visit::reachable_types_of_translation_unit;
use abir_ir::{Environment, TuId, TypeId, TypeTag};

/// Compute (or return) the canonical type of `t`.
///
/// Idempotent: a second call returns the same representative. A
/// declaration-only class with a known definition is canonicalized
/// through the definition and shares its canonical.
pub fn canonicalize(env: &mut Environment, t: TypeId) -> TypeId {
    if let Some(canonical) = env.canonical_type(t) {
        return canonical;
    }

    let target = env.decl_only_definition(t).unwrap_or(t);
    let canonical = match env.canonical_type(target) {
        Some(c) => c,
        None => compute_canonical(env, target),
    };
    if target != t {
        env.set_canonical_type(t, canonical);
    }
    canonical
}

/// The canonical type of `t`, if it has been computed.
pub fn get_canonical_type_for(env: &Environment, t: TypeId) -> Option<TypeId> {
    env.canonical_type(t)
}

fn compute_canonical(env: &mut Environment, t: TypeId) -> TypeId {
    let key = type_repr_id(env, t, true);

    let candidates: Vec<TypeId> = env.canonical_candidates(key).to_vec();
    let mut found = None;
    for &candidate in candidates.iter().rev() {
        if odr_fast_path_matches(env, t, candidate) {
            tracing::debug!(ty = ?t, candidate = ?candidate, "canonical hit via ODR fast path");
            found = Some(candidate);
            break;
        }
        // The candidate goes on the left: the left-hand side of a
        // comparison is the canonicalized one, the right-hand side is
        // the type being canonicalized.
        if equal(env, candidate, t, None) {
            tracing::trace!(ty = ?t, candidate = ?candidate, "canonical hit via structural equality");
            found = Some(candidate);
            break;
        }
    }

    let canonical = match found {
        Some(candidate) => candidate,
        None => {
            tracing::trace!(ty = ?t, key = env.str(key), "registering new canonical type");
            env.append_canonical_candidate(key, t);
            t
        }
    };
    env.set_canonical_type(t, canonical);
    propagate_to_earlier_declarations(env, t, canonical);
    canonical
}

/// Give the canonical of a freshly canonicalized class definition to
/// the declaration-only nodes resolved to it.
fn propagate_to_earlier_declarations(env: &mut Environment, t: TypeId, canonical: TypeId) {
    let declarations: Vec<TypeId> = env
        .type_node(t)
        .kind
        .class_or_union()
        .map(|p| p.declarations.clone())
        .unwrap_or_default();
    for declaration in declarations {
        if env.canonical_type(declaration).is_none() {
            env.set_canonical_type(declaration, canonical);
        }
    }
}

/// The One-Definition-Rule fast path: within one corpus, two named,
/// complete class (or union) types of the same name and size are the
/// same type; no structural comparison is needed.
fn odr_fast_path_matches(env: &Environment, t: TypeId, candidate: TypeId) -> bool {
    let tag = env.type_tag(t);
    if !matches!(tag, TypeTag::Class | TypeTag::Union) || env.type_tag(candidate) != tag {
        return false;
    }
    if env.is_anonymous_type(t) || env.is_anonymous_type(candidate) {
        return false;
    }
    if env.is_declaration_only(t) || env.is_declaration_only(candidate) {
        return false;
    }
    let (Some(tc), Some(cc)) = (env.type_corpus(t), env.type_corpus(candidate)) else {
        return false;
    };
    if tc != cc {
        return false;
    }
    env.type_node(t).size_in_bits() == env.type_node(candidate).size_in_bits()
}

/// Canonicalize every type reachable from a translation unit's global
/// scope, plus the function types the unit keeps alive. Any
/// propagation still tentative at the end of the pass is
/// force-confirmed: with the pass over, nothing is in doubt anymore.
pub fn canonicalize_translation_unit(env: &mut Environment, tu: TuId) {
    let types = reachable_types_of_translation_unit(env, tu);
    tracing::debug!(tu = ?tu, count = types.len(), "canonicalizing translation unit");
    for t in types {
        canonicalize(env, t);
    }
    env.confirm_all_propagations();
}
