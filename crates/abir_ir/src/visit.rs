//! Generic traversal over the IR.
//!
//! A [`Traversal`] drives an [`IrVisitor`] over types and decls. Each
//! node is guarded by a visiting flag for the duration of the walk:
//! re-entering a node already being visited is a no-op, which is what
//! breaks cycles (a class containing a method whose parameter points
//! back at the class).
//!
//! The contract: `visit_*_begin` returns `true` to descend into the
//! sub-tree and `false` to skip it; `visit_*_end` returns `true` to
//! continue the traversal at the parent level and `false` to abort the
//! whole walk.

use crate::types::TypeKind;
use crate::{DeclId, DeclKind, Environment, ScopeId, TuId, TypeId};
use rustc_hash::FxHashSet;

/// Visitor over IR artifacts.
pub trait IrVisitor {
    /// Called before descending into a type's sub-tree.
    fn visit_type_begin(&mut self, env: &Environment, t: TypeId) -> bool {
        let _ = (env, t);
        true
    }

    /// Called after a type's sub-tree has been visited.
    fn visit_type_end(&mut self, env: &Environment, t: TypeId) -> bool {
        let _ = (env, t);
        true
    }

    /// Called before descending into a decl's sub-tree.
    fn visit_decl_begin(&mut self, env: &Environment, d: DeclId) -> bool {
        let _ = (env, d);
        true
    }

    /// Called after a decl's sub-tree has been visited.
    fn visit_decl_end(&mut self, env: &Environment, d: DeclId) -> bool {
        let _ = (env, d);
        true
    }
}

/// Traversal driver holding the visiting flags.
#[derive(Default)]
pub struct Traversal {
    visiting_types: FxHashSet<TypeId>,
    visiting_decls: FxHashSet<DeclId>,
}

impl Traversal {
    /// Create a traversal with no node in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk a type. Returns `false` when the visitor aborted the walk.
    pub fn traverse_type(
        &mut self,
        env: &Environment,
        t: TypeId,
        visitor: &mut dyn IrVisitor,
    ) -> bool {
        if self.visiting_types.contains(&t) {
            // Cycle break: re-entry is a no-op.
            return true;
        }
        if visitor.visit_type_begin(env, t) {
            self.visiting_types.insert(t);
            let descended = self.traverse_type_children(env, t, visitor);
            self.visiting_types.remove(&t);
            if !descended {
                return false;
            }
        }
        visitor.visit_type_end(env, t)
    }

    fn traverse_type_children(
        &mut self,
        env: &Environment,
        t: TypeId,
        visitor: &mut dyn IrVisitor,
    ) -> bool {
        match &env.type_node(t).kind {
            TypeKind::Scalar(_) | TypeKind::TemplateParameter(_) => true,
            TypeKind::Qualified(q) => self.traverse_type(env, q.underlying, visitor),
            TypeKind::Pointer(p) => self.traverse_type(env, p.pointee, visitor),
            TypeKind::Reference(r) => self.traverse_type(env, r.pointee, visitor),
            TypeKind::Array(a) => self.traverse_type(env, a.element, visitor),
            TypeKind::Enum(e) => self.traverse_type(env, e.underlying, visitor),
            TypeKind::Typedef(td) => self.traverse_type(env, td.underlying, visitor),
            TypeKind::Function(f) => {
                if !self.traverse_type(env, f.return_type, visitor) {
                    return false;
                }
                for p in &f.parms {
                    if !self.traverse_type(env, p.ty, visitor) {
                        return false;
                    }
                }
                true
            }
            TypeKind::Method(m) => {
                if !self.traverse_type(env, m.class, visitor) {
                    return false;
                }
                if !self.traverse_type(env, m.fn_type.return_type, visitor) {
                    return false;
                }
                for p in &m.fn_type.parms {
                    if !self.traverse_type(env, p.ty, visitor) {
                        return false;
                    }
                }
                true
            }
            TypeKind::Class(c) => {
                for base in &c.bases {
                    if !self.traverse_type(env, base.base, visitor) {
                        return false;
                    }
                }
                self.traverse_class_members(env, &c.parts, visitor)
            }
            TypeKind::Union(u) => self.traverse_class_members(env, &u.parts, visitor),
        }
    }

    fn traverse_class_members(
        &mut self,
        env: &Environment,
        parts: &crate::types::ClassOrUnionParts,
        visitor: &mut dyn IrVisitor,
    ) -> bool {
        for &member in parts
            .data_members
            .iter()
            .chain(parts.member_fns.iter())
            .chain(parts.member_fn_templates.iter())
            .chain(parts.member_class_templates.iter())
        {
            if !self.traverse_decl(env, member, visitor) {
                return false;
            }
        }
        for &member in &parts.member_types {
            if !self.traverse_type(env, member, visitor) {
                return false;
            }
        }
        true
    }

    /// Walk a decl. Returns `false` when the visitor aborted the walk.
    pub fn traverse_decl(
        &mut self,
        env: &Environment,
        d: DeclId,
        visitor: &mut dyn IrVisitor,
    ) -> bool {
        if self.visiting_decls.contains(&d) {
            return true;
        }
        if visitor.visit_decl_begin(env, d) {
            self.visiting_decls.insert(d);
            let descended = self.traverse_decl_children(env, d, visitor);
            self.visiting_decls.remove(&d);
            if !descended {
                return false;
            }
        }
        visitor.visit_decl_end(env, d)
    }

    fn traverse_decl_children(
        &mut self,
        env: &Environment,
        d: DeclId,
        visitor: &mut dyn IrVisitor,
    ) -> bool {
        match &env.decl(d).kind {
            DeclKind::Var(v) => self.traverse_type(env, v.ty, visitor),
            DeclKind::Func(f) => self.traverse_type(env, f.ty, visitor),
            DeclKind::Type(t) => self.traverse_type(env, *t, visitor),
            DeclKind::Namespace(ns) => self.traverse_scope(env, ns.scope, visitor),
            DeclKind::FunctionTemplate(t) => self.traverse_decl(env, t.pattern, visitor),
            DeclKind::ClassTemplate(t) => self.traverse_type(env, t.pattern, visitor),
        }
    }

    /// Walk every member of a scope, in declaration order.
    pub fn traverse_scope(
        &mut self,
        env: &Environment,
        scope: ScopeId,
        visitor: &mut dyn IrVisitor,
    ) -> bool {
        for &member in &env.scope_node(scope).members {
            if !self.traverse_decl(env, member, visitor) {
                return false;
            }
        }
        true
    }
}

/// Collector of every distinct type encountered, in visit order.
#[derive(Default)]
struct TypeCollector {
    seen: FxHashSet<TypeId>,
    out: Vec<TypeId>,
}

impl IrVisitor for TypeCollector {
    fn visit_type_begin(&mut self, _env: &Environment, t: TypeId) -> bool {
        if self.seen.insert(t) {
            self.out.push(t);
            true
        } else {
            false
        }
    }
}

/// Every distinct type reachable from `t`, including `t` itself.
pub fn reachable_types_from(env: &Environment, t: TypeId) -> Vec<TypeId> {
    let mut collector = TypeCollector::default();
    let mut traversal = Traversal::new();
    traversal.traverse_type(env, t, &mut collector);
    collector.out
}

/// Every distinct type reachable from a translation unit's global
/// scope, followed by the function types the unit keeps alive.
pub fn reachable_types_of_translation_unit(env: &Environment, tu: TuId) -> Vec<TypeId> {
    let mut collector = TypeCollector::default();
    let mut traversal = Traversal::new();
    traversal.traverse_scope(env, env.tu(tu).global_scope(), &mut collector);
    for &t in env.tu(tu).live_fn_types() {
        traversal.traverse_type(env, t, &mut collector);
    }
    collector.out
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "Tests use expect for clarity")]
mod tests {
    use super::*;
    use crate::scope::add_decl_to_scope;
    use crate::types::{AccessSpecifier, Parameter};
    use crate::{DeclBinding, Location, Name, SourceLanguage};

    #[test]
    fn traversal_terminates_on_cyclic_types() {
        let mut env = Environment::new();
        // class Node { Node* next; }
        let node = env.new_class_type("Node", 64, 64, false, false, Location::NONE);
        let ptr = env.new_pointer_type(node, 64, 64);
        let next = env.new_var_decl("next", ptr, DeclBinding::None, Location::NONE);
        env.class_add_data_member(node, next, AccessSpecifier::Public, false, true, 0)
            .expect("attach succeeds");

        let reachable = reachable_types_from(&env, node);
        assert!(reachable.contains(&node));
        assert!(reachable.contains(&ptr));
        // Visited once each, despite the cycle.
        assert_eq!(reachable.len(), 2);
    }

    #[test]
    fn begin_false_skips_the_subtree() {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        let ptr = env.new_pointer_type(int, 64, 64);

        struct SkipPointers {
            visited: Vec<TypeId>,
        }
        impl IrVisitor for SkipPointers {
            fn visit_type_begin(&mut self, env: &Environment, t: TypeId) -> bool {
                self.visited.push(t);
                env.type_tag(t) != crate::types::TypeTag::Pointer
            }
        }

        let mut visitor = SkipPointers { visited: Vec::new() };
        let mut traversal = Traversal::new();
        assert!(traversal.traverse_type(&env, ptr, &mut visitor));
        // The pointer was seen, its pointee was not.
        assert_eq!(visitor.visited, vec![ptr]);
    }

    #[test]
    fn end_false_aborts_the_walk() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.c", 64, SourceLanguage::C);
        let global = env.tu(tu).global_scope();
        let int = env.new_scalar_type("int", 32, 32);
        let a = env.new_var_decl("a", int, DeclBinding::Global, Location::NONE);
        let b = env.new_var_decl("b", int, DeclBinding::Global, Location::NONE);
        add_decl_to_scope(&mut env, a, global).expect("attach succeeds");
        add_decl_to_scope(&mut env, b, global).expect("attach succeeds");

        struct StopAfterFirstDecl {
            decls: usize,
        }
        impl IrVisitor for StopAfterFirstDecl {
            fn visit_decl_end(&mut self, _env: &Environment, _d: DeclId) -> bool {
                self.decls += 1;
                false
            }
        }

        let mut visitor = StopAfterFirstDecl { decls: 0 };
        let mut traversal = Traversal::new();
        assert!(!traversal.traverse_scope(&env, global, &mut visitor));
        assert_eq!(visitor.decls, 1);
    }

    #[test]
    fn translation_unit_reachability_includes_live_fn_types() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.c", 64, SourceLanguage::C);
        let int = env.new_scalar_type("int", 32, 32);
        let void = env.get_void_type();
        let f = env.new_function_type(tu, void, vec![Parameter::new(int, Name::EMPTY)]);

        let reachable = reachable_types_of_translation_unit(&env, tu);
        assert!(reachable.contains(&f));
        assert!(reachable.contains(&int));
        assert!(reachable.contains(&void));
    }
}
