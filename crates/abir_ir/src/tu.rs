//! Translation units.
//!
//! A translation unit owns its path, address size, source language,
//! location manager, global scope, the function types created while
//! reading it (function types have no syntactic scope, so the unit
//! keeps them alive), and a qualified-name-to-type lookup map.

use crate::scope::{ScopeKind, ScopeNode};
use crate::{CorpusId, Environment, LocationManager, Name, ScopeId, TuId, TypeId};
use rustc_hash::FxHashMap;

/// Source language of a translation unit.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum SourceLanguage {
    /// Unknown language.
    #[default]
    Unknown,
    /// C.
    C,
    /// C++.
    CPlusPlus,
    /// Assembly.
    Assembly,
    /// Rust.
    Rust,
    /// Some other recorded language.
    Other,
}

/// A translation unit. Belongs to at most one corpus.
pub struct TranslationUnit {
    path: String,
    address_size_in_bits: u32,
    language: SourceLanguage,
    loc_mgr: LocationManager,
    global_scope: ScopeId,
    live_fn_types: Vec<TypeId>,
    type_name_map: FxHashMap<Name, TypeId>,
    is_constructed: bool,
    corpus: Option<CorpusId>,
}

impl TranslationUnit {
    /// Path of the unit's source file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Address size of the target, in bits.
    pub fn address_size_in_bits(&self) -> u32 {
        self.address_size_in_bits
    }

    /// Source language of the unit.
    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    /// The unit's global scope.
    pub fn global_scope(&self) -> ScopeId {
        self.global_scope
    }

    /// The unit's location manager.
    pub fn location_manager(&self) -> &LocationManager {
        &self.loc_mgr
    }

    /// Mutable access to the location manager.
    pub fn location_manager_mut(&mut self) -> &mut LocationManager {
        &mut self.loc_mgr
    }

    /// Function types kept alive by this unit.
    pub fn live_fn_types(&self) -> &[TypeId] {
        &self.live_fn_types
    }

    /// Whether construction of the unit has finished.
    pub fn is_constructed(&self) -> bool {
        self.is_constructed
    }

    /// The corpus the unit belongs to, if any.
    pub fn corpus(&self) -> Option<CorpusId> {
        self.corpus
    }

    /// Look up a type by qualified name.
    pub fn lookup_type(&self, qualified_name: Name) -> Option<TypeId> {
        self.type_name_map.get(&qualified_name).copied()
    }

    /// All registered (name, type) pairs.
    pub fn type_names(&self) -> impl Iterator<Item = (Name, TypeId)> + '_ {
        self.type_name_map.iter().map(|(&n, &t)| (n, t))
    }

    pub(crate) fn keep_fn_type_alive(&mut self, t: TypeId) {
        self.live_fn_types.push(t);
    }

    pub(crate) fn register_type_name(&mut self, qualified_name: Name, t: TypeId) {
        self.type_name_map.insert(qualified_name, t);
    }

    pub(crate) fn set_corpus(&mut self, corpus: CorpusId) {
        self.corpus = Some(corpus);
    }
}

impl Environment {
    /// Create a translation unit bound to this environment, with its
    /// global scope.
    pub fn new_translation_unit(
        &mut self,
        path: &str,
        address_size_in_bits: u32,
        language: SourceLanguage,
    ) -> TuId {
        let tu = TuId::from_raw(
            u32::try_from(self.tus.len())
                .unwrap_or_else(|_| panic!("translation-unit arena exceeded u32::MAX entries")),
        );
        let global_scope = self.push_scope(ScopeNode::new(ScopeKind::Global { tu }, Some(tu)));
        self.tus.push(TranslationUnit {
            path: path.to_owned(),
            address_size_in_bits,
            language,
            loc_mgr: LocationManager::new(),
            global_scope,
            live_fn_types: Vec::new(),
            type_name_map: FxHashMap::default(),
            is_constructed: false,
            corpus: None,
        });
        tu
    }

    /// Mark a translation unit constructed. At this transition the
    /// virtual member functions of every class reachable from the
    /// unit's global scope are sorted into vtable order.
    pub fn mark_translation_unit_constructed(&mut self, tu: TuId) {
        let reachable = crate::visit::reachable_types_of_translation_unit(self, tu);
        for t in reachable {
            let is_class_or_union = self.type_node(t).kind.class_or_union().is_some();
            if !is_class_or_union {
                continue;
            }
            let mut virtuals = self
                .type_node(t)
                .kind
                .class_or_union()
                .map(|p| p.virtual_member_fns.clone())
                .unwrap_or_default();
            virtuals.sort_by_key(|&d| match &self.decl(d).kind {
                crate::DeclKind::Func(f) => f.member.map_or(i64::MAX, |m| m.vtable_offset),
                _ => i64::MAX,
            });
            if let Some(parts) = self.type_node_mut(t).kind.class_or_union_mut() {
                parts.virtual_member_fns = virtuals;
            }
        }
        self.tu_mut(tu).is_constructed = true;
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "Tests use expect for clarity")]
mod tests {
    use super::*;
    use crate::scope::add_decl_to_scope;
    use crate::types::MemberFnInfo;
    use crate::{AccessSpecifier, DeclBinding, Location, Parameter};

    #[test]
    fn new_unit_has_a_global_scope_bound_to_it() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("lib.c", 64, SourceLanguage::C);
        let scope = env.tu(tu).global_scope();
        assert_eq!(env.scope_node(scope).tu, Some(tu));
        assert!(!env.tu(tu).is_constructed());
        assert_eq!(env.tu(tu).path(), "lib.c");
    }

    #[test]
    fn constructed_transition_sorts_vtable_order() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.cc", 64, SourceLanguage::CPlusPlus);
        let global = env.tu(tu).global_scope();
        let void = env.get_void_type();

        let class = env.new_class_type("C", 64, 64, false, false, Location::NONE);
        let class_decl = env.type_decl(class).expect("class has a decl");
        add_decl_to_scope(&mut env, class_decl, global).expect("attach succeeds");

        // Two virtual member functions added out of vtable order.
        for (name, offset) in [("g", 2), ("f", 1)] {
            let mty = env.new_method_type(tu, class, void, Vec::<Parameter>::new());
            let f = env.new_fn_decl(name, mty, DeclBinding::Global, false, Location::NONE);
            env.class_add_member_fn(
                class,
                f,
                AccessSpecifier::Public,
                false,
                MemberFnInfo {
                    is_virtual: true,
                    vtable_offset: offset,
                    ..MemberFnInfo::default()
                },
            )
            .expect("attach succeeds");
        }

        let before: Vec<_> = (0..env.class_virtual_member_fn_count(class))
            .map(|i| env.class_virtual_member_fn(class, i))
            .map(|d| env.str(env.decl(d).data.name))
            .collect();
        assert_eq!(before, vec!["g", "f"]);

        env.mark_translation_unit_constructed(tu);

        let after: Vec<_> = (0..env.class_virtual_member_fn_count(class))
            .map(|i| env.class_virtual_member_fn(class, i))
            .map(|d| env.str(env.decl(d).data.name))
            .collect();
        assert_eq!(after, vec!["f", "g"]);
        assert!(env.tu(tu).is_constructed());
    }
}
